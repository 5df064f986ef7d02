//! Common types shared by the Lemmy migration crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
