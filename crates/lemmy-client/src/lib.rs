//! Lemmy API client for community migration
//!
//! Provides the rate-limited request executor and the per-account session
//! used to move community subscriptions between accounts. This crate knows
//! nothing about the sync algorithm; it only turns the Lemmy v3 HTTP API into
//! typed, fallible operations.
//!
//! Session flow:
//! 1. `SiteIdentity::normalize()` turns user input into an `https://host` base
//! 2. `AccountSession::login()` fetches the bearer token once per run
//! 3. `AccountSession::subscriptions()` pages through `community/list` and
//!    memoizes the result
//! 4. `AccountSession::resolve_community()` maps a canonical actor URL to the
//!    instance-local id
//! 5. `AccountSession::follow()` subscribes using that id

pub mod community;
pub mod constants;
pub mod error;
pub mod executor;
pub mod session;
pub mod site;
#[cfg(feature = "test-util")]
pub mod testing;
pub mod types;

pub use community::{CommunityRef, local_name};
pub use constants::*;
pub use error::{Error, Result};
pub use executor::{Executor, ExecutorConfig};
pub use session::{AccountSession, FollowOutcome, SessionOptions};
pub use site::SiteIdentity;
pub use types::{CommentView, ListingType, SubscribedType};
