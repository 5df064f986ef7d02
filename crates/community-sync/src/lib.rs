//! Community subscription sync
//!
//! Brings a destination account's followed communities up to date with a
//! source set. The source is either another account's live subscription set
//! or a backup file; the destination is anything implementing
//! `CommunityDirectory` (an `AccountSession` in production).
//!
//! Sync flow:
//! 1. Destination lists its current subscriptions
//! 2. `source - destination` over canonical actor URLs
//! 3. Candidates whose local name is excluded are dropped
//! 4. Each remaining candidate is resolved on the destination and followed
//! 5. A `SyncReport` summarizes what happened, item failures included

pub mod backup;
pub mod directory;
pub mod error;
pub mod exclusion;
pub mod sync;

pub use directory::CommunityDirectory;
pub use error::{Error, Result};
pub use exclusion::Exclusions;
pub use sync::{SyncFailure, SyncOptions, SyncReport, missing, sync};
