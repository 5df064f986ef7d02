//! Lemmy API constants
//!
//! Endpoint paths are relative to a normalized site identity. Only the v3 API
//! is supported; instances running v4 still serve these routes.

use std::time::Duration;

/// API prefix shared by every endpoint
pub const API_BASE: &str = "api/v3";

pub const LOGIN_PATH: &str = "user/login";
pub const COMMUNITY_LIST_PATH: &str = "community/list";
pub const RESOLVE_OBJECT_PATH: &str = "resolve_object";
pub const COMMUNITY_FOLLOW_PATH: &str = "community/follow";
pub const COMMENT_LIST_PATH: &str = "comment/list";

/// Maximum page size accepted by `community/list`. A page with fewer entries
/// than this is the last one.
pub const PAGE_SIZE: u32 = 50;

/// Delay inserted before every request to stay under instance rate limits
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(1);

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failed page fetches tolerated within one listing before giving up
pub const DEFAULT_MAX_PAGE_ATTEMPTS: u32 = 5;

/// Path segment that precedes a community name in its actor URL
pub const COMMUNITY_PATH_MARKER: &str = "/c/";

pub const USER_AGENT: &str = concat!("lemmy-migrate/", env!("CARGO_PKG_VERSION"));
