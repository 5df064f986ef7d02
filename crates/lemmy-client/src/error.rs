//! Error types for Lemmy API operations

/// Errors from Lemmy API operations.
///
/// `Transport` and `Http` come straight from the executor and are never
/// retried there; callers decide whether to skip the item or abort.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("authentication failed: {0}")]
    Authentication(#[source] Box<Error>),

    #[error("failed to resolve community {community}: {source}")]
    Resolution {
        community: String,
        #[source]
        source: Box<Error>,
    },

    #[error("session is not logged in")]
    NotAuthenticated,

    #[error("listing aborted on page {page} after {attempts} failed attempts: {last_error}")]
    ListingAborted {
        page: u32,
        attempts: u32,
        last_error: String,
    },

    #[error("invalid site: {0}")]
    InvalidSite(String),

    #[error("HTTP client setup failed: {0}")]
    ClientBuild(String),
}

/// Result alias for Lemmy API operations.
pub type Result<T> = std::result::Result<T, Error>;
