//! Run-level error types

use thiserror::Error;

/// Failures that stop a migration run.
///
/// Problems with individual satellite accounts or communities never end up
/// here; they are logged, recorded in the run summary, and skipped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] lemmy_client::Error),

    #[error("main account \"{account}\" could not log in: {source}")]
    MainLogin {
        account: String,
        #[source]
        source: lemmy_client::Error,
    },

    #[error("could not list subscriptions of \"{account}\": {source}")]
    SourceListing {
        account: String,
        #[source]
        source: community_sync::Error,
    },

    #[error("import failed: {0}")]
    Import(#[source] community_sync::Error),

    #[error("main account \"{0}\" is not configured")]
    MissingMain(String),
}

/// Result alias using run Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = Error::MainLogin {
            account: "main".into(),
            source: lemmy_client::Error::NotAuthenticated,
        };
        assert_eq!(
            err.to_string(),
            "main account \"main\" could not log in: session is not logged in"
        );

        let err = Error::Import(community_sync::Error::BackupIo {
            path: "/tmp/missing.json".into(),
            message: "not found".into(),
        });
        assert!(err.to_string().contains("/tmp/missing.json"));
    }

    #[test]
    fn error_debug_includes_variant_name() {
        let err = Error::MissingMain("primary".into());
        let debug = format!("{err:?}");
        assert!(
            debug.contains("MissingMain"),
            "Debug output must include variant name, got: {debug}"
        );
    }
}
