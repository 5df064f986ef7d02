//! Error types for sync and backup operations

use std::path::PathBuf;

/// Errors from sync and backup operations.
///
/// Per-community failures never show up here; they are collected in the
/// `SyncReport`. These are the failures that stop a whole operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("backup I/O error on {}: {message}", .path.display())]
    BackupIo { path: PathBuf, message: String },

    #[error("malformed backup {}: {message}", .path.display())]
    BackupFormat { path: PathBuf, message: String },

    #[error(transparent)]
    Client(#[from] lemmy_client::Error),
}

/// Result alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_errors_name_the_file() {
        let err = Error::BackupFormat {
            path: PathBuf::from("/tmp/backup.json"),
            message: "expected an object".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/backup.json"), "got: {msg}");
        assert!(msg.contains("expected an object"), "got: {msg}");
    }

    #[test]
    fn client_errors_pass_through() {
        let err: Error = lemmy_client::Error::NotAuthenticated.into();
        assert_eq!(err.to_string(), "session is not logged in");
    }
}
