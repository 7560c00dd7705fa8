//! Storage errors
//!
//! Vault and state-file failures, classified from `io::Error` so the CLI can
//! suggest a fix.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied on '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left while writing '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The state file exists but isn't valid JSON for `SyncData`
    #[error("Corrupt state file '{path}': {details}")]
    InvalidFormat { path: PathBuf, details: String },

    #[error("Not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The pass lock file is held
    #[error("Another sync is already running (lock file '{path}')")]
    Locked { path: PathBuf },

    /// Renaming the temp file over the target failed
    #[error("Cannot replace '{to}' with '{from}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Classify an I/O failure on `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StorageError::NotFound { path },
            _ if is_out_of_space(&error) => StorageError::DiskFull {
                path,
                source: error,
            },
            _ => StorageError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Like `from_io`, but unclassified failures are reads
    pub fn from_read(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound => {
                Self::from_io(error, path)
            }
            _ => StorageError::ReadError {
                path,
                source: error,
            },
        }
    }

    /// What the user can do about it, when there's something
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } | StorageError::CreateDirectory { .. } => {
                Some("Check permissions of the vault and data directories.")
            }
            StorageError::InvalidFormat { .. } => {
                Some("Move the state file aside and run `ankisync import` then `ankisync sync --full`.")
            }
            StorageError::Locked { .. } => {
                Some("Wait for the running sync to finish, or delete the lock file if none is running.")
            }
            StorageError::NotFound { .. } => Some("Check vault_dir with `ankisync config show`."),
            _ => None,
        }
    }
}

// io::ErrorKind::StorageFull isn't stable on our MSRV
fn is_out_of_space(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::from_io(io_err, PathBuf::from("/vault/a.md"));

        assert!(matches!(err, StorageError::PermissionDenied { .. }));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_missing_file_on_read() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = StorageError::from_read(io_err, PathBuf::from("/vault/gone.md"));

        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_read_error() {
        let io_err = io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8");
        let err = StorageError::from_read(io_err, PathBuf::from("/vault/bad.md"));

        assert!(matches!(err, StorageError::ReadError { .. }));
        assert!(err.recovery_suggestion().is_none());
    }

    #[test]
    fn test_out_of_space() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = StorageError::from_io(io_err, PathBuf::from("/data/state.json"));

        assert!(matches!(err, StorageError::DiskFull { .. }));
    }

    #[test]
    fn test_locked_message() {
        let err = StorageError::Locked {
            path: PathBuf::from("/data/sync.lock"),
        };

        let msg = err.to_string();
        assert!(msg.contains("already running"));
        assert!(msg.contains("/data/sync.lock"));
    }
}
