//! Error types for PipeStore operations
//!
//! Every failure surfaces as a [`StoreError`]. Errors raised on a worker
//! thread travel back to the blocked caller unchanged, so variants are
//! `Clone` and carry their own context instead of borrowing it.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// PipeStore error types with enough context to locate the failure.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The row id has no entry in the offset index.
    #[error("Row {id} not found")]
    RowNotFound {
        /// 1-based row id as seen by the caller
        id: usize,
    },

    /// The named column is not part of the current schema.
    #[error("Column not found: {column}")]
    ColumnNotFound {
        /// Column name that failed to resolve
        column: String,
    },

    /// A column name appears twice in a header or an add request.
    #[error("Duplicate column: {column}")]
    DuplicateColumn {
        /// Offending column name
        column: String,
    },

    /// The backing file has no header line.
    #[error("Table file {} has no header line", .path.display())]
    EmptyFile {
        /// Backing file path
        path: PathBuf,
    },

    /// A value or column name cannot be stored without corrupting the layout.
    #[error("Invalid value {value:?}: {reason}")]
    InvalidValue {
        /// The rejected text
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// An underlying file operation failed.
    #[error("I/O error{}: {message} ({kind})", io_location(.path))]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// The caller stopped waiting for a queued mutation because its worker
    /// went away before replying.
    #[error("Operation interrupted: {operation}")]
    Interrupted {
        /// Which mutation was being awaited
        operation: String,
    },

    /// The mutation executor no longer accepts or runs tasks.
    #[error("Store is shut down")]
    ShutDown,

    /// Configuration rejected by [`crate::Config::validate`].
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Wrap an I/O error with the path it happened on and what was attempted.
    pub fn io(path: &Path, err: std::io::Error, what: &str) -> Self {
        StoreError::Io {
            path: Some(path.to_path_buf()),
            kind: err.kind(),
            message: format!("{}: {}", what, err),
        }
    }

    /// Build a `ColumnNotFound` for `column`.
    pub fn column_not_found(column: &str) -> Self {
        StoreError::ColumnNotFound { column: column.to_string() }
    }
}

fn io_location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

/// Convert std::io::Error to StoreError::Io
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for PipeStore operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::RowNotFound { id: 7 };
        assert_eq!(err.to_string(), "Row 7 not found");

        let err = StoreError::column_not_found("score");
        assert_eq!(err.to_string(), "Column not found: score");
    }

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StoreError::io(Path::new("/tmp/table.psv"), io_err, "Failed to open table");

        let display = err.to_string();
        assert!(display.contains("/tmp/table.psv"));
        assert!(display.contains("Failed to open table"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();

        match store_err {
            StoreError::Io { kind, path, .. } => {
                assert_eq!(kind, std::io::ErrorKind::NotFound);
                assert!(path.is_none());
            }
            _ => panic!("Expected Io error"),
        }
    }
}
