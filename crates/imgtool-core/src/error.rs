//! Archive error types

use thiserror::Error;

/// The main error type for IMG archive operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading or writing a store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecognized layout or corrupt directory
    #[error("Invalid or unsupported IMG format: {0}")]
    Format(String),

    /// Missing store, member, file or directory
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad layout token, name collision, empty input set
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Some, but not all, items of a batch operation succeeded
    #[error("{operation} partially failed: {succeeded} succeeded, {failed} failed")]
    PartialFailure {
        operation: &'static str,
        succeeded: usize,
        failed: usize,
    },
}

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Map an I/O error on `path` to `NotFound` when the file is missing
    pub fn from_io_at(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.display().to_string())
        } else {
            Error::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_from_io_at_maps_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let mapped = Error::from_io_at(err, Path::new("models.img"));
        assert!(matches!(mapped, Error::NotFound(ref p) if p == "models.img"));
    }

    #[test]
    fn test_from_io_at_keeps_other_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let mapped = Error::from_io_at(err, Path::new("models.img"));
        assert!(matches!(mapped, Error::Io(_)));
    }

    #[test]
    fn test_partial_failure_message() {
        let err = Error::PartialFailure {
            operation: "add",
            succeeded: 2,
            failed: 1,
        };
        assert_eq!(err.to_string(), "add partially failed: 2 succeeded, 1 failed");
    }
}
