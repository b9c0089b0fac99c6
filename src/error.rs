//! Custom error types for arcsync
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for arcsync operations
#[derive(Error, Debug)]
pub enum ArcsyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for settings and job definitions
    #[error("Validation error: {0}")]
    Validation(String),

    /// Secret protection errors
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// The external archiver failed or could not be started
    #[error("Archive error: {0}")]
    Archive(String),

    /// The external archiver did not finish in time
    #[error("Archive timed out after {seconds}s: {archive}")]
    ArchiveTimeout { archive: String, seconds: u64 },

    /// Remote store errors (raised after retries are exhausted)
    #[error("Remote error: {0}")]
    Remote(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Local archive directory errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ArcsyncError {
    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error came from the remote store
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<std::io::Error> for ArcsyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ArcsyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for arcsync operations
pub type ArcsyncResult<T> = Result<T, ArcsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArcsyncError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
        assert!(err.is_config());
    }

    #[test]
    fn test_timeout_error() {
        let err = ArcsyncError::ArchiveTimeout {
            archive: "F-Logs-2024-01-01-00-00-00.7z".into(),
            seconds: 1800,
        };
        assert_eq!(
            err.to_string(),
            "Archive timed out after 1800s: F-Logs-2024-01-01-00-00-00.7z"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ArcsyncError = io_err.into();
        assert!(matches!(err, ArcsyncError::Io(_)));
    }

    #[test]
    fn test_remote_predicate() {
        assert!(ArcsyncError::Remote("gone".into()).is_remote());
        assert!(!ArcsyncError::Storage("x".into()).is_remote());
    }
}
