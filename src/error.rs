//! Error types for keyquiz
//!
//! This module provides error handling using thiserror for structured error
//! definitions and anyhow for error propagation at the binary edge.

use std::time::Duration;
use thiserror::Error;

/// Main error type for keyquiz operations
#[derive(Error, Debug)]
pub enum KeyquizError {
    /// Persisted state store read or write failed
    #[error("Store error: {0}")]
    Store(String),

    /// Quiz backend could not be reached or produced an unusable reply
    #[error("Backend error: {0}")]
    Backend(String),

    /// Quiz backend answered with a non-success status
    #[error("Backend returned status {status}: {body}")]
    BackendStatus { status: u16, body: String },

    /// Quiz backend did not answer in time
    #[error("Backend request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Display surface refused to open a quiz view
    #[error("Display error: {0}")]
    Display(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied invalid input (blank names, zero thresholds, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown topic for an explicit topic operation
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl KeyquizError {
    /// Whether this error came from the quiz backend path.
    ///
    /// Backend failures are recoverable: the session is released and the
    /// next qualifying threshold crossing retries naturally.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            KeyquizError::Backend(_)
                | KeyquizError::BackendStatus { .. }
                | KeyquizError::Timeout(_)
                | KeyquizError::Http(_)
        )
    }
}

/// Result type alias for keyquiz operations
pub type Result<T> = std::result::Result<T, KeyquizError>;

/// Convert anyhow::Error to KeyquizError
impl From<anyhow::Error> for KeyquizError {
    fn from(err: anyhow::Error) -> Self {
        KeyquizError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KeyquizError::BackendStatus {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned status 500: boom");
    }

    #[test]
    fn test_backend_failure_classification() {
        assert!(KeyquizError::Timeout(Duration::from_secs(1)).is_backend_failure());
        assert!(KeyquizError::Backend("down".into()).is_backend_failure());
        assert!(!KeyquizError::Store("disk full".into()).is_backend_failure());
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: KeyquizError = json_err.into();
        assert!(matches!(err, KeyquizError::Serialization(_)));

        let err: KeyquizError = anyhow::anyhow!("context").into();
        assert_eq!(err.to_string(), "context");
    }
}
