//! Error types for feedrelay.

use thiserror::Error;

/// Common error type for feedrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Feed fetch or parse error.
    #[error("feed error: {0}")]
    Feed(String),

    /// Notification delivery error.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for RelayError {
    fn from(e: sqlx::Error) -> Self {
        RelayError::Database(e.to_string())
    }
}

/// Result type alias for feedrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = RelayError::Validation("url is empty".to_string());
        assert_eq!(err.to_string(), "validation error: url is empty");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = RelayError::NotFound("subscription".to_string());
        assert_eq!(err.to_string(), "subscription not found");
    }

    #[test]
    fn test_feed_error_display() {
        let err = RelayError::Feed("HTTP error: 503".to_string());
        assert_eq!(err.to_string(), "feed error: HTTP error: 503");
    }

    #[test]
    fn test_delivery_error_display() {
        let err = RelayError::Delivery("webhook returned 404".to_string());
        assert_eq!(err.to_string(), "delivery error: webhook returned 404");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RelayError = io_err.into();
        assert!(matches!(err, RelayError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: RelayError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, RelayError::Database(_)));
    }
}
