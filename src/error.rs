//! Error types for feedcast.

use thiserror::Error;

/// Common error type for feedcast.
#[derive(Error, Debug)]
pub enum FeedcastError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Fetching a feed, an image or a status endpoint failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Task queue error.
    #[error("queue error: {0}")]
    Queue(String),

    /// Delivery to a notification channel failed.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// A crawled item could not be converted into any request.
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// The enclosing deadline elapsed before the work completed.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Payload (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl FeedcastError {
    /// Whether this error is a deadline expiry rather than a failure of the work itself.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, FeedcastError::DeadlineExceeded(_))
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for FeedcastError {
    fn from(e: sqlx::Error) -> Self {
        FeedcastError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for FeedcastError {
    fn from(e: serde_json::Error) -> Self {
        FeedcastError::Serialization(e.to_string())
    }
}

/// Result type alias for feedcast operations.
pub type Result<T> = std::result::Result<T, FeedcastError>;
