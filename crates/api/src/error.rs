//! Error types for the REST client.

use nestmate_core::retry::{classify_http_status, RetryClass};
use nestmate_core::StorageError;
use thiserror::Error;

/// Result type alias for REST operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure, no response received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response, message normalized from the server error body
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Local secret-store failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Missing credential or user id before an operation that requires it
    #[error("precondition failed: {0}")]
    Precondition(String),
}

impl ApiError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a precondition error
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Http(_) => RetryClass::Retryable,
            Self::Json(_) => RetryClass::Permanent,
            Self::Storage(_) => RetryClass::Permanent,
            Self::Precondition(_) => RetryClass::Permanent,
        }
    }

    /// True for transport-level failures where no response was received.
    /// The session manager's offline-mode policy keys off this.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
