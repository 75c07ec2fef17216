//! Error types for the realtime channel.

use nestmate_core::StorageError;
use thiserror::Error;

/// Result type alias for realtime operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Errors that can occur on the realtime channel.
///
/// Connection and frame failures never escape the reader task (the channel
/// is best-effort); these surface only from the explicit `connect` call and
/// from frame parsing.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Missing credential before an operation that requires it
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// WebSocket handshake failure
    #[error("handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    /// Malformed inbound frame
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A connection is already open; disconnect first
    #[error("already connected")]
    AlreadyConnected,

    /// Local secret-store failure while reading the access token
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RealtimeError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
