//! Error types for all quill crates.

use std::time::Duration;

use crate::id::ConversationId;

/// Errors from chat transport and session operations.
///
/// Every variant is terminal for the stream attempt that produced it.
/// Nothing in quill retries on its own; the user resends.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// The backend answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Reason phrase and any body text.
        message: String,
    },
    /// A streaming response arrived without a body.
    #[error("response has no body")]
    MissingBody,
    /// The `{ code, data, message }` envelope reported a failure.
    #[error("api error {code}: {message}")]
    Api {
        /// Envelope `code`.
        code: i64,
        /// Envelope `message`, or a placeholder when absent.
        message: String,
    },
    /// A payload decoded as JSON but matched no accepted wire shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// A stream is already open for this conversation.
    #[error("a reply is already streaming for conversation {0}")]
    StreamInFlight(ConversationId),
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The stream broke mid-flight.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    /// Local persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StateError),
    /// Any other error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ChatError {
    /// Whether a resend has a reasonable chance of succeeding.
    ///
    /// Informational only: callers decide whether to offer a resend.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Stream(e) => e.is_retryable,
            _ => false,
        }
    }
}

/// Errors from a [`StateStore`](crate::state::StateStore).
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A read failed for a reason other than a missing key.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// A write operation failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// An error reported in-band on a chat stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StreamError {
    /// Human-readable description.
    pub message: String,
    /// Whether resending the same message might work.
    pub is_retryable: bool,
}

impl StreamError {
    /// A transient failure (connection dropped, read error).
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: true,
        }
    }

    /// A failure a resend will not fix (bad payload, rejected request).
    #[must_use]
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: false,
        }
    }
}

impl From<ChatError> for StreamError {
    fn from(err: ChatError) -> Self {
        let is_retryable = err.is_retryable();
        Self {
            message: err.to_string(),
            is_retryable,
        }
    }
}
