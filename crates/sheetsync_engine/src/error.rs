//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a refresh.
///
/// None of these are fatal to a manager: the periodic loop logs the
/// error and retries on the next tick.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error from the remote origin.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The origin answered with a non-success status.
    #[error("origin returned status {status:?}")]
    Origin {
        /// The status string from the response.
        status: String,
    },

    /// Malformed tabular payload.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Durable store read or read-modify-write failure.
    #[error("durable store error: {0}")]
    Store(String),

    /// Broadcast publish or subscribe failure.
    #[error("broadcast error: {0}")]
    Broadcast(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later refresh may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Store(_) => true,
            SyncError::Broadcast(_) => true,
            SyncError::Origin { .. } => true,
            SyncError::Decode(_) => false,
        }
    }
}
