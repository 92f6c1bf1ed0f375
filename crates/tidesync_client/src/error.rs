//! Error types for the sync client.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync round.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Request timed out.
    #[error("operation timed out")]
    Timeout,

    /// Credential rejected by the server.
    ///
    /// Never retried by this subsystem; the caller must re-authenticate.
    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    /// Server rejected the request (validation, conflict).
    #[error("server rejected request: {0}")]
    ServerRejected(String),

    /// Invalid message on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local store failure while reading or applying changes.
    #[error("storage error: {0}")]
    Storage(String),
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

    /// Creates a storage error from any local-store failure.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Returns true if this error can be retried by a later round.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerRejected(_) => false,
            SyncError::Unauthorized(_) => false,
            SyncError::Protocol(_) => false,
            SyncError::Storage(_) => false,
        }
    }

    /// Returns true if a pull failure with this error degrades to a no-op.
    ///
    /// Transport, timeout, server and protocol failures are deferred to the
    /// next round. Auth failures must surface for re-authentication, and
    /// local storage failures are not a pull problem at all.
    pub fn absorbed_by_pull(&self) -> bool {
        !matches!(self, SyncError::Unauthorized(_) | SyncError::Storage(_))
    }
}
