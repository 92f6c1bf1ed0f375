//! Error types for the offline queue.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur while operating the queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The durable job store failed to read or write.
    #[error("job store error: {0}")]
    Store(String),

    /// A drain is already in flight.
    #[error("queue drain already in progress")]
    DrainInProgress,
}

impl QueueError {
    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

/// An error reported by a job handler.
///
/// Recorded on the job as `last_error`; whether the job retries depends on
/// its remaining attempts, not on the error itself.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct JobError {
    message: String,
}

impl JobError {
    /// Creates a handler error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
