//! Job handler dispatch.

use crate::error::JobError;
use async_trait::async_trait;
use std::future::Future;

/// Handles jobs of one kind.
///
/// Handlers may perform asynchronous I/O; the queue awaits each invocation
/// before starting the next job, so a handler never runs concurrently with
/// another. Registration is process-local and never persisted: after a
/// restart, consumers must re-register handlers before the first drain or
/// their jobs stay pending.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Executes one job. An error counts one attempt against the job.
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), JobError>;
}

/// A [`JobHandler`] built from an async closure. See [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wraps an async closure as a [`JobHandler`].
///
/// ```
/// use tidesync_queue::{handler_fn, JobError};
///
/// let handler = handler_fn(|payload: serde_json::Value| async move {
///     if payload.get("source").is_none() {
///         return Err(JobError::new("missing source"));
///     }
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), JobError> {
        (self.f)(payload.clone()).await
    }
}
