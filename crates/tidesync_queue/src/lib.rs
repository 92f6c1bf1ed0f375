//! # Tidesync Queue
//!
//! A persisted, retryable offline action queue.
//!
//! Operations that require network access are deferred here while offline
//! and dispatched to registered handlers once a drain runs. Jobs are
//! durable: they survive process restart via a pluggable [`JobStore`].
//!
//! This crate provides:
//! - [`OfflineQueue`]: enqueue, cancel, drain, and housekeeping operations
//! - [`JobHandler`]: async handler dispatch keyed by job kind
//! - [`JobStore`]: the durability seam, with [`MemoryJobStore`] and
//!   [`FileJobStore`] implementations
//!
//! ## Key invariants
//!
//! - Jobs run in creation order, one at a time (FIFO, no handler concurrency)
//! - A drain operates on the snapshot of pending jobs taken at its start;
//!   jobs enqueued mid-drain wait for the next drain
//! - Jobs of a kind with no registered handler are skipped, not failed;
//!   handlers are process-local and must be re-registered after restart

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod handler;
mod job;
mod queue;
mod store;

pub use error::{JobError, QueueError, QueueResult};
pub use handler::{handler_fn, FnHandler, JobHandler};
pub use job::{JobId, JobStatus, OfflineJob, QueueStatus, DEFAULT_MAX_ATTEMPTS};
pub use queue::{DrainReport, OfflineQueue};
pub use store::{FileJobStore, JobStore, MemoryJobStore};
