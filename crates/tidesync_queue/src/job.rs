//! Offline job records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Default number of attempts before a job is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Unique identifier of an offline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh job ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an offline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a drain pass.
    Pending,
    /// Handler currently running.
    Processing,
    /// Handler succeeded.
    Completed,
    /// Attempts exhausted.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl JobStatus {
    /// Returns true for terminal states.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A persisted unit of deferred work.
///
/// Jobs are durable and survive process restart; the handler registry is
/// not, so a job's `kind` must be re-registered before it can run again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineJob {
    /// Unique job ID.
    pub id: JobId,
    /// Handler dispatch key.
    pub kind: String,
    /// Opaque payload passed to the handler.
    pub payload: serde_json::Value,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Number of failed handler invocations so far.
    pub attempts: u32,
    /// Attempts allowed before the job is marked failed.
    pub max_attempts: u32,
    /// Creation time, unix milliseconds. Preserves FIFO order across restarts.
    pub created_at: u64,
    /// Message from the most recent handler failure.
    pub last_error: Option<String>,
}

impl OfflineJob {
    /// Creates a pending job.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value, max_attempts: u32) -> Self {
        Self {
            id: JobId::generate(),
            kind: kind.into(),
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            created_at: unix_millis(),
            last_error: None,
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Aggregate queue counts for UI and trigger-policy checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatus {
    /// Jobs waiting for a drain.
    pub pending: usize,
    /// Jobs with a handler currently running.
    pub processing: usize,
    /// Jobs that exhausted their attempts.
    pub failed: usize,
}
