//! The offline action queue.

use crate::error::{QueueError, QueueResult};
use crate::handler::JobHandler;
use crate::job::{JobId, JobStatus, OfflineJob, QueueStatus, DEFAULT_MAX_ATTEMPTS};
use crate::store::JobStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Jobs whose handler succeeded.
    pub completed: usize,
    /// Jobs that failed but returned to pending for a later pass.
    pub retried: usize,
    /// Jobs that exhausted their attempts.
    pub failed: usize,
    /// Jobs skipped because no handler is registered for their kind.
    pub skipped: usize,
}

/// A persisted list of deferred jobs with handler dispatch and retry.
///
/// Jobs are durable via the [`JobStore`]; every state transition is
/// persisted before the next job runs, so a crash mid-drain loses at most
/// the in-flight handler's effect, never the queue's bookkeeping.
///
/// # Concurrency
///
/// [`OfflineQueue::process_queue`] must not run concurrently with itself
/// (enforced with an atomic guard); it may run concurrently with
/// [`OfflineQueue::enqueue`]. Jobs appended mid-drain are picked up on the
/// next drain, because a drain operates on the snapshot of pending jobs
/// taken at its start.
pub struct OfflineQueue<S: JobStore> {
    store: S,
    jobs: Mutex<Vec<OfflineJob>>,
    handlers: RwLock<HashMap<String, Arc<dyn JobHandler>>>,
    draining: AtomicBool,
}

impl<S: JobStore> OfflineQueue<S> {
    /// Opens the queue, loading any jobs the store has persisted.
    ///
    /// Jobs left `Processing` by a crash are returned to `Pending`: their
    /// handler never committed a result.
    pub fn open(store: S) -> QueueResult<Self> {
        let mut jobs = store.load()?;
        let mut recovered = 0usize;
        for job in &mut jobs {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Pending;
                recovered += 1;
            }
        }
        if recovered > 0 {
            debug!(recovered, "returned interrupted jobs to pending");
            store.save(&jobs)?;
        }

        Ok(Self {
            store,
            jobs: Mutex::new(jobs),
            handlers: RwLock::new(HashMap::new()),
            draining: AtomicBool::new(false),
        })
    }

    /// Registers the handler for a job kind.
    ///
    /// At most one handler per kind; a second registration replaces the
    /// first (last registration wins).
    pub fn register_handler(&self, kind: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let kind = kind.into();
        if self.handlers.write().insert(kind.clone(), handler).is_some() {
            debug!(%kind, "replaced job handler");
        }
    }

    /// Removes the handler for a job kind. Returns false if none was set.
    pub fn unregister_handler(&self, kind: &str) -> bool {
        self.handlers.write().remove(kind).is_some()
    }

    /// Enqueues a job with the default attempt budget.
    pub fn enqueue(&self, kind: impl Into<String>, payload: serde_json::Value) -> QueueResult<JobId> {
        self.enqueue_with_attempts(kind, payload, DEFAULT_MAX_ATTEMPTS)
    }

    /// Enqueues a job with an explicit attempt budget.
    ///
    /// The job is durably written before this returns.
    pub fn enqueue_with_attempts(
        &self,
        kind: impl Into<String>,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> QueueResult<JobId> {
        let job = OfflineJob::new(kind, payload, max_attempts);
        let id = job.id;

        let mut jobs = self.jobs.lock();
        jobs.push(job);
        self.store.save(&jobs)?;
        debug!(%id, "enqueued offline job");
        Ok(id)
    }

    /// Cancels a job.
    ///
    /// Succeeds only while the job is `Pending`, or `Processing` with its
    /// handler still in flight (the result is then discarded). Returns
    /// false for finished or unknown jobs.
    pub fn cancel(&self, id: JobId) -> bool {
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return false;
        };

        match job.status {
            JobStatus::Pending | JobStatus::Processing => {
                job.status = JobStatus::Cancelled;
                if let Err(e) = self.store.save(&jobs) {
                    warn!(%id, error = %e, "failed to persist cancellation");
                }
                true
            }
            _ => false,
        }
    }

    /// Drains the queue: runs every job that was pending when the drain
    /// started, in creation order, one handler at a time.
    ///
    /// Handler failures are per-job and never abort the pass. Returns
    /// [`QueueError::DrainInProgress`] if a drain is already running.
    pub async fn process_queue(&self) -> QueueResult<DrainReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(QueueError::DrainInProgress);
        }

        let result = self.drain().await;
        self.draining.store(false, Ordering::SeqCst);
        result
    }

    async fn drain(&self) -> QueueResult<DrainReport> {
        // Snapshot of pending job IDs; anything enqueued after this waits
        // for the next drain.
        let snapshot: Vec<JobId> = self
            .jobs
            .lock()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| j.id)
            .collect();

        debug!(jobs = snapshot.len(), "draining offline queue");
        let mut report = DrainReport::default();

        for id in snapshot {
            let Some((payload, handler)) = self.begin_job(id, &mut report)? else {
                continue;
            };

            let outcome = handler.handle(&payload).await;
            self.commit_job(id, outcome, &mut report)?;
        }

        debug!(?report, "drain finished");
        Ok(report)
    }

    /// Moves a job to `Processing` and returns what its handler needs.
    ///
    /// Returns `None` when the job should not run: cancelled or cleared
    /// since the snapshot, or its kind has no registered handler.
    fn begin_job(
        &self,
        id: JobId,
        report: &mut DrainReport,
    ) -> QueueResult<Option<(serde_json::Value, Arc<dyn JobHandler>)>> {
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(None);
        };
        if job.status != JobStatus::Pending {
            return Ok(None);
        }

        let Some(handler) = self.handlers.read().get(&job.kind).cloned() else {
            // A handler may register later in the session; leave the job
            // pending rather than failing it.
            debug!(%id, kind = %job.kind, "no handler registered, skipping job");
            report.skipped += 1;
            return Ok(None);
        };

        job.status = JobStatus::Processing;
        let payload = job.payload.clone();
        self.store.save(&jobs)?;
        Ok(Some((payload, handler)))
    }

    /// Records a handler outcome, honoring a cancellation that arrived
    /// while the handler was in flight.
    fn commit_job(
        &self,
        id: JobId,
        outcome: Result<(), crate::error::JobError>,
        report: &mut DrainReport,
    ) -> QueueResult<()> {
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(());
        };
        if job.status == JobStatus::Cancelled {
            debug!(%id, "job cancelled mid-flight, discarding handler outcome");
            return Ok(());
        }

        match outcome {
            Ok(()) => {
                job.status = JobStatus::Completed;
                job.last_error = None;
                report.completed += 1;
            }
            Err(e) => {
                job.attempts += 1;
                job.last_error = Some(e.to_string());
                if job.attempts < job.max_attempts {
                    job.status = JobStatus::Pending;
                    report.retried += 1;
                    debug!(%id, attempts = job.attempts, "job failed, will retry");
                } else {
                    job.status = JobStatus::Failed;
                    report.failed += 1;
                    warn!(%id, attempts = job.attempts, error = %e, "job failed permanently");
                }
            }
        }

        self.store.save(&jobs)
    }

    /// Returns pending/processing/failed counts.
    pub fn status(&self) -> QueueStatus {
        let jobs = self.jobs.lock();
        let mut status = QueueStatus::default();
        for job in jobs.iter() {
            match job.status {
                JobStatus::Pending => status.pending += 1,
                JobStatus::Processing => status.processing += 1,
                JobStatus::Failed => status.failed += 1,
                _ => {}
            }
        }
        status
    }

    /// Returns a job by ID.
    pub fn job(&self, id: JobId) -> Option<OfflineJob> {
        self.jobs.lock().iter().find(|j| j.id == id).cloned()
    }

    /// Returns all jobs of a kind, in creation order.
    pub fn jobs_by_kind(&self, kind: &str) -> Vec<OfflineJob> {
        self.jobs
            .lock()
            .iter()
            .filter(|j| j.kind == kind)
            .cloned()
            .collect()
    }

    /// Resets every failed job to pending with a fresh attempt budget.
    pub fn retry_failed(&self) -> QueueResult<usize> {
        let mut jobs = self.jobs.lock();
        let mut reset = 0usize;
        for job in jobs.iter_mut() {
            if job.status == JobStatus::Failed {
                job.status = JobStatus::Pending;
                job.attempts = 0;
                reset += 1;
            }
        }
        if reset > 0 {
            self.store.save(&jobs)?;
        }
        Ok(reset)
    }

    /// Removes finished jobs (completed, failed, cancelled).
    pub fn clear_finished(&self) -> QueueResult<usize> {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|j| !j.status.is_finished());
        let removed = before - jobs.len();
        if removed > 0 {
            self.store.save(&jobs)?;
        }
        Ok(removed)
    }

    /// Removes every job regardless of status. Destructive.
    pub fn clear_queue(&self) -> QueueResult<usize> {
        let mut jobs = self.jobs.lock();
        let removed = jobs.len();
        jobs.clear();
        self.store.save(&jobs)?;
        Ok(removed)
    }
}
