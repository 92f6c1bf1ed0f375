//! The background sync scheduler.

use crate::config::SchedulerConfig;
use crate::events::SourceEvent;
use crate::runner::SyncRunner;
use crate::state::{SyncState, Trigger};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tidesync_queue::{JobId, JobStore, OfflineQueue, QueueResult, QueueStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// One slot per timer/subscription kind; re-arming replaces the slot.
#[derive(Default)]
struct TaskSlots {
    listener: Option<JoinHandle<()>>,
    periodic: Option<JoinHandle<()>>,
    debounce: Option<JoinHandle<()>>,
}

struct Inner<R, S: JobStore> {
    config: SchedulerConfig,
    runner: Arc<R>,
    queue: Arc<OfflineQueue<S>>,
    state: Mutex<SyncState>,
    /// The sync-exclusion guard: at most one round active at any time.
    sync_active: AtomicBool,
    initialized: AtomicBool,
    tasks: Mutex<TaskSlots>,
}

impl<R, S> Inner<R, S>
where
    R: SyncRunner + 'static,
    S: JobStore + 'static,
{
    fn policy_allows(&self, trigger: Trigger) -> bool {
        if trigger != Trigger::Manual && !self.config.enabled {
            debug!(?trigger, "background sync disabled, dropping trigger");
            return false;
        }

        match trigger {
            Trigger::Manual | Trigger::DebouncedChange => true,
            Trigger::Foreground => {
                let state = self.state.lock();
                match state.last_sync_at {
                    Some(at) if at.elapsed() < self.config.foreground_min_interval => {
                        debug!("foreground trigger inside minimum interval, dropping");
                        false
                    }
                    _ => true,
                }
            }
            Trigger::NetworkReachable => {
                if self.state.lock().pending_local_changes == 0 {
                    debug!("network reachable but nothing pending, skipping round");
                    false
                } else {
                    true
                }
            }
            Trigger::Periodic => self.config.auto_sync,
        }
    }

    /// Admission: trigger policy, then the exclusivity guard.
    ///
    /// Synchronous and non-blocking; a trigger arriving while a round is in
    /// flight is dropped here, not queued.
    fn begin(&self, trigger: Trigger) -> bool {
        if !self.policy_allows(trigger) {
            return false;
        }

        if self
            .sync_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(?trigger, "sync round already in flight, dropping trigger");
            return false;
        }

        let mut state = self.state.lock();
        if trigger == Trigger::Manual {
            state.consecutive_failures = 0;
        }
        state.is_syncing = true;
        debug!(?trigger, "sync round admitted");
        true
    }

    /// Runs an admitted round, with automatic retries, then releases the
    /// guard. Must only be called after [`Inner::begin`] returned true.
    async fn run_admitted(self: Arc<Self>, trigger: Trigger) {
        let max_attempts = self.config.retry.max_attempts;
        let mut attempt = 0u32;

        loop {
            match self.runner.run_round().await {
                Ok(round) => {
                    let mut state = self.state.lock();
                    state.last_sync_at = Some(Instant::now());
                    state.last_sync_ok = true;
                    state.consecutive_failures = 0;
                    // Edits recorded mid-round have re-armed the debounce
                    // and will count themselves again.
                    state.pending_local_changes = 0;
                    drop(state);
                    info!(
                        ?trigger,
                        pulled = round.pulled,
                        pushed = round.pushed,
                        degraded = round.pull_degraded,
                        "sync round succeeded"
                    );
                    break;
                }
                Err(e) => {
                    attempt += 1;
                    {
                        let mut state = self.state.lock();
                        state.last_sync_ok = false;
                        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    }

                    if !e.is_retryable() {
                        warn!(?trigger, error = %e, "sync round failed, not retryable");
                        break;
                    }
                    if attempt >= max_attempts {
                        warn!(
                            ?trigger,
                            attempts = attempt,
                            error = %e,
                            "sync round failed, retry ceiling reached"
                        );
                        break;
                    }

                    let delay = self.config.retry.delay_for_attempt(attempt);
                    debug!(
                        ?trigger,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "sync round failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }

        self.state.lock().is_syncing = false;
        self.sync_active.store(false, Ordering::SeqCst);
    }

    /// Re-arms the debounce timer; an armed timer is aborted and replaced.
    fn arm_debounce(this: &Arc<Self>) {
        let mut slots = this.tasks.lock();
        if let Some(handle) = slots.debounce.take() {
            handle.abort();
        }

        let inner = Arc::clone(this);
        slots.debounce = Some(tokio::spawn(async move {
            sleep(inner.config.debounce_window).await;
            if inner.begin(Trigger::DebouncedChange) {
                Arc::clone(&inner).run_admitted(Trigger::DebouncedChange).await;
            }
        }));
    }

    fn on_record_changed(this: &Arc<Self>) {
        if !this.config.enabled {
            return;
        }
        this.state.lock().pending_local_changes += 1;
        Self::arm_debounce(this);
    }

    /// Connectivity returned: run a round if local changes are waiting,
    /// then drain deferred jobs. Strictly sequential; a failed drain never
    /// fails the trigger.
    async fn on_reachable(self: Arc<Self>) {
        if self.begin(Trigger::NetworkReachable) {
            Arc::clone(&self).run_admitted(Trigger::NetworkReachable).await;
        }
        self.drain_queue().await;
    }

    async fn drain_queue(&self) {
        match self.queue.process_queue().await {
            Ok(report) => debug!(?report, "offline queue drained"),
            Err(e) => warn!(error = %e, "offline queue drain failed"),
        }
    }

    async fn listen(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<SourceEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                SourceEvent::Lifecycle { foreground: true } => {
                    if self.begin(Trigger::Foreground) {
                        tokio::spawn(Arc::clone(&self).run_admitted(Trigger::Foreground));
                    }
                }
                SourceEvent::Lifecycle { foreground: false } => {
                    debug!("app moved to background");
                }
                SourceEvent::Reachability { reachable: true } => {
                    Arc::clone(&self).on_reachable().await;
                }
                SourceEvent::Reachability { reachable: false } => {
                    debug!("network became unreachable");
                }
                SourceEvent::RecordChanged => Self::on_record_changed(&self),
            }
        }
        debug!("event channel closed");
    }

    async fn periodic_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.periodic_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.begin(Trigger::Periodic) {
                Arc::clone(&self).run_admitted(Trigger::Periodic).await;
            }
        }
    }
}

/// Owns the decision of when a sync round runs.
///
/// One scheduler instance per running app: constructed explicitly, handed
/// its collaborators, and passed by handle to whatever composes the
/// application. All trigger methods are synchronous and non-blocking;
/// admitted rounds run on spawned tasks, so the scheduler must live on a
/// tokio runtime.
pub struct SyncScheduler<R, S: JobStore> {
    inner: Arc<Inner<R, S>>,
}

impl<R, S> SyncScheduler<R, S>
where
    R: SyncRunner + 'static,
    S: JobStore + 'static,
{
    /// Creates a scheduler over a sync runner and an offline queue.
    pub fn new(config: SchedulerConfig, runner: Arc<R>, queue: Arc<OfflineQueue<S>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                runner,
                queue,
                state: Mutex::new(SyncState::default()),
                sync_active: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
                tasks: Mutex::new(TaskSlots::default()),
            }),
        }
    }

    /// Subscribes to event sources and starts the periodic timer.
    ///
    /// Idempotent: a second call while initialized is a no-op and drops the
    /// offered receiver, closing its senders.
    pub fn initialize(&self, events: mpsc::UnboundedReceiver<SourceEvent>) {
        if self
            .inner
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("scheduler already initialized");
            return;
        }

        let mut slots = self.inner.tasks.lock();
        slots.listener = Some(tokio::spawn(Arc::clone(&self.inner).listen(events)));
        if self.inner.config.enabled && self.inner.config.auto_sync {
            slots.periodic = Some(tokio::spawn(Arc::clone(&self.inner).periodic_loop()));
        }
        info!("sync scheduler initialized");
    }

    /// Unsubscribes from event sources and cancels all timers.
    ///
    /// Idempotent. Does not interrupt an already-admitted round; the guard
    /// releases when that round finishes.
    pub fn shutdown(&self) {
        if self
            .inner
            .initialized
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let mut slots = self.inner.tasks.lock();
        for handle in [
            slots.listener.take(),
            slots.periodic.take(),
            slots.debounce.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
        info!("sync scheduler shut down");
    }

    /// Requests a sync now. Always admitted unless a round is already in
    /// flight; resets the failure counter.
    ///
    /// Returns true if a round was started.
    pub fn trigger_manual_sync(&self) -> bool {
        if self.inner.begin(Trigger::Manual) {
            tokio::spawn(Arc::clone(&self.inner).run_admitted(Trigger::Manual));
            true
        } else {
            false
        }
    }

    /// Signals that a local record changed.
    ///
    /// Debounced: each call restarts the quiet window, coalescing bursts of
    /// edits into one round.
    pub fn trigger_change_sync(&self) {
        Inner::on_record_changed(&self.inner);
    }

    /// Cancels a pending (not yet fired) debounced change sync.
    ///
    /// Returns true if a timer was armed. Has no effect on an in-flight
    /// round.
    pub fn cancel_pending_change_sync(&self) -> bool {
        let handle = self.inner.tasks.lock().debounce.take();
        match handle {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                debug!("pending change sync cancelled");
                true
            }
            _ => false,
        }
    }

    /// Returns a snapshot of the sync bookkeeping.
    pub fn sync_state(&self) -> SyncState {
        *self.inner.state.lock()
    }

    /// Defers an operation to the offline queue.
    pub fn enqueue_offline_job(
        &self,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> QueueResult<JobId> {
        self.inner.queue.enqueue(kind, payload)
    }

    /// Returns the offline queue's counts.
    pub fn queue_status(&self) -> QueueStatus {
        self.inner.queue.status()
    }

    /// Returns the offline queue.
    pub fn queue(&self) -> &Arc<OfflineQueue<S>> {
        &self.inner.queue
    }
}
