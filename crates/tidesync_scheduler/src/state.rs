//! Scheduler state and triggers.

use tokio::time::Instant;

/// Process-wide sync bookkeeping, read by UI and trigger-policy checks.
///
/// Mutated only by the scheduler while it holds the sync-exclusion guard;
/// reads see a consistent snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SyncState {
    /// True while a round (including its automatic retries) is in flight.
    pub is_syncing: bool,
    /// Completion time of the last successful round.
    pub last_sync_at: Option<Instant>,
    /// Whether the most recent round succeeded.
    pub last_sync_ok: bool,
    /// Local edits recorded since the last successful round.
    pub pending_local_changes: u64,
    /// Failed attempts since the last success or manual reset.
    pub consecutive_failures: u32,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            is_syncing: false,
            last_sync_at: None,
            last_sync_ok: true,
            pending_local_changes: 0,
            consecutive_failures: 0,
        }
    }
}

/// The trigger sources a round can be admitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// App resumed to the foreground.
    Foreground,
    /// Network became reachable with local changes pending.
    NetworkReachable,
    /// Periodic timer fired.
    Periodic,
    /// Explicit user request.
    Manual,
    /// Local-change debounce window elapsed.
    DebouncedChange,
}
