//! Change log collaborator seam.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use tidesync_protocol::{ChangeBatch, ChangeSet, SyncCursor};

/// The local store's change-tracking interface.
///
/// The change log records per-record creates/updates/deletes since an
/// arbitrary cursor and applies a remote change set transactionally. It also
/// owns cursor persistence: the cursor lives next to the data it describes
/// so a restore of one restores the other.
#[async_trait]
pub trait ChangeLog: Send + Sync {
    /// Returns the persisted cursor, or `None` before the first sync.
    async fn cursor(&self) -> SyncResult<Option<SyncCursor>>;

    /// Persists the cursor after a pull has been applied.
    async fn set_cursor(&self, cursor: SyncCursor) -> SyncResult<()>;

    /// Applies a remote change batch in one transaction.
    ///
    /// Either every change lands or none do; a partially applied batch would
    /// desynchronize the store from the cursor.
    async fn apply_remote_changes(&self, changes: &ChangeBatch) -> SyncResult<()>;

    /// Collects local changes awaiting push.
    ///
    /// Repeated calls without an intervening [`ChangeLog::acknowledge_pushed`]
    /// return the same changes again (plus anything recorded since), so a
    /// failed push is retried in full on the next round.
    async fn collect_local_changes(&self) -> SyncResult<ChangeBatch>;

    /// Marks the last collected changes as pushed.
    ///
    /// Called only after the server acknowledged the push. Changes recorded
    /// after the collection are unaffected.
    async fn acknowledge_pushed(&self) -> SyncResult<()>;
}

#[derive(Default)]
struct MemoryChangeLogState {
    cursor: Option<SyncCursor>,
    /// Local edits not yet collected for a push.
    pending: ChangeBatch,
    /// Edits collected by an unacknowledged push.
    in_flight: ChangeBatch,
    /// Remote batches applied, newest last.
    applied: Vec<ChangeBatch>,
}

/// An in-memory change log for tests and examples.
#[derive(Default)]
pub struct MemoryChangeLog {
    state: Mutex<MemoryChangeLogState>,
    fail_storage: Mutex<bool>,
}

impl MemoryChangeLog {
    /// Creates an empty change log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records local edits for a collection.
    pub fn record_local(&self, collection: impl Into<String>, changes: ChangeSet) {
        self.state
            .lock()
            .pending
            .collection_mut(collection)
            .merge(changes);
    }

    /// Returns the number of local records awaiting push.
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock();
        state.pending.total_len() + state.in_flight.total_len()
    }

    /// Returns every remote batch applied so far.
    pub fn applied_batches(&self) -> Vec<ChangeBatch> {
        self.state.lock().applied.clone()
    }

    /// Makes every subsequent call fail with a storage error.
    pub fn fail_next_operations(&self, fail: bool) {
        *self.fail_storage.lock() = fail;
    }

    fn check_storage(&self) -> SyncResult<()> {
        if *self.fail_storage.lock() {
            Err(SyncError::storage("simulated store failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChangeLog for MemoryChangeLog {
    async fn cursor(&self) -> SyncResult<Option<SyncCursor>> {
        self.check_storage()?;
        Ok(self.state.lock().cursor)
    }

    async fn set_cursor(&self, cursor: SyncCursor) -> SyncResult<()> {
        self.check_storage()?;
        self.state.lock().cursor = Some(cursor);
        Ok(())
    }

    async fn apply_remote_changes(&self, changes: &ChangeBatch) -> SyncResult<()> {
        self.check_storage()?;
        self.state.lock().applied.push(changes.clone());
        Ok(())
    }

    async fn collect_local_changes(&self) -> SyncResult<ChangeBatch> {
        self.check_storage()?;
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        state.in_flight.merge(pending);
        Ok(state.in_flight.clone())
    }

    async fn acknowledge_pushed(&self) -> SyncResult<()> {
        self.check_storage()?;
        self.state.lock().in_flight = ChangeBatch::new();
        Ok(())
    }
}
