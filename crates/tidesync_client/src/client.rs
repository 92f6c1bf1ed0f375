//! Sync round execution.

use crate::change_log::ChangeLog;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tidesync_protocol::{PullRequest, PushRequest, SyncCursor};
use tracing::{debug, info, warn};

/// The outcome of one pull-then-push attempt.
///
/// Ephemeral: kept for logging and scheduler bookkeeping, never persisted.
#[derive(Debug, Clone)]
pub struct SyncRound {
    /// Cursor the round started from (`None` on first-ever sync).
    pub cursor_used: Option<SyncCursor>,
    /// Cursor after the round (`None` only if the first-ever pull degraded).
    pub new_cursor: Option<SyncCursor>,
    /// Number of remote records applied.
    pub pulled: usize,
    /// Number of local records acknowledged by the server.
    pub pushed: usize,
    /// True if the pull failed and was absorbed into a no-op.
    pub pull_degraded: bool,
    /// Wall-clock duration of the round.
    pub duration: Duration,
}

/// Executes one pull-then-push round trip against the remote service.
///
/// The client owns the sync cursor discipline; the [`ChangeLog`] collaborator
/// owns persistence and transactional application.
///
/// # Ordering guarantees
///
/// Within one round, pull always precedes push, and the cursor threaded
/// through the push is exactly the cursor returned by that round's pull,
/// never refreshed mid-round.
pub struct SyncClient<T: SyncTransport, C: ChangeLog> {
    transport: Arc<T>,
    change_log: Arc<C>,
}

impl<T: SyncTransport, C: ChangeLog> SyncClient<T, C> {
    /// Creates a new sync client.
    pub fn new(transport: Arc<T>, change_log: Arc<C>) -> Self {
        Self {
            transport,
            change_log,
        }
    }

    /// Returns the change log collaborator.
    pub fn change_log(&self) -> &Arc<C> {
        &self.change_log
    }

    /// Runs one sync round: pull, apply, then push local changes.
    ///
    /// Pull failures degrade to a no-op (the server's changes are deferred
    /// to the next round); push failures propagate with nothing
    /// acknowledged. Auth and local storage failures always propagate.
    pub async fn run_round(&self) -> SyncResult<SyncRound> {
        let start = Instant::now();
        let cursor_used = self.change_log.cursor().await?;
        debug!(cursor = ?cursor_used, "starting sync round");

        let (round_cursor, pulled, pull_degraded) = self.pull_phase(cursor_used).await?;
        let pushed = self.push_phase(round_cursor).await?;

        let round = SyncRound {
            cursor_used,
            new_cursor: round_cursor,
            pulled,
            pushed,
            pull_degraded,
            duration: start.elapsed(),
        };
        info!(
            pulled = round.pulled,
            pushed = round.pushed,
            degraded = round.pull_degraded,
            "sync round finished"
        );
        Ok(round)
    }

    /// Pulls and applies remote changes.
    ///
    /// Returns the cursor the rest of the round must use, the number of
    /// records applied, and whether the pull degraded.
    async fn pull_phase(
        &self,
        cursor_used: Option<SyncCursor>,
    ) -> SyncResult<(Option<SyncCursor>, usize, bool)> {
        let request = PullRequest::new(cursor_used);

        let response = match self.transport.pull(&request).await {
            Ok(response) => response,
            Err(e) if e.absorbed_by_pull() => {
                warn!(error = %e, "pull failed, deferring server changes to next round");
                return Ok((cursor_used, 0, true));
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = response.changes.validate() {
            warn!(error = %e, "pull response failed validation, deferring to next round");
            return Ok((cursor_used, 0, true));
        }

        let pulled = response.changes.total_len();
        if pulled > 0 {
            self.change_log
                .apply_remote_changes(&response.changes)
                .await?;
        }
        // The watermark moves only once the changes it covers are durable.
        self.change_log.set_cursor(response.timestamp).await?;

        Ok((Some(response.timestamp), pulled, false))
    }

    /// Pushes local changes against the round's cursor.
    async fn push_phase(&self, round_cursor: Option<SyncCursor>) -> SyncResult<usize> {
        let local = self.change_log.collect_local_changes().await?;
        if local.is_empty() {
            debug!("nothing to push");
            return Ok(0);
        }

        let Some(cursor) = round_cursor else {
            // First-ever pull degraded: no cursor exists to order a push
            // after, so local changes wait for the next round.
            debug!("skipping push, no cursor established yet");
            return Ok(0);
        };

        local
            .validate()
            .map_err(|e| SyncError::Protocol(format!("local change batch invalid: {e}")))?;

        let count = local.total_len();
        let request = PushRequest::new(local, cursor);
        self.transport.push(&request).await?;
        self.change_log.acknowledge_pushed().await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_log::MemoryChangeLog;
    use crate::transport::MockTransport;
    use serde_json::json;
    use tidesync_protocol::{ChangeBatch, ChangeSet, PullResponse, PushResponse};

    fn client(
        transport: MockTransport,
        log: MemoryChangeLog,
    ) -> SyncClient<MockTransport, MemoryChangeLog> {
        SyncClient::new(Arc::new(transport), Arc::new(log))
    }

    fn remote_batch(ids: &[&str]) -> ChangeBatch {
        let mut batch = ChangeBatch::new();
        for id in ids {
            batch
                .collection_mut("tasks")
                .created
                .push(json!({ "id": id }));
        }
        batch
    }

    fn local_create(log: &MemoryChangeLog, id: &str) {
        log.record_local(
            "tasks",
            ChangeSet {
                created: vec![json!({ "id": id })],
                ..ChangeSet::default()
            },
        );
    }

    #[tokio::test]
    async fn round_pulls_applies_and_pushes() {
        let transport = MockTransport::new();
        transport.push_pull_response(Ok(PullResponse::new(
            remote_batch(&["r1", "r2"]),
            SyncCursor::new(100),
        )));
        transport.push_push_response(Ok(PushResponse::new()));

        let log = MemoryChangeLog::new();
        local_create(&log, "l1");

        let client = client(transport, log);
        let round = client.run_round().await.unwrap();

        assert_eq!(round.pulled, 2);
        assert_eq!(round.pushed, 1);
        assert!(!round.pull_degraded);
        assert_eq!(round.new_cursor, Some(SyncCursor::new(100)));
        assert_eq!(client.change_log().applied_batches().len(), 1);
        assert_eq!(client.change_log().pending_count(), 0);
    }

    #[tokio::test]
    async fn push_carries_exactly_the_pulled_cursor() {
        let transport = MockTransport::new();
        transport.push_pull_response(Ok(PullResponse::unchanged(SyncCursor::new(77))));
        transport.push_push_response(Ok(PushResponse::new()));

        let log = MemoryChangeLog::new();
        log.set_cursor(SyncCursor::new(50)).await.unwrap();
        local_create(&log, "l1");

        let client = client(transport, log);
        client.run_round().await.unwrap();

        let pushes = client.transport.push_requests();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].last_pulled_at, SyncCursor::new(77));
    }

    #[tokio::test]
    async fn pull_failure_degrades_to_noop() {
        let transport = MockTransport::new();
        transport.push_pull_response(Err(SyncError::transport_retryable("network down")));

        let log = MemoryChangeLog::new();
        log.set_cursor(SyncCursor::new(10)).await.unwrap();

        let client = client(transport, log);
        let round = client.run_round().await.unwrap();

        assert!(round.pull_degraded);
        assert_eq!(round.pulled, 0);
        assert_eq!(round.new_cursor, Some(SyncCursor::new(10)));
        // The watermark must not move on a failed pull.
        assert_eq!(
            client.change_log().cursor().await.unwrap(),
            Some(SyncCursor::new(10))
        );
    }

    #[tokio::test]
    async fn degraded_pull_still_pushes_pending_changes() {
        let transport = MockTransport::new();
        transport.push_pull_response(Err(SyncError::Timeout));
        transport.push_push_response(Ok(PushResponse::new()));

        let log = MemoryChangeLog::new();
        log.set_cursor(SyncCursor::new(10)).await.unwrap();
        local_create(&log, "l1");

        let client = client(transport, log);
        let round = client.run_round().await.unwrap();

        assert!(round.pull_degraded);
        assert_eq!(round.pushed, 1);
        assert_eq!(
            client.transport.push_requests()[0].last_pulled_at,
            SyncCursor::new(10)
        );
    }

    #[tokio::test]
    async fn degraded_first_pull_skips_push() {
        let transport = MockTransport::new();
        transport.push_pull_response(Err(SyncError::Timeout));

        let log = MemoryChangeLog::new();
        local_create(&log, "l1");

        let client = client(transport, log);
        let round = client.run_round().await.unwrap();

        assert!(round.pull_degraded);
        assert_eq!(round.pushed, 0);
        assert!(client.transport.push_requests().is_empty());
        // Nothing acknowledged; the change is still pending.
        assert_eq!(client.change_log().pending_count(), 1);
    }

    #[tokio::test]
    async fn unauthorized_pull_propagates() {
        let transport = MockTransport::new();
        transport.push_pull_response(Err(SyncError::Unauthorized("token expired".into())));

        let client = client(transport, MemoryChangeLog::new());
        let result = client.run_round().await;

        assert!(matches!(result, Err(SyncError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn push_failure_propagates_and_keeps_changes_pending() {
        let transport = MockTransport::new();
        transport.push_pull_response(Ok(PullResponse::unchanged(SyncCursor::new(20))));
        transport.push_push_response(Err(SyncError::transport_retryable("connection reset")));

        let log = MemoryChangeLog::new();
        local_create(&log, "l1");

        let client = client(transport, log);
        let result = client.run_round().await;

        assert!(result.is_err());
        // Un-acknowledged changes are collected again on the next round.
        assert_eq!(client.change_log().pending_count(), 1);
        // The cursor advanced with the successful pull and stays advanced.
        assert_eq!(
            client.change_log().cursor().await.unwrap(),
            Some(SyncCursor::new(20))
        );
    }

    #[tokio::test]
    async fn empty_local_changes_skip_push_entirely() {
        let transport = MockTransport::new();
        transport.push_pull_response(Ok(PullResponse::unchanged(SyncCursor::new(30))));

        let client = client(transport, MemoryChangeLog::new());
        let round = client.run_round().await.unwrap();

        assert_eq!(round.pushed, 0);
        assert!(client.transport.push_requests().is_empty());
    }

    #[tokio::test]
    async fn first_sync_sends_null_cursor() {
        let transport = MockTransport::new();
        transport.push_pull_response(Ok(PullResponse::unchanged(SyncCursor::new(1))));

        let client = client(transport, MemoryChangeLog::new());
        client.run_round().await.unwrap();

        assert_eq!(client.transport.pull_requests()[0].last_pulled_at, None);
    }

    #[tokio::test]
    async fn invalid_pull_response_is_deferred() {
        // Same record ID in two buckets: the batch must not be applied.
        let mut batch = ChangeBatch::new();
        batch
            .collection_mut("tasks")
            .created
            .push(json!({ "id": "x" }));
        batch
            .collection_mut("tasks")
            .updated
            .push(json!({ "id": "x" }));

        let transport = MockTransport::new();
        transport.push_pull_response(Ok(PullResponse::new(batch, SyncCursor::new(99))));

        let log = MemoryChangeLog::new();
        log.set_cursor(SyncCursor::new(10)).await.unwrap();

        let client = client(transport, log);
        let round = client.run_round().await.unwrap();

        assert!(round.pull_degraded);
        assert!(client.change_log().applied_batches().is_empty());
        assert_eq!(
            client.change_log().cursor().await.unwrap(),
            Some(SyncCursor::new(10))
        );
    }

    #[tokio::test]
    async fn storage_failure_fails_the_round() {
        let transport = MockTransport::new();
        let log = MemoryChangeLog::new();
        log.fail_next_operations(true);

        let client = client(transport, log);
        let result = client.run_round().await;

        assert!(matches!(result, Err(SyncError::Storage(_))));
    }
}
