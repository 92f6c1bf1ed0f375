//! Seam between the scheduler and the sync protocol client.

use async_trait::async_trait;
use tidesync_client::{ChangeLog, SyncClient, SyncResult, SyncRound, SyncTransport};

/// Runs one sync round on behalf of the scheduler.
///
/// Implemented by [`SyncClient`]; mocked in tests that exercise trigger
/// policy without a transport.
#[async_trait]
pub trait SyncRunner: Send + Sync {
    /// Executes one pull-then-push round.
    async fn run_round(&self) -> SyncResult<SyncRound>;
}

#[async_trait]
impl<T, C> SyncRunner for SyncClient<T, C>
where
    T: SyncTransport + 'static,
    C: ChangeLog + 'static,
{
    async fn run_round(&self) -> SyncResult<SyncRound> {
        SyncClient::run_round(self).await
    }
}
