//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tidesync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};

/// A sync transport handles network communication with the sync service.
///
/// This trait abstracts the network layer, allowing different implementations
/// (HTTP, loopback to an in-process server, mock for testing). Both methods
/// are suspension points and must bound their own execution time.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Pulls changes recorded after the given cursor.
    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;

    /// Pushes local changes, causally ordered after the round's pull.
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;
}

/// A mock transport for testing.
///
/// Responses are scripted per call in FIFO order; every received request is
/// recorded so tests can assert on cursor threading and call counts.
#[derive(Default)]
pub struct MockTransport {
    pull_responses: Mutex<VecDeque<SyncResult<PullResponse>>>,
    push_responses: Mutex<VecDeque<SyncResult<PushResponse>>>,
    pull_requests: Mutex<Vec<PullRequest>>,
    push_requests: Mutex<Vec<PushRequest>>,
}

impl MockTransport {
    /// Creates a new mock transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next pull outcome.
    pub fn push_pull_response(&self, response: SyncResult<PullResponse>) {
        self.pull_responses.lock().push_back(response);
    }

    /// Scripts the next push outcome.
    pub fn push_push_response(&self, response: SyncResult<PushResponse>) {
        self.push_responses.lock().push_back(response);
    }

    /// Returns the pull requests received so far.
    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.lock().clone()
    }

    /// Returns the push requests received so far.
    pub fn push_requests(&self) -> Vec<PushRequest> {
        self.push_requests.lock().clone()
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pull_requests.lock().push(request.clone());
        self.pull_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Protocol("no scripted pull response".into())))
    }

    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.push_requests.lock().push(request.clone());
        self.push_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Protocol("no scripted push response".into())))
    }
}
