//! Configuration for the sync client.

use std::time::Duration;

/// Configuration for the sync client's transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the sync service (e.g. "https://sync.example.com").
    pub base_url: String,
    /// Bound on each network request.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the given sync service.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
