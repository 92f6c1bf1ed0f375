//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport for the sync client. The
//! actual HTTP client is abstracted via a trait so different libraries
//! (reqwest, hyper, ureq) can be plugged in; authentication is the client
//! implementation's responsibility (bearer credential per request).

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tidesync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};

/// A raw HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implementations attach credentials and perform the actual I/O. Errors
/// returned here are treated as connection-level failures (retryable);
/// status-code classification happens in [`HttpTransport`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the raw response.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;
}

/// HTTP-based sync transport.
///
/// Posts JSON bodies to `{base_url}/sync/pull` and `{base_url}/sync/push`
/// and maps response status codes onto the sync error taxonomy.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    timeout: Duration,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(config: ClientConfig, client: C) -> Self {
        Self {
            base_url: config.base_url,
            timeout: config.request_timeout,
            client,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<Req, Res>(&self, endpoint: &str, request: &Req) -> SyncResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;

        let url = format!("{}{}", self.base_url, endpoint);
        let response = tokio::time::timeout(self.timeout, self.client.post(&url, body))
            .await
            .map_err(|_| SyncError::Timeout)?
            .map_err(SyncError::transport_retryable)?;

        match response.status {
            200..=299 => serde_json::from_slice(&response.body)
                .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}"))),
            401 | 403 => Err(SyncError::Unauthorized(status_text(&response))),
            408 | 429 | 500..=599 => Err(SyncError::transport_retryable(format!(
                "HTTP {}: {}",
                response.status,
                status_text(&response)
            ))),
            _ => Err(SyncError::ServerRejected(format!(
                "HTTP {}: {}",
                response.status,
                status_text(&response)
            ))),
        }
    }
}

fn status_text(response: &HttpResponse) -> String {
    String::from_utf8_lossy(&response.body).into_owned()
}

#[async_trait]
impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.post_json("/sync/pull", request).await
    }

    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.post_json("/sync/push", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tidesync_protocol::SyncCursor;

    struct TestClient {
        responses: Mutex<Vec<Result<HttpResponse, String>>>,
        requests: Mutex<Vec<String>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn respond_with(&self, status: u16, body: &str) {
            self.responses.lock().push(Ok(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
            }));
        }

        fn fail_with(&self, message: &str) {
            self.responses.lock().push(Err(message.to_string()));
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn post(&self, url: &str, _body: Vec<u8>) -> Result<HttpResponse, String> {
            self.requests.lock().push(url.to_string());
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err("no response set".into()))
        }
    }

    fn transport(client: TestClient) -> HttpTransport<TestClient> {
        HttpTransport::new(ClientConfig::new("https://sync.example.com"), client)
    }

    #[tokio::test]
    async fn pull_posts_to_sync_pull() {
        let client = TestClient::new();
        client.respond_with(200, r#"{"changes":{},"timestamp":9}"#);
        let transport = transport(client);

        let response = transport.pull(&PullRequest::initial()).await.unwrap();
        assert_eq!(response.timestamp, SyncCursor::new(9));
        assert_eq!(
            transport.client.requests.lock()[0],
            "https://sync.example.com/sync/pull"
        );
    }

    #[tokio::test]
    async fn unauthorized_status_maps_to_auth_error() {
        let client = TestClient::new();
        client.respond_with(401, "token expired");
        let transport = transport(client);

        let result = transport.pull(&PullRequest::initial()).await;
        assert!(matches!(result, Err(SyncError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn server_errors_are_retryable() {
        let client = TestClient::new();
        client.respond_with(503, "maintenance");
        let transport = transport(client);

        let err = transport.pull(&PullRequest::initial()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn validation_failures_are_not_retryable() {
        let client = TestClient::new();
        client.respond_with(422, "bad change set");
        let transport = transport(client);

        let err = transport
            .push(&PushRequest::new(Default::default(), SyncCursor::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ServerRejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn connection_failure_is_retryable_transport() {
        let client = TestClient::new();
        client.fail_with("connection refused");
        let transport = transport(client);

        let err = transport.pull(&PullRequest::initial()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn garbage_body_is_a_protocol_error() {
        let client = TestClient::new();
        client.respond_with(200, "not json");
        let transport = transport(client);

        let result = transport.pull(&PullRequest::initial()).await;
        assert!(matches!(result, Err(SyncError::Protocol(_))));
    }
}
