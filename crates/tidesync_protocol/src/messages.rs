//! Pull and push wire messages.

use crate::changes::ChangeBatch;
use crate::cursor::SyncCursor;
use serde::{Deserialize, Serialize};

/// Pull request from client.
///
/// `last_pulled_at` is `None` only on the first-ever sync of a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Cursor of the last successful pull, if any.
    pub last_pulled_at: Option<SyncCursor>,
}

impl PullRequest {
    /// Creates a pull request from the persisted cursor.
    pub fn new(last_pulled_at: Option<SyncCursor>) -> Self {
        Self { last_pulled_at }
    }

    /// Creates the first-ever pull request.
    pub fn initial() -> Self {
        Self {
            last_pulled_at: None,
        }
    }
}

/// Pull response from server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Changes since the requested cursor, grouped by collection.
    pub changes: ChangeBatch,
    /// The new cursor covering everything in `changes`.
    pub timestamp: SyncCursor,
}

impl PullResponse {
    /// Creates a pull response.
    pub fn new(changes: ChangeBatch, timestamp: SyncCursor) -> Self {
        Self { changes, timestamp }
    }

    /// Creates an empty response that leaves the cursor where it was.
    ///
    /// This is the shape a degraded pull produces: no changes observed, no
    /// watermark movement.
    pub fn unchanged(cursor: SyncCursor) -> Self {
        Self {
            changes: ChangeBatch::new(),
            timestamp: cursor,
        }
    }
}

/// Push request from client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Local changes to apply on the server, grouped by collection.
    pub changes: ChangeBatch,
    /// The cursor returned by this round's pull.
    ///
    /// Never a stale or refreshed value; the server uses it to order the
    /// push causally after the pull it followed.
    pub last_pulled_at: SyncCursor,
}

impl PushRequest {
    /// Creates a push request.
    pub fn new(changes: ChangeBatch, last_pulled_at: SyncCursor) -> Self {
        Self {
            changes,
            last_pulled_at,
        }
    }
}

/// Push acknowledgement from server.
///
/// The wire protocol requires no body on success; an empty JSON object
/// deserializes into this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {}

impl PushResponse {
    /// Creates an acknowledgement.
    pub fn new() -> Self {
        Self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pull_request_wire_shape() {
        let json = serde_json::to_value(PullRequest::new(Some(SyncCursor::new(42)))).unwrap();
        assert_eq!(json, json!({ "last_pulled_at": 42 }));
    }

    #[test]
    fn first_sync_sends_null_cursor() {
        let json = serde_json::to_value(PullRequest::initial()).unwrap();
        assert_eq!(json, json!({ "last_pulled_at": null }));
    }

    #[test]
    fn pull_response_wire_shape() {
        let raw = json!({
            "changes": {
                "tasks": {
                    "created": [{ "id": "t1", "title": "buy milk" }],
                    "updated": [],
                    "deleted": ["t0"]
                }
            },
            "timestamp": 1700000000500u64
        });

        let response: PullResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.timestamp, SyncCursor::new(1700000000500));

        let tasks = response.changes.collection("tasks").unwrap();
        assert_eq!(tasks.created.len(), 1);
        assert_eq!(tasks.deleted, vec!["t0".into()]);
    }

    #[test]
    fn pull_response_tolerates_missing_buckets() {
        // Servers may omit empty buckets per collection.
        let raw = json!({
            "changes": { "tasks": { "created": [{ "id": "t1" }] } },
            "timestamp": 10u64
        });

        let response: PullResponse = serde_json::from_value(raw).unwrap();
        let tasks = response.changes.collection("tasks").unwrap();
        assert!(tasks.updated.is_empty());
        assert!(tasks.deleted.is_empty());
    }

    #[test]
    fn unchanged_response_keeps_cursor() {
        let response = PullResponse::unchanged(SyncCursor::new(7));
        assert!(response.changes.is_empty());
        assert_eq!(response.timestamp, SyncCursor::new(7));
    }

    #[test]
    fn push_request_carries_pull_cursor() {
        let mut changes = ChangeBatch::new();
        changes
            .collection_mut("tasks")
            .created
            .push(json!({ "id": "t1" }));

        let json = serde_json::to_value(PushRequest::new(changes, SyncCursor::new(42))).unwrap();
        assert_eq!(json["last_pulled_at"], 42);
        assert_eq!(json["changes"]["tasks"]["created"][0]["id"], "t1");
    }

    #[test]
    fn push_response_accepts_empty_body() {
        let response: PushResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response, PushResponse::new());
    }
}
