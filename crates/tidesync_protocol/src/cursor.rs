//! Sync cursor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, monotonically non-decreasing watermark issued by the server.
///
/// The cursor marks the point up to which a client has observed the server's
/// change history. Clients never compute cursors; they only store the value
/// returned by the latest successful pull and echo it back.
///
/// # Invariants
///
/// - Written locally only after a pull's changes have been applied
/// - The cursor pushed in round N equals the cursor pulled in round N
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncCursor(u64);

impl SyncCursor {
    /// Wraps a raw server-issued cursor value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw cursor value for persistence.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
