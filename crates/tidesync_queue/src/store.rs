//! Durable job storage.
//!
//! The queue persists its full job list through a [`JobStore`] so jobs
//! survive process restart. Two implementations are provided:
//! [`MemoryJobStore`] for tests and ephemeral queues, and [`FileJobStore`]
//! for a JSON file with atomic replacement.

use crate::error::{QueueError, QueueResult};
use crate::job::OfflineJob;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Durable storage for the job list.
///
/// `save` replaces the whole list; job records are small and drains are
/// infrequent, so snapshot semantics beat per-record bookkeeping.
pub trait JobStore: Send + Sync {
    /// Loads all persisted jobs, in the order they were saved.
    fn load(&self) -> QueueResult<Vec<OfflineJob>>;

    /// Atomically replaces the persisted job list.
    fn save(&self, jobs: &[OfflineJob]) -> QueueResult<()>;
}

/// An in-memory job store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<OfflineJob>>,
}

impl MemoryJobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn load(&self) -> QueueResult<Vec<OfflineJob>> {
        Ok(self.jobs.lock().clone())
    }

    fn save(&self, jobs: &[OfflineJob]) -> QueueResult<()> {
        *self.jobs.lock() = jobs.to_vec();
        Ok(())
    }
}

/// A file-backed job store.
///
/// The job list is stored as one JSON document. Saves write to a sibling
/// temporary file, flush it to disk, and rename over the target so a crash
/// mid-save leaves the previous list intact.
pub struct FileJobStore {
    path: PathBuf,
}

impl FileJobStore {
    /// Creates a store backed by the given file path.
    ///
    /// The file is created on first save; a missing file loads as an empty
    /// queue.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".tmp");
        PathBuf::from(path)
    }
}

impl JobStore for FileJobStore {
    fn load(&self) -> QueueResult<Vec<OfflineJob>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(&self.path)
            .map_err(|e| QueueError::store(format!("read {}: {e}", self.path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| QueueError::store(format!("parse {}: {e}", self.path.display())))
    }

    fn save(&self, jobs: &[OfflineJob]) -> QueueResult<()> {
        let bytes = serde_json::to_vec_pretty(jobs)
            .map_err(|e| QueueError::store(format!("encode job list: {e}")))?;

        let tmp = self.tmp_path();
        let mut file = File::create(&tmp)
            .map_err(|e| QueueError::store(format!("create {}: {e}", tmp.display())))?;
        file.write_all(&bytes)
            .map_err(|e| QueueError::store(format!("write {}: {e}", tmp.display())))?;
        file.sync_all()
            .map_err(|e| QueueError::store(format!("sync {}: {e}", tmp.display())))?;

        fs::rename(&tmp, &self.path)
            .map_err(|e| QueueError::store(format!("rename to {}: {e}", self.path.display())))
    }
}
