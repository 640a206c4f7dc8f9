//! Durable, monotonic task-id allocation.
//!
//! The highwatermark lives in a single counter file next to the task
//! records. The durable value is advanced *before* an id is handed out,
//! so a crash between allocation and first use can never lead to the
//! same id being issued twice. Ids of deleted tasks are never reused.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::storage::write_atomic;

const COUNTER_FILE: &str = "highwatermark";

/// Monotonic identifier source for tasks.
///
/// The counter file is re-read on every allocation, so several allocator
/// instances over the same data directory issue a single ascending
/// sequence (in-process calls are serialized by the mutex; the durable
/// file is the hand-off between instances).
pub struct IdAllocator {
    counter_path: PathBuf,
    scan_dir: PathBuf,
    lock: Mutex<()>,
}

impl IdAllocator {
    /// Allocator rooted at `data_dir`; task records are scanned from
    /// `data_dir/tasks` when the counter file is missing.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            counter_path: data_dir.join(COUNTER_FILE),
            scan_dir: data_dir.join("tasks"),
            lock: Mutex::new(()),
        }
    }

    /// Issue the next id. The new high-water value is durably recorded
    /// before the id is returned.
    pub async fn next(&self) -> Result<String> {
        let _guard = self.lock.lock().await;
        let current = self.read_highwatermark().await?;
        let next = current + 1;
        write_atomic(&self.counter_path, &next.to_string()).await?;
        debug!(id = next, "allocated task id");
        Ok(next.to_string())
    }

    /// Current high-water value: the counter file if present, otherwise
    /// the maximum numeric id among persisted task records (0 if none).
    async fn read_highwatermark(&self) -> Result<u64> {
        match fs::read_to_string(&self.counter_path).await {
            Ok(text) => match text.trim().parse::<u64>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(
                        path = %self.counter_path.display(),
                        content = %text.trim(),
                        "unreadable highwatermark, recovering from task records"
                    );
                    self.scan_max().await
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let max = self.scan_max().await?;
                info!(highwatermark = max, "recovered highwatermark from task records");
                Ok(max)
            }
            Err(e) => Err(StorageError::Io(e).into()),
        }
    }

    /// Largest numeric id among `<scan_dir>/*.json` filenames.
    async fn scan_max(&self) -> Result<u64> {
        if !self.scan_dir.exists() {
            return Ok(0);
        }
        let mut max = 0u64;
        let mut read_dir = fs::read_dir(&self.scan_dir)
            .await
            .map_err(StorageError::Io)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(StorageError::Io)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                max = max.max(id);
            }
        }
        Ok(max)
    }
}
