//! Durable storage for finished job output.
//!
//! One text file per job under `<data_dir>/outputs/<owner>/`. Each
//! executor numbers its own jobs, so the owner segment keeps agents
//! sharing one data dir from writing the same path. Output is written
//! exactly once, when the job reaches a terminal status; a missing file
//! simply means the job has not finished.

use std::path::PathBuf;

use tokio::fs;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::storage::{sanitize_id, write_atomic};

/// File-backed store for job output text.
pub struct OutputStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl OutputStore {
    /// Store scoped to one owner, rooted at `<data_dir>/outputs/<owner>`.
    pub fn new(data_dir: impl Into<PathBuf>, owner: &str, max_bytes: usize) -> Self {
        Self {
            dir: data_dir.into().join("outputs").join(sanitize_id(owner)),
            max_bytes,
        }
    }

    /// Where the output of `job_id` lives (whether or not it exists yet).
    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", sanitize_id(job_id)))
    }

    /// Persist the final output of a job, truncated to the configured
    /// limit. Returns the path of the written file.
    pub async fn write(&self, job_id: &str, output: &str) -> Result<PathBuf> {
        let text = self.truncate(output);
        let path = self.path_for(job_id);
        write_atomic(&path, &text).await?;
        debug!(job_id, bytes = text.len(), "job output persisted");
        Ok(path)
    }

    /// Read back persisted output. `None` when the job has not produced
    /// any (it is still running, or never existed).
    pub async fn read(&self, job_id: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(job_id)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e).into()),
        }
    }

    /// Cut to at most `max_bytes`, never splitting a char. The stored
    /// record is the exact head of the output, so the cap is a hard
    /// bound on file size.
    fn truncate(&self, s: &str) -> String {
        if s.len() <= self.max_bytes {
            return s.to_string();
        }
        let end = floor_char_boundary(s, self.max_bytes);
        s[..end].to_string()
    }
}

/// Find the largest byte index <= `i` that is a valid char boundary.
fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}
