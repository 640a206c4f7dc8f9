//! Completion notifications for background jobs.
//!
//! Every job that reaches a terminal status enqueues exactly one
//! notification here. The consuming loop drains the queue between
//! turns; a drained notification is gone, so each terminal transition
//! is reported exactly once.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use crate::jobs::model::{JobKind, JobStatus};

/// A single job-completion notice.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Kind-prefixed job id.
    pub job_id: String,
    /// What sort of work the job ran.
    pub job_type: JobKind,
    /// Terminal status the job landed on.
    pub status: JobStatus,
    /// Leading slice of the output, for display without a file read.
    pub summary: String,
    /// Where the full output was persisted, if the write succeeded.
    pub output_file: Option<PathBuf>,
}

impl Notification {
    /// Wire form injected into the consuming agent's context.
    pub fn to_wire(&self) -> Value {
        json!({
            "type": "attachment",
            "attachment": {
                "type": "task_status",
                "job_id": self.job_id,
                "job_type": self.job_type,
                "status": self.status,
                "summary": self.summary,
                "output_file": self.output_file,
            }
        })
    }
}

/// Bounded preview of the output: at most `max_chars` characters, with
/// the ellipsis marking a cut counted against the bound.
pub fn summarize(output: &str, max_chars: usize) -> String {
    if output.chars().count() <= max_chars {
        return output.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut summary: String = output.chars().take(keep).collect();
    summary.push_str("...");
    summary
}

/// In-memory FIFO of pending notifications.
pub struct NotificationBus {
    queue: Mutex<VecDeque<Notification>>,
}

impl NotificationBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
        })
    }

    /// Enqueue one notice.
    pub async fn put(&self, notification: Notification) {
        debug!(
            job_id = %notification.job_id,
            status = %notification.status,
            "notification queued"
        );
        self.queue.lock().await.push_back(notification);
    }

    /// Take everything queued so far, oldest first. The queue is empty
    /// afterwards.
    pub async fn drain(&self) -> Vec<Notification> {
        self.queue.lock().await.drain(..).collect()
    }

    /// Number of undelivered notifications.
    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}
