//! Concurrent execution of background jobs.
//!
//! Each submitted job runs on its own spawned task. The job's terminal
//! transition happens in exactly one place, `finalize`, which is
//! first-writer-wins: whichever of the worker or a stop request gets
//! there first decides the terminal status, persists the output, and
//! enqueues the one completion notification. The loser is a no-op, so
//! terminal statuses are sticky and notifications never duplicate.
//!
//! Stopping is cooperative. A stop flips the status immediately; the
//! work itself keeps its `StopToken` and is expected to notice and
//! wind down. Its eventual return value is discarded.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::jobs::model::{JobKind, JobReceipt, JobSnapshot, JobStatus};
use crate::jobs::output::OutputStore;
use crate::notify::{Notification, NotificationBus, summarize};

/// Cancellation handle handed to job work.
///
/// The token observes the job's status channel, so it also resolves
/// when the job is finalized for any other reason.
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<JobStatus>,
}

impl StopToken {
    /// Whether the job has been asked to stop (or already finalized).
    pub fn is_stopped(&self) -> bool {
        self.rx.borrow().is_terminal()
    }

    /// Resolve once the job is asked to stop (or otherwise finalized).
    pub async fn stopped(&mut self) {
        let _ = self.rx.wait_for(|s| s.is_terminal()).await;
    }
}

struct JobEntry {
    kind: JobKind,
    status: JobStatus,
    output: Option<String>,
    tx: watch::Sender<JobStatus>,
}

/// Runs jobs in the background and tracks their lifecycle.
///
/// Entries are kept after the job finishes so the output stays
/// retrievable for the life of the process.
pub struct BackgroundExecutor {
    outputs: OutputStore,
    bus: Arc<NotificationBus>,
    jobs: RwLock<HashMap<String, JobEntry>>,
    sequence: AtomicU64,
    summary_chars: usize,
}

impl BackgroundExecutor {
    pub fn new(
        outputs: OutputStore,
        bus: Arc<NotificationBus>,
        summary_chars: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            outputs,
            bus,
            jobs: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            summary_chars,
        })
    }

    /// Launch `work` as a background job and return immediately.
    ///
    /// Ids share one ascending sequence across kinds, prefixed per
    /// kind: "b1", then "t2", then "s3". A panic inside the work is
    /// contained and finalizes the job as an error.
    pub async fn submit<F, Fut>(self: &Arc<Self>, kind: JobKind, work: F) -> JobReceipt
    where
        F: FnOnce(StopToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let job_id = format!("{}{}", kind.prefix(), n);

        let (tx, rx) = watch::channel(JobStatus::Running);
        self.jobs.write().await.insert(
            job_id.clone(),
            JobEntry {
                kind,
                status: JobStatus::Running,
                output: None,
                tx,
            },
        );
        info!(job_id = %job_id, kind = %kind, "background job started");

        let executor = Arc::clone(self);
        let id = job_id.clone();
        let token = StopToken { rx };
        tokio::spawn(async move {
            // Inner spawn so a panic surfaces as a JoinError here
            // instead of killing the reaper; the closure body runs
            // inside the inner task too.
            let outcome = tokio::spawn(async move { work(token).await }).await;
            match outcome {
                Ok(Ok(output)) => executor.finalize(&id, JobStatus::Completed, output).await,
                Ok(Err(e)) => executor.finalize(&id, JobStatus::Error, e.to_string()).await,
                Err(join_err) => {
                    executor
                        .finalize(&id, JobStatus::Error, panic_message(join_err))
                        .await
                }
            }
        });

        JobReceipt {
            job_id,
            status: JobStatus::Running,
        }
    }

    /// Current state of a job, without waiting.
    pub async fn snapshot(&self, job_id: &str) -> Result<JobSnapshot> {
        let jobs = self.jobs.read().await;
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| Error::job_not_found(job_id))?;
        Ok(JobSnapshot {
            job_id: job_id.to_string(),
            kind: entry.kind,
            status: entry.status,
            output: entry.output.clone(),
        })
    }

    /// Wait until the job reaches a terminal status, then snapshot it.
    ///
    /// With a timeout, an elapsed wait is not an error; the snapshot
    /// simply still shows the job running.
    pub async fn wait(&self, job_id: &str, timeout: Option<Duration>) -> Result<JobSnapshot> {
        let mut rx = {
            let jobs = self.jobs.read().await;
            let entry = jobs
                .get(job_id)
                .ok_or_else(|| Error::job_not_found(job_id))?;
            entry.tx.subscribe()
        };

        let terminal = rx.wait_for(|s| s.is_terminal());
        match timeout {
            Some(limit) => {
                let _ = tokio::time::timeout(limit, terminal).await;
            }
            None => {
                let _ = terminal.await;
            }
        }
        self.snapshot(job_id).await
    }

    /// Request a stop. If the job is still running it finalizes as
    /// stopped right away; a job already in a terminal status keeps it.
    pub async fn stop(&self, job_id: &str) -> Result<JobSnapshot> {
        if !self.jobs.read().await.contains_key(job_id) {
            return Err(Error::job_not_found(job_id));
        }
        self.finalize(job_id, JobStatus::Stopped, String::new())
            .await;
        self.snapshot(job_id).await
    }

    /// Number of jobs still running.
    pub async fn running_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| e.status == JobStatus::Running)
            .count()
    }

    /// Move a job to a terminal status. First writer wins; later calls
    /// for the same job do nothing.
    ///
    /// The status channel fires only after the output is persisted and
    /// the notification enqueued, so a waiter that observes a terminal
    /// status can rely on both being in place. The terminal value is
    /// stored in the channel even when no receiver is subscribed at
    /// that moment, so a waiter arriving later still sees it.
    async fn finalize(&self, job_id: &str, status: JobStatus, output: String) {
        let kind = {
            let mut jobs = self.jobs.write().await;
            let Some(entry) = jobs.get_mut(job_id) else {
                warn!(job_id, "finalize for unknown job");
                return;
            };
            if entry.status.is_terminal() {
                debug!(job_id, status = %status, "job already finalized");
                return;
            }
            entry.status = status;
            entry.output = Some(output.clone());
            entry.kind
        };

        let output_file = match self.outputs.write(job_id, &output).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!(job_id, error = %e, "failed to persist job output");
                None
            }
        };

        self.bus
            .put(Notification {
                job_id: job_id.to_string(),
                job_type: kind,
                status,
                summary: summarize(&output, self.summary_chars),
                output_file,
            })
            .await;

        if let Some(entry) = self.jobs.read().await.get(job_id) {
            entry.tx.send_replace(status);
        }
        info!(job_id, status = %status, "background job finished");
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "job task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("job panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("job panicked: {s}")
    } else {
        "job panicked".to_string()
    }
}
