//! The façade tying the task board, background jobs, and notifications
//! together.
//!
//! One orchestrator per agent. Several orchestrators pointed at the
//! same data directory share the task board through its files; jobs
//! and notifications belong to the process that started them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::jobs::executor::{BackgroundExecutor, StopToken};
use crate::jobs::model::{JobKind, JobReceipt, JobSnapshot};
use crate::jobs::output::OutputStore;
use crate::notify::{Notification, NotificationBus};
use crate::tasks::model::{Task, TaskUpdate, render_list};
use crate::tasks::store::TaskStore;

pub struct TaskOrchestrator {
    identity: String,
    default_wait: Duration,
    tasks: Arc<TaskStore>,
    executor: Arc<BackgroundExecutor>,
    notifications: Arc<NotificationBus>,
}

impl TaskOrchestrator {
    /// Build an orchestrator acting as `identity`. The identity is
    /// stamped onto tasks it claims without an explicit owner, and
    /// scopes where this agent's job output files land.
    pub fn new(config: OrchestratorConfig, identity: impl Into<String>) -> Self {
        let identity = identity.into();
        let notifications = NotificationBus::new();
        let outputs = OutputStore::new(&config.data_dir, &identity, config.max_output_bytes);
        let executor =
            BackgroundExecutor::new(outputs, Arc::clone(&notifications), config.summary_chars);
        let tasks = TaskStore::with_policy(&config.data_dir, config.single_in_progress);
        Self {
            identity,
            default_wait: config.default_wait,
            tasks,
            executor,
            notifications,
        }
    }

    /// Acting identity of this orchestrator.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    // ── Task board ──────────────────────────────────────────────────

    pub async fn create_task(
        &self,
        subject: &str,
        description: &str,
        active_form: &str,
    ) -> Result<Task> {
        self.tasks.create(subject, description, active_form).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        self.tasks.get(id).await
    }

    /// Apply an update, acting as this orchestrator's identity.
    pub async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task> {
        self.tasks.update(id, update, &self.identity).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        self.tasks.delete(id).await
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.tasks.list().await
    }

    /// Human-readable board, one line per task.
    pub async fn render_task_list(&self) -> Result<String> {
        Ok(render_list(&self.tasks.list().await?))
    }

    // ── Background jobs ─────────────────────────────────────────────

    /// Launch `work` as a background job of the given kind.
    pub async fn run_in_background<F, Fut>(&self, kind: JobKind, work: F) -> JobReceipt
    where
        F: FnOnce(StopToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        self.executor.submit(kind, work).await
    }

    /// Status and, once terminal, output of a job.
    ///
    /// When `block` is set, waits up to `timeout` (the configured
    /// default when `None`) for the job to finish; an elapsed wait
    /// returns the still-running snapshot. `block = false` snapshots
    /// immediately.
    pub async fn get_output(
        &self,
        job_id: &str,
        block: bool,
        timeout: Option<Duration>,
    ) -> Result<JobSnapshot> {
        if !block {
            return self.executor.snapshot(job_id).await;
        }
        let limit = timeout.unwrap_or(self.default_wait);
        self.executor.wait(job_id, Some(limit)).await
    }

    /// Ask a running job to stop.
    pub async fn stop_job(&self, job_id: &str) -> Result<JobSnapshot> {
        self.executor.stop(job_id).await
    }

    /// Number of jobs still running.
    pub async fn running_jobs(&self) -> usize {
        self.executor.running_count().await
    }

    // ── Notifications ───────────────────────────────────────────────

    /// Pending completion notices, oldest first. Draining removes
    /// them; each notice is delivered exactly once.
    pub async fn drain_notifications(&self) -> Vec<Notification> {
        self.notifications.drain().await
    }

    /// Wire forms of the pending notices, ready to inject into the
    /// consuming conversation.
    pub async fn drain_notification_wire(&self) -> Vec<Value> {
        self.drain_notifications()
            .await
            .iter()
            .map(Notification::to_wire)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::JobStatus;
    use crate::tasks::model::TaskStatus;
    use tempfile::TempDir;

    fn orchestrator(dir: &TempDir, identity: &str) -> TaskOrchestrator {
        let config = OrchestratorConfig::default().with_data_dir(dir.path());
        TaskOrchestrator::new(config, identity)
    }

    #[tokio::test]
    async fn update_defaults_owner_to_orchestrator_identity() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, "planner");
        assert_eq!(orch.identity(), "planner");

        orch.create_task("Review PR", "", "Reviewing PR").await.unwrap();
        let task = orch
            .update_task("1", TaskUpdate::default().with_status(TaskStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(task.owner, "planner");
    }

    #[tokio::test]
    async fn two_orchestrators_share_the_board() {
        let dir = TempDir::new().unwrap();
        let lead = orchestrator(&dir, "lead");
        let helper = orchestrator(&dir, "helper");

        lead.create_task("Shared", "", "Sharing").await.unwrap();
        let seen = helper.list_tasks().await.unwrap();
        assert_eq!(seen.len(), 1);

        helper
            .update_task("1", TaskUpdate::default().with_status(TaskStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(lead.get_task("1").await.unwrap().owner, "helper");
    }

    #[tokio::test]
    async fn render_shows_progress_markers() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, "planner");

        orch.create_task("First", "", "Doing first").await.unwrap();
        orch.create_task("Second", "", "Doing second").await.unwrap();
        orch.update_task("1", TaskUpdate::default().with_status(TaskStatus::InProgress))
            .await
            .unwrap();

        let board = orch.render_task_list().await.unwrap();
        assert!(board.contains("[>] 1 First <- Doing first"));
        assert!(board.contains("[ ] 2 Second"));
        assert!(board.ends_with("(0/2 completed)"));
    }

    #[tokio::test]
    async fn job_round_trip_through_the_facade() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, "planner");

        let receipt = orch
            .run_in_background(JobKind::Bash, |_token| async {
                Ok::<_, anyhow::Error>("listed 4 files".to_string())
            })
            .await;
        assert_eq!(receipt.job_id, "b1");

        let snap = orch
            .get_output(&receipt.job_id, true, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.output.as_deref(), Some("listed 4 files"));

        let wire = orch.drain_notification_wire().await;
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["type"], "attachment");
        assert_eq!(wire[0]["attachment"]["job_id"], "b1");
        assert!(orch.drain_notifications().await.is_empty());
    }

    #[tokio::test]
    async fn nonblocking_get_output_snapshots_immediately() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, "planner");

        let receipt = orch
            .run_in_background(JobKind::Subagent, |mut token| async move {
                token.stopped().await;
                Ok::<_, anyhow::Error>(String::new())
            })
            .await;

        let snap = orch.get_output(&receipt.job_id, false, None).await.unwrap();
        assert_eq!(snap.status, JobStatus::Running);
        assert_eq!(snap.output, None);
        assert_eq!(orch.running_jobs().await, 1);

        orch.stop_job(&receipt.job_id).await.unwrap();
    }

    #[tokio::test]
    async fn blocking_wait_falls_back_to_configured_default() {
        let dir = TempDir::new().unwrap();
        let mut config = OrchestratorConfig::default().with_data_dir(dir.path());
        config.default_wait = Duration::from_millis(50);
        let orch = TaskOrchestrator::new(config, "planner");

        let receipt = orch
            .run_in_background(JobKind::Bash, |mut token| async move {
                token.stopped().await;
                Ok::<_, anyhow::Error>(String::new())
            })
            .await;

        // No explicit timeout: the 50ms default elapses and the job is
        // still running.
        let snap = orch.get_output(&receipt.job_id, true, None).await.unwrap();
        assert_eq!(snap.status, JobStatus::Running);

        orch.stop_job(&receipt.job_id).await.unwrap();
    }
}
