//! Persisted CRUD for tasks plus dependency-graph maintenance.
//!
//! One JSON file per task under `<data_dir>/tasks/`, written atomically.
//! The durable files are the hand-off between board members: several
//! stores over the same directory observe each other's writes. Mutations
//! on one id are serialized by a per-id lock; no lock ever spans two
//! entities at once, so the cascade cannot deadlock with concurrent
//! completions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, StorageError, TaskError};
use crate::storage::{sanitize_id, write_atomic};
use crate::tasks::ids::IdAllocator;
use crate::tasks::model::{Task, TaskStatus, TaskUpdate};

/// File-backed task store.
pub struct TaskStore {
    tasks_dir: PathBuf,
    ids: IdAllocator,
    // Entries are never removed: ids are never reused, and a removed
    // entry could briefly coexist with a clone still held by a writer.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    single_in_progress: bool,
}

impl TaskStore {
    /// Store rooted at `data_dir`, with the one-in-progress policy off.
    pub fn new(data_dir: impl Into<PathBuf>) -> Arc<Self> {
        Self::with_policy(data_dir, false)
    }

    /// Store rooted at `data_dir`. When `single_in_progress` is set, an
    /// update moving a second task to in_progress fails validation.
    pub fn with_policy(data_dir: impl Into<PathBuf>, single_in_progress: bool) -> Arc<Self> {
        let data_dir = data_dir.into();
        Arc::new(Self {
            tasks_dir: data_dir.join("tasks"),
            ids: IdAllocator::new(&data_dir),
            locks: Mutex::new(HashMap::new()),
            single_in_progress,
        })
    }

    /// Create a pending task with a freshly allocated id.
    pub async fn create(
        &self,
        subject: &str,
        description: &str,
        active_form: &str,
    ) -> Result<Task> {
        let subject = subject.trim();
        let active_form = active_form.trim();
        if subject.is_empty() {
            return Err(Error::validation("subject is required"));
        }
        if active_form.is_empty() {
            return Err(Error::validation("activeForm is required"));
        }

        let id = self.ids.next().await?;
        let task = Task::new(&id, subject, description.trim(), active_form);
        self.persist(&task).await?;
        info!(id = %task.id, subject = %task.subject, "task created");
        Ok(task)
    }

    /// Fetch one task.
    pub async fn get(&self, id: &str) -> Result<Task> {
        self.read_task(id).await
    }

    /// Apply a validated mutation to one task.
    ///
    /// `actor` is the acting identity: a task moving to in_progress with
    /// no owner (neither on the record nor in the request) is stamped
    /// with it. Setting status to completed afterwards clears the
    /// completed id from every dependent's blockedBy set. A task cannot
    /// list itself in blockedBy.
    pub async fn update(&self, id: &str, update: TaskUpdate, actor: &str) -> Result<Task> {
        let (task, became_completed, added, removed) = {
            let lock = self.entity_lock(id).await;
            let _guard = lock.lock().await;

            let mut task = self.read_task(id).await?;

            if update.add_blocked_by.iter().any(|dep| dep == id) {
                return Err(Error::validation("a task cannot block itself"));
            }

            if self.single_in_progress
                && update.status == Some(TaskStatus::InProgress)
                && task.status != TaskStatus::InProgress
                && let Some(other) = self
                    .list()
                    .await?
                    .into_iter()
                    .find(|t| t.id != id && t.status == TaskStatus::InProgress)
            {
                return Err(Error::validation(format!(
                    "task {} is already in_progress",
                    other.id
                )));
            }

            let mut became_completed = false;

            if let Some(status) = update.status {
                became_completed = status == TaskStatus::Completed;
                task.status = status;
            }
            if let Some(owner) = &update.owner {
                task.owner = owner.clone();
            }
            if update.status == Some(TaskStatus::InProgress) && task.owner.is_empty() {
                task.owner = actor.to_string();
                debug!(id = %task.id, owner = %task.owner, "owner defaulted to acting identity");
            }

            let mut added = Vec::new();
            for dep in &update.add_blocked_by {
                if !task.blocked_by.contains(dep) {
                    task.blocked_by.push(dep.clone());
                    added.push(dep.clone());
                }
            }
            let mut removed = Vec::new();
            for dep in &update.remove_blocked_by {
                if task.blocked_by.contains(dep) {
                    task.blocked_by.retain(|d| d != dep);
                    removed.push(dep.clone());
                }
            }

            task.updated_at = Utc::now();
            self.persist(&task).await?;
            (task, became_completed, added, removed)
        };

        // Inverse edges on the referenced tasks, one lock at a time.
        for dep in &added {
            self.edit_if_exists(dep, |t| {
                if t.blocks.contains(&task.id) {
                    false
                } else {
                    t.blocks.push(task.id.clone());
                    true
                }
            })
            .await?;
        }
        for dep in &removed {
            self.edit_if_exists(dep, |t| {
                let before = t.blocks.len();
                t.blocks.retain(|b| b != &task.id);
                before != t.blocks.len()
            })
            .await?;
        }

        if became_completed {
            self.cascade_unblock(&task.id).await?;
        }

        debug!(id = %task.id, status = %task.status, "task updated");
        Ok(task)
    }

    /// Physically remove a task record.
    ///
    /// Never cascades: dependents keep their (now dangling) blockedBy
    /// entries and stay non-executable until edited. A warning names
    /// them so the caller can clean up.
    pub async fn delete(&self, id: &str) -> Result<()> {
        {
            let lock = self.entity_lock(id).await;
            let _guard = lock.lock().await;
            // Confirms existence so a bad id surfaces as not-found.
            self.read_task(id).await?;
            fs::remove_file(self.task_path(id))
                .await
                .map_err(StorageError::Io)?;
        }

        let dependents: Vec<String> = self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.blocked_by.iter().any(|d| d == id))
            .map(|t| t.id)
            .collect();
        if !dependents.is_empty() {
            warn!(
                id,
                dependents = ?dependents,
                "deleted task is still listed in blockedBy of other tasks"
            );
        }

        info!(id, "task deleted");
        Ok(())
    }

    /// All tasks, ordered by ascending numeric id. Unreadable records
    /// are skipped with a warning rather than failing the listing.
    pub async fn list(&self) -> Result<Vec<Task>> {
        if !self.tasks_dir.exists() {
            return Ok(Vec::new());
        }

        let mut tasks = Vec::new();
        let mut read_dir = fs::read_dir(&self.tasks_dir)
            .await
            .map_err(StorageError::Io)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(StorageError::Io)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = match fs::read_to_string(&path).await {
                Ok(text) => text,
                // Raced with a delete from another board member.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e).into()),
            };
            match serde_json::from_str::<Task>(&text) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable task record");
                }
            }
        }

        tasks.sort_by_key(|t| (t.id.parse::<u64>().unwrap_or(u64::MAX), t.id.clone()));
        Ok(tasks)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn task_path(&self, id: &str) -> PathBuf {
        self.tasks_dir.join(format!("{}.json", sanitize_id(id)))
    }

    async fn entity_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_task(&self, id: &str) -> Result<Task> {
        let path = self.task_path(id);
        match fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                StorageError::CorruptRecord {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::task_not_found(id)),
            Err(e) => Err(StorageError::Io(e).into()),
        }
    }

    async fn persist(&self, task: &Task) -> Result<()> {
        let json = serde_json::to_string_pretty(task).map_err(StorageError::Serialization)?;
        write_atomic(&self.task_path(&task.id), &json).await?;
        Ok(())
    }

    /// Mutate a task if it exists, under its own lock; missing ids are a
    /// no-op (dependency references are allowed to dangle). Returns
    /// whether the record changed and was rewritten.
    async fn edit_if_exists<F>(&self, id: &str, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Task) -> bool,
    {
        let lock = self.entity_lock(id).await;
        let _guard = lock.lock().await;

        let mut task = match self.read_task(id).await {
            Ok(task) => task,
            Err(Error::Task(TaskError::NotFound { .. })) => return Ok(false),
            Err(e) => return Err(e),
        };
        if mutate(&mut task) {
            task.updated_at = Utc::now();
            self.persist(&task).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Remove `completed_id` from every other task's blockedBy set.
    async fn cascade_unblock(&self, completed_id: &str) -> Result<()> {
        let snapshot = self.list().await?;
        let mut unblocked = 0usize;
        for other in snapshot {
            if other.id == completed_id || !other.blocked_by.iter().any(|d| d == completed_id) {
                continue;
            }
            let changed = self
                .edit_if_exists(&other.id, |t| {
                    let before = t.blocked_by.len();
                    t.blocked_by.retain(|d| d != completed_id);
                    before != t.blocked_by.len()
                })
                .await?;
            if changed {
                unblocked += 1;
            }
        }
        if unblocked > 0 {
            info!(id = completed_id, unblocked, "completion unblocked dependent tasks");
        }
        Ok(())
    }
}
