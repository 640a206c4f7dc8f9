//! Task records for the shared board.
//!
//! Tasks are persisted one file per record with camelCase keys, the format
//! the rest of the agent system reads (`activeForm`, `blockedBy` and so
//! on). A task is *executable* when nothing blocks it; that is derived
//! from `blocked_by`, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Status of a task on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    Pending,
    /// Actively being worked on.
    InProgress,
    /// Done.
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = TaskError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(TaskError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// A persisted unit of work with status, ownership, and dependency edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Monotonically allocated id, never reused.
    pub id: String,
    /// Short imperative summary ("Ship parser").
    pub subject: String,
    /// Longer free-form details.
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    /// Present-participle label shown while in progress ("Shipping parser").
    pub active_form: String,
    /// Acting identity that claimed the task; empty when unowned.
    #[serde(default)]
    pub owner: String,
    /// Ids of tasks that depend on this one (maintained inverse edge).
    #[serde(default)]
    pub blocks: Vec<String>,
    /// Ids of prerequisite tasks; the task is executable once this is empty.
    #[serde(default)]
    pub blocked_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh pending task.
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        description: impl Into<String>,
        active_form: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            subject: subject.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            active_form: active_form.into(),
            owner: String::new(),
            blocks: Vec::new(),
            blocked_by: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A task is executable iff nothing blocks it.
    pub fn is_executable(&self) -> bool {
        self.blocked_by.is_empty()
    }

    /// One rendered line for the board view.
    pub fn render_line(&self) -> String {
        let mark = match self.status {
            TaskStatus::Completed => "[x]",
            TaskStatus::InProgress => "[>]",
            TaskStatus::Pending => "[ ]",
        };
        let mut line = format!("{} {} {}", mark, self.id, self.subject);
        if self.status == TaskStatus::InProgress {
            line.push_str(&format!(" <- {}", self.active_form));
            if !self.owner.is_empty() {
                line.push_str(&format!(" (owner: {})", self.owner));
            }
        }
        if !self.blocked_by.is_empty() {
            line.push_str(&format!(" (blocked by: {})", self.blocked_by.join(", ")));
        }
        line
    }
}

/// Render the whole board as the text view the turn-based loop consumes.
pub fn render_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks.".to_string();
    }
    let mut lines: Vec<String> = tasks.iter().map(Task::render_line).collect();
    let completed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    lines.push(format!("\n({}/{} completed)", completed, tasks.len()));
    lines.join("\n")
}

/// Mutation request for a single task: every field optional, validated
/// before any change is applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub owner: Option<String>,
    pub add_blocked_by: Vec<String>,
    pub remove_blocked_by: Vec<String>,
}

impl TaskUpdate {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_add_blocked_by(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.add_blocked_by
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_remove_blocked_by(
        mut self,
        ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.remove_blocked_by
            .extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Minimal acknowledgment returned to the caller right after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub id: String,
    pub subject: String,
}

impl From<&Task> for TaskCreated {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            subject: task.subject.clone(),
        }
    }
}
