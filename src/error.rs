//! Error types for the task orchestration core.

/// Top-level error type for the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Task validation and lookup errors, surfaced synchronously to the
/// caller of the mutating operation.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Invalid status value: {value}")]
    InvalidStatus { value: String },

    #[error("Task {id} not found")]
    NotFound { id: String },
}

/// Background-job errors. Failures *inside* a job are never errors at
/// this level; they surface as a terminal `error` status on the job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} not found")]
    NotFound { id: String },

    #[error("Unknown job kind: {value}")]
    InvalidKind { value: String },
}

/// Durable-record I/O errors. Each entity is an independent file, so a
/// failed write is fatal only to the operation that attempted it.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record at {path}: {reason}")]
    CorruptRecord { path: String, reason: String },
}

impl Error {
    /// Shorthand for a task validation failure.
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Task(TaskError::Validation {
            reason: reason.into(),
        })
    }

    /// Shorthand for an unknown-task error.
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Error::Task(TaskError::NotFound { id: id.into() })
    }

    /// Shorthand for an unknown-job error.
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Error::Job(JobError::NotFound { id: id.into() })
    }
}

/// Result type alias for the orchestrator.
pub type Result<T> = std::result::Result<T, Error>;
