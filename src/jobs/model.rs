//! Background-job identity and lifecycle types.

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// What sort of work a background job runs. The kind picks the prefix
/// of the job id, so "b3" reads as "third job overall, a shell job".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Shell command execution.
    Bash,
    /// A delegated sub-agent run.
    Subagent,
    /// Work handed to another teammate agent.
    Teammate,
}

impl JobKind {
    /// Single-letter id prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Bash => "b",
            Self::Subagent => "s",
            Self::Teammate => "t",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Bash => "bash",
            Self::Subagent => "subagent",
            Self::Teammate => "teammate",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bash" => Ok(Self::Bash),
            "subagent" => Ok(Self::Subagent),
            "teammate" => Ok(Self::Teammate),
            other => Err(JobError::InvalidKind {
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a background job.
///
/// `Running` is the only live state; the three terminal states are
/// sticky. Once a job reaches one of them it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Work is still executing.
    Running,
    /// Work finished and returned a result.
    Completed,
    /// Work failed or panicked.
    Error,
    /// Work was stopped before finishing.
    Stopped,
}

impl JobStatus {
    /// Check whether this status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Stopped)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// What `submit` hands back: the id to poll with, and the status at
/// submission time (always running).
#[derive(Debug, Clone, Serialize)]
pub struct JobReceipt {
    /// Kind-prefixed job id, e.g. "b1".
    pub job_id: String,
    /// Status at submission.
    pub status: JobStatus,
}

/// Point-in-time view of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    /// Kind-prefixed job id.
    pub job_id: String,
    /// What sort of work the job runs.
    pub kind: JobKind,
    /// Lifecycle state at snapshot time.
    pub status: JobStatus,
    /// Final output. `None` until the job reaches a terminal status.
    pub output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_prefixes() {
        assert_eq!(JobKind::Bash.prefix(), "b");
        assert_eq!(JobKind::Subagent.prefix(), "s");
        assert_eq!(JobKind::Teammate.prefix(), "t");
    }

    #[test]
    fn kind_display_and_parse_roundtrip() {
        for kind in [JobKind::Bash, JobKind::Subagent, JobKind::Teammate] {
            let parsed: JobKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "cron".parse::<JobKind>().unwrap_err();
        assert!(matches!(err, JobError::InvalidKind { value } if value == "cron"));
    }

    #[test]
    fn terminal_statuses_are_sticky_candidates() {
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Stopped.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(JobStatus::Error).unwrap(),
            serde_json::json!("error")
        );
        assert_eq!(
            serde_json::to_value(JobKind::Subagent).unwrap(),
            serde_json::json!("subagent")
        );
    }

    #[test]
    fn snapshot_serializes_with_wire_fields() {
        let snapshot = JobSnapshot {
            job_id: "b1".to_string(),
            kind: JobKind::Bash,
            status: JobStatus::Completed,
            output: Some("done".to_string()),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["job_id"], "b1");
        assert_eq!(value["kind"], "bash");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["output"], "done");
    }
}
