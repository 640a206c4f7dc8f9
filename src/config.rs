//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration.
///
/// One instance is built up front and injected into [`TaskOrchestrator`];
/// nothing reads the environment after construction.
///
/// [`TaskOrchestrator`]: crate::orchestrator::TaskOrchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root for all durable records (task files, counter, overflow outputs).
    pub data_dir: PathBuf,
    /// Maximum stored length of a background job's output, in bytes.
    pub max_output_bytes: usize,
    /// Maximum length of a notification summary, in characters.
    pub summary_chars: usize,
    /// Default wait for a blocking output retrieval.
    pub default_wait: Duration,
    /// When set, at most one task may be in_progress at a time.
    pub single_in_progress: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/tasks"),
            max_output_bytes: 64 * 1024, // 64KB
            summary_chars: 500,
            default_wait: Duration::from_millis(2000), // 2 seconds
            single_in_progress: false,
        }
    }
}

impl OrchestratorConfig {
    /// Build config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("AGENT_TASKS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let max_output_bytes: usize = std::env::var("AGENT_TASKS_MAX_OUTPUT_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_output_bytes);

        let summary_chars: usize = std::env::var("AGENT_TASKS_SUMMARY_CHARS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.summary_chars);

        let default_wait = std::env::var("AGENT_TASKS_DEFAULT_WAIT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.default_wait);

        let single_in_progress = std::env::var("AGENT_TASKS_SINGLE_IN_PROGRESS")
            .ok()
            .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.single_in_progress);

        Self {
            data_dir,
            max_output_bytes,
            summary_chars,
            default_wait,
            single_in_progress,
        }
    }

    /// Replace the data directory (handy for tests and embedded setups).
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}
