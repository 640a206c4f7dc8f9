//! Agent task board and background-job orchestration.

pub mod config;
pub mod error;
pub mod jobs;
pub mod notify;
pub mod orchestrator;
pub mod tasks;

mod storage;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use orchestrator::TaskOrchestrator;
