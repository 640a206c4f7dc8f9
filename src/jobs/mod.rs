//! Background jobs: models, durable output, and the executor.

pub mod executor;
pub mod model;
pub mod output;

pub use executor::{BackgroundExecutor, StopToken};
pub use model::{JobKind, JobReceipt, JobSnapshot, JobStatus};
pub use output::OutputStore;
