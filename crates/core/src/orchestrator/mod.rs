//! Download orchestrator for resumable bulk harvesting.
//!
//! The orchestrator drives a museum's items through the progress store:
//! - **Discovery**: listing pages are fetched lazily and resume from a persisted cursor
//! - **Processing**: claimed batches are downloaded with bounded concurrency
//! - **Retries**: failures are classified and rescheduled or abandoned

mod config;
mod runner;
mod shutdown;
mod types;

pub use config::OrchestratorConfig;
pub use runner::DownloadOrchestrator;
pub use shutdown::StopHandle;
pub use types::{FailedItemReport, OrchestratorError, RunOptions, RunSummary};
