//! Monthly ingestion cycle: freshness check, harvest, enrichment,
//! persistence and summary, with a run ledger per invocation.

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::PipelineError;
pub use orchestrator::PipelineOrchestrator;
pub use state::{CycleReport, CycleState};
