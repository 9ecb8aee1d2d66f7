//! Runner for the tree packing optimizer.
//!
//! This crate provides:
//! - Solution table I/O in the `id,x,y,deg` CSV format
//! - Run configuration loadable from TOML
//! - The parallel orchestrator with merge, checkpoint and shutdown handling

mod config;
mod error;
mod orchestrator;
mod solution;

pub use config::RunConfig;
pub use error::{RunnerError, SolutionError};
pub use orchestrator::{
    finalize, Finalized, Orchestrator, OrchestratorState, RunReport, Shutdown, Validator, Verdict,
    WorkerReport,
};
pub use solution::Solution;
