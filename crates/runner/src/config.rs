//! Run configuration, loadable from TOML.
//!
//! ```toml
//! input = "submission_in.csv"
//! output = "submission.csv"
//! threads = 8
//! time_limit_secs = 3600.0
//! checkpoint_every = 20
//! instances = [10, 11, 12]
//!
//! [anneal]
//! max_iterations = 200000
//! seed = 42
//! ```

use crate::error::RunnerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tree_packing_core::AnnealConfig;

/// Longest accepted wall-clock budget: one year.
const MAX_TIME_LIMIT_SECS: f64 = 365.0 * 24.0 * 3600.0;

/// Settings for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Solution to start from.
    pub input: PathBuf,
    /// Where checkpoints and the final solution are written.
    pub output: PathBuf,
    /// Worker threads. 0 uses one per core.
    pub threads: usize,
    /// Wall-clock budget in seconds.
    pub time_limit_secs: f64,
    /// Checkpoint after this many completed instances.
    pub checkpoint_every: usize,
    /// Minimum side-length drop for a result to be merged.
    pub improvement_epsilon: f64,
    /// Instance ids to optimize. Empty means all.
    pub instances: Vec<usize>,
    /// Annealing parameters.
    pub anneal: AnnealConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("submission_in.csv"),
            output: PathBuf::from("submission.csv"),
            threads: 0,
            time_limit_secs: 11.5 * 3600.0,
            checkpoint_every: 20,
            improvement_epsilon: 1e-12,
            instances: Vec::new(),
            anneal: AnnealConfig::default(),
        }
    }
}

impl RunConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, RunnerError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, RunnerError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Sets input and output paths.
    pub fn with_paths(mut self, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        self.input = input.into();
        self.output = output.into();
        self
    }

    /// Sets the worker count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_secs = limit.as_secs_f64();
        self
    }

    /// Sets the checkpoint interval.
    pub fn with_checkpoint_every(mut self, n: usize) -> Self {
        self.checkpoint_every = n;
        self
    }

    /// Restricts the run to the given instance ids.
    pub fn with_instances(mut self, ids: Vec<usize>) -> Self {
        self.instances = ids;
        self
    }

    /// Sets the annealing parameters.
    pub fn with_anneal(mut self, anneal: AnnealConfig) -> Self {
        self.anneal = anneal;
        self
    }

    /// Wall-clock budget.
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs.min(MAX_TIME_LIMIT_SECS))
            .unwrap_or(Duration::ZERO)
    }

    /// Checks every value, including the nested annealing parameters.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if !(self.time_limit_secs > 0.0 && self.time_limit_secs <= MAX_TIME_LIMIT_SECS) {
            return Err(RunnerError::Config(format!(
                "time_limit_secs must be in (0, {}], got {}",
                MAX_TIME_LIMIT_SECS,
                self.time_limit_secs
            )));
        }
        if self.checkpoint_every == 0 {
            return Err(RunnerError::Config(
                "checkpoint_every must be at least 1".into(),
            ));
        }
        if !(self.improvement_epsilon.is_finite() && self.improvement_epsilon >= 0.0) {
            return Err(RunnerError::Config(
                "improvement_epsilon must be non-negative".into(),
            ));
        }
        self.anneal.validate()?;
        Ok(())
    }
}
