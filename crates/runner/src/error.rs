//! Error types for solution I/O and orchestration.

use std::num::ParseFloatError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing a solution file.
#[derive(Debug, Error)]
pub enum SolutionError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A coordinate or angle did not parse.
    #[error("invalid number: {0}")]
    ParseFloat(#[from] ParseFloatError),

    /// A row id is not of the form `<instance>_<index>`.
    #[error("row {row}: malformed id '{id}'")]
    MalformedId {
        /// 1-based data row number.
        row: usize,
        /// Offending id.
        id: String,
    },

    /// A value column failed to parse.
    #[error("row {row}: invalid {column} value '{value}'")]
    InvalidValue {
        /// 1-based data row number.
        row: usize,
        /// Column name.
        column: &'static str,
        /// Raw cell content.
        value: String,
    },

    /// The indices of an instance are not exactly `0..id`.
    #[error("instance {id}: expected indices 0..{id}, found {found} rows with gaps or duplicates")]
    IndexMismatch {
        /// Instance id.
        id: usize,
        /// Rows found for the instance.
        found: usize,
    },

    /// An instance violates the placement-count invariant.
    #[error(transparent)]
    Instance(#[from] tree_packing_core::Error),

    /// Atomic rename of a checkpoint failed.
    #[error("could not replace {path}: {source}")]
    Persist {
        /// Destination path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A run configuration value is out of range.
    #[error("invalid run configuration: {0}")]
    Config(String),

    /// The TOML configuration file did not parse.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing the solution failed.
    #[error(transparent)]
    Solution(#[from] SolutionError),

    /// The optimizer rejected its configuration.
    #[error(transparent)]
    Core(#[from] tree_packing_core::Error),

    /// The worker pool could not be built.
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
