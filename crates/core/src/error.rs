//! Error types shared by the tree packing crates.

use thiserror::Error;

/// Result alias used throughout the tree packing crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the packing core.
#[derive(Debug, Error)]
pub enum Error {
    /// A placement has non-finite coordinates or angle.
    #[error("invalid placement: {0}")]
    InvalidPlacement(String),

    /// An instance does not hold exactly `id` placements.
    #[error("instance {id} holds {found} placements, expected {id}")]
    InstanceSize {
        /// Instance id (the required placement count).
        id: usize,
        /// Number of placements actually supplied.
        found: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
