//! # Tree Packing Core
//!
//! Shared building blocks for the tree packing optimizer.
//!
//! This crate holds everything that does not depend on the tree shape itself:
//!
//! - **Bounding boxes**: [`AABB2D`]
//! - **Robust predicates**: [`robust::orient2d_filtered`], [`robust::locate_point`],
//!   [`robust::segments_cross_properly`]
//! - **Annealing primitives**: [`AnnealConfig`], [`InstanceSchedule`], [`Cooling`],
//!   [`accept_move`]
//! - **Run control**: [`CancelToken`], [`RunControl`]
//! - **Run results**: [`RunStats`], [`AnnealStatus`]
//!
//! ## Configuration
//!
//! ```rust
//! use tree_packing_core::AnnealConfig;
//!
//! let config = AnnealConfig::new()
//!     .with_max_iterations(200_000)
//!     .with_temperatures(1.0, 0.003)
//!     .with_seed(42);
//! assert!(config.validate().is_ok());
//!
//! let schedule = config.schedule_for(12);
//! assert_eq!(schedule.iterations, 600_000);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod error;
pub mod result;
pub mod robust;
pub mod sa;
pub mod solver;
pub mod transform;

// Re-exports
pub use error::{Error, Result};
pub use result::{AnnealStatus, RunStats};
pub use robust::{Orientation, PointLocation};
pub use sa::{
    accept_move, acceptance_probability, cooling_rate, AnnealConfig, Cooling, InstanceSchedule,
    ScaleDecay, ScaleRange, MIN_TEMPERATURE,
};
pub use solver::{CancelToken, RunControl, StopReason};
pub use transform::AABB2D;
