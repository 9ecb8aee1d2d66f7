//! # Tree Packing 2D
//!
//! Placement geometry and the per-instance optimizer for packing copies of a
//! fixed tree outline into the smallest axis-aligned square.
//!
//! ## Components
//!
//! - [`ShapeTemplate`] / [`TREE`]: the 15-vertex outline
//! - [`Placement`]: a positioned, rotated tree with cached polygon and bounds
//! - [`overlaps`]: interior-intersection test (touching allowed)
//! - [`EnvelopeTracker`]: incremental bounding square
//! - [`Objective`]: side length plus gravity term
//! - [`Annealer`] / [`AnnealState`]: simulated annealing
//! - [`validate`]: R*-tree accelerated feasibility check
//!
//! ## Quick Start
//!
//! ```rust
//! use tree_packing_core::{AnnealConfig, RunControl};
//! use tree_packing_d2::{validate, Annealer, Instance};
//!
//! let instance = Instance::from_poses(
//!     3,
//!     &[(0.0, 0.0, 0.0), (1.5, 0.0, 0.0), (0.0, 1.5, 0.0)],
//! )
//! .unwrap();
//!
//! let config = AnnealConfig::new().with_max_iterations(1_000).with_seed(7);
//! let annealer = Annealer::new(config).unwrap();
//! let outcome = annealer.optimize(instance.id(), instance.placements(), &RunControl::new());
//!
//! assert_eq!(outcome.placements.len(), 3);
//! assert!(outcome.score <= instance.side_length());
//! assert!(validate(&outcome.placements));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod anneal;
pub mod collision;
pub mod envelope;
pub mod instance;
pub mod objective;
pub mod placement;
pub mod spatial_index;
pub mod template;
pub mod validator;

// Re-exports
pub use anneal::{
    AnnealOutcome, AnnealProgress, AnnealState, Annealer, InstanceOptimizer, Proposal,
};
pub use collision::{overlaps, polygons_overlap};
pub use envelope::{EnvelopeTracker, EnvelopeUpdate};
pub use instance::Instance;
pub use objective::{Energy, Objective};
pub use placement::{envelope_of, Placement, Pose};
pub use spatial_index::{BroadPhase, SpatialEntry2D, SpatialIndex2D};
pub use template::{ShapeTemplate, TREE, TREE_VERTEX_COUNT};
pub use validator::{find_overlaps, validate, validate_with};

// Core re-exports
pub use tree_packing_core::{
    AnnealConfig, AnnealStatus, CancelToken, Error, Result, RunControl, RunStats, AABB2D,
};
