//! Final feasibility check for a whole instance.

use crate::collision::{overlaps, polygons_overlap};
use crate::placement::Placement;
use crate::spatial_index::{BroadPhase, SpatialIndex2D};
use tree_packing_core::AABB2D;

/// Returns true if no two placements overlap. Touching is allowed.
pub fn validate(placements: &[Placement]) -> bool {
    if placements.len() < 2 {
        return true;
    }
    let index = build_index(placements);
    validate_with(placements, &index)
}

/// Validates using an already built broad phase.
pub fn validate_with<B: BroadPhase + ?Sized>(placements: &[Placement], broad_phase: &B) -> bool {
    for (i, p) in placements.iter().enumerate() {
        for j in broad_phase.candidates(p.bounds()) {
            if j > i && overlaps(p, &placements[j]) {
                return false;
            }
        }
    }
    true
}

/// Lists every overlapping pair `(i, j)` with `i < j`.
pub fn find_overlaps(placements: &[Placement]) -> Vec<(usize, usize)> {
    let index = build_index(placements);
    let mut pairs = Vec::new();
    for (i, p) in placements.iter().enumerate() {
        for j in index.candidates(p.bounds()) {
            if j > i && polygons_overlap(p.polygon(), placements[j].polygon()) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

fn build_index(placements: &[Placement]) -> SpatialIndex2D {
    SpatialIndex2D::from_boxes(placements.iter().map(Placement::bounds))
}

/// Bounding boxes of `placements`, usable as a linear-scan broad phase.
pub fn bounding_boxes(placements: &[Placement]) -> Vec<AABB2D> {
    placements.iter().map(|p| *p.bounds()).collect()
}
