//! Broad-phase candidate search over placement bounding boxes.
//!
//! The contract is one query: given a box, return the indices of all
//! entries whose (closed) bounding box intersects it. [`SpatialIndex2D`]
//! answers it with a bulk-loaded R*-tree; a plain slice of boxes answers it
//! by linear scan.

use rstar::{RTree, RTreeObject, AABB};
use tree_packing_core::AABB2D;

/// Indices whose bounding box intersects a query box.
pub trait BroadPhase {
    /// Returns every index whose box intersects `query`, touching included.
    fn candidates(&self, query: &AABB2D) -> Vec<usize>;
}

/// An entry in the spatial index.
#[derive(Debug, Clone)]
pub struct SpatialEntry2D {
    /// Index of the placement in its instance.
    pub index: usize,
    /// Bounding box of the placement.
    pub aabb: AABB2D,
}

impl SpatialEntry2D {
    /// Creates a new entry.
    pub fn new(index: usize, aabb: AABB2D) -> Self {
        Self { index, aabb }
    }
}

impl RTreeObject for SpatialEntry2D {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        to_rstar(&self.aabb)
    }
}

fn to_rstar(aabb: &AABB2D) -> AABB<[f64; 2]> {
    AABB::from_corners([aabb.min_x, aabb.min_y], [aabb.max_x, aabb.max_y])
}

/// R*-tree over placement bounding boxes.
#[derive(Debug)]
pub struct SpatialIndex2D {
    tree: RTree<SpatialEntry2D>,
}

impl SpatialIndex2D {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Bulk-loads an index; entry `i` gets index `i`.
    pub fn from_boxes<'a, I>(boxes: I) -> Self
    where
        I: IntoIterator<Item = &'a AABB2D>,
    {
        let entries = boxes
            .into_iter()
            .enumerate()
            .map(|(i, b)| SpatialEntry2D::new(i, *b))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Entries whose boxes intersect `query`.
    pub fn query(&self, query: &AABB2D) -> impl Iterator<Item = &SpatialEntry2D> {
        self.tree.locate_in_envelope_intersecting(&to_rstar(query))
    }
}

impl Default for SpatialIndex2D {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadPhase for SpatialIndex2D {
    fn candidates(&self, query: &AABB2D) -> Vec<usize> {
        if query.is_empty() {
            return Vec::new();
        }
        let mut out: Vec<usize> = self.query(query).map(|e| e.index).collect();
        out.sort_unstable();
        out
    }
}

impl BroadPhase for [AABB2D] {
    fn candidates(&self, query: &AABB2D) -> Vec<usize> {
        self.iter()
            .enumerate()
            .filter(|(_, b)| b.intersects(query))
            .map(|(i, _)| i)
            .collect()
    }
}
