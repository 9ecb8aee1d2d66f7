//! Overlap test between placed trees.
//!
//! Two placements overlap when their interiors intersect. Shared edges and
//! shared vertices are allowed.
//!
//! The exact test runs in two stages. Robust orientation predicates settle the
//! common cases: a proper edge crossing or a vertex strictly inside the other
//! outline means overlap, and no boundary contact at all means the outlines
//! are apart. When some vertex sits exactly on the other boundary the contact
//! is degenerate and the decision is handed to a DE-9IM relate computation.

use crate::placement::Placement;
use geo::{Coord, LineString, Polygon, Relate};
use tree_packing_core::robust::{locate_point, segments_cross_properly, PointLocation};

/// Returns true if the interiors of `a` and `b` intersect.
///
/// Disjoint bounding boxes short-circuit to `false`.
#[inline]
pub fn overlaps(a: &Placement, b: &Placement) -> bool {
    if !a.bounds().intersects(b.bounds()) {
        return false;
    }
    polygons_overlap(a.polygon(), b.polygon())
}

/// Exact interior-intersection test for two simple polygons.
pub fn polygons_overlap(a: &[(f64, f64)], b: &[(f64, f64)]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }

    let na = a.len();
    let nb = b.len();
    for i in 0..na {
        let a1 = a[i];
        let a2 = a[(i + 1) % na];
        for j in 0..nb {
            if segments_cross_properly(a1, a2, b[j], b[(j + 1) % nb]) {
                return true;
            }
        }
    }

    let mut contact = false;
    for (points, ring) in [(a, b), (b, a)] {
        for &p in points {
            match locate_point(p, ring) {
                PointLocation::Inside => return true,
                PointLocation::Boundary => contact = true,
                PointLocation::Outside => {}
            }
        }
    }

    if !contact {
        return false;
    }
    relate_overlap(a, b)
}

/// DE-9IM fallback for boundary contact: interiors intersect iff the
/// interior/interior cell of the matrix is non-empty.
///
/// Input that the relate computation cannot handle counts as overlap.
fn relate_overlap(a: &[(f64, f64)], b: &[(f64, f64)]) -> bool {
    if a.iter().chain(b.iter()).any(|p| !(p.0.is_finite() && p.1.is_finite())) {
        log::debug!("non-finite outline in relate fallback; treating as overlap");
        return true;
    }
    let matrix = ring_to_polygon(a).relate(&ring_to_polygon(b));
    matrix.is_intersects() && !matrix.is_touches()
}

/// Closes an implicit ring into a hole-free `geo` polygon.
fn ring_to_polygon(ring: &[(f64, f64)]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring.iter().map(|&(x, y)| Coord { x, y }).collect();
    Polygon::new(LineString::from(coords), vec![])
}
