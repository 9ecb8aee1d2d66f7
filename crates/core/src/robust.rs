//! Robust geometric predicates for polygon contact tests.
//!
//! Orientation signs come from Shewchuk's adaptive precision arithmetic (via the
//! `robust` crate) behind a cheap floating-point filter. Everything built on top
//! (segment crossing, point location) inherits exact signs, so "touching" is
//! decided without a tolerance.
//!
//! ## References
//!
//! - Shewchuk, J.R. (1997). "Adaptive Precision Floating-Point Arithmetic and
//!   Fast Robust Predicates for Computational Geometry"

use robust::{orient2d as robust_orient2d, Coord};

/// Result of an orientation test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Left turn.
    CounterClockwise,
    /// Right turn.
    Clockwise,
    /// The three points lie on one line.
    Collinear,
}

impl Orientation {
    /// Classifies the sign of an orientation determinant.
    #[inline]
    fn of_determinant(det: f64) -> Self {
        match det.partial_cmp(&0.0) {
            Some(std::cmp::Ordering::Greater) => Orientation::CounterClockwise,
            Some(std::cmp::Ordering::Less) => Orientation::Clockwise,
            _ => Orientation::Collinear,
        }
    }
}

/// Exact orientation of `pc` relative to the directed line `pa -> pb`.
#[inline]
pub fn orient2d(pa: (f64, f64), pb: (f64, f64), pc: (f64, f64)) -> Orientation {
    Orientation::of_determinant(robust_orient2d(
        Coord { x: pa.0, y: pa.1 },
        Coord { x: pb.0, y: pb.1 },
        Coord { x: pc.0, y: pc.1 },
    ))
}

/// Relative error bound under which the plain determinant sign is trusted.
const FILTER_EPSILON: f64 = 1e-12;

/// Orientation with a floating-point filter in front of the exact test.
///
/// Almost every call in the packing loop is decided by the filter; only
/// near-collinear triples pay for adaptive arithmetic.
#[inline]
pub fn orient2d_filtered(pa: (f64, f64), pb: (f64, f64), pc: (f64, f64)) -> Orientation {
    let (ax, ay) = (pa.0 - pc.0, pa.1 - pc.1);
    let (bx, by) = (pb.0 - pc.0, pb.1 - pc.1);
    let (left, right) = (ax * by, ay * bx);
    let det = left - right;
    if det.abs() > FILTER_EPSILON * (left.abs() + right.abs()) {
        Orientation::of_determinant(det)
    } else {
        orient2d(pa, pb, pc)
    }
}

/// Returns true if `p` lies on the closed segment `a-b`.
#[inline]
pub fn point_on_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> bool {
    if p.0 < a.0.min(b.0) || p.0 > a.0.max(b.0) || p.1 < a.1.min(b.1) || p.1 > a.1.max(b.1) {
        return false;
    }
    orient2d_filtered(a, b, p) == Orientation::Collinear
}

/// Returns true if segments `a1-a2` and `b1-b2` cross at a single point
/// interior to both.
///
/// Contacts at an endpoint and collinear overlaps are not proper crossings.
#[inline]
pub fn segments_cross_properly(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> bool {
    let strictly_opposite = |p: Orientation, q: Orientation| {
        p != Orientation::Collinear && q != Orientation::Collinear && p != q
    };
    strictly_opposite(orient2d_filtered(b1, b2, a1), orient2d_filtered(b1, b2, a2))
        && strictly_opposite(orient2d_filtered(a1, a2, b1), orient2d_filtered(a1, a2, b2))
}

/// Location of a point relative to a closed polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLocation {
    /// Strictly inside the polygon.
    Inside,
    /// On an edge or vertex.
    Boundary,
    /// Strictly outside.
    Outside,
}

/// Locates `p` against a simple polygon given as an implicitly closed ring.
///
/// Uses a winding number whose crossing decisions come from exact orientation
/// signs, after an explicit on-boundary check.
pub fn locate_point(p: (f64, f64), polygon: &[(f64, f64)]) -> PointLocation {
    let n = polygon.len();
    if n < 3 {
        return PointLocation::Outside;
    }

    let mut winding = 0i32;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];

        if point_on_segment(p, a, b) {
            return PointLocation::Boundary;
        }

        if a.1 <= p.1 {
            if b.1 > p.1 && orient2d_filtered(a, b, p) == Orientation::CounterClockwise {
                winding += 1;
            }
        } else if b.1 <= p.1 && orient2d_filtered(a, b, p) == Orientation::Clockwise {
            winding -= 1;
        }
    }

    if winding != 0 {
        PointLocation::Inside
    } else {
        PointLocation::Outside
    }
}

/// Signed area of a ring (positive for counter-clockwise winding).
pub fn signed_area(polygon: &[(f64, f64)]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += polygon[i].0 * polygon[j].1 - polygon[j].0 * polygon[i].1;
    }
    sum / 2.0
}

/// Returns true if no two non-adjacent edges of the ring touch or cross.
pub fn is_simple_polygon(polygon: &[(f64, f64)]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    for i in 0..n {
        let a1 = polygon[i];
        let a2 = polygon[(i + 1) % n];
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            let b1 = polygon[j];
            let b2 = polygon[(j + 1) % n];
            if segments_cross_properly(a1, a2, b1, b2)
                || point_on_segment(a1, b1, b2)
                || point_on_segment(a2, b1, b2)
                || point_on_segment(b1, a1, a2)
                || point_on_segment(b2, a1, a2)
            {
                return false;
            }
        }
    }
    true
}
