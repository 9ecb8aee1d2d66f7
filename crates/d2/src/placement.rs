//! A positioned, rotated tree with its cached outline and bounding box.

use crate::template::{TREE, TREE_VERTEX_COUNT};
use tree_packing_core::{Error, Result, AABB2D};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One tree placed at `center` with rotation `angle_deg`.
///
/// The world-space polygon and its bounding box are derived from the pose on
/// construction and never mutated on their own; moving a placement builds a
/// new one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "Pose", into = "Pose"))]
pub struct Placement {
    center_x: f64,
    center_y: f64,
    angle_deg: f64,
    polygon: [(f64, f64); TREE_VERTEX_COUNT],
    bounds: AABB2D,
}

/// Serialized form of a placement: the pose only.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Center x coordinate.
    pub x: f64,
    /// Center y coordinate.
    pub y: f64,
    /// Rotation in degrees.
    pub deg: f64,
}

impl From<Pose> for Placement {
    fn from(pose: Pose) -> Self {
        Placement::new(pose.x, pose.y, pose.deg)
    }
}

impl From<Placement> for Pose {
    fn from(placement: Placement) -> Self {
        placement.pose()
    }
}

impl Placement {
    /// Instantiates the tree at `(center_x, center_y)` rotated by `angle_deg`.
    pub fn new(center_x: f64, center_y: f64, angle_deg: f64) -> Self {
        let polygon = TREE.instantiate((center_x, center_y), angle_deg);
        let bounds = AABB2D::from_points(&polygon);
        Self {
            center_x,
            center_y,
            angle_deg,
            polygon,
            bounds,
        }
    }

    /// Like [`Placement::new`] but rejects non-finite input.
    pub fn try_new(center_x: f64, center_y: f64, angle_deg: f64) -> Result<Self> {
        if !(center_x.is_finite() && center_y.is_finite() && angle_deg.is_finite()) {
            return Err(Error::InvalidPlacement(format!(
                "non-finite pose ({}, {}, {})",
                center_x, center_y, angle_deg
            )));
        }
        Ok(Self::new(center_x, center_y, angle_deg))
    }

    /// Center of rotation.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.center_x, self.center_y)
    }

    /// Rotation in degrees.
    #[inline]
    pub fn angle_deg(&self) -> f64 {
        self.angle_deg
    }

    /// Pose triple.
    pub fn pose(&self) -> Pose {
        Pose {
            x: self.center_x,
            y: self.center_y,
            deg: self.angle_deg,
        }
    }

    /// World-space outline.
    #[inline]
    pub fn polygon(&self) -> &[(f64, f64); TREE_VERTEX_COUNT] {
        &self.polygon
    }

    /// Cached bounding box of the outline.
    #[inline]
    pub fn bounds(&self) -> &AABB2D {
        &self.bounds
    }

    /// A new placement translated by `(dx, dy)` and rotated by `d_angle` degrees.
    #[inline]
    pub fn moved(&self, dx: f64, dy: f64, d_angle: f64) -> Self {
        Self::new(self.center_x + dx, self.center_y + dy, self.angle_deg + d_angle)
    }

    /// Squared distance of the center from the origin.
    #[inline]
    pub fn distance_sq(&self) -> f64 {
        self.center_x * self.center_x + self.center_y * self.center_y
    }

    /// Returns true if every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.center_x.is_finite() && self.center_y.is_finite() && self.angle_deg.is_finite()
    }
}

/// Bounding box of a set of placements.
pub fn envelope_of(placements: &[Placement]) -> AABB2D {
    placements
        .iter()
        .fold(AABB2D::empty(), |acc, p| acc.union(p.bounds()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_cached() {
        let p = Placement::new(1.0, -1.0, 0.0);
        assert_relative_eq!(p.bounds().min_x, 0.65);
        assert_relative_eq!(p.bounds().max_x, 1.35);
        assert_relative_eq!(p.bounds().min_y, -1.2);
        assert_relative_eq!(p.bounds().max_y, -0.2);
    }

    #[test]
    fn test_moved_recomputes_geometry() {
        let p = Placement::new(0.0, 0.0, 0.0);
        let q = p.moved(0.5, 0.25, 90.0);
        assert_eq!(q.center(), (0.5, 0.25));
        assert_relative_eq!(q.angle_deg(), 90.0);
        assert_eq!(q, Placement::new(0.5, 0.25, 90.0));
        // The original is untouched.
        assert_eq!(p.center(), (0.0, 0.0));
    }

    #[test]
    fn test_try_new_rejects_nan() {
        assert!(Placement::try_new(f64::NAN, 0.0, 0.0).is_err());
        assert!(Placement::try_new(0.0, 0.0, f64::INFINITY).is_err());
        assert!(Placement::try_new(0.0, 0.0, 45.0).is_ok());
    }

    #[test]
    fn test_envelope_of() {
        let placements = vec![Placement::new(0.0, 0.0, 0.0), Placement::new(2.0, 0.0, 0.0)];
        let env = envelope_of(&placements);
        assert_relative_eq!(env.width(), 2.7);
        assert_relative_eq!(env.height(), 1.0);
        assert_relative_eq!(env.side_length(), 2.7);
        assert!(envelope_of(&[]).is_empty());
    }
}
