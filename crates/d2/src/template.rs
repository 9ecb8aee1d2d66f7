//! The fixed tree outline and its rigid instantiation.

use tree_packing_core::robust::{is_simple_polygon, signed_area};

/// Number of vertices in the tree outline.
pub const TREE_VERTEX_COUNT: usize = 15;

/// An immutable polygon in local coordinates, placed by rotation about the
/// origin followed by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeTemplate {
    vertices: [(f64, f64); TREE_VERTEX_COUNT],
}

const TRUNK_W: f64 = 0.15;
const TRUNK_H: f64 = 0.2;
const BASE_W: f64 = 0.7;
const MID_W: f64 = 0.4;
const TOP_W: f64 = 0.25;
const TIP_Y: f64 = 0.8;
const TIER_1_Y: f64 = 0.5;
const TIER_2_Y: f64 = 0.25;
const BASE_Y: f64 = 0.0;
const TRUNK_BOTTOM_Y: f64 = -TRUNK_H;

/// The tree: a three-tier crown on a rectangular trunk, tip at `(0, 0.8)`.
pub const TREE: ShapeTemplate = ShapeTemplate {
    vertices: [
        (0.0, TIP_Y),
        (TOP_W / 2.0, TIER_1_Y),
        (TOP_W / 4.0, TIER_1_Y),
        (MID_W / 2.0, TIER_2_Y),
        (MID_W / 4.0, TIER_2_Y),
        (BASE_W / 2.0, BASE_Y),
        (TRUNK_W / 2.0, BASE_Y),
        (TRUNK_W / 2.0, TRUNK_BOTTOM_Y),
        (-TRUNK_W / 2.0, TRUNK_BOTTOM_Y),
        (-TRUNK_W / 2.0, BASE_Y),
        (-BASE_W / 2.0, BASE_Y),
        (-MID_W / 4.0, TIER_2_Y),
        (-MID_W / 2.0, TIER_2_Y),
        (-TOP_W / 4.0, TIER_1_Y),
        (-TOP_W / 2.0, TIER_1_Y),
    ],
};

impl ShapeTemplate {
    /// Vertices in local coordinates.
    pub fn vertices(&self) -> &[(f64, f64); TREE_VERTEX_COUNT] {
        &self.vertices
    }

    /// Rotates by `angle_deg` about the origin, then translates to `center`.
    pub fn instantiate(
        &self,
        center: (f64, f64),
        angle_deg: f64,
    ) -> [(f64, f64); TREE_VERTEX_COUNT] {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let mut out = [(0.0, 0.0); TREE_VERTEX_COUNT];
        for (dst, &(x, y)) in out.iter_mut().zip(self.vertices.iter()) {
            *dst = (x * cos - y * sin + center.0, x * sin + y * cos + center.1);
        }
        out
    }

    /// Enclosed area.
    pub fn area(&self) -> f64 {
        signed_area(&self.vertices).abs()
    }

    /// Returns true if the outline does not touch or cross itself.
    pub fn is_simple(&self) -> bool {
        is_simple_polygon(&self.vertices)
    }
}
