//! Annealing energy: envelope side length plus a small gravity term.

use tree_packing_core::AABB2D;

/// Energy of a configuration together with the score it implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Energy {
    /// Side length plus the weighted gravity term. Drives acceptance.
    pub total: f64,
    /// Side length of the enclosing square. This is the reported score.
    pub side_length: f64,
}

/// Gravity-augmented objective for an instance of `n` placements.
///
/// The gravity term is the mean squared distance of centers from the
/// origin scaled by `gravity_weight`; it only breaks ties between layouts with
/// equal side length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    gravity_weight: f64,
    inv_n: f64,
}

impl Objective {
    /// Creates the objective for `n` placements.
    pub fn new(gravity_weight: f64, n: usize) -> Self {
        Self {
            gravity_weight,
            inv_n: 1.0 / n.max(1) as f64,
        }
    }

    /// Evaluates the energy of an envelope and a distance sum.
    #[inline]
    pub fn energy(&self, envelope: &AABB2D, distance_sum: f64) -> Energy {
        let side_length = envelope.side_length();
        Energy {
            total: side_length + self.gravity_weight * distance_sum * self.inv_n,
            side_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_energy_components() {
        let objective = Objective::new(1e-4, 4);
        let env = AABB2D::new(0.0, 0.0, 3.0, 2.0);
        let energy = objective.energy(&env, 8.0);
        assert_relative_eq!(energy.side_length, 3.0);
        assert_relative_eq!(energy.total, 3.0 + 1e-4 * 2.0);
    }

    #[test]
    fn test_zero_weight_energy_is_score() {
        let objective = Objective::new(0.0, 10);
        let env = AABB2D::new(-1.0, -1.0, 1.0, 2.5);
        let energy = objective.energy(&env, 123.0);
        assert_eq!(energy.total, energy.side_length);
    }

    #[test]
    fn test_empty_instance_does_not_divide_by_zero() {
        let objective = Objective::new(1.0, 0);
        let energy = objective.energy(&AABB2D::empty(), 0.0);
        assert_eq!(energy.total, 0.0);
    }
}
