//! A packing instance: exactly `id` placements of the tree.

use crate::placement::{envelope_of, Placement};
use tree_packing_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Instance `id` holds exactly `id` placements.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "UncheckedInstance"))]
pub struct Instance {
    id: usize,
    placements: Vec<Placement>,
}

/// Deserialized form, checked by [`Instance::new`] before use.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct UncheckedInstance {
    id: usize,
    placements: Vec<Placement>,
}

#[cfg(feature = "serde")]
impl TryFrom<UncheckedInstance> for Instance {
    type Error = Error;

    fn try_from(raw: UncheckedInstance) -> Result<Self> {
        Instance::new(raw.id, raw.placements)
    }
}

impl Instance {
    /// Creates an instance, checking the placement count and finiteness.
    pub fn new(id: usize, placements: Vec<Placement>) -> Result<Self> {
        if placements.len() != id {
            return Err(Error::InstanceSize {
                id,
                found: placements.len(),
            });
        }
        if let Some(i) = placements.iter().position(|p| !p.is_finite()) {
            return Err(Error::InvalidPlacement(format!(
                "instance {} placement {} has a non-finite pose",
                id, i
            )));
        }
        Ok(Self { id, placements })
    }

    /// Builds an instance from `(x, y, deg)` triples.
    pub fn from_poses(id: usize, poses: &[(f64, f64, f64)]) -> Result<Self> {
        let placements = poses
            .iter()
            .map(|&(x, y, deg)| Placement::try_new(x, y, deg))
            .collect::<Result<Vec<_>>>()?;
        Self::new(id, placements)
    }

    /// Instance id, equal to the placement count.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Placements in index order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Number of placements.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Returns true for the empty instance `0`.
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Side length of the enclosing square.
    pub fn side_length(&self) -> f64 {
        envelope_of(&self.placements).side_length()
    }

    /// Contribution to the total score: `side^2 / n`.
    pub fn score_contribution(&self) -> f64 {
        if self.id == 0 {
            return 0.0;
        }
        let side = self.side_length();
        side * side / self.id as f64
    }

    /// Replaces the placements, keeping the count invariant.
    pub fn replace_placements(&mut self, placements: Vec<Placement>) -> Result<()> {
        if placements.len() != self.id {
            return Err(Error::InstanceSize {
                id: self.id,
                found: placements.len(),
            });
        }
        self.placements = placements;
        Ok(())
    }

    /// Consumes the instance, returning its placements.
    pub fn into_placements(self) -> Vec<Placement> {
        self.placements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_count_must_match_id() {
        let placements = vec![Placement::new(0.0, 0.0, 0.0)];
        assert!(Instance::new(1, placements.clone()).is_ok());
        match Instance::new(2, placements) {
            Err(Error::InstanceSize { id, found }) => {
                assert_eq!(id, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_from_poses_rejects_nan() {
        assert!(Instance::from_poses(1, &[(f64::NAN, 0.0, 0.0)]).is_err());
    }

    #[test]
    fn test_score_contribution() {
        let instance = Instance::from_poses(2, &[(0.0, 0.0, 0.0), (0.7, 0.0, 0.0)]).unwrap();
        assert_relative_eq!(instance.side_length(), 1.4);
        assert_relative_eq!(instance.score_contribution(), 1.4 * 1.4 / 2.0);
    }

    #[test]
    fn test_replace_keeps_count() {
        let mut instance = Instance::from_poses(1, &[(0.0, 0.0, 0.0)]).unwrap();
        assert!(instance.replace_placements(vec![]).is_err());
        assert!(instance
            .replace_placements(vec![Placement::new(1.0, 1.0, 0.0)])
            .is_ok());
        assert_eq!(instance.placements()[0].center(), (1.0, 1.0));
    }
}
