//! Run statistics and termination status.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How an annealing run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnnealStatus {
    /// The iteration budget ran out.
    Converged,
    /// The wall-clock deadline passed.
    TimedOut,
    /// Cancellation was requested.
    Interrupted,
}

impl AnnealStatus {
    /// Returns true if the run used its whole budget.
    pub fn is_complete(self) -> bool {
        matches!(self, AnnealStatus::Converged)
    }
}

impl std::fmt::Display for AnnealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnealStatus::Converged => write!(f, "converged"),
            AnnealStatus::TimedOut => write!(f, "timed out"),
            AnnealStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Counters collected during one annealing run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunStats {
    /// Iterations executed.
    pub iterations: u64,
    /// Moves that passed the feasibility check and the Metropolis test.
    pub accepted: u64,
    /// Moves rejected because they overlapped another placement.
    pub collision_rejections: u64,
    /// Exact polygon intersection tests performed.
    pub collision_tests: u64,
    /// Full envelope rescans triggered by boundary-defining moves.
    pub envelope_rescans: u64,
    /// Times the best snapshot was replaced.
    pub improvements: u64,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl RunStats {
    /// Fraction of iterations that were accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.accepted as f64 / self.iterations as f64
        }
    }

    /// Adds another run's counters to this one.
    pub fn absorb(&mut self, other: &RunStats) {
        self.iterations += other.iterations;
        self.accepted += other.accepted;
        self.collision_rejections += other.collision_rejections;
        self.collision_tests += other.collision_tests;
        self.envelope_rescans += other.envelope_rescans;
        self.improvements += other.improvements;
        self.elapsed += other.elapsed;
    }
}
