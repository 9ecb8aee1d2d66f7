//! Per-instance simulated annealing.
//!
//! Each iteration perturbs one placement, rejects the move outright if it
//! creates an overlap, and otherwise runs the Metropolis test on the
//! gravity-augmented energy. The envelope and the distance sum are updated
//! incrementally so an iteration costs one feasibility scan plus O(1) work in
//! the common case.
//!
//! The best snapshot tracks the real score (side length) only; a move that
//! lowers the energy without shrinking the square never replaces it.

use crate::collision::polygons_overlap;
use crate::envelope::{EnvelopeTracker, EnvelopeUpdate};
use crate::objective::{Energy, Objective};
use crate::placement::{envelope_of, Placement};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tree_packing_core::{
    accept_move, AnnealConfig, AnnealStatus, Result, RunControl, RunStats, StopReason,
};

/// A feasible candidate move, evaluated but not yet applied.
#[derive(Debug, Clone)]
pub struct Proposal {
    index: usize,
    candidate: Placement,
    update: EnvelopeUpdate,
    distance_sum: f64,
    energy: Energy,
}

impl Proposal {
    /// Index of the moved placement.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The moved placement.
    pub fn candidate(&self) -> &Placement {
        &self.candidate
    }

    /// Energy after the move.
    pub fn energy(&self) -> Energy {
        self.energy
    }
}

/// Mutable state of one annealing run. Owned by a single worker.
#[derive(Debug, Clone)]
pub struct AnnealState {
    placements: Vec<Placement>,
    tracker: EnvelopeTracker,
    objective: Objective,
    distance_sum: f64,
    energy: Energy,
    best_placements: Vec<Placement>,
    best_score: f64,
    stats: RunStats,
}

impl AnnealState {
    /// Starts from a feasible configuration.
    pub fn new(placements: Vec<Placement>, objective: Objective) -> Self {
        let tracker = EnvelopeTracker::new(placements.iter().map(|p| *p.bounds()).collect());
        let distance_sum: f64 = placements.iter().map(Placement::distance_sq).sum();
        let energy = objective.energy(tracker.envelope(), distance_sum);
        Self {
            best_placements: placements.clone(),
            best_score: energy.side_length,
            placements,
            tracker,
            objective,
            distance_sum,
            energy,
            stats: RunStats::default(),
        }
    }

    /// Number of placements.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Returns true if the state holds no placements.
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Current placements.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Current energy.
    pub fn energy(&self) -> Energy {
        self.energy
    }

    /// Running sum of squared center distances.
    pub fn distance_sum(&self) -> f64 {
        self.distance_sum
    }

    /// Envelope tracker for the current placements.
    pub fn tracker(&self) -> &EnvelopeTracker {
        &self.tracker
    }

    /// Best side length seen so far.
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    /// Placements that achieved [`AnnealState::best_score`].
    pub fn best_placements(&self) -> &[Placement] {
        &self.best_placements
    }

    /// Counters collected so far.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Returns true if `candidate` at `index` overlaps no other placement.
    pub fn is_feasible(&mut self, index: usize, candidate: &Placement) -> bool {
        let bounds = candidate.bounds();
        for (j, other) in self.placements.iter().enumerate() {
            if j == index || !bounds.intersects(other.bounds()) {
                continue;
            }
            self.stats.collision_tests += 1;
            if polygons_overlap(candidate.polygon(), other.polygon()) {
                return false;
            }
        }
        true
    }

    /// Evaluates moving placement `index` to `candidate`.
    ///
    /// Returns `None` if the move creates an overlap.
    pub fn propose(&mut self, index: usize, candidate: Placement) -> Option<Proposal> {
        if !self.is_feasible(index, &candidate) {
            self.stats.collision_rejections += 1;
            return None;
        }

        let update = self.tracker.propose(index, candidate.bounds());
        if update.rescanned {
            self.stats.envelope_rescans += 1;
        }
        let distance_sum =
            self.distance_sum - self.placements[index].distance_sq() + candidate.distance_sq();
        let energy = self.objective.energy(&update.envelope, distance_sum);

        Some(Proposal {
            index,
            candidate,
            update,
            distance_sum,
            energy,
        })
    }

    /// Applies a proposal. Returns true if it set a new best score.
    pub fn commit(&mut self, proposal: Proposal) -> bool {
        let Proposal {
            index,
            candidate,
            update,
            distance_sum,
            energy,
        } = proposal;

        self.tracker.commit(index, *candidate.bounds(), update);
        self.placements[index] = candidate;
        self.distance_sum = distance_sum;
        self.energy = energy;
        self.stats.accepted += 1;

        if energy.side_length < self.best_score {
            self.best_score = energy.side_length;
            self.best_placements.clone_from(&self.placements);
            self.stats.improvements += 1;
            true
        } else {
            false
        }
    }

    /// Consumes the state, returning the best placements, their score and
    /// the run counters.
    pub fn into_best(self) -> (Vec<Placement>, f64, RunStats) {
        (self.best_placements, self.best_score, self.stats)
    }
}

/// Snapshot passed to progress callbacks.
#[derive(Debug, Clone, Copy)]
pub struct AnnealProgress {
    /// Instance id.
    pub instance_id: usize,
    /// Iterations completed.
    pub iteration: u64,
    /// Iteration budget.
    pub iterations: u64,
    /// Current temperature.
    pub temperature: f64,
    /// Current side length.
    pub current_score: f64,
    /// Best side length so far.
    pub best_score: f64,
}

/// Result of optimizing one instance.
#[derive(Debug, Clone)]
pub struct AnnealOutcome {
    /// Instance id.
    pub instance_id: usize,
    /// Best placements found (the input if nothing improved).
    pub placements: Vec<Placement>,
    /// Side length of `placements`.
    pub score: f64,
    /// Side length of the input.
    pub initial_score: f64,
    /// How the run ended.
    pub status: AnnealStatus,
    /// Run counters.
    pub stats: RunStats,
}

impl AnnealOutcome {
    /// Returns true if the score strictly dropped.
    pub fn improved(&self) -> bool {
        self.score < self.initial_score
    }
}

/// Optimizes one instance. The seam between the orchestrator and the engine.
pub trait InstanceOptimizer: Send + Sync {
    /// Runs on `placements` of instance `instance_id` until done or `control`
    /// says stop.
    fn optimize_instance(
        &self,
        instance_id: usize,
        placements: &[Placement],
        control: &RunControl,
    ) -> AnnealOutcome;
}

/// Simulated annealing engine configured once and reused across instances.
#[derive(Debug, Clone)]
pub struct Annealer {
    config: AnnealConfig,
}

impl Annealer {
    /// Creates an annealer after validating `config`.
    pub fn new(config: AnnealConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    pub fn config(&self) -> &AnnealConfig {
        &self.config
    }

    /// RNG for an instance: seeded deterministically from the configured seed
    /// and the id, or from OS entropy when no seed is set.
    pub fn rng_for(&self, instance_id: usize) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(
                seed ^ (instance_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
            ),
            None => StdRng::from_entropy(),
        }
    }

    /// Optimizes one instance with its own RNG.
    pub fn optimize(
        &self,
        instance_id: usize,
        placements: &[Placement],
        control: &RunControl,
    ) -> AnnealOutcome {
        let mut rng = self.rng_for(instance_id);
        self.optimize_with_rng(instance_id, placements, control, &mut rng)
    }

    /// Optimizes one instance with a caller-supplied RNG.
    pub fn optimize_with_rng<R: Rng>(
        &self,
        instance_id: usize,
        placements: &[Placement],
        control: &RunControl,
        rng: &mut R,
    ) -> AnnealOutcome {
        self.optimize_with_progress(instance_id, placements, control, rng, |_| {})
    }

    /// Optimizes one instance, calling `progress` at every control poll.
    pub fn optimize_with_progress<R, F>(
        &self,
        instance_id: usize,
        placements: &[Placement],
        control: &RunControl,
        rng: &mut R,
        mut progress: F,
    ) -> AnnealOutcome
    where
        R: Rng,
        F: FnMut(&AnnealProgress),
    {
        let n = placements.len();
        let initial_score = envelope_of(placements).side_length();

        if n < 2 {
            return AnnealOutcome {
                instance_id,
                placements: placements.to_vec(),
                score: initial_score,
                initial_score,
                status: AnnealStatus::Converged,
                stats: RunStats::default(),
            };
        }

        let start = Instant::now();
        let schedule = self.config.schedule_for(n);
        let mut cooling = schedule.cooling();
        let mut state = AnnealState::new(
            placements.to_vec(),
            Objective::new(schedule.gravity_weight, n),
        );
        let check_interval = self.config.cancel_check_interval.max(1);
        let scale = self.config.acceptance_scale;
        let mut status = AnnealStatus::Converged;

        log::debug!(
            "instance {}: annealing {} placements, {} iterations, T {:.4} -> {:.4}, score {:.6}",
            instance_id,
            n,
            schedule.iterations,
            schedule.t_start,
            schedule.t_end,
            initial_score
        );

        for iteration in 0..schedule.iterations {
            if iteration % check_interval == 0 {
                if let Some(reason) = control.should_stop() {
                    status = match reason {
                        StopReason::Cancelled => AnnealStatus::Interrupted,
                        StopReason::DeadlineExceeded => AnnealStatus::TimedOut,
                    };
                    break;
                }
                progress(&AnnealProgress {
                    instance_id,
                    iteration,
                    iterations: schedule.iterations,
                    temperature: cooling.temperature(),
                    current_score: state.energy().side_length,
                    best_score: state.best_score(),
                });
            }

            let (move_scale, rotate_scale) = schedule.step_scales(iteration, &cooling);
            let index = rng.gen_range(0..n);
            let step = schedule.translation_step * move_scale;
            let dx = (rng.gen::<f64>() - 0.5) * step;
            let dy = (rng.gen::<f64>() - 0.5) * step;
            let d_angle = (rng.gen::<f64>() - 0.5) * rotate_scale;
            let candidate = state.placements()[index].moved(dx, dy, d_angle);

            if let Some(proposal) = state.propose(index, candidate) {
                let delta = proposal.energy().total - state.energy().total;
                if accept_move(delta, cooling.temperature(), scale, rng) {
                    state.commit(proposal);
                }
            }

            cooling.cool();
            state.stats.iterations += 1;
        }

        let (best, score, mut stats) = state.into_best();
        stats.elapsed = start.elapsed();

        log::debug!(
            "instance {}: {} after {} iterations in {:.2?}, score {:.6} -> {:.6}, {} accepted, {} collisions",
            instance_id,
            status,
            stats.iterations,
            stats.elapsed,
            initial_score,
            score,
            stats.accepted,
            stats.collision_rejections
        );

        AnnealOutcome {
            instance_id,
            placements: best,
            score,
            initial_score,
            status,
            stats,
        }
    }
}

impl InstanceOptimizer for Annealer {
    fn optimize_instance(
        &self,
        instance_id: usize,
        placements: &[Placement],
        control: &RunControl,
    ) -> AnnealOutcome {
        self.optimize(instance_id, placements, control)
    }
}
