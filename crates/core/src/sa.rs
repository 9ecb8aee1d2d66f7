//! Simulated annealing primitives: configuration, per-instance schedule,
//! geometric cooling and the Metropolis acceptance rule.
//!
//! The configuration is an immutable value handed to the optimizer at
//! construction, so differently tuned runs can coexist in one process.
//! [`AnnealConfig::schedule_for`] resolves it into an [`InstanceSchedule`]
//! for a given instance size:
//!
//! | Size | Iterations | Start temperature | Gravity | Step decay |
//! |------|------------|-------------------|---------|------------|
//! | `n <= small_instance_threshold` | ×`small_iteration_factor` | ×`small_temperature_factor` | `small_gravity_weight` | linear in progress |
//! | larger | ×1 | ×1 | `large_gravity_weight` | proportional to temperature |

use crate::{Error, Result};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Temperature below which no uphill move is accepted.
pub const MIN_TEMPERATURE: f64 = 1e-10;

/// A step scale that decays from `start` and never drops below `floor`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScaleRange {
    /// Scale at the beginning of the run.
    pub start: f64,
    /// Lower bound on the scale.
    pub floor: f64,
}

impl ScaleRange {
    /// Creates a new range.
    pub const fn new(start: f64, floor: f64) -> Self {
        Self { start, floor }
    }

    /// Scale for the given remaining fraction (1 at the start, 0 at the end).
    #[inline]
    pub fn at(&self, remaining: f64) -> f64 {
        (self.start * remaining).max(self.floor)
    }
}

/// How move and rotation scales shrink over a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScaleDecay {
    /// Proportional to `1 - iteration / iterations`.
    Linear,
    /// Proportional to `T / T_start`.
    TemperatureProportional,
}

/// Annealing configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnnealConfig {
    /// Iteration budget for large instances.
    pub max_iterations: u64,
    /// Start temperature for large instances.
    pub t_start: f64,
    /// Final temperature reached after the iteration budget.
    pub t_end: f64,
    /// Scaling constant `K` in `exp(-delta * K / T)`.
    pub acceptance_scale: f64,
    /// Instances with at most this many placements use the small-instance policy.
    pub small_instance_threshold: usize,
    /// Iteration budget multiplier for small instances.
    pub small_iteration_factor: u64,
    /// Start temperature multiplier for small instances.
    pub small_temperature_factor: f64,
    /// Gravity weight for small instances.
    pub small_gravity_weight: f64,
    /// Gravity weight for large instances.
    pub large_gravity_weight: f64,
    /// Translation per unit of move scale (each axis draws from `±step/2`).
    pub translation_step: f64,
    /// Move scale for small instances (linear decay).
    pub small_move_scale: ScaleRange,
    /// Rotation scale in degrees for small instances (linear decay).
    pub small_rotate_scale: ScaleRange,
    /// Move scale for large instances (temperature-proportional decay).
    pub large_move_scale: ScaleRange,
    /// Rotation scale in degrees for large instances (temperature-proportional decay).
    pub large_rotate_scale: ScaleRange,
    /// RNG seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Iterations between cancellation/deadline polls.
    pub cancel_check_interval: u64,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            max_iterations: 800_000,
            t_start: 1.0,
            t_end: 0.003,
            acceptance_scale: 1000.0,
            small_instance_threshold: 50,
            small_iteration_factor: 3,
            small_temperature_factor: 2.0,
            small_gravity_weight: 1e-4,
            large_gravity_weight: 1e-6,
            translation_step: 0.1,
            small_move_scale: ScaleRange::new(3.0, 0.005),
            small_rotate_scale: ScaleRange::new(5.0, 0.001),
            large_move_scale: ScaleRange::new(1.0, 0.001),
            large_rotate_scale: ScaleRange::new(5.0, 0.002),
            seed: None,
            cancel_check_interval: 4096,
        }
    }
}

impl AnnealConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration budget for large instances.
    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the start and end temperatures.
    pub fn with_temperatures(mut self, t_start: f64, t_end: f64) -> Self {
        self.t_start = t_start;
        self.t_end = t_end;
        self
    }

    /// Sets the acceptance scaling constant.
    pub fn with_acceptance_scale(mut self, scale: f64) -> Self {
        self.acceptance_scale = scale;
        self
    }

    /// Sets the small-instance threshold.
    pub fn with_small_instance_threshold(mut self, threshold: usize) -> Self {
        self.small_instance_threshold = threshold;
        self
    }

    /// Sets both gravity weights.
    pub fn with_gravity_weights(mut self, small: f64, large: f64) -> Self {
        self.small_gravity_weight = small;
        self.large_gravity_weight = large;
        self
    }

    /// Sets a fixed RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the cancellation poll interval.
    pub fn with_cancel_check_interval(mut self, interval: u64) -> Self {
        self.cancel_check_interval = interval.max(1);
        self
    }

    /// Checks that every knob is in range.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be positive".into()));
        }
        if !(self.t_start.is_finite() && self.t_start > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "t_start must be positive, got {}",
                self.t_start
            )));
        }
        if !(self.t_end.is_finite() && self.t_end > 0.0 && self.t_end <= self.t_start) {
            return Err(Error::InvalidConfig(format!(
                "t_end must lie in (0, t_start], got {}",
                self.t_end
            )));
        }
        if !(self.acceptance_scale.is_finite() && self.acceptance_scale > 0.0) {
            return Err(Error::InvalidConfig(
                "acceptance_scale must be positive".into(),
            ));
        }
        if self.small_iteration_factor == 0
            || !(self.small_temperature_factor.is_finite() && self.small_temperature_factor > 0.0)
        {
            return Err(Error::InvalidConfig(
                "small-instance factors must be positive".into(),
            ));
        }
        check_non_negative("small_gravity_weight", self.small_gravity_weight)?;
        check_non_negative("large_gravity_weight", self.large_gravity_weight)?;
        check_non_negative("translation_step", self.translation_step)?;
        for (name, range) in [
            ("small_move_scale", &self.small_move_scale),
            ("small_rotate_scale", &self.small_rotate_scale),
            ("large_move_scale", &self.large_move_scale),
            ("large_rotate_scale", &self.large_rotate_scale),
        ] {
            check_non_negative(name, range.start)?;
            check_non_negative(name, range.floor)?;
        }
        if self.cancel_check_interval == 0 {
            return Err(Error::InvalidConfig(
                "cancel_check_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Resolves the size policy for an instance with `n` placements.
    pub fn schedule_for(&self, n: usize) -> InstanceSchedule {
        if n <= self.small_instance_threshold {
            InstanceSchedule {
                iterations: self.max_iterations.saturating_mul(self.small_iteration_factor),
                t_start: self.t_start * self.small_temperature_factor,
                t_end: self.t_end,
                gravity_weight: self.small_gravity_weight,
                translation_step: self.translation_step,
                decay: ScaleDecay::Linear,
                move_scale: self.small_move_scale,
                rotate_scale: self.small_rotate_scale,
            }
        } else {
            InstanceSchedule {
                iterations: self.max_iterations,
                t_start: self.t_start,
                t_end: self.t_end,
                gravity_weight: self.large_gravity_weight,
                translation_step: self.translation_step,
                decay: ScaleDecay::TemperatureProportional,
                move_scale: self.large_move_scale,
                rotate_scale: self.large_rotate_scale,
            }
        }
    }
}

/// Size-resolved annealing parameters for one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSchedule {
    /// Iteration budget.
    pub iterations: u64,
    /// Start temperature.
    pub t_start: f64,
    /// End temperature.
    pub t_end: f64,
    /// Weight of the compactness term.
    pub gravity_weight: f64,
    /// Translation per unit of move scale.
    pub translation_step: f64,
    /// Step decay policy.
    pub decay: ScaleDecay,
    /// Move scale range.
    pub move_scale: ScaleRange,
    /// Rotation scale range, in degrees.
    pub rotate_scale: ScaleRange,
}

impl InstanceSchedule {
    /// Geometric cooling over the iteration budget.
    pub fn cooling(&self) -> Cooling {
        Cooling::geometric(self.t_start, self.t_end, self.iterations)
    }

    /// Move and rotation scales at `iteration` given the current cooling state.
    #[inline]
    pub fn step_scales(&self, iteration: u64, cooling: &Cooling) -> (f64, f64) {
        let remaining = match self.decay {
            ScaleDecay::Linear => 1.0 - iteration as f64 / self.iterations.max(1) as f64,
            ScaleDecay::TemperatureProportional => cooling.ratio(),
        };
        (self.move_scale.at(remaining), self.rotate_scale.at(remaining))
    }
}

/// Geometric cooling: `T_k = T_start * rate^k`.
#[derive(Debug, Clone)]
pub struct Cooling {
    initial: f64,
    temperature: f64,
    rate: f64,
}

impl Cooling {
    /// Cooling that reaches `t_end` from `t_start` after `steps` calls to [`Cooling::cool`].
    pub fn geometric(t_start: f64, t_end: f64, steps: u64) -> Self {
        Self {
            initial: t_start,
            temperature: t_start,
            rate: cooling_rate(t_start, t_end, steps),
        }
    }

    /// Current temperature.
    #[inline]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Current temperature relative to the start temperature.
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.temperature / self.initial
    }

    /// Advances one step.
    #[inline]
    pub fn cool(&mut self) {
        self.temperature *= self.rate;
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )))
    }
}

/// `(t_end / t_start)^(1 / steps)`.
pub fn cooling_rate(t_start: f64, t_end: f64, steps: u64) -> f64 {
    (t_end / t_start).powf(1.0 / steps.max(1) as f64)
}

/// Probability of accepting an uphill move of size `delta`.
#[inline]
pub fn acceptance_probability(delta: f64, temperature: f64, scale: f64) -> f64 {
    if delta < 0.0 {
        1.0
    } else if temperature <= MIN_TEMPERATURE {
        0.0
    } else {
        (-delta * scale / temperature).exp()
    }
}

/// Metropolis criterion. Downhill moves are always accepted; uphill moves are
/// accepted with [`acceptance_probability`].
#[inline]
pub fn accept_move<R: Rng + ?Sized>(delta: f64, temperature: f64, scale: f64, rng: &mut R) -> bool {
    if delta < 0.0 {
        return true;
    }
    let probability = acceptance_probability(delta, temperature, scale);
    probability > 0.0 && rng.gen::<f64>() < probability
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AnnealConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_temperatures_rejected() {
        let config = AnnealConfig::default().with_temperatures(1.0, 2.0);
        assert!(config.validate().is_err());

        let config = AnnealConfig::default().with_temperatures(0.0, 0.0);
        assert!(config.validate().is_err());

        let config = AnnealConfig::default().with_max_iterations(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_step_knobs_rejected() {
        let mut config = AnnealConfig::default();
        config.translation_step = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AnnealConfig::default();
        config.large_move_scale = ScaleRange::new(f64::INFINITY, 0.001);
        assert!(config.validate().is_err());

        let mut config = AnnealConfig::default();
        config.small_rotate_scale = ScaleRange::new(5.0, -0.1);
        assert!(config.validate().is_err());

        let mut config = AnnealConfig::default();
        config.small_gravity_weight = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AnnealConfig::default();
        config.translation_step = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_small_instances_explore_longer_and_hotter() {
        let config = AnnealConfig::default().with_max_iterations(1000);
        let small = config.schedule_for(10);
        let large = config.schedule_for(120);

        assert_eq!(small.iterations, 3000);
        assert_eq!(large.iterations, 1000);
        assert_relative_eq!(small.t_start, 2.0);
        assert_relative_eq!(large.t_start, 1.0);
        assert!(small.gravity_weight > large.gravity_weight);
        assert_eq!(small.decay, ScaleDecay::Linear);
        assert_eq!(large.decay, ScaleDecay::TemperatureProportional);

        // Threshold is inclusive.
        assert_eq!(config.schedule_for(50).decay, ScaleDecay::Linear);
        assert_eq!(config.schedule_for(51).decay, ScaleDecay::TemperatureProportional);
    }

    #[test]
    fn test_cooling_reaches_end_temperature() {
        let steps = 10_000;
        let mut cooling = Cooling::geometric(2.0, 0.003, steps);
        for _ in 0..steps {
            cooling.cool();
        }
        assert_relative_eq!(cooling.temperature(), 0.003, max_relative = 1e-9);
        assert_relative_eq!(cooling.ratio(), 0.0015, max_relative = 1e-9);
    }

    #[test]
    fn test_step_scales_linear_decay() {
        let schedule = AnnealConfig::default()
            .with_max_iterations(100)
            .schedule_for(5);
        let cooling = schedule.cooling();

        let (m0, r0) = schedule.step_scales(0, &cooling);
        assert_relative_eq!(m0, 3.0);
        assert_relative_eq!(r0, 5.0);

        let (m_mid, _) = schedule.step_scales(150, &cooling);
        assert_relative_eq!(m_mid, 1.5);

        // Floors hold at the end of the run.
        let (m_end, r_end) = schedule.step_scales(300, &cooling);
        assert_relative_eq!(m_end, 0.005);
        assert_relative_eq!(r_end, 0.001);
    }

    #[test]
    fn test_step_scales_follow_temperature() {
        let schedule = AnnealConfig::default()
            .with_max_iterations(100)
            .schedule_for(100);
        let mut cooling = schedule.cooling();
        let (m0, _) = schedule.step_scales(0, &cooling);
        assert_relative_eq!(m0, 1.0);

        for _ in 0..50 {
            cooling.cool();
        }
        let (m_half, r_half) = schedule.step_scales(50, &cooling);
        assert_relative_eq!(m_half, cooling.ratio());
        assert_relative_eq!(r_half, 5.0 * cooling.ratio());
    }

    #[test]
    fn test_acceptance_probability() {
        assert_eq!(acceptance_probability(-1.0, 1.0, 1000.0), 1.0);
        assert_eq!(acceptance_probability(0.1, 0.0, 1000.0), 0.0);
        assert_relative_eq!(
            acceptance_probability(0.001, 1.0, 1000.0),
            (-1.0f64).exp()
        );
        // Hotter means more permissive.
        assert!(
            acceptance_probability(0.001, 2.0, 1000.0) > acceptance_probability(0.001, 1.0, 1000.0)
        );
    }

    #[test]
    fn test_accept_move() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(accept_move(-1e-9, 0.0, 1000.0, &mut rng));
        assert!(!accept_move(1.0, 1e-12, 1000.0, &mut rng));

        let accepted = (0..10_000)
            .filter(|_| accept_move(0.001, 1.0, 1000.0, &mut rng))
            .count();
        let rate = accepted as f64 / 10_000.0;
        assert!((rate - (-1.0f64).exp()).abs() < 0.03, "rate = {}", rate);
    }
}
