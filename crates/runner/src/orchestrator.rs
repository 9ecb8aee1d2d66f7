//! Parallel optimization of every instance with merge, checkpoint and
//! shutdown handling.
//!
//! One task per instance runs on a fixed-size rayon pool, largest instances
//! first. Results come back over a channel to the calling thread, which alone
//! mutates the [`Solution`] and writes checkpoints.
//!
//! Shutdown has two levels. `stop_dispatch` lets in-flight tasks finish and
//! skips queued ones. `abort` also makes in-flight annealers return early; their
//! results are discarded. Passing the deadline sets both.

use crate::config::RunConfig;
use crate::error::RunnerError;
use crate::solution::Solution;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tree_packing_core::{AnnealStatus, CancelToken, RunControl, RunStats};
use tree_packing_d2::{envelope_of, validate, Annealer, InstanceOptimizer, Placement};

/// Whole-instance feasibility check applied to every worker result.
pub type Validator = fn(&[Placement]) -> bool;

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Queuing one task per instance.
    Dispatching,
    /// Collecting results and merging improvements.
    Draining,
    /// Writing the final checkpoint.
    Saving,
    /// Finished.
    Done,
}

/// Two-level shutdown shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    stop_dispatch: CancelToken,
    abort: CancelToken,
    requests: Arc<AtomicUsize>,
}

impl Shutdown {
    /// Creates a shutdown handle with nothing requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// First call stops dispatch; any further call aborts in-flight work.
    pub fn request(&self) {
        let previous = self.requests.fetch_add(1, Ordering::SeqCst);
        self.stop_dispatch.cancel();
        if previous >= 1 {
            self.abort.cancel();
        }
    }

    /// Stops dispatch and aborts in-flight work at once.
    pub fn abort(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.stop_dispatch.cancel();
        self.abort.cancel();
    }

    /// Token checked before a queued task starts.
    pub fn stop_dispatch_token(&self) -> &CancelToken {
        &self.stop_dispatch
    }

    /// Token polled by running annealers.
    pub fn abort_token(&self) -> &CancelToken {
        &self.abort
    }
}

/// What happened to one instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Merged into the solution.
    Improved {
        /// Side length before.
        from: f64,
        /// Side length after.
        to: f64,
    },
    /// Valid but not better by more than the epsilon.
    NotImproved {
        /// Side length found by the worker.
        score: f64,
    },
    /// The result overlapped; the original was kept.
    ValidationFailed,
    /// Stopped early; the result was discarded.
    Discarded(AnnealStatus),
    /// Never started because dispatch was stopped.
    Skipped,
    /// The worker panicked.
    Panicked(String),
}

/// Per-instance entry of the run report.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Instance id.
    pub instance_id: usize,
    /// Outcome.
    pub verdict: Verdict,
    /// Annealing counters (zero if the task never ran).
    pub stats: RunStats,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One entry per dispatched instance, in completion order.
    pub reports: Vec<WorkerReport>,
    /// States visited, in order.
    pub states: Vec<OrchestratorState>,
    /// Checkpoints written, the final save included.
    pub checkpoints: usize,
    /// Total score before the run.
    pub initial_total: f64,
    /// Total score after the run.
    pub final_total: f64,
    /// True if the deadline passed.
    pub deadline_hit: bool,
    /// Wall-clock time.
    pub elapsed: Duration,
}

impl RunReport {
    /// Number of merged improvements.
    pub fn improved(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.verdict, Verdict::Improved { .. }))
            .count()
    }

    /// Counters summed over all workers.
    pub fn total_stats(&self) -> RunStats {
        let mut total = RunStats::default();
        for report in &self.reports {
            total.absorb(&report.stats);
        }
        total
    }

    /// Report for one instance.
    pub fn get(&self, instance_id: usize) -> Option<&WorkerReport> {
        self.reports.iter().find(|r| r.instance_id == instance_id)
    }
}

/// Result of checking a worker's output, before the merge decision.
#[derive(Debug, Clone)]
pub enum Finalized {
    /// Valid placements and their recomputed side length.
    Candidate {
        /// Placements found.
        placements: Vec<Placement>,
        /// Side length recomputed from the placements.
        score: f64,
    },
    /// Rejected for the given reason.
    Rejected(Verdict),
}

/// Turns an annealing outcome into a merge candidate.
///
/// Runs that stopped early are discarded. Results with the wrong placement
/// count or that fail `validator` are rejected, so the instance keeps its
/// original placements and score.
pub fn finalize(
    instance_id: usize,
    status: AnnealStatus,
    placements: Vec<Placement>,
    validator: Validator,
) -> Finalized {
    if !status.is_complete() {
        return Finalized::Rejected(Verdict::Discarded(status));
    }
    if placements.len() != instance_id {
        log::warn!(
            "instance {}: worker returned {} placements, keeping original",
            instance_id,
            placements.len()
        );
        return Finalized::Rejected(Verdict::ValidationFailed);
    }
    if !validator(&placements) {
        log::warn!(
            "instance {}: optimized placements failed validation, keeping original",
            instance_id
        );
        return Finalized::Rejected(Verdict::ValidationFailed);
    }
    let score = envelope_of(&placements).side_length();
    Finalized::Candidate { placements, score }
}

enum TaskMessage {
    Finished {
        instance_id: usize,
        result: Finalized,
        stats: RunStats,
    },
    Skipped(usize),
    Panicked(usize, String),
}

/// Runs an [`InstanceOptimizer`] over a whole solution.
pub struct Orchestrator {
    config: RunConfig,
    optimizer: Arc<dyn InstanceOptimizer>,
    validator: Validator,
}

impl Orchestrator {
    /// Creates an orchestrator that anneals with `config.anneal`.
    pub fn new(config: RunConfig) -> Result<Self, RunnerError> {
        config.validate()?;
        let annealer = Annealer::new(config.anneal.clone())?;
        Ok(Self {
            config,
            optimizer: Arc::new(annealer),
            validator: validate,
        })
    }

    /// Replaces the optimizer.
    pub fn with_optimizer(mut self, optimizer: Arc<dyn InstanceOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Replaces the result validator.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Ids to optimize, largest first.
    fn dispatch_order(&self, solution: &Solution) -> Vec<usize> {
        let mut ids: Vec<usize> = if self.config.instances.is_empty() {
            solution.ids().collect()
        } else {
            self.config
                .instances
                .iter()
                .copied()
                .filter(|&id| {
                    let known = solution.get(id).is_some();
                    if !known {
                        log::warn!("instance {:03} not in solution, skipping", id);
                    }
                    known
                })
                .collect()
        };
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.dedup();
        ids
    }

    /// Optimizes `solution` in place, checkpointing to `config.output`.
    ///
    /// The final save happens on every path out of the drain loop. Errors
    /// from intermediate checkpoints are logged; an error from the final save
    /// is returned.
    pub fn run(
        &self,
        solution: &mut Solution,
        shutdown: &Shutdown,
    ) -> Result<RunReport, RunnerError> {
        let start = Instant::now();
        let deadline = start + self.config.time_limit();
        let mut report = RunReport {
            initial_total: solution.total_score(),
            ..RunReport::default()
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("tree-packer-{}", i))
            .build()?;

        transition(&mut report, OrchestratorState::Dispatching);
        let ids = self.dispatch_order(solution);
        let total = ids.len();
        log::info!(
            "optimizing {} instances on {} threads, time limit {:.2}h",
            total,
            pool.current_num_threads(),
            self.config.time_limit_secs / 3600.0
        );

        let control = RunControl::new()
            .with_cancel(shutdown.abort_token().clone())
            .with_deadline(deadline);
        let (tx, rx) = mpsc::channel::<TaskMessage>();

        for &id in &ids {
            let Some(instance) = solution.get(id) else {
                continue;
            };
            let placements = instance.placements().to_vec();
            let tx = tx.clone();
            let optimizer = Arc::clone(&self.optimizer);
            let validator = self.validator;
            let stop_dispatch = shutdown.stop_dispatch_token().clone();
            let control = control.clone();

            pool.spawn_fifo(move || {
                if stop_dispatch.is_cancelled() || control.should_stop().is_some() {
                    let _ = tx.send(TaskMessage::Skipped(id));
                    return;
                }
                let message = match catch_unwind(AssertUnwindSafe(|| {
                    optimizer.optimize_instance(id, &placements, &control)
                })) {
                    Ok(outcome) => TaskMessage::Finished {
                        instance_id: id,
                        result: finalize(id, outcome.status, outcome.placements, validator),
                        stats: outcome.stats,
                    },
                    Err(payload) => TaskMessage::Panicked(id, panic_message(payload.as_ref())),
                };
                let _ = tx.send(message);
            });
        }
        drop(tx);

        transition(&mut report, OrchestratorState::Draining);
        let mut finished = 0usize;
        for message in rx {
            finished += 1;
            let entry = self.merge(solution, message);
            log_progress(finished, total, &entry);
            report.reports.push(entry);

            if !report.deadline_hit && Instant::now() >= deadline {
                report.deadline_hit = true;
                log::warn!(
                    "time limit reached after {:.2}h, stopping workers",
                    start.elapsed().as_secs_f64() / 3600.0
                );
                shutdown.abort();
            }

            if finished % self.config.checkpoint_every == 0 && finished < total {
                log::info!("checkpoint at {}/{}", finished, total);
                match solution.save_atomic(&self.config.output) {
                    Ok(()) => report.checkpoints += 1,
                    Err(e) => log::warn!("checkpoint failed: {}", e),
                }
            }
        }
        drop(pool);

        transition(&mut report, OrchestratorState::Saving);
        report.final_total = solution.total_score();
        report.elapsed = start.elapsed();
        log::info!(
            "final save to {}: {} improved, total score {:.6} -> {:.6}",
            self.config.output.display(),
            report.improved(),
            report.initial_total,
            report.final_total
        );
        solution.save_atomic(&self.config.output)?;
        report.checkpoints += 1;

        transition(&mut report, OrchestratorState::Done);
        Ok(report)
    }

    /// Applies one worker result. Only strict improvements beyond the epsilon
    /// replace the stored placements.
    fn merge(&self, solution: &mut Solution, message: TaskMessage) -> WorkerReport {
        match message {
            TaskMessage::Skipped(instance_id) => WorkerReport {
                instance_id,
                verdict: Verdict::Skipped,
                stats: RunStats::default(),
            },
            TaskMessage::Panicked(instance_id, msg) => {
                log::warn!("instance {}: worker panicked: {}", instance_id, msg);
                WorkerReport {
                    instance_id,
                    verdict: Verdict::Panicked(msg),
                    stats: RunStats::default(),
                }
            }
            TaskMessage::Finished {
                instance_id,
                result,
                stats,
            } => {
                let verdict = match result {
                    Finalized::Rejected(verdict) => verdict,
                    Finalized::Candidate { placements, score } => {
                        let original = solution
                            .get(instance_id)
                            .map(|i| i.side_length())
                            .unwrap_or(f64::INFINITY);
                        if original - score > self.config.improvement_epsilon {
                            match solution.replace(instance_id, placements) {
                                Ok(()) => Verdict::Improved {
                                    from: original,
                                    to: score,
                                },
                                Err(e) => {
                                    log::warn!("instance {}: merge rejected: {}", instance_id, e);
                                    Verdict::ValidationFailed
                                }
                            }
                        } else {
                            Verdict::NotImproved { score }
                        }
                    }
                };
                WorkerReport {
                    instance_id,
                    verdict,
                    stats,
                }
            }
        }
    }
}

fn transition(report: &mut RunReport, next: OrchestratorState) {
    log::debug!("orchestrator: {:?}", next);
    report.states.push(next);
}

fn log_progress(finished: usize, total: usize, entry: &WorkerReport) {
    match &entry.verdict {
        Verdict::Improved { from, to } => log::info!(
            "[{}/{}] instance {}: {:.6} -> {:.6} improved (-{:.6})",
            finished,
            total,
            entry.instance_id,
            from,
            to,
            from - to
        ),
        Verdict::NotImproved { score } => log::info!(
            "[{}/{}] instance {}: {:.6}, no improvement",
            finished,
            total,
            entry.instance_id,
            score
        ),
        other => log::info!(
            "[{}/{}] instance {}: {:?}",
            finished,
            total,
            entry.instance_id,
            other
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
