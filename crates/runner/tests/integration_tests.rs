//! Integration tests for tree-packing-runner.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tree_packing_core::{AnnealConfig, AnnealStatus, RunControl, RunStats, StopReason};
use tree_packing_d2::{validate, AnnealOutcome, Instance, InstanceOptimizer, Placement};
use tree_packing_runner::{
    Orchestrator, OrchestratorState, RunConfig, Shutdown, Solution, Verdict,
};

/// Instance `n`: a single row of trees spaced `pitch` apart.
fn row_instance(n: usize, pitch: f64) -> Instance {
    let poses: Vec<(f64, f64, f64)> = (0..n).map(|i| (i as f64 * pitch, 0.0, 0.0)).collect();
    Instance::from_poses(n, &poses).unwrap()
}

fn loose_solution(ids: &[usize]) -> Solution {
    Solution::from_instances(ids.iter().map(|&n| row_instance(n, 2.0)))
}

fn config_in(dir: &TempDir) -> RunConfig {
    RunConfig::default()
        .with_paths(dir.path().join("in.csv"), dir.path().join("out.csv"))
        .with_threads(2)
        .with_anneal(AnnealConfig::default().with_max_iterations(500).with_seed(1))
}

fn outcome(
    instance_id: usize,
    input: &[Placement],
    placements: Vec<Placement>,
    status: AnnealStatus,
) -> AnnealOutcome {
    let initial_score = tree_packing_d2::envelope_of(input).side_length();
    let score = tree_packing_d2::envelope_of(&placements).side_length();
    AnnealOutcome {
        instance_id,
        placements,
        score,
        initial_score,
        status,
        stats: RunStats {
            iterations: 1,
            ..RunStats::default()
        },
    }
}

/// Optimizer driven by a plain function, for scripting worker behavior.
struct Scripted(fn(usize, &[Placement]) -> AnnealOutcome);

impl InstanceOptimizer for Scripted {
    fn optimize_instance(
        &self,
        instance_id: usize,
        placements: &[Placement],
        _control: &RunControl,
    ) -> AnnealOutcome {
        (self.0)(instance_id, placements)
    }
}

/// Packs the row tightly (pitch 0.7, touching).
fn tighten(id: usize, input: &[Placement]) -> AnnealOutcome {
    let tight = row_instance(id, 0.7).into_placements();
    outcome(id, input, tight, AnnealStatus::Converged)
}

fn identity(id: usize, input: &[Placement]) -> AnnealOutcome {
    outcome(id, input, input.to_vec(), AnnealStatus::Converged)
}

fn tighten_then_interrupt(id: usize, input: &[Placement]) -> AnnealOutcome {
    let tight = row_instance(id, 0.7).into_placements();
    outcome(id, input, tight, AnnealStatus::Interrupted)
}

fn panic_on_three(id: usize, input: &[Placement]) -> AnnealOutcome {
    if id == 3 {
        panic!("worker failure on instance 3");
    }
    tighten(id, input)
}

fn reject_three(placements: &[Placement]) -> bool {
    placements.len() != 3 && validate(placements)
}

fn overlap_everything(id: usize, input: &[Placement]) -> AnnealOutcome {
    let stacked = (0..id).map(|_| Placement::new(0.0, 0.0, 0.0)).collect();
    outcome(id, input, stacked, AnnealStatus::Converged)
}

/// Holds a tightened result until the run control says stop.
struct RunUntilStopped;

impl InstanceOptimizer for RunUntilStopped {
    fn optimize_instance(
        &self,
        instance_id: usize,
        placements: &[Placement],
        control: &RunControl,
    ) -> AnnealOutcome {
        let status = loop {
            match control.should_stop() {
                Some(StopReason::DeadlineExceeded) => break AnnealStatus::TimedOut,
                Some(StopReason::Cancelled) => break AnnealStatus::Interrupted,
                None => std::thread::sleep(Duration::from_millis(5)),
            }
        };
        let tight = row_instance(instance_id, 0.7).into_placements();
        outcome(instance_id, placements, tight, status)
    }
}

/// Requests a graceful shutdown from inside its first task, then finishes it.
struct InterruptDuringFirst(Shutdown);

impl InstanceOptimizer for InterruptDuringFirst {
    fn optimize_instance(
        &self,
        instance_id: usize,
        placements: &[Placement],
        _control: &RunControl,
    ) -> AnnealOutcome {
        self.0.request();
        tighten(instance_id, placements)
    }
}

mod orchestrator_tests {
    use super::*;

    #[test]
    fn test_real_annealer_end_to_end() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[1, 2, 3, 5]);
        let before = solution.clone();
        let orchestrator = Orchestrator::new(config_in(&dir)).unwrap();

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        assert_eq!(
            report.states,
            vec![
                OrchestratorState::Dispatching,
                OrchestratorState::Draining,
                OrchestratorState::Saving,
                OrchestratorState::Done,
            ]
        );
        assert_eq!(report.reports.len(), 4);
        for instance in solution.iter() {
            assert_eq!(instance.len(), instance.id());
            assert!(validate(instance.placements()));
            let original = before.get(instance.id()).unwrap().side_length();
            assert!(instance.side_length() <= original);
        }
        // The single tree never moves.
        assert_eq!(solution.get(1), before.get(1));
        assert!(report.final_total <= report.initial_total);

        let saved = Solution::load(dir.path().join("out.csv")).unwrap();
        assert_eq!(saved, solution);
    }

    #[test]
    fn test_improvements_are_merged() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3, 4]);
        let orchestrator = Orchestrator::new(config_in(&dir))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(tighten)));

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        assert_eq!(report.improved(), 3);
        for id in [2, 3, 4] {
            let side = solution.get(id).unwrap().side_length();
            assert!((side - 0.7 * id as f64).abs() < 1e-9);
            assert!(matches!(
                report.get(id).unwrap().verdict,
                Verdict::Improved { .. }
            ));
        }
        assert!(report.final_total < report.initial_total);
    }

    #[test]
    fn test_no_merge_without_improvement() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3]);
        let before = solution.clone();
        let orchestrator = Orchestrator::new(config_in(&dir))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(identity)));

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        assert_eq!(report.improved(), 0);
        assert_eq!(solution, before);
        assert!(report
            .reports
            .iter()
            .all(|r| matches!(r.verdict, Verdict::NotImproved { .. })));
    }

    #[test]
    fn test_epsilon_gates_merge() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2]);
        let before = solution.clone();
        let mut config = config_in(&dir);
        // Tightening instance 2 saves 1.3, below this threshold.
        config.improvement_epsilon = 2.0;
        let orchestrator = Orchestrator::new(config)
            .unwrap()
            .with_optimizer(Arc::new(Scripted(tighten)));

        orchestrator.run(&mut solution, &Shutdown::new()).unwrap();
        assert_eq!(solution, before);
    }

    #[test]
    fn test_validation_failure_reverts_only_that_instance() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3, 4]);
        let before = solution.clone();
        let orchestrator = Orchestrator::new(config_in(&dir))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(tighten)))
            .with_validator(reject_three);

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        assert_eq!(report.get(3).unwrap().verdict, Verdict::ValidationFailed);
        assert_eq!(solution.get(3), before.get(3));
        assert_ne!(solution.get(2), before.get(2));
        assert_ne!(solution.get(4), before.get(4));
    }

    #[test]
    fn test_overlapping_result_rejected_by_default_validator() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3]);
        let before = solution.clone();
        let orchestrator = Orchestrator::new(config_in(&dir))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(overlap_everything)));

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        assert_eq!(solution, before);
        assert!(report
            .reports
            .iter()
            .all(|r| r.verdict == Verdict::ValidationFailed));
    }

    #[test]
    fn test_worker_panic_is_contained() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3, 4]);
        let before = solution.clone();
        let orchestrator = Orchestrator::new(config_in(&dir))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(panic_on_three)));

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        assert!(matches!(report.get(3).unwrap().verdict, Verdict::Panicked(_)));
        assert_eq!(solution.get(3), before.get(3));
        assert_eq!(report.improved(), 2);
    }

    #[test]
    fn test_interrupted_results_discarded() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3]);
        let before = solution.clone();
        let orchestrator = Orchestrator::new(config_in(&dir))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(tighten_then_interrupt)));

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        assert_eq!(solution, before);
        assert!(report
            .reports
            .iter()
            .all(|r| r.verdict == Verdict::Discarded(AnnealStatus::Interrupted)));
    }

    #[test]
    fn test_abort_before_start_still_saves() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3, 4]);
        let before = solution.clone();
        let orchestrator = Orchestrator::new(config_in(&dir))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(tighten)));
        let shutdown = Shutdown::new();
        shutdown.abort();

        let report = orchestrator.run(&mut solution, &shutdown).unwrap();

        assert_eq!(solution, before);
        assert!(report.reports.iter().all(|r| r.verdict == Verdict::Skipped));
        assert_eq!(report.checkpoints, 1);
        assert_eq!(
            Solution::load(dir.path().join("out.csv")).unwrap(),
            before
        );
    }

    #[test]
    fn test_deadline_mid_run_discards_and_saves() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3, 4, 5]);
        let before = solution.clone();
        let config = config_in(&dir)
            .with_threads(1)
            .with_time_limit(Duration::from_millis(100));
        let orchestrator = Orchestrator::new(config)
            .unwrap()
            .with_optimizer(Arc::new(RunUntilStopped));
        let shutdown = Shutdown::new();

        let report = orchestrator.run(&mut solution, &shutdown).unwrap();

        assert!(report.deadline_hit);
        assert!(shutdown.abort_token().is_cancelled());
        // The largest instance was in flight when the deadline passed.
        assert_eq!(
            report.get(5).unwrap().verdict,
            Verdict::Discarded(AnnealStatus::TimedOut)
        );
        for id in [2, 3, 4] {
            assert_eq!(report.get(id).unwrap().verdict, Verdict::Skipped);
        }
        assert_eq!(solution, before);
        assert_eq!(report.states.last(), Some(&OrchestratorState::Done));
        assert_eq!(report.checkpoints, 1);
        assert_eq!(
            Solution::load(dir.path().join("out.csv")).unwrap(),
            before
        );
    }

    #[test]
    fn test_first_interrupt_finishes_in_flight_work() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3, 4]);
        let before = solution.clone();
        let shutdown = Shutdown::new();
        let orchestrator = Orchestrator::new(config_in(&dir).with_threads(1))
            .unwrap()
            .with_optimizer(Arc::new(InterruptDuringFirst(shutdown.clone())));

        let report = orchestrator.run(&mut solution, &shutdown).unwrap();

        assert!(shutdown.stop_dispatch_token().is_cancelled());
        assert!(!shutdown.abort_token().is_cancelled());
        assert!(!report.deadline_hit);
        assert!(matches!(
            report.get(4).unwrap().verdict,
            Verdict::Improved { .. }
        ));
        assert!((solution.get(4).unwrap().side_length() - 2.8).abs() < 1e-9);
        for id in [2, 3] {
            assert_eq!(report.get(id).unwrap().verdict, Verdict::Skipped);
            assert_eq!(solution.get(id), before.get(id));
        }
        assert_eq!(
            Solution::load(dir.path().join("out.csv")).unwrap(),
            solution
        );
    }

    #[test]
    fn test_periodic_checkpoints() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3, 4, 5, 6]);
        let orchestrator = Orchestrator::new(config_in(&dir).with_checkpoint_every(2))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(identity)));

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        // After 2 and 4 completions, plus the final save.
        assert_eq!(report.checkpoints, 3);
        assert!(!dir.path().join("out.csv.tmp").exists());
    }

    #[test]
    fn test_instance_filter() {
        let dir = TempDir::new().unwrap();
        let mut solution = loose_solution(&[2, 3, 4]);
        let before = solution.clone();
        let orchestrator = Orchestrator::new(config_in(&dir).with_instances(vec![3, 99]))
            .unwrap()
            .with_optimizer(Arc::new(Scripted(tighten)));

        let report = orchestrator.run(&mut solution, &Shutdown::new()).unwrap();

        assert_eq!(report.reports.len(), 1);
        assert_eq!(report.reports[0].instance_id, 3);
        assert_eq!(solution.get(2), before.get(2));
        assert_ne!(solution.get(3), before.get(3));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(Orchestrator::new(config_in(&dir).with_checkpoint_every(0)).is_err());
    }
}

mod solution_tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("solution.csv");
        let solution = Solution::from_instances([row_instance(1, 1.0), row_instance(12, 0.75)]);

        solution.save_atomic(&path).unwrap();
        let loaded = Solution::load(&path).unwrap();
        assert_eq!(loaded, solution);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("id,x,y,deg\n001_0,s0,s0,s0\n012_0,"));
        assert_eq!(text.lines().count(), 1 + 1 + 12);
    }

    #[test]
    fn test_overwrite_not_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("solution.csv");
        let solution = Solution::from_instances([row_instance(3, 1.0)]);
        solution.save_atomic(&path).unwrap();
        solution.save_atomic(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_instance_deserialize_checks_count() {
        let valid = "id = 1\nplacements = [{ x = 0.5, y = 0.0, deg = 45.0 }]\n";
        let instance: Instance = toml::from_str(valid).unwrap();
        assert_eq!(instance.len(), 1);

        let short = "id = 2\nplacements = [{ x = 0.0, y = 0.0, deg = 0.0 }]\n";
        assert!(toml::from_str::<Instance>(short).is_err());

        let non_finite = "id = 1\nplacements = [{ x = nan, y = 0.0, deg = 0.0 }]\n";
        assert!(toml::from_str::<Instance>(non_finite).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Solution::load(dir.path().join("absent.csv")).is_err());
    }
}
