//! Tree packing CLI

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tree_packing_d2::find_overlaps;
use tree_packing_runner::{Orchestrator, RunConfig, Shutdown, Solution, Verdict};

#[derive(Parser)]
#[command(name = "tree-packer")]
#[command(about = "Simulated annealing optimizer for packing trees into the smallest square")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize every instance of a solution file in parallel
    Optimize {
        /// Input solution CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output solution CSV (checkpoints overwrite it)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML run configuration; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Worker threads (0 = one per core)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Time limit in hours
        #[arg(long)]
        hours: Option<f64>,

        /// Iteration budget for large instances
        #[arg(long)]
        iterations: Option<u64>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Checkpoint after this many completed instances
        #[arg(long)]
        checkpoint_every: Option<usize>,

        /// Only optimize these instance ids (comma separated)
        #[arg(long, value_delimiter = ',')]
        instances: Vec<usize>,
    },

    /// Print per-instance side lengths and the total score
    Score {
        /// Solution CSV
        file: PathBuf,

        /// Show every instance, not only the total
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check every instance for overlapping trees
    Validate {
        /// Solution CSV
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Optimize {
            input,
            output,
            config,
            threads,
            hours,
            iterations,
            seed,
            checkpoint_every,
            instances,
        } => {
            let mut run_config = match &config {
                Some(path) => RunConfig::from_toml_file(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => RunConfig::default(),
            };
            if let Some(input) = input {
                run_config.input = input;
            }
            if let Some(output) = output {
                run_config.output = output;
            }
            if let Some(threads) = threads {
                run_config.threads = threads;
            }
            if let Some(hours) = hours {
                let limit = Duration::try_from_secs_f64(hours * 3600.0)
                    .with_context(|| format!("invalid --hours {}", hours))?;
                run_config = run_config.with_time_limit(limit);
            }
            if let Some(iterations) = iterations {
                run_config.anneal.max_iterations = iterations;
            }
            if let Some(seed) = seed {
                run_config.anneal.seed = Some(seed);
            }
            if let Some(n) = checkpoint_every {
                run_config.checkpoint_every = n;
            }
            if !instances.is_empty() {
                run_config.instances = instances;
            }

            let mut solution = Solution::load(&run_config.input)
                .with_context(|| format!("reading {}", run_config.input.display()))?;
            let orchestrator = Orchestrator::new(run_config).context("invalid configuration")?;

            let shutdown = Shutdown::new();
            let handler = shutdown.clone();
            ctrlc::set_handler(move || {
                log::warn!("interrupt received, finishing in-flight instances (again to abort)");
                handler.request();
            })
            .context("installing interrupt handler")?;

            println!(
                "Loaded {} instances, total score {:.6}",
                solution.len(),
                solution.total_score()
            );
            println!("Press Ctrl+C to stop early and save progress.");

            let report = orchestrator.run(&mut solution, &shutdown)?;

            let failures = report
                .reports
                .iter()
                .filter(|r| matches!(r.verdict, Verdict::ValidationFailed | Verdict::Panicked(_)))
                .count();
            let stats = report.total_stats();
            println!("\n{:=<60}", "");
            println!("Improved instances:  {}", report.improved());
            println!("Failed instances:    {}", failures);
            println!("Checkpoints written: {}", report.checkpoints);
            println!("Iterations:          {}", stats.iterations);
            println!("Acceptance rate:     {:.2}%", stats.acceptance_rate() * 100.0);
            println!(
                "Total score:         {:.6} -> {:.6}",
                report.initial_total, report.final_total
            );
            println!("Elapsed:             {:.1?}", report.elapsed);
            if report.deadline_hit {
                println!("Stopped at the time limit.");
            }
            println!("Saved to {}", orchestrator.config().output.display());
        }

        Commands::Score { file, verbose } => {
            let solution = Solution::load(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            if verbose {
                println!("{:>5} {:>12} {:>12}", "N", "Side", "Score");
                println!("{:-<31}", "");
                for instance in solution.iter() {
                    println!(
                        "{:>5} {:>12.6} {:>12.6}",
                        instance.id(),
                        instance.side_length(),
                        instance.score_contribution()
                    );
                }
                println!("{:-<31}", "");
            }
            println!("Instances: {}", solution.len());
            println!("Total score: {:.6}", solution.total_score());
        }

        Commands::Validate { file } => {
            let solution = Solution::load(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut invalid = 0usize;
            for instance in solution.iter() {
                let pairs = find_overlaps(instance.placements());
                if !pairs.is_empty() {
                    invalid += 1;
                    println!(
                        "instance {:03}: {} overlapping pairs {:?}",
                        instance.id(),
                        pairs.len(),
                        pairs
                    );
                }
            }
            if invalid > 0 {
                anyhow::bail!("{} of {} instances have overlaps", invalid, solution.len());
            }
            println!("All {} instances are overlap-free.", solution.len());
        }
    }

    Ok(())
}
