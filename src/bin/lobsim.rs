use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use lobsim::config::Config;
use lobsim::error::SimResult;
use lobsim::logging::{init_logging, log_replay_verdict};
use lobsim::metrics;
use lobsim::report::{print_cross_summary, print_summary, CrossReport, Report, ScenarioResult};
use lobsim::runner::{hash_file, Runner};

/// Deterministic exchange simulator CLI
#[derive(Parser)]
#[command(name = "lobsim")]
#[command(about = "Measure how message latency shapes execution quality under price-time priority")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base directory for run outputs
    #[arg(long, default_value = "runs")]
    runs_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation scenario
    Run {
        /// Scenario name: calm, thin, spike
        #[arg(long)]
        scenario: String,
        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Optional TOML configuration overriding the named defaults
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Run all scenarios and generate a consolidated report
    Demo {
        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print a previously generated report
    Report {
        /// Use the most recent run
        #[arg(long)]
        last_run: bool,
        /// Run id (e.g. calm_seed42)
        #[arg(long)]
        run_id: Option<String>,
        /// Path to a specific run directory
        #[arg(long)]
        run_dir: Option<PathBuf>,
    },
    /// Recompute metrics from a run's event log and verify the run replays
    /// to a byte-identical log
    Replay {
        /// Run id (e.g. calm_seed42)
        #[arg(long)]
        run_id: Option<String>,
        /// Path to a specific run directory
        #[arg(long)]
        run_dir: Option<PathBuf>,
        /// Path to an event log (defaults to <run-dir>/events.jsonl)
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = init_logging() {
        eprintln!("Warning: could not initialize logging: {e}");
    }

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run {
            scenario,
            seed,
            config,
        } => cmd_run(&cli.runs_dir, &scenario, seed, config.as_deref()),
        Commands::Demo { seed } => cmd_demo(&cli.runs_dir, seed),
        Commands::Report {
            last_run,
            run_id,
            run_dir,
        } => cmd_report(&cli.runs_dir, last_run, run_id, run_dir),
        Commands::Replay {
            run_id,
            run_dir,
            log,
        } => cmd_replay(&cli.runs_dir, run_id, run_dir, log),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn cmd_run(
    runs_dir: &Path,
    scenario: &str,
    seed: u64,
    config_path: Option<&Path>,
) -> SimResult<()> {
    let cfg = match config_path {
        Some(path) => Config::load_toml(path)?,
        None => Config::named(scenario, seed)?,
    };

    println!("Running scenario: {} (seed={})", cfg.name, cfg.seed);

    let mut runner = Runner::new(&cfg, runs_dir)?;
    let result = runner.run()?;

    println!("Simulation complete.");
    println!("  Events processed: {}", result.event_count);
    println!("  Trades executed:  {}", result.trade_count);
    println!("  Wall time:        {:?}", result.wall_duration);
    println!("  Log hash:         {}...", &result.log_hash[..16]);
    println!("  Output:           {}", result.output_dir.display());

    let metrics_by_trader = metrics::compute_from_log(&result.log_path)?;
    println!("\nMetrics Summary:");
    print_summary(&cfg, &metrics_by_trader);

    let report = Report::new(&cfg, &metrics_by_trader, &result.output_dir);
    report.generate()?;
    println!("\nReport written to: {}/report.md", result.output_dir.display());

    Ok(())
}

fn cmd_demo(runs_dir: &Path, seed: u64) -> SimResult<()> {
    let mut results = Vec::new();

    for name in ["calm", "thin", "spike"] {
        let cfg = Config::named(name, seed)?;
        println!("Running scenario: {} (seed={})...", name, seed);

        let mut runner = Runner::new(&cfg, runs_dir)?;
        let result = runner.run()?;
        println!(
            "  {}: {} events, {} trades, {:?}",
            name, result.event_count, result.trade_count, result.wall_duration
        );

        let metrics_by_trader = metrics::compute_from_log(&result.log_path)?;

        let report = Report::new(&cfg, &metrics_by_trader, &result.output_dir);
        report.generate()?;

        results.push(ScenarioResult {
            config: cfg,
            metrics: metrics_by_trader,
            run_dir: result.output_dir,
        });
    }

    print_cross_summary(&results);

    CrossReport::new(&results, runs_dir).generate()?;
    println!(
        "\nCross-scenario report: {}/cross-scenario-report.md",
        runs_dir.display()
    );

    Ok(())
}

fn resolve_run_dir(
    runs_dir: &Path,
    last_run: bool,
    run_id: Option<String>,
    run_dir: Option<PathBuf>,
) -> SimResult<PathBuf> {
    if let Some(dir) = run_dir {
        return Ok(dir);
    }
    if let Some(id) = run_id {
        return Ok(runs_dir.join(id));
    }
    if last_run {
        let pointer = std::fs::read_to_string(runs_dir.join("last-run"))?;
        return Ok(PathBuf::from(pointer.trim()));
    }
    Err(lobsim::SimError::invalid_config(
        "--last-run, --run-dir, or --run-id required",
    ))
}

fn cmd_report(
    runs_dir: &Path,
    last_run: bool,
    run_id: Option<String>,
    run_dir: Option<PathBuf>,
) -> SimResult<()> {
    let dir = resolve_run_dir(runs_dir, last_run, run_id, run_dir)?;

    let report = std::fs::read_to_string(dir.join("report.md"))?;
    println!("{report}");

    if let Ok(plots) = std::fs::read_to_string(dir.join("plots.txt")) {
        println!("{plots}");
    }

    Ok(())
}

fn cmd_replay(
    runs_dir: &Path,
    run_id: Option<String>,
    run_dir: Option<PathBuf>,
    log: Option<PathBuf>,
) -> SimResult<()> {
    let dir = match (&run_dir, &run_id, &log) {
        (Some(dir), _, _) => dir.clone(),
        (None, Some(id), _) => runs_dir.join(id),
        (None, None, Some(log_path)) => log_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        (None, None, None) => {
            return Err(lobsim::SimError::invalid_config(
                "--run-id, --run-dir, or --log required",
            ))
        }
    };
    let log_path = log.unwrap_or_else(|| dir.join("events.jsonl"));

    let cfg = Config::load_json(dir.join("config.json"))?;
    let target_hash = hash_file(&log_path)?;

    println!("Analyzing event log: {}", log_path.display());
    let metrics_by_trader = metrics::compute_from_log(&log_path)?;
    println!("\nMetrics Summary (Replay):");
    print_summary(&cfg, &metrics_by_trader);

    // Regenerate the run deterministically and compare event-log hashes.
    let scratch = tempfile::tempdir()?;
    let mut runner = Runner::new(&cfg, scratch.path())?;
    let replay = runner.run()?;

    println!("\nDeterministic replay log: {}", replay.log_path.display());
    log_replay_verdict(&target_hash, &replay.log_hash);
    if target_hash == replay.log_hash {
        println!(
            "Event log hash matches deterministic replay: {}...",
            &target_hash[..16]
        );
    } else {
        println!(
            "Event log hash MISMATCH!\nTarget: {}...\nReplay: {}...",
            &target_hash[..16],
            &replay.log_hash[..16]
        );
    }

    Ok(())
}
