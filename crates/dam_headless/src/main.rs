//! Headless dam simulation runner.
//!
//! This binary runs the simulation without graphics, emitting JSON state
//! lines on stdout. Designed for CI testing and balance analysis.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in standard scenario
//! cargo run -p dam_headless -- run
//!
//! # Run a scenario file with overrides
//! cargo run -p dam_headless -- run --scenario scenarios/standard.ron --ticks 20000 --seed 7
//! ```
//!
//! Output (stdout): JSON reports, one per line, then a summary line.
//! Logs (stderr): tracing output, `-v` for debug level.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dam_headless::runner::HeadlessRunner;
use dam_headless::scenario::Scenario;

#[derive(Parser)]
#[command(name = "dam_headless")]
#[command(about = "Headless dam simulation runner for CI and balance analysis")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scenario to completion
    Run {
        /// Scenario file to load (RON); defaults to the standard session
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scenario's tick budget
        #[arg(long)]
        ticks: Option<u64>,

        /// Override the scenario's RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the report interval
        #[arg(long)]
        report_every: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = cli.command.unwrap_or(Commands::Run {
        scenario: None,
        ticks: None,
        seed: None,
        report_every: None,
    });

    match command {
        Commands::Run {
            scenario,
            ticks,
            seed,
            report_every,
        } => run_command(scenario, ticks, seed, report_every),
    }
}

fn run_command(
    scenario_path: Option<PathBuf>,
    ticks: Option<u64>,
    seed: Option<u64>,
    report_every: Option<u64>,
) -> ExitCode {
    let mut scenario = match scenario_path {
        Some(path) => match Scenario::load(&path) {
            Ok(scenario) => scenario,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Scenario::default(),
    };
    if let Some(ticks) = ticks {
        scenario.ticks = ticks;
    }
    if let Some(seed) = seed {
        scenario.seed = seed;
    }
    if let Some(interval) = report_every {
        scenario.report_every = interval;
    }

    tracing::info!(name = %scenario.name, seed = scenario.seed, ticks = scenario.ticks, "starting run");

    let mut runner = match HeadlessRunner::new(scenario) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match runner.run(&mut out) {
        Ok(summary) => {
            let _ = out.flush();
            tracing::info!(
                ticks = summary.ticks,
                lost = summary.lost,
                score = summary.score,
                "run finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
