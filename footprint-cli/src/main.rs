//! Footprint CLI — aggregate tick files into footprint bars.
//!
//! Commands:
//! - `aggregate` — run one or more TOML configs over a tick CSV, optionally
//!   writing the JSON reports to a file
//! - `demo` — generate a synthetic tick stream and print TIME and TICK bars

mod input;
mod report;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use footprint_core::sample::TickGenerator;
use footprint_core::{FootprintConfig, FootprintEngine, Tick};
use rayon::prelude::*;
use report::{bar_summary, write_reports, RunReport};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "footprint", about = "Footprint CLI — tick aggregation into footprint bars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a tick CSV with one or more configs (run in parallel).
    Aggregate {
        /// Tick CSV with header `timestamp,price,volume,is_bid_trade`.
        #[arg(long)]
        ticks: PathBuf,

        /// TOML config file; repeat to run several policies over the same ticks.
        #[arg(long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Close the last partial bar at end of input.
        #[arg(long, default_value_t = false)]
        flush: bool,

        /// Output format printed to stdout.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,

        /// Also write the JSON reports to this file.
        #[arg(long)]
        out: Option<PathBuf>,

        /// In text output, print the ladder for this many of the newest bars.
        #[arg(long, default_value_t = 3)]
        show: usize,
    },
    /// Run the built-in demo on synthetic ticks.
    Demo {
        /// Number of ticks to generate.
        #[arg(long, default_value_t = 500)]
        ticks: usize,

        /// RNG seed for the tick generator.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Starting price of the random walk.
        #[arg(long, default_value_t = 4500.0)]
        start_price: f64,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate { ticks, configs, flush, output, out, show } => {
            run_aggregate(&ticks, &configs, flush, output, out.as_deref(), show)
        }
        Commands::Demo { ticks, seed, start_price } => run_demo(ticks, seed, start_price),
    }
}

/// Logs go to stderr so `--output json` stays clean on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("footprint_core=info,footprint=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run_aggregate(
    ticks_path: &Path,
    config_paths: &[PathBuf],
    flush: bool,
    output: OutputFormat,
    out: Option<&Path>,
    show: usize,
) -> Result<()> {
    let configs = config_paths
        .iter()
        .map(|path| -> Result<(PathBuf, FootprintConfig)> {
            let config = FootprintConfig::from_file(path)?;
            config.validate().with_context(|| format!("invalid config {}", path.display()))?;
            Ok((path.clone(), config))
        })
        .collect::<Result<Vec<_>>>()?;

    let ticks = input::read_ticks_file(ticks_path)?;
    info!(ticks = ticks.len(), configs = configs.len(), path = %ticks_path.display(), "loaded ticks");

    let reports = configs
        .par_iter()
        .map(|(path, config)| -> Result<RunReport> {
            let engine = run_engine(config, &ticks, flush)
                .with_context(|| format!("aggregate with {}", path.display()))?;
            Ok(RunReport::from_engine(Some(path.clone()), &engine))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(path) = out {
        write_reports(path, &reports)?;
        info!(path = %path.display(), reports = reports.len(), "wrote json reports");
    }

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            for report in &reports {
                print_report(report, show);
            }
        }
    }
    Ok(())
}

/// Feed `ticks` through a fresh engine. Rejected ticks are skipped; any
/// other engine error aborts the run.
fn run_engine(config: &FootprintConfig, ticks: &[Tick], flush: bool) -> Result<FootprintEngine> {
    let mut engine = FootprintEngine::from_config(config)?;
    for tick in ticks {
        match engine.process(*tick) {
            Ok(()) => {}
            Err(err) if err.is_rejection() => {}
            Err(err) => return Err(err.into()),
        }
    }
    if flush {
        engine.flush()?;
    }
    if engine.ticks_rejected() > 0 {
        warn!(
            rejected = engine.ticks_rejected(),
            aggregation = %engine.policy().aggregation(),
            "some ticks were rejected"
        );
    }
    Ok(engine)
}

fn print_report(report: &RunReport, show: usize) {
    println!("{}", report.headline());
    let skip = report.bars.len().saturating_sub(show);
    for bar in &report.bars[skip..] {
        println!();
        print!("{}", bar_summary(bar));
    }
    println!();
}

fn run_demo(count: usize, seed: u64, start_price: f64) -> Result<()> {
    if !(start_price.is_finite() && start_price > 0.0) {
        bail!("--start-price must be a positive number, got {start_price}");
    }

    let time_config = FootprintConfig::default();
    let tick_config = FootprintConfig::from_toml(
        r#"
        tick_size = 0.25
        aggregation_type = "TICK"
        aggregation_value = 100
        "#,
    )?;

    let start = demo_start();
    let ticks: Vec<Tick> =
        TickGenerator::new(seed, start_price, time_config.tick_size, start).take(count).collect();
    info!(ticks = ticks.len(), seed, start_price, "generated demo ticks");

    for config in [time_config, tick_config] {
        let engine = run_engine(&config, &ticks, true)?;
        let report = RunReport::from_engine(None, &engine);
        print_report(&report, 3);
    }
    Ok(())
}

fn demo_start() -> DateTime<Utc> {
    // 2024-01-02 14:30:00 UTC, a US cash-session open
    DateTime::from_timestamp(1_704_205_800, 0).unwrap_or_default()
}
