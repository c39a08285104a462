//! Breadth CLI — acquisition, reporting, and snapshot management commands.
//!
//! Commands:
//! - `acquire` — fetch daily closes for the universe and snapshot as Parquet
//! - `report` — run the full breadth pipeline and print the trailing table
//! - `snapshot status` — report snapshot row count, instruments, date range
//!
//! The upstream token is read from `BREADTH_API_TOKEN`; Telegram delivery
//! (for `report --notify`) from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.

use anyhow::{bail, Context, Result};
use breadth_core::data::{
    assemble, FinMindSource, MarketDataSource, ObservationSnapshot, QuotaBreaker, StdoutProgress,
    SyntheticSource, Universe,
};
use breadth_core::engine::{compute_breadth, BreadthParams};
use breadth_runner::{
    render_table, resolve_notifier, run_pipeline, trailing_view, write_csv, NotifySummary,
    PipelineError, RunConfig, StrategyConfig,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TOKEN_ENV: &str = "BREADTH_API_TOKEN";

#[derive(Parser)]
#[command(
    name = "breadth",
    about = "Market breadth CLI — daily new-high/new-low counts over a rolling 200-day window"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily closes for the universe and snapshot them as Parquet.
    Acquire {
        /// Universe TOML file. Defaults to the built-in sample universe.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Calendar days of history to request.
        #[arg(long, default_value_t = 365)]
        lookback_days: i64,

        /// Use per-instrument batches instead of monthly whole-market pulls.
        #[arg(long, default_value_t = false)]
        batches: bool,

        /// Use synthetic data instead of the upstream (smoke runs).
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Snapshot directory.
        #[arg(long, default_value = "data")]
        snapshot_dir: PathBuf,
    },
    /// Run the full breadth pipeline and print the trailing table.
    Report {
        /// Path to a TOML run config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Report date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Compute from a previously written snapshot instead of fetching.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Use synthetic data instead of the upstream (smoke runs).
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Send the summary to the configured notification channel.
        #[arg(long, default_value_t = false)]
        notify: bool,
    },
    /// Snapshot management commands.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Report snapshot row count, instrument count, and date range.
    Status {
        /// Snapshot directory.
        #[arg(long, default_value = "data")]
        snapshot_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Acquire {
            universe,
            as_of,
            lookback_days,
            batches,
            synthetic,
            snapshot_dir,
        } => run_acquire(universe, as_of, lookback_days, batches, synthetic, snapshot_dir),
        Commands::Report {
            config,
            as_of,
            snapshot,
            synthetic,
            notify,
        } => run_report(config, as_of, snapshot, synthetic, notify),
        Commands::Snapshot { action } => match action {
            SnapshotAction::Status { snapshot_dir } => run_snapshot_status(&snapshot_dir),
        },
    }
}

fn parse_as_of(as_of: Option<&str>) -> Result<NaiveDate> {
    match as_of {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of date '{s}'")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn load_universe(path: Option<&Path>) -> Result<Vec<String>> {
    let universe = match path {
        Some(p) => Universe::from_file(p).map_err(anyhow::Error::msg)?,
        None => Universe::sample(),
    };
    let ids = universe.primary_equities();
    if ids.is_empty() {
        bail!("universe contains no primary-board equities");
    }
    Ok(ids)
}

fn build_source(synthetic: bool, universe: &[String], end: NaiveDate) -> Box<dyn MarketDataSource> {
    if synthetic {
        Box::new(SyntheticSource::new(universe.to_vec(), end))
    } else {
        Box::new(FinMindSource::new(Arc::new(QuotaBreaker::default_upstream())))
    }
}

fn run_acquire(
    universe_file: Option<PathBuf>,
    as_of: Option<String>,
    lookback_days: i64,
    batches: bool,
    synthetic: bool,
    snapshot_dir: PathBuf,
) -> Result<()> {
    let as_of = parse_as_of(as_of.as_deref())?;
    let universe = load_universe(universe_file.as_deref())?;
    let source = build_source(synthetic, &universe, as_of);

    let strategy = if batches {
        breadth_core::data::PlanStrategy::default_batches()
    } else {
        breadth_core::data::PlanStrategy::default_months()
    };

    let token = std::env::var(TOKEN_ENV).ok();
    let start = as_of - chrono::Duration::days(lookback_days);

    let report = breadth_core::data::acquire(
        source.as_ref(),
        &universe,
        start,
        as_of,
        &strategy,
        token.as_deref(),
        &StdoutProgress,
    );

    for warning in &report.warnings {
        eprintln!("WARNING: {warning}");
    }
    println!(
        "Acquired {} observations ({} units ok, {} failed)",
        report.observations.len(),
        report.succeeded_units(),
        report.failed_units()
    );

    if report.observations.is_empty() {
        eprintln!("Nothing to snapshot: every acquisition unit failed.");
        std::process::exit(1);
    }

    let snapshot = ObservationSnapshot::new(&snapshot_dir);
    let meta = snapshot
        .write(&report.observations)
        .map_err(|e| anyhow::anyhow!("snapshot write failed: {e}"))?;
    println!(
        "Snapshot written to {} ({} instruments, {} to {})",
        snapshot_dir.display(),
        meta.instrument_count,
        meta.start_date,
        meta.end_date
    );

    Ok(())
}

fn run_report(
    config_path: Option<PathBuf>,
    as_of: Option<String>,
    snapshot_dir: Option<PathBuf>,
    synthetic: bool,
    notify: bool,
) -> Result<()> {
    let cfg = match config_path {
        Some(path) => RunConfig::from_file(&path)?,
        None => RunConfig::default(),
    };
    let as_of = parse_as_of(as_of.as_deref())?;
    let universe = load_universe(cfg.universe_file.as_deref())?;

    let (rows, instrument_count, warnings) = if let Some(dir) = snapshot_dir {
        report_from_snapshot(&cfg, &dir)?
    } else {
        let source = build_source(synthetic, &universe, as_of);
        let token = std::env::var(TOKEN_ENV).ok();

        let output = match run_pipeline(
            &cfg,
            source.as_ref(),
            &universe,
            as_of,
            token.as_deref(),
            &StdoutProgress,
        ) {
            Ok(output) => output,
            // Terminal conditions: no partial artifact is produced.
            Err(e @ PipelineError::InsufficientCoverage { .. }) | Err(e @ PipelineError::Engine(_)) => {
                eprintln!("ERROR: {e}");
                std::process::exit(1);
            }
        };
        (output.rows, output.instrument_count, output.warnings)
    };

    for warning in &warnings {
        eprintln!("WARNING: {warning}");
    }

    println!();
    println!("=== Market Breadth ({} instruments) ===", instrument_count);
    print!("{}", render_table(&trailing_view(&rows, cfg.report_days)));

    let csv_path = cfg.output_dir.join("breadth.csv");
    write_csv(&rows, &csv_path)?;
    println!("CSV saved to: {}", csv_path.display());

    if notify {
        let mut notify_warnings = warnings.clone();
        let notifier = resolve_notifier(&mut notify_warnings);
        if let Some(summary) = NotifySummary::from_rows(&rows, instrument_count, &warnings) {
            match notifier.send(&summary) {
                Ok(()) => println!("Summary sent via {}", notifier.name()),
                Err(e) => eprintln!("WARNING: notification failed: {e}"),
            }
        }
        for warning in notify_warnings.iter().skip(warnings.len()) {
            eprintln!("WARNING: {warning}");
        }
    }

    Ok(())
}

/// Offline path: assemble a previously written snapshot and run the engine,
/// with the same coverage gate the live pipeline applies.
fn report_from_snapshot(
    cfg: &RunConfig,
    dir: &Path,
) -> Result<(Vec<breadth_core::domain::BreadthRow>, usize, Vec<String>)> {
    let snapshot = ObservationSnapshot::new(dir);
    let observations = snapshot
        .load()
        .map_err(|e| anyhow::anyhow!("snapshot load failed: {e}"))?;

    let matrix = assemble(&observations);
    if matrix.instrument_count() < cfg.min_instruments {
        eprintln!(
            "ERROR: insufficient coverage: snapshot has {} instrument column(s), minimum is {}",
            matrix.instrument_count(),
            cfg.min_instruments
        );
        std::process::exit(1);
    }

    let params = BreadthParams {
        window: cfg.window,
        min_periods: cfg.min_periods,
    };
    let rows = compute_breadth(&matrix, None, params)?;
    Ok((rows, matrix.instrument_count(), Vec::new()))
}

fn run_snapshot_status(snapshot_dir: &Path) -> Result<()> {
    let snapshot = ObservationSnapshot::new(snapshot_dir);
    match snapshot.meta() {
        Some(meta) => {
            println!("Snapshot: {}", snapshot_dir.display());
            println!("Observations: {}", meta.observation_count);
            println!("Instruments:  {}", meta.instrument_count);
            println!("Date range:   {} to {}", meta.start_date, meta.end_date);
            println!("Content hash: {}", meta.content_hash);
            println!("Written at:   {}", meta.written_at);
        }
        None => {
            println!("No snapshot at {}", snapshot_dir.display());
        }
    }
    Ok(())
}
