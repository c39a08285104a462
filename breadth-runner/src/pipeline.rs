//! Pipeline orchestration: acquire → assemble → gate → engine.
//!
//! Terminal conditions (insufficient coverage, empty derived series) end the
//! run with a typed error and no partial artifact, so an under-sampled chart
//! is never published. Non-fatal degradations (missing token, benchmark
//! failure, per-unit fetch failures) are carried as warnings into the output.

use crate::config::RunConfig;
use breadth_core::data::snapshot::content_hash;
use breadth_core::data::{acquire, assemble, FetchProgress, MarketDataSource, UnitOutcome};
use breadth_core::domain::BreadthRow;
use breadth_core::engine::{compute_breadth, BreadthParams, EngineError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

/// Terminal conditions for a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "insufficient coverage: {got} instrument column(s) assembled, minimum is {required} — no report produced"
    )]
    InsufficientCoverage { got: usize, required: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Everything a renderer or notifier needs from one completed run.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Full breadth row sequence, ascending by date.
    pub rows: Vec<BreadthRow>,
    /// Instrument columns in the assembled matrix (the sample size).
    pub instrument_count: usize,
    /// Deterministic hash of the accepted observation set.
    pub dataset_hash: String,
    /// Non-fatal degradations accumulated across the run.
    pub warnings: Vec<String>,
    /// Per-unit acquisition outcomes, in plan order.
    pub outcomes: Vec<UnitOutcome>,
    /// Whether the upstream handshake succeeded.
    pub authenticated: bool,
}

/// Execute one full breadth run dated `as_of`.
///
/// The universe is the externally-resolved id list (already filtered to
/// primary-board equities). `token` is the optional upstream credential.
pub fn run_pipeline(
    cfg: &RunConfig,
    source: &dyn MarketDataSource,
    universe: &[String],
    as_of: NaiveDate,
    token: Option<&str>,
    progress: &dyn FetchProgress,
) -> Result<PipelineOutput, PipelineError> {
    let (start, end) = cfg.acquisition_window(as_of);
    let strategy = cfg.strategy.to_plan();

    let acquisition = acquire(source, universe, start, end, &strategy, token, progress);
    let mut warnings = acquisition.warnings.clone();

    let failed = acquisition.failed_units();
    if failed > 0 {
        warnings.push(format!(
            "{failed} of {} acquisition unit(s) failed; coverage is reduced",
            acquisition.outcomes.len()
        ));
    }

    let matrix = assemble(&acquisition.observations);

    // Coverage gate: refuse to compute indicators on a sample too small to
    // be representative.
    if matrix.instrument_count() < cfg.min_instruments {
        return Err(PipelineError::InsufficientCoverage {
            got: matrix.instrument_count(),
            required: cfg.min_instruments,
        });
    }

    // Benchmark series: failure is a degraded row, never a dead run.
    let benchmark = cfg.benchmark.as_deref().and_then(|id| {
        match source.fetch_instrument(id, start) {
            Ok(observations) => Some(
                observations
                    .into_iter()
                    .map(|o| (o.date, o.close))
                    .collect::<BTreeMap<NaiveDate, f64>>(),
            ),
            Err(e) => {
                warnings.push(format!("benchmark '{id}' unavailable: {e}"));
                None
            }
        }
    });

    let params = BreadthParams {
        window: cfg.window,
        min_periods: cfg.min_periods,
    };
    let rows = compute_breadth(&matrix, benchmark.as_ref(), params)?;

    Ok(PipelineOutput {
        rows,
        instrument_count: matrix.instrument_count(),
        dataset_hash: content_hash(&acquisition.observations),
        warnings,
        outcomes: acquisition.outcomes,
        authenticated: acquisition.authenticated,
    })
}
