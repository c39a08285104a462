//! Market data source trait and structured error types.
//!
//! The MarketDataSource trait abstracts over upstream quote APIs so the
//! scheduler can drive a real HTTP source, a synthetic source, or a test
//! double through the same interface. A source never panics across this
//! boundary: every failure mode is a `FetchError` variant.

use crate::domain::{InstrumentId, PriceObservation};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for acquisition units.
///
/// These are displayable in both CLI output and the unit outcome log.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by upstream (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("empty payload: upstream returned zero observations for {unit}")]
    EmptyPayload { unit: String },

    #[error("instrument not found: {instrument}")]
    InstrumentNotFound { instrument: InstrumentId },

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("hard stop: upstream has refused further requests (quota breaker open)")]
    Blocked,

    #[error("snapshot error: {0}")]
    SnapshotError(String),

    #[error("fetch error: {0}")]
    Other(String),
}

/// Trait for upstream quote sources.
///
/// `fetch_instrument` is the per-instrument request shape (one ticker, open
/// start date). `fetch_market` is the whole-market shape (one date range, no
/// instrument filter) — preferred where the upstream offers it, since the
/// run's request count then depends on the window, not the universe size.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// One-time login/handshake with a credential token. Called by the
    /// scheduler before the first unit when a token is configured.
    fn authenticate(&self, token: &str) -> Result<(), FetchError>;

    /// Fetch daily closes for one instrument from `start` to the present.
    fn fetch_instrument(
        &self,
        instrument: &str,
        start: NaiveDate,
    ) -> Result<Vec<PriceObservation>, FetchError>;

    /// Fetch daily closes for the whole market over a date range.
    fn fetch_market(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>, FetchError>;

    /// Whether the source will currently accept requests (breaker closed).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-unit acquisition runs.
pub trait FetchProgress: Send {
    /// Called when an acquisition unit starts.
    fn on_unit_start(&self, unit: &str, index: usize, total: usize);

    /// Called when an acquisition unit completes. `result` carries the
    /// observation count on success.
    fn on_unit_complete(&self, unit: &str, index: usize, total: usize, result: &Result<usize, FetchError>);

    /// Called when the whole plan is done.
    fn on_plan_complete(&self, succeeded: usize, failed: usize, observations: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_unit_start(&self, unit: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {unit}...", index + 1, total);
    }

    fn on_unit_complete(
        &self,
        unit: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, FetchError>,
    ) {
        match result {
            Ok(n) => println!("  OK: {unit} ({n} observations)"),
            Err(e) => println!("  FAIL: {unit}: {e}"),
        }
    }

    fn on_plan_complete(&self, succeeded: usize, failed: usize, observations: usize) {
        println!(
            "\nAcquisition complete: {succeeded} unit(s) succeeded, {failed} failed, {observations} observations"
        );
    }
}

/// Progress reporter that discards everything (tests, library callers).
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_unit_start(&self, _unit: &str, _index: usize, _total: usize) {}
    fn on_unit_complete(
        &self,
        _unit: &str,
        _index: usize,
        _total: usize,
        _result: &Result<usize, FetchError>,
    ) {
    }
    fn on_plan_complete(&self, _succeeded: usize, _failed: usize, _observations: usize) {}
}
