//! Acquisition scheduler — plans, paces, and drives rate-limited requests.
//!
//! Two interchangeable planning strategies cover the upstream's request
//! shapes:
//! - `InstrumentBatches`: one request per instrument, grouped into fixed-size
//!   batches with a cooldown sleep between batches so the rolling-hour
//!   request count stays under the upstream quota.
//! - `MarketMonths`: one whole-market request per calendar month with a short
//!   delay between months. Request count is bounded by the number of months,
//!   independent of universe size — preferred when the upstream offers it.
//!
//! A failing unit (timeout, malformed or empty payload) is recorded in the
//! outcome log and skipped; it never aborts the run. When the quota breaker
//! opens mid-plan, all remaining units are marked blocked instead of issued.

use super::provider::{FetchError, FetchProgress, MarketDataSource};
use crate::domain::{InstrumentId, PriceObservation};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

/// How the universe/time range is partitioned into acquisition units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStrategy {
    /// Per-instrument requests in fixed-size batches with an inter-batch
    /// cooldown. `parallel` fans the requests inside one batch out across
    /// rayon workers; pacing still holds at batch granularity.
    InstrumentBatches {
        batch_size: usize,
        cooldown: Duration,
        parallel: bool,
    },
    /// One whole-market request per calendar month, oldest first, with a
    /// short fixed delay between months.
    MarketMonths { delay: Duration },
}

impl PlanStrategy {
    /// Batch tuning sized for a ~600 requests/hour quota.
    pub fn default_batches() -> Self {
        Self::InstrumentBatches {
            batch_size: 100,
            cooldown: Duration::from_secs(300),
            parallel: false,
        }
    }

    /// Monthly whole-market tuning: 12–15 requests total for a 200-day
    /// window, paced gently.
    pub fn default_months() -> Self {
        Self::MarketMonths {
            delay: Duration::from_millis(1500),
        }
    }
}

/// Outcome of one acquisition unit. `Ok` carries the observation count.
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub unit: String,
    pub result: Result<usize, FetchError>,
}

impl UnitOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Best-effort result of running an acquisition plan.
#[derive(Debug)]
pub struct AcquisitionReport {
    /// All observations accumulated from successful units. May contain exact
    /// duplicates from overlapping windows; the assembler removes them.
    pub observations: Vec<PriceObservation>,
    /// Per-unit pass/fail log, in plan order.
    pub outcomes: Vec<UnitOutcome>,
    /// Whether the one-time login handshake succeeded.
    pub authenticated: bool,
    /// Non-fatal degradations (missing token, rejected handshake).
    pub warnings: Vec<String>,
}

impl AcquisitionReport {
    pub fn succeeded_units(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed_units(&self) -> usize {
        self.outcomes.len() - self.succeeded_units()
    }
}

/// Run an acquisition plan against `source` for the given universe.
///
/// `start`/`end` bound the calendar window the plan must cover (the caller
/// sizes it from the rolling-window lookback). The report is best-effort:
/// callers apply their coverage gate afterwards.
pub fn acquire(
    source: &dyn MarketDataSource,
    universe: &[InstrumentId],
    start: NaiveDate,
    end: NaiveDate,
    strategy: &PlanStrategy,
    token: Option<&str>,
    progress: &dyn FetchProgress,
) -> AcquisitionReport {
    let mut warnings = Vec::new();

    // One-time handshake before the first unit. Absence of a token is not
    // fatal, but the upstream may silently truncate unauthenticated bulk
    // requests, so it is always surfaced.
    let authenticated = match token {
        Some(tok) => match source.authenticate(tok) {
            Ok(()) => true,
            Err(e) => {
                warnings.push(format!("login handshake failed, continuing unauthenticated: {e}"));
                false
            }
        },
        None => {
            warnings.push(
                "no upstream token configured; bulk requests may be truncated".to_string(),
            );
            false
        }
    };

    let (observations, outcomes) = match strategy {
        PlanStrategy::InstrumentBatches {
            batch_size,
            cooldown,
            parallel,
        } => run_instrument_batches(source, universe, start, *batch_size, *cooldown, *parallel, progress),
        PlanStrategy::MarketMonths { delay } => {
            run_market_months(source, universe, start, end, *delay, progress)
        }
    };

    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    progress.on_plan_complete(succeeded, outcomes.len() - succeeded, observations.len());

    AcquisitionReport {
        observations,
        outcomes,
        authenticated,
        warnings,
    }
}

fn run_instrument_batches(
    source: &dyn MarketDataSource,
    universe: &[InstrumentId],
    start: NaiveDate,
    batch_size: usize,
    cooldown: Duration,
    parallel: bool,
    progress: &dyn FetchProgress,
) -> (Vec<PriceObservation>, Vec<UnitOutcome>) {
    let total = universe.len();
    let batch_size = batch_size.max(1);
    let mut observations = Vec::new();
    let mut outcomes: Vec<UnitOutcome> = Vec::with_capacity(total);

    let batches: Vec<&[InstrumentId]> = universe.chunks(batch_size).collect();
    let batch_count = batches.len();

    for (batch_idx, batch) in batches.into_iter().enumerate() {
        if !source.is_available() {
            // Quota breaker opened: mark everything left as blocked.
            for id in &universe[outcomes.len()..] {
                outcomes.push(UnitOutcome {
                    unit: id.clone(),
                    result: Err(FetchError::Blocked),
                });
            }
            break;
        }

        if parallel {
            // Fan the batch out; pacing is preserved because the cooldown
            // applies per batch, not per request.
            let results: Vec<(InstrumentId, Result<Vec<PriceObservation>, FetchError>)> = batch
                .par_iter()
                .map(|id| (id.clone(), fetch_one(source, id, start)))
                .collect();
            for (id, result) in results {
                let index = outcomes.len();
                progress.on_unit_start(&id, index, total);
                record_unit(&id, index, total, result, &mut observations, &mut outcomes, progress);
            }
        } else {
            for id in batch {
                let index = outcomes.len();
                progress.on_unit_start(id, index, total);
                let result = fetch_one(source, id, start);
                record_unit(id, index, total, result, &mut observations, &mut outcomes, progress);
            }
        }

        if batch_idx + 1 < batch_count && !cooldown.is_zero() {
            std::thread::sleep(cooldown);
        }
    }

    (observations, outcomes)
}

fn fetch_one(
    source: &dyn MarketDataSource,
    id: &str,
    start: NaiveDate,
) -> Result<Vec<PriceObservation>, FetchError> {
    let observations = source.fetch_instrument(id, start)?;
    if observations.is_empty() {
        return Err(FetchError::EmptyPayload {
            unit: id.to_string(),
        });
    }
    Ok(observations)
}

fn record_unit(
    unit: &str,
    index: usize,
    total: usize,
    result: Result<Vec<PriceObservation>, FetchError>,
    observations: &mut Vec<PriceObservation>,
    outcomes: &mut Vec<UnitOutcome>,
    progress: &dyn FetchProgress,
) {
    match result {
        Ok(mut obs) => {
            progress.on_unit_complete(unit, index, total, &Ok(obs.len()));
            outcomes.push(UnitOutcome {
                unit: unit.to_string(),
                result: Ok(obs.len()),
            });
            observations.append(&mut obs);
        }
        Err(e) => {
            progress.on_unit_complete(unit, index, total, &Err(e.clone()));
            outcomes.push(UnitOutcome {
                unit: unit.to_string(),
                result: Err(e),
            });
        }
    }
}

fn run_market_months(
    source: &dyn MarketDataSource,
    universe: &[InstrumentId],
    start: NaiveDate,
    end: NaiveDate,
    delay: Duration,
    progress: &dyn FetchProgress,
) -> (Vec<PriceObservation>, Vec<UnitOutcome>) {
    let windows = month_windows(start, end);
    let total = windows.len();
    let target: HashSet<&str> = universe.iter().map(|s| s.as_str()).collect();

    let mut observations = Vec::new();
    let mut outcomes: Vec<UnitOutcome> = Vec::with_capacity(total);

    for (i, (win_start, win_end)) in windows.iter().enumerate() {
        let unit = format!("{}", win_start.format("%Y-%m"));

        if !source.is_available() {
            for (later_start, _) in &windows[i..] {
                outcomes.push(UnitOutcome {
                    unit: format!("{}", later_start.format("%Y-%m")),
                    result: Err(FetchError::Blocked),
                });
            }
            break;
        }

        progress.on_unit_start(&unit, i, total);

        let result = source.fetch_market(*win_start, *win_end).and_then(|obs| {
            let mut kept: Vec<PriceObservation> = obs
                .into_iter()
                .filter(|o| target.contains(o.instrument.as_str()))
                .collect();
            if kept.is_empty() {
                return Err(FetchError::EmptyPayload { unit: unit.clone() });
            }
            // Keep accumulation order deterministic across upstream quirks.
            kept.sort_by(|a, b| (a.date, &a.instrument).cmp(&(b.date, &b.instrument)));
            Ok(kept)
        });

        record_unit(&unit, i, total, result, &mut observations, &mut outcomes, progress);

        if i + 1 < total && !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    (observations, outcomes)
}

/// Partition `[start, end]` into calendar-month windows, oldest first.
/// The first and last windows are clamped to the requested range.
pub fn month_windows(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    if start > end {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut cursor = NaiveDate::from_ymd_opt(start.year(), start.month(), 1).unwrap();

    while cursor <= end {
        let (next_year, next_month) = if cursor.month() == 12 {
            (cursor.year() + 1, 1)
        } else {
            (cursor.year(), cursor.month() + 1)
        };
        let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap();
        let month_end = next_first.pred_opt().unwrap();

        windows.push((cursor.max(start), month_end.min(end)));
        cursor = next_first;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::SilentProgress;
    use std::sync::Mutex;

    /// Scripted source: per-instrument closes keyed by id, with optional
    /// per-id failures; records every request it receives.
    struct ScriptedSource {
        closes: Vec<(String, Vec<(NaiveDate, f64)>)>,
        failing: Vec<String>,
        requests: Mutex<Vec<String>>,
        available: std::sync::atomic::AtomicBool,
    }

    impl ScriptedSource {
        fn new(closes: Vec<(String, Vec<(NaiveDate, f64)>)>) -> Self {
            Self {
                closes,
                failing: Vec::new(),
                requests: Mutex::new(Vec::new()),
                available: std::sync::atomic::AtomicBool::new(true),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl MarketDataSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn authenticate(&self, _token: &str) -> Result<(), FetchError> {
            Ok(())
        }

        fn fetch_instrument(
            &self,
            instrument: &str,
            start: NaiveDate,
        ) -> Result<Vec<PriceObservation>, FetchError> {
            self.requests.lock().unwrap().push(instrument.to_string());
            if self.failing.iter().any(|f| f == instrument) {
                return Err(FetchError::NetworkUnreachable("scripted timeout".into()));
            }
            let series = self
                .closes
                .iter()
                .find(|(id, _)| id == instrument)
                .map(|(_, s)| s.clone())
                .unwrap_or_default();
            Ok(series
                .into_iter()
                .filter(|(d, _)| *d >= start)
                .map(|(date, close)| PriceObservation {
                    date,
                    instrument: instrument.to_string(),
                    close,
                })
                .collect())
        }

        fn fetch_market(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PriceObservation>, FetchError> {
            self.requests
                .lock()
                .unwrap()
                .push(format!("market {start}..{end}"));
            let mut out = Vec::new();
            for (id, series) in &self.closes {
                for (date, close) in series {
                    if *date >= start && *date <= end {
                        out.push(PriceObservation {
                            date: *date,
                            instrument: id.clone(),
                            close: *close,
                        });
                    }
                }
            }
            Ok(out)
        }

        fn is_available(&self) -> bool {
            self.available.load(std::sync::atomic::Ordering::Relaxed)
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn two_instrument_source() -> ScriptedSource {
        ScriptedSource::new(vec![
            (
                "1101".into(),
                vec![(d("2024-01-02"), 35.0), (d("2024-02-01"), 36.0)],
            ),
            (
                "2330".into(),
                vec![(d("2024-01-02"), 600.0), (d("2024-02-01"), 610.0)],
            ),
        ])
    }

    #[test]
    fn batched_plan_fetches_every_instrument() {
        let source = two_instrument_source();
        let universe = vec!["1101".to_string(), "2330".to_string()];
        let strategy = PlanStrategy::InstrumentBatches {
            batch_size: 1,
            cooldown: Duration::ZERO,
            parallel: false,
        };

        let report = acquire(
            &source,
            &universe,
            d("2024-01-01"),
            d("2024-02-28"),
            &strategy,
            Some("tok"),
            &SilentProgress,
        );

        assert_eq!(source.request_count(), 2);
        assert_eq!(report.succeeded_units(), 2);
        assert_eq!(report.observations.len(), 4);
        assert!(report.authenticated);
    }

    #[test]
    fn failing_unit_is_skipped_not_fatal() {
        let mut source = two_instrument_source();
        source.failing.push("1101".into());
        let universe = vec!["1101".to_string(), "2330".to_string()];
        let strategy = PlanStrategy::InstrumentBatches {
            batch_size: 10,
            cooldown: Duration::ZERO,
            parallel: false,
        };

        let report = acquire(
            &source,
            &universe,
            d("2024-01-01"),
            d("2024-02-28"),
            &strategy,
            Some("tok"),
            &SilentProgress,
        );

        assert_eq!(report.succeeded_units(), 1);
        assert_eq!(report.failed_units(), 1);
        assert!(report.outcomes[0].result.is_err());
        // The other instrument's observations still arrived.
        assert_eq!(report.observations.len(), 2);
    }

    #[test]
    fn empty_payload_is_a_unit_failure() {
        let source = ScriptedSource::new(vec![("9999".into(), vec![])]);
        let universe = vec!["9999".to_string()];
        let strategy = PlanStrategy::InstrumentBatches {
            batch_size: 10,
            cooldown: Duration::ZERO,
            parallel: false,
        };

        let report = acquire(
            &source,
            &universe,
            d("2024-01-01"),
            d("2024-02-28"),
            &strategy,
            Some("tok"),
            &SilentProgress,
        );

        assert_eq!(report.failed_units(), 1);
        assert!(matches!(
            report.outcomes[0].result,
            Err(FetchError::EmptyPayload { .. })
        ));
    }

    #[test]
    fn monthly_plan_request_count_is_bounded_by_months() {
        let source = two_instrument_source();
        let universe = vec!["1101".to_string(), "2330".to_string()];
        let strategy = PlanStrategy::MarketMonths {
            delay: Duration::ZERO,
        };

        let report = acquire(
            &source,
            &universe,
            d("2024-01-01"),
            d("2024-02-28"),
            &strategy,
            Some("tok"),
            &SilentProgress,
        );

        // Two calendar months, two requests — regardless of universe size.
        assert_eq!(source.request_count(), 2);
        assert_eq!(report.succeeded_units(), 2);
        assert_eq!(report.observations.len(), 4);
    }

    #[test]
    fn monthly_plan_filters_to_target_universe() {
        let source = ScriptedSource::new(vec![
            ("1101".into(), vec![(d("2024-01-02"), 35.0)]),
            ("0050".into(), vec![(d("2024-01-02"), 130.0)]),
        ]);
        let universe = vec!["1101".to_string()];
        let strategy = PlanStrategy::MarketMonths {
            delay: Duration::ZERO,
        };

        let report = acquire(
            &source,
            &universe,
            d("2024-01-01"),
            d("2024-01-31"),
            &strategy,
            Some("tok"),
            &SilentProgress,
        );

        assert_eq!(report.observations.len(), 1);
        assert_eq!(report.observations[0].instrument, "1101");
    }

    #[test]
    fn missing_token_warns_but_proceeds() {
        let source = two_instrument_source();
        let universe = vec!["1101".to_string()];
        let strategy = PlanStrategy::MarketMonths {
            delay: Duration::ZERO,
        };

        let report = acquire(
            &source,
            &universe,
            d("2024-01-01"),
            d("2024-01-31"),
            &strategy,
            None,
            &SilentProgress,
        );

        assert!(!report.authenticated);
        assert!(!report.warnings.is_empty());
        assert_eq!(report.succeeded_units(), 1);
    }

    #[test]
    fn breaker_open_blocks_remaining_units() {
        let source = two_instrument_source();
        source
            .available
            .store(false, std::sync::atomic::Ordering::Relaxed);
        let universe = vec!["1101".to_string(), "2330".to_string()];
        let strategy = PlanStrategy::InstrumentBatches {
            batch_size: 1,
            cooldown: Duration::ZERO,
            parallel: false,
        };

        let report = acquire(
            &source,
            &universe,
            d("2024-01-01"),
            d("2024-02-28"),
            &strategy,
            Some("tok"),
            &SilentProgress,
        );

        assert_eq!(source.request_count(), 0);
        assert_eq!(report.failed_units(), 2);
        assert!(report
            .outcomes
            .iter()
            .all(|o| matches!(o.result, Err(FetchError::Blocked))));
    }

    #[test]
    fn parallel_batch_matches_sequential_results() {
        let source_a = two_instrument_source();
        let source_b = two_instrument_source();
        let universe = vec!["1101".to_string(), "2330".to_string()];

        let seq = acquire(
            &source_a,
            &universe,
            d("2024-01-01"),
            d("2024-02-28"),
            &PlanStrategy::InstrumentBatches {
                batch_size: 2,
                cooldown: Duration::ZERO,
                parallel: false,
            },
            Some("tok"),
            &SilentProgress,
        );
        let par = acquire(
            &source_b,
            &universe,
            d("2024-01-01"),
            d("2024-02-28"),
            &PlanStrategy::InstrumentBatches {
                batch_size: 2,
                cooldown: Duration::ZERO,
                parallel: true,
            },
            Some("tok"),
            &SilentProgress,
        );

        assert_eq!(seq.succeeded_units(), par.succeeded_units());
        assert_eq!(seq.observations.len(), par.observations.len());
    }

    #[test]
    fn month_windows_clamp_to_range() {
        let windows = month_windows(d("2024-01-15"), d("2024-03-10"));
        assert_eq!(
            windows,
            vec![
                (d("2024-01-15"), d("2024-01-31")),
                (d("2024-02-01"), d("2024-02-29")),
                (d("2024-03-01"), d("2024-03-10")),
            ]
        );
    }

    #[test]
    fn month_windows_cross_year_boundary() {
        let windows = month_windows(d("2023-12-01"), d("2024-01-31"));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1], (d("2024-01-01"), d("2024-01-31")));
    }

    #[test]
    fn month_windows_empty_when_inverted() {
        assert!(month_windows(d("2024-03-01"), d("2024-01-01")).is_empty());
    }
}
