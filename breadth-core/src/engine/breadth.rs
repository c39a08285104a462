//! Breadth computation — new-high/new-low counts and the high/low ratio.
//!
//! Policy (the documented contract for this pipeline):
//! - Window 200 trading days, defined from 150 observed days onward.
//! - Inclusive comparison: the rolling extremum includes day t itself, so a
//!   close equal to its rolling max counts as a new high (ties count), and
//!   symmetrically for lows.

use super::rolling::{forward_fill, rolling_max, rolling_min};
use crate::data::assemble::WideMatrix;
use crate::domain::BreadthRow;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

/// Ratio sentinel returned when a reporting window has zero new lows.
/// Read as "undefined/very high", never as a literal percentage.
pub const RATIO_SENTINEL: i64 = 999;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no trading day reached the rolling-window minimum of {min_periods} observations")]
    EmptyDerivedSeries { min_periods: usize },
}

/// Rolling-window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreadthParams {
    /// Trailing window length in trading days.
    pub window: usize,
    /// Observed days required before the window is defined.
    pub min_periods: usize,
}

impl Default for BreadthParams {
    fn default() -> Self {
        Self {
            window: 200,
            min_periods: 150,
        }
    }
}

/// Compute the full breadth row sequence from a wide matrix and an optional
/// benchmark series.
///
/// Each instrument column is forward-filled (the only mutation applied after
/// assembly), then scanned for rolling extrema. A row is emitted for every
/// matrix date where at least one instrument window is defined; the benchmark
/// is joined by date with no fill, so its absence never blocks a row.
pub fn compute_breadth(
    matrix: &WideMatrix,
    benchmark: Option<&BTreeMap<NaiveDate, f64>>,
    params: BreadthParams,
) -> Result<Vec<BreadthRow>, EngineError> {
    let n = matrix.row_count();
    let mut new_highs = vec![0usize; n];
    let mut new_lows = vec![0usize; n];
    let mut window_defined = vec![false; n];

    for column in matrix.columns.values() {
        let filled = forward_fill(column);
        let max = rolling_max(&filled, params.window, params.min_periods);
        let min = rolling_min(&filled, params.window, params.min_periods);

        for t in 0..n {
            let (Some(close), Some(hi), Some(lo)) = (filled[t], max[t], min[t]) else {
                continue;
            };
            window_defined[t] = true;
            if close >= hi {
                new_highs[t] += 1;
            }
            if close <= lo {
                new_lows[t] += 1;
            }
        }
    }

    let rows: Vec<BreadthRow> = (0..n)
        .filter(|&t| window_defined[t])
        .map(|t| BreadthRow {
            date: matrix.dates[t],
            new_highs: new_highs[t],
            new_lows: new_lows[t],
            benchmark: benchmark.and_then(|b| b.get(&matrix.dates[t]).copied()),
        })
        .collect();

    if rows.is_empty() {
        return Err(EngineError::EmptyDerivedSeries {
            min_periods: params.min_periods,
        });
    }

    Ok(rows)
}

/// High/low ratio for a reporting window: `round(new_highs / new_lows * 100)`
/// when lows are present, otherwise [`RATIO_SENTINEL`].
pub fn high_low_ratio(new_highs: usize, new_lows: usize) -> i64 {
    if new_lows == 0 {
        return RATIO_SENTINEL;
    }
    ((new_highs as f64 / new_lows as f64) * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::assemble::assemble;
    use crate::domain::PriceObservation;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Matrix with consecutive weekdays starting 2024-01-01 and the given
    /// closes per instrument.
    fn matrix_from(series: &[(&str, Vec<f64>)]) -> WideMatrix {
        let mut observations = Vec::new();
        for (id, closes) in series {
            let mut date = d("2024-01-01");
            for close in closes {
                while matches!(
                    chrono::Datelike::weekday(&date),
                    chrono::Weekday::Sat | chrono::Weekday::Sun
                ) {
                    date += chrono::Duration::days(1);
                }
                observations.push(PriceObservation {
                    date,
                    instrument: id.to_string(),
                    close: *close,
                });
                date += chrono::Duration::days(1);
            }
        }
        assemble(&observations)
    }

    fn small_params() -> BreadthParams {
        BreadthParams {
            window: 3,
            min_periods: 2,
        }
    }

    #[test]
    fn tie_with_rolling_max_counts_as_new_high() {
        // Flat series: every close equals its rolling max AND min.
        let matrix = matrix_from(&[("1101", vec![10.0, 10.0, 10.0, 10.0])]);
        let rows = compute_breadth(&matrix, None, small_params()).unwrap();
        assert!(rows.iter().all(|r| r.new_highs == 1 && r.new_lows == 1));
    }

    #[test]
    fn rising_series_is_a_perpetual_new_high() {
        let matrix = matrix_from(&[("1101", vec![10.0, 11.0, 12.0, 13.0, 14.0])]);
        let rows = compute_breadth(&matrix, None, small_params()).unwrap();
        let last = rows.last().unwrap();
        assert_eq!(last.new_highs, 1);
        assert_eq!(last.new_lows, 0);
    }

    #[test]
    fn counts_sum_across_instruments() {
        let matrix = matrix_from(&[
            ("1101", vec![10.0, 11.0, 12.0]), // new high on final day
            ("2330", vec![30.0, 29.0, 28.0]), // new low on final day
            ("2412", vec![20.0, 21.0, 20.5]), // neither
        ]);
        let rows = compute_breadth(&matrix, None, small_params()).unwrap();
        let last = rows.last().unwrap();
        assert_eq!(last.new_highs, 1);
        assert_eq!(last.new_lows, 1);
    }

    #[test]
    fn warmup_rows_are_omitted() {
        let matrix = matrix_from(&[("1101", vec![10.0, 11.0, 12.0, 13.0])]);
        let rows = compute_breadth(&matrix, None, small_params()).unwrap();
        // min_periods = 2: the first date has no defined window.
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, matrix.dates[1]);
    }

    #[test]
    fn too_little_history_is_terminal() {
        let matrix = matrix_from(&[("1101", vec![10.0])]);
        let err = compute_breadth(&matrix, None, small_params()).unwrap_err();
        assert!(matches!(err, EngineError::EmptyDerivedSeries { .. }));
    }

    #[test]
    fn benchmark_joined_without_fill() {
        let matrix = matrix_from(&[("1101", vec![10.0, 11.0, 12.0])]);
        let mut benchmark = BTreeMap::new();
        // Benchmark only has the second matrix date.
        benchmark.insert(matrix.dates[1], 17500.0);

        let rows = compute_breadth(&matrix, Some(&benchmark), small_params()).unwrap();
        assert_eq!(rows[0].benchmark, Some(17500.0));
        assert_eq!(rows[1].benchmark, None);
    }

    #[test]
    fn forward_fill_bridges_single_missing_day() {
        // 1101 misses the third date; ffill keeps its window alive.
        let mut observations = Vec::new();
        for (i, close) in [10.0, 11.0, 12.0, 13.0].iter().enumerate() {
            observations.push(PriceObservation {
                date: d("2024-01-01") + chrono::Duration::days(i as i64),
                instrument: "2330".into(),
                close: *close,
            });
        }
        // 1101 observed on days 0, 1, 3 only.
        for (i, close) in [(0, 20.0), (1, 21.0), (3, 22.0)] {
            observations.push(PriceObservation {
                date: d("2024-01-01") + chrono::Duration::days(i),
                instrument: "1101".into(),
                close,
            });
        }

        let matrix = assemble(&observations);
        let rows = compute_breadth(&matrix, None, small_params()).unwrap();
        let last = rows.last().unwrap();
        // Both instruments make a new high on the final day.
        assert_eq!(last.new_highs, 2);
    }

    #[test]
    fn ratio_sentinel_when_no_lows() {
        assert_eq!(high_low_ratio(5, 0), RATIO_SENTINEL);
    }

    #[test]
    fn ratio_rounds_percentage() {
        assert_eq!(high_low_ratio(20, 10), 200);
        assert_eq!(high_low_ratio(1, 3), 33);
        assert_eq!(high_low_ratio(0, 4), 0);
    }

    #[test]
    fn rows_ascend_by_date() {
        let matrix = matrix_from(&[("1101", vec![10.0, 11.0, 9.0, 12.0, 8.0])]);
        let rows = compute_breadth(&matrix, None, small_params()).unwrap();
        assert!(rows.windows(2).all(|w| w[0].date < w[1].date));
    }
}
