//! Rolling-window kernels over sparse daily series.
//!
//! A series is a `Vec<Option<f64>>` aligned to the matrix date axis. Rolling
//! extrema are undefined (`None`) until the trailing window holds at least
//! `min_periods` observed values, which tolerates recent listings and data
//! gaps without discarding the instrument.

/// Forward-fill gaps after the first observation. Leading `None`s stay.
pub fn forward_fill(series: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut filled = Vec::with_capacity(series.len());
    let mut last = None;
    for cell in series {
        if cell.is_some() {
            last = *cell;
        }
        filled.push(last);
    }
    filled
}

/// Rolling maximum over the trailing `window` entries (inclusive of the
/// current day), defined once `min_periods` values are present.
pub fn rolling_max(series: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    rolling_extremum(series, window, min_periods, f64::max)
}

/// Rolling minimum, same window semantics as [`rolling_max`].
pub fn rolling_min(series: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    rolling_extremum(series, window, min_periods, f64::min)
}

fn rolling_extremum(
    series: &[Option<f64>],
    window: usize,
    min_periods: usize,
    pick: fn(f64, f64) -> f64,
) -> Vec<Option<f64>> {
    let n = series.len();
    let window = window.max(1);
    let min_periods = min_periods.clamp(1, window);
    let mut result = vec![None; n];

    for t in 0..n {
        let lo = (t + 1).saturating_sub(window);
        let mut observed = 0usize;
        let mut extremum: Option<f64> = None;
        for cell in &series[lo..=t] {
            if let Some(v) = cell {
                observed += 1;
                extremum = Some(match extremum {
                    Some(e) => pick(e, *v),
                    None => *v,
                });
            }
        }
        if observed >= min_periods {
            result[t] = extremum;
        }
    }

    result
}
