//! Rolling window statistics over optional buffers.
//!
//! Windows are trailing: position `i` covers the last `window` entries up
//! to and including `i`. Missing entries are excluded from the window's
//! statistics; a position yields `None` when fewer than `min_periods`
//! present values fall inside its window.

use crate::stats;

/// Compute a rolling mean.
pub fn rolling_mean(series: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    rolling_apply(series, window, min_periods, stats::mean)
}

/// Compute a rolling sample standard deviation (ddof 1).
///
/// A window holding a single value has no defined sample deviation and
/// yields `None`.
pub fn rolling_std(series: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    rolling_apply(series, window, min_periods, |s| {
        if s.len() < 2 {
            f64::NAN
        } else {
            stats::std_dev(s, 1)
        }
    })
}

/// Compute a rolling median.
pub fn rolling_median(
    series: &[Option<f64>],
    window: usize,
    min_periods: usize,
) -> Vec<Option<f64>> {
    rolling_apply(series, window, min_periods, stats::median)
}

/// Generic rolling window application.
fn rolling_apply<F>(
    series: &[Option<f64>],
    window: usize,
    min_periods: usize,
    f: F,
) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let n = series.len();
    let mut result = vec![None; n];
    if window == 0 {
        return result;
    }

    for i in 0..n {
        let start = (i + 1).saturating_sub(window);
        let segment: Vec<f64> = series[start..=i].iter().filter_map(|v| *v).collect();
        if segment.len() >= min_periods.max(1) {
            let value = f(&segment);
            if value.is_finite() {
                result[i] = Some(value);
            }
        }
    }

    result
}
