//! Outlier detection and treatment for grouped numeric columns.
//!
//! Detection produces a per-column boolean mask within the scope (group,
//! or whole table when no grouping is given); treatment replaces only the
//! flagged cells, using replacement statistics computed from the scope's
//! original values. Both respect group boundaries.

use std::str::FromStr;

use polars::prelude::*;
use tracing::debug;

use crate::error::{PrepError, Result};
use crate::frame::{self, Group};
use crate::stats;
use crate::window;

const METHOD_NAMES: &str = "'zscore', 'iqr', 'rolling', 'robust_scaler'";

/// Default z-score threshold in standard deviations.
pub const DEFAULT_THRESHOLD: f64 = 3.0;
/// Default rolling window length.
pub const DEFAULT_WINDOW: usize = 5;
/// Default rolling sigma multiplier.
pub const DEFAULT_SIGMA: f64 = 3.0;
/// IQR fence multiplier.
const IQR_FENCE: f64 = 1.5;
/// MAD multiplier for the robust-scaler method.
const MAD_FENCE: f64 = 3.0;

/// Strategy for detecting and treating outliers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierMethod {
    /// Standard score against the rest of the scope; values whose score
    /// exceeds the threshold are replaced with the scope median.
    ///
    /// Each value is scored against the mean and deviation of the
    /// *remaining* scope values. A plain whole-scope score caps out near
    /// sqrt(n) and can mask a single extreme value in short groups.
    ZScore { threshold: f64 },
    /// Tukey fences at `Q1 - 1.5*IQR` / `Q3 + 1.5*IQR`; flagged values
    /// are replaced with the Q1/Q3 midpoint.
    Iqr,
    /// Deviation from a rolling mean beyond `sigma` rolling standard
    /// deviations; flagged values take the rolling median at their
    /// position.
    Rolling { window: usize, sigma: f64 },
    /// Median/IQR scaling, then a 3-MAD fence on the scaled values;
    /// flagged values take the scope median.
    RobustScaler,
}

impl OutlierMethod {
    /// Resolve a configured strategy name with its threshold.
    pub fn parse(name: &str, threshold: f64) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "zscore" => Ok(Self::ZScore { threshold }),
            "iqr" => Ok(Self::Iqr),
            "rolling" => Ok(Self::Rolling {
                window: DEFAULT_WINDOW,
                sigma: threshold,
            }),
            "robust_scaler" => Ok(Self::RobustScaler),
            _ => Err(PrepError::InvalidMethod {
                name: name.to_string(),
                expected: METHOD_NAMES.to_string(),
            }),
        }
    }
}

impl FromStr for OutlierMethod {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, DEFAULT_THRESHOLD)
    }
}

/// Detect and replace outliers in the target columns, per group when
/// grouping columns are given. Returns a patched copy of the table.
pub fn handle_outliers(
    df: &DataFrame,
    columns: &[String],
    group_by: &[String],
    method: OutlierMethod,
) -> Result<DataFrame> {
    frame::ensure_columns(df, columns)?;
    let groups = frame::partition(df, group_by)?;

    let mut buffers: Vec<Vec<Option<f64>>> = Vec::with_capacity(columns.len());
    for name in columns {
        buffers.push(frame::numeric_buffer(df, name)?);
    }

    for group in &groups {
        treat_group(&mut buffers, columns, group, method);
    }

    let mut out = df.clone();
    for (name, buffer) in columns.iter().zip(buffers) {
        frame::replace_column(&mut out, name, buffer)?;
    }
    Ok(out)
}

fn treat_group(
    buffers: &mut [Vec<Option<f64>>],
    columns: &[String],
    group: &Group,
    method: OutlierMethod,
) {
    for (name, buffer) in columns.iter().zip(buffers.iter_mut()) {
        let values: Vec<Option<f64>> = group.rows.iter().map(|&r| buffer[r]).collect();
        let mask = detect(&values, method);
        let flagged = mask.iter().filter(|&&f| f).count();
        if flagged == 0 {
            continue;
        }
        debug!(
            group = %group.label,
            column = %name,
            flagged, "replacing outliers"
        );

        let treated = treat(&values, &mask, method);
        for (&row, value) in group.rows.iter().zip(&treated) {
            buffer[row] = *value;
        }
    }
}

/// Boolean outlier mask for one column within one scope.
fn detect(values: &[Option<f64>], method: OutlierMethod) -> Vec<bool> {
    match method {
        OutlierMethod::ZScore { threshold } => detect_zscore(values, threshold),
        OutlierMethod::Iqr => detect_iqr(values),
        OutlierMethod::Rolling { window, sigma } => detect_rolling(values, window, sigma),
        OutlierMethod::RobustScaler => detect_robust(values),
    }
}

fn detect_zscore(values: &[Option<f64>], threshold: f64) -> Vec<bool> {
    let present = stats::present(values);
    let n = present.len();
    if n < 3 {
        return vec![false; values.len()];
    }
    let sum: f64 = present.iter().sum();

    values
        .iter()
        .map(|v| {
            let Some(x) = *v else { return false };
            let rest = (n - 1) as f64;
            let mean = (sum - x) / rest;
            // Squared deviations about the leave-one-out mean, minus this
            // point's own term. The second pass keeps the variance exact
            // where a sum-of-squares shortcut cancels catastrophically on
            // large, tightly packed values.
            let total: f64 = present.iter().map(|y| (y - mean).powi(2)).sum();
            let var = ((total - (x - mean).powi(2)) / rest).max(0.0);
            if var == 0.0 {
                x != mean
            } else {
                (x - mean).abs() / var.sqrt() > threshold
            }
        })
        .collect()
}

fn detect_iqr(values: &[Option<f64>]) -> Vec<bool> {
    let present = stats::present(values);
    if present.len() < 2 {
        return vec![false; values.len()];
    }
    let q1 = stats::quantile(&present, 0.25);
    let q3 = stats::quantile(&present, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - IQR_FENCE * iqr;
    let upper = q3 + IQR_FENCE * iqr;

    values
        .iter()
        .map(|v| v.map(|x| x < lower || x > upper).unwrap_or(false))
        .collect()
}

fn detect_rolling(values: &[Option<f64>], window: usize, sigma: f64) -> Vec<bool> {
    let means = window::rolling_mean(values, window, 1);
    let stds = window::rolling_std(values, window, 1);

    values
        .iter()
        .zip(means.iter().zip(&stds))
        .map(|(v, (m, s))| match (v, m, s) {
            (Some(x), Some(mean), Some(std)) => (x - mean).abs() > sigma * std,
            _ => false,
        })
        .collect()
}

fn detect_robust(values: &[Option<f64>]) -> Vec<bool> {
    let present = stats::present(values);
    if present.len() < 2 {
        return vec![false; values.len()];
    }
    let center = stats::median(&present);
    let iqr = stats::quantile(&present, 0.75) - stats::quantile(&present, 0.25);
    // Zero spread gets a unit scale, as RobustScaler does.
    let scale = if iqr == 0.0 { 1.0 } else { iqr };

    let scaled: Vec<f64> = present.iter().map(|x| (x - center) / scale).collect();
    let scaled_median = stats::median(&scaled);
    let scaled_mad = stats::mad(&scaled);

    values
        .iter()
        .map(|v| {
            v.map(|x| ((x - center) / scale - scaled_median).abs() > MAD_FENCE * scaled_mad)
                .unwrap_or(false)
        })
        .collect()
}

/// Replace flagged cells, matching the replacement to the detector. All
/// replacement statistics come from the original (pre-treatment) values.
fn treat(values: &[Option<f64>], mask: &[bool], method: OutlierMethod) -> Vec<Option<f64>> {
    match method {
        OutlierMethod::ZScore { .. } | OutlierMethod::RobustScaler => {
            let replacement = stats::median(&stats::present(values));
            apply_constant(values, mask, replacement)
        }
        OutlierMethod::Iqr => {
            let present = stats::present(values);
            let replacement =
                (stats::quantile(&present, 0.25) + stats::quantile(&present, 0.75)) / 2.0;
            apply_constant(values, mask, replacement)
        }
        OutlierMethod::Rolling { window, .. } => {
            let medians = window::rolling_median(values, window, 1);
            values
                .iter()
                .zip(mask.iter().zip(&medians))
                .map(|(v, (flag, m))| if *flag { *m } else { *v })
                .collect()
        }
    }
}

fn apply_constant(values: &[Option<f64>], mask: &[bool], replacement: f64) -> Vec<Option<f64>> {
    values
        .iter()
        .zip(mask)
        .map(|(v, flag)| if *flag { Some(replacement) } else { *v })
        .collect()
}
