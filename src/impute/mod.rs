//! Missing-value imputation for grouped numeric columns.
//!
//! Every strategy works strictly within a group: statistics and
//! neighbor searches never see another group's rows. Results are
//! written back by original row index, so the table keeps its shape.

mod knn;
mod spline;

use std::str::FromStr;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::{PrepError, Result};
use crate::frame::{self, Group};
use crate::stats;

pub use knn::DEFAULT_K_NEIGHBORS;

const METHOD_NAMES: &str = "'mean', 'median', 'ffill', 'bfill', 'knn', 'spline', 'linear'";

/// Strategy for filling missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeMethod {
    /// Replace missing with the group's column mean.
    Mean,
    /// Replace missing with the group's column median.
    Median,
    /// Propagate the nearest prior value forward.
    Ffill,
    /// Propagate the nearest following value backward.
    Bfill,
    /// Distance-weighted average of the k nearest rows, judged by the
    /// other target columns.
    Knn { k: usize },
    /// Interpolating cubic spline over row positions.
    Spline,
    /// Linear interpolation between the nearest present neighbors.
    Linear,
}

impl ImputeMethod {
    /// Resolve a configured strategy name, with `k` for the knn variant.
    pub fn parse(name: &str, k: usize) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "ffill" => Ok(Self::Ffill),
            "bfill" => Ok(Self::Bfill),
            "knn" => Ok(Self::Knn { k }),
            "spline" => Ok(Self::Spline),
            "linear" => Ok(Self::Linear),
            _ => Err(PrepError::InvalidMethod {
                name: name.to_string(),
                expected: METHOD_NAMES.to_string(),
            }),
        }
    }
}

impl FromStr for ImputeMethod {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, DEFAULT_K_NEIGHBORS)
    }
}

/// Fill missing values in the target columns, per group when grouping
/// columns are given.
///
/// The input table is not modified; a patched copy is returned with the
/// same rows in the same order.
pub fn impute(
    df: &DataFrame,
    columns: &[String],
    group_by: &[String],
    method: ImputeMethod,
) -> Result<DataFrame> {
    frame::ensure_columns(df, columns)?;
    let groups = frame::partition(df, group_by)?;

    let mut buffers: Vec<Vec<Option<f64>>> = Vec::with_capacity(columns.len());
    for name in columns {
        buffers.push(frame::numeric_buffer(df, name)?);
    }

    for group in &groups {
        fill_group(&mut buffers, columns, group, method);
    }

    let mut out = df.clone();
    for (name, buffer) in columns.iter().zip(buffers) {
        frame::replace_column(&mut out, name, buffer)?;
    }
    Ok(out)
}

fn fill_group(
    buffers: &mut [Vec<Option<f64>>],
    columns: &[String],
    group: &Group,
    method: ImputeMethod,
) {
    if let ImputeMethod::Knn { k } = method {
        // knn couples the target columns: each row's neighbors are judged
        // across all of them at once.
        let mut slices: Vec<Vec<Option<f64>>> = buffers
            .iter()
            .map(|buf| group.rows.iter().map(|&r| buf[r]).collect())
            .collect();
        let before: Vec<usize> = slices.iter().map(|s| stats::missing_count(s)).collect();
        knn::fill(&mut slices, k);
        for (((name, buffer), filled), before) in
            columns.iter().zip(buffers.iter_mut()).zip(&slices).zip(before)
        {
            let after = stats::missing_count(filled);
            debug!(
                group = %group.label,
                column = %name,
                before, after, "imputed missing values"
            );
            for (&row, value) in group.rows.iter().zip(filled) {
                buffer[row] = *value;
            }
        }
        return;
    }

    for (name, buffer) in columns.iter().zip(buffers.iter_mut()) {
        let mut values: Vec<Option<f64>> = group.rows.iter().map(|&r| buffer[r]).collect();
        let before = stats::missing_count(&values);

        match method {
            ImputeMethod::Mean => fill_constant(&mut values, stats::mean),
            ImputeMethod::Median => fill_constant(&mut values, stats::median),
            ImputeMethod::Ffill => fill_forward(&mut values),
            ImputeMethod::Bfill => fill_backward(&mut values),
            ImputeMethod::Linear => fill_linear(&mut values),
            ImputeMethod::Spline => match spline::fill(&values) {
                Some(filled) => values = filled,
                None => {
                    warn!(
                        group = %group.label,
                        column = %name,
                        "too few points for a cubic spline, falling back to linear"
                    );
                    fill_linear(&mut values);
                }
            },
            ImputeMethod::Knn { .. } => unreachable!("handled above"),
        }

        let after = stats::missing_count(&values);
        debug!(
            group = %group.label,
            column = %name,
            before, after, "imputed missing values"
        );

        for (&row, value) in group.rows.iter().zip(&values) {
            buffer[row] = *value;
        }
    }
}

/// Replace every missing entry with a single statistic of the present ones.
fn fill_constant(values: &mut [Option<f64>], statistic: fn(&[f64]) -> f64) {
    let present = stats::present(values);
    if present.is_empty() {
        return;
    }
    let fill = statistic(&present);
    for value in values.iter_mut() {
        if value.is_none() {
            *value = Some(fill);
        }
    }
}

fn fill_forward(values: &mut [Option<f64>]) {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }
}

fn fill_backward(values: &mut [Option<f64>]) {
    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
}

/// Linear interpolation by row position. Interior gaps are interpolated
/// between the surrounding present values; trailing gaps extend the last
/// present value; leading gaps stay missing.
fn fill_linear(values: &mut [Option<f64>]) {
    let n = values.len();
    let mut prev: Option<(usize, f64)> = None;

    for i in 0..n {
        if let Some(v) = values[i] {
            prev = Some((i, v));
            continue;
        }
        let Some((pi, pv)) = prev else { continue };
        match values[i + 1..].iter().enumerate().find_map(|(j, v)| v.map(|v| (i + 1 + j, v))) {
            Some((ni, nv)) => {
                let frac = (i - pi) as f64 / (ni - pi) as f64;
                values[i] = Some(pv + (nv - pv) * frac);
            }
            None => values[i] = Some(pv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unwrap_all(values: &[Option<f64>]) -> Vec<f64> {
        values.iter().map(|v| v.unwrap()).collect()
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(ImputeMethod::parse("linear", 5).unwrap(), ImputeMethod::Linear);
        assert_eq!(ImputeMethod::parse("KNN", 3).unwrap(), ImputeMethod::Knn { k: 3 });
        let err = ImputeMethod::parse("mode", 5).unwrap_err();
        assert!(matches!(err, PrepError::InvalidMethod { name, .. } if name == "mode"));
    }

    #[test]
    fn linear_interpolates_interior_gap() {
        let mut values = vec![Some(1.0), None, None, Some(4.0)];
        fill_linear(&mut values);
        let filled = unwrap_all(&values);
        assert_relative_eq!(filled[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(filled[2], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_extends_trailing_and_keeps_leading() {
        let mut values = vec![None, Some(2.0), None];
        fill_linear(&mut values);
        assert!(values[0].is_none());
        assert_eq!(values[2], Some(2.0));
    }

    #[test]
    fn ffill_and_bfill_edges() {
        let mut values = vec![None, Some(1.0), None, Some(3.0), None];
        fill_forward(&mut values);
        assert_eq!(values, vec![None, Some(1.0), Some(1.0), Some(3.0), Some(3.0)]);

        let mut values = vec![None, Some(1.0), None, Some(3.0), None];
        fill_backward(&mut values);
        assert_eq!(values, vec![Some(1.0), Some(1.0), Some(3.0), Some(3.0), None]);
    }

    #[test]
    fn mean_fill_within_groups_only() {
        let df = df![
            "g" => ["a", "a", "a", "b", "b", "b"],
            "x" => [Some(1.0), None, Some(3.0), Some(10.0), None, Some(30.0)],
        ]
        .unwrap();
        let out = impute(
            &df,
            &["x".to_string()],
            &["g".to_string()],
            ImputeMethod::Mean,
        )
        .unwrap();
        let x = out.column("x").unwrap().f64().unwrap();
        assert_relative_eq!(x.get(1).unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(x.get(4).unwrap(), 20.0, epsilon = 1e-12);
    }

    #[test]
    fn median_fill_whole_table_without_grouping() {
        let df = df![
            "x" => [Some(1.0), Some(2.0), None, Some(100.0)],
        ]
        .unwrap();
        let out = impute(&df, &["x".to_string()], &[], ImputeMethod::Median).unwrap();
        let x = out.column("x").unwrap().f64().unwrap();
        assert_relative_eq!(x.get(2).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn knn_fills_every_target_column() {
        let df = df![
            "x" => [Some(1.0), Some(2.0), None, Some(4.0)],
            "y" => [Some(10.0), None, Some(30.0), Some(40.0)],
        ]
        .unwrap();
        let out = impute(
            &df,
            &["x".to_string(), "y".to_string()],
            &[],
            ImputeMethod::Knn { k: 2 },
        )
        .unwrap();
        assert_eq!(out.column("x").unwrap().null_count(), 0);
        assert_eq!(out.column("y").unwrap().null_count(), 0);
    }

    #[test]
    fn input_frame_is_not_mutated() {
        let df = df![
            "x" => [Some(1.0), None, Some(3.0)],
        ]
        .unwrap();
        let _ = impute(&df, &["x".to_string()], &[], ImputeMethod::Linear).unwrap();
        assert_eq!(df.column("x").unwrap().null_count(), 1);
    }

    #[test]
    fn missing_target_column_is_reported() {
        let df = df!["x" => [1.0]].unwrap();
        let err = impute(&df, &["y".to_string()], &[], ImputeMethod::Mean).unwrap_err();
        assert!(matches!(err, PrepError::ColumnNotFound(name) if name == "y"));
    }

    #[test]
    fn spline_falls_back_on_tiny_groups() {
        let df = df![
            "x" => [Some(1.0), None, Some(3.0)],
        ]
        .unwrap();
        let out = impute(&df, &["x".to_string()], &[], ImputeMethod::Spline).unwrap();
        let x = out.column("x").unwrap().f64().unwrap();
        assert_relative_eq!(x.get(1).unwrap(), 2.0, epsilon = 1e-12);
    }
}
