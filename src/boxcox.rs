//! Per-group Box-Cox power transform with persisted lambda parameters.
//!
//! Every (category, subcategory) group gets its own fitted lambda; the
//! lambda table is the state needed to invert the transform in a later
//! run. Constant groups are skipped with a null lambda and pass through
//! both directions unchanged.

use std::collections::HashMap;

use polars::prelude::*;
use tracing::warn;

use crate::error::{PrepError, Result};
use crate::frame::{self, render_value};

/// Lambdas this close to zero use the log form of the transform.
const LAMBDA_EPS: f64 = 1e-10;

/// Apply the Box-Cox transform with a given lambda.
///
/// For lambda != 0: `y = (x^lambda - 1) / lambda`; for lambda == 0:
/// `y = ln(x)`.
pub fn boxcox(series: &[f64], lambda: f64) -> Vec<f64> {
    series
        .iter()
        .map(|&x| {
            if lambda.abs() < LAMBDA_EPS {
                x.ln()
            } else {
                (x.powf(lambda) - 1.0) / lambda
            }
        })
        .collect()
}

/// Invert the Box-Cox transform.
///
/// For lambda != 0: `x = (lambda * y + 1)^(1/lambda)`; for lambda == 0:
/// `x = exp(y)`. Values the forward transform could not have produced
/// yield NaN.
pub fn inv_boxcox(transformed: &[f64], lambda: f64) -> Vec<f64> {
    transformed
        .iter()
        .map(|&y| {
            if lambda.abs() < LAMBDA_EPS {
                y.exp()
            } else {
                let val = lambda * y + 1.0;
                if val <= 0.0 {
                    f64::NAN
                } else {
                    val.powf(1.0 / lambda)
                }
            }
        })
        .collect()
}

/// Find the Box-Cox lambda by maximum likelihood.
///
/// Coarse grid search over [-2, 2] followed by a finer pass around the
/// best candidate.
pub fn boxcox_lambda(series: &[f64]) -> f64 {
    let mut best_lambda = 1.0;
    let mut best_llf = f64::NEG_INFINITY;

    for i in -200..=200 {
        let lambda = f64::from(i) / 100.0;
        let llf = boxcox_llf(series, lambda);
        if llf > best_llf {
            best_llf = llf;
            best_lambda = lambda;
        }
    }

    let start = (best_lambda - 0.1).max(-2.0);
    let end = (best_lambda + 0.1).min(2.0);
    for i in 0..=100 {
        let lambda = start + (end - start) * f64::from(i) / 100.0;
        let llf = boxcox_llf(series, lambda);
        if llf > best_llf {
            best_llf = llf;
            best_lambda = lambda;
        }
    }

    best_lambda
}

/// Log-likelihood of the transformed data under a normal model,
/// ignoring constant terms.
fn boxcox_llf(series: &[f64], lambda: f64) -> f64 {
    let n = series.len();
    if n < 2 {
        return f64::NEG_INFINITY;
    }

    let transformed = boxcox(series, lambda);
    if transformed.iter().any(|x| !x.is_finite()) {
        return f64::NEG_INFINITY;
    }

    let mean = transformed.iter().sum::<f64>() / n as f64;
    let variance = transformed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    if variance <= 0.0 {
        return f64::NEG_INFINITY;
    }

    let log_sum: f64 = series.iter().map(|x| x.ln()).sum();
    -0.5 * n as f64 * variance.ln() + (lambda - 1.0) * log_sum
}

/// Transform the value column group by group.
///
/// Returns the transformed table together with the lambda table: one row
/// per (category, subcategory) key with a nullable `lambda` column. A
/// null lambda marks a constant group whose values were left unchanged.
///
/// Fails with `InvalidData` when a non-constant group contains missing
/// or non-positive values.
pub fn transform(
    df: &DataFrame,
    value_column: &str,
    category_column: &str,
    subcategory_column: &str,
) -> Result<(DataFrame, DataFrame)> {
    let keys = [category_column.to_string(), subcategory_column.to_string()];
    let mut buffer = frame::numeric_buffer(df, value_column)?;
    let groups = frame::partition(df, &keys)?;

    let mut lambdas: Vec<Option<f64>> = Vec::with_capacity(groups.len());
    let mut first_rows: Vec<IdxSize> = Vec::with_capacity(groups.len());

    for group in &groups {
        first_rows.push(group.first_row() as IdxSize);

        let mut values: Vec<f64> = Vec::with_capacity(group.rows.len());
        for &row in &group.rows {
            match buffer[row] {
                Some(v) => values.push(v),
                None => {
                    return Err(PrepError::InvalidData {
                        group: group.label.clone(),
                        reason: format!("missing value in column '{value_column}'"),
                    })
                }
            }
        }

        if values.iter().all(|&v| v == values[0]) {
            warn!(
                group = %group.label,
                "skipping Box-Cox transformation for constant data"
            );
            lambdas.push(None);
            continue;
        }

        if let Some(&bad) = values.iter().find(|&&v| v <= 0.0) {
            return Err(PrepError::InvalidData {
                group: group.label.clone(),
                reason: format!("non-positive value {bad} in column '{value_column}'"),
            });
        }

        let lambda = boxcox_lambda(&values);
        lambdas.push(Some(lambda));
        for (&row, value) in group.rows.iter().zip(boxcox(&values, lambda)) {
            buffer[row] = Some(value);
        }
    }

    let mut out = df.clone();
    frame::replace_column(&mut out, value_column, buffer)?;

    let idx = IdxCa::from_vec("first_rows".into(), first_rows);
    let mut lambda_table = df
        .select([category_column, subcategory_column])?
        .take(&idx)?;
    lambda_table.with_column(Series::new("lambda".into(), lambdas))?;

    Ok((out, lambda_table))
}

/// Invert a previous transform using the persisted lambda table.
///
/// Every group key present in the table must resolve to a lambda row;
/// otherwise this fails with `MissingLambda` naming the key. Null-lambda
/// groups pass through unchanged. The returned table carries the same
/// columns as the input; lambda values never appear in it.
pub fn inverse_transform(
    df: &DataFrame,
    value_column: &str,
    category_column: &str,
    subcategory_column: &str,
    lambda_table: &DataFrame,
) -> Result<DataFrame> {
    let keys = [category_column.to_string(), subcategory_column.to_string()];
    frame::ensure_columns(lambda_table, &keys)?;
    let lambda_column = frame::numeric_buffer(lambda_table, "lambda")?;

    // Group key -> stored lambda (None marks a constant group).
    let mut stored: HashMap<(String, String), Option<f64>> = HashMap::new();
    let cats = lambda_table.column(category_column)?;
    let subs = lambda_table.column(subcategory_column)?;
    for (i, lambda) in lambda_column.iter().enumerate() {
        let key = (render_value(&cats.get(i)?), render_value(&subs.get(i)?));
        stored.insert(key, *lambda);
    }

    let mut buffer = frame::numeric_buffer(df, value_column)?;
    let groups = frame::partition(df, &keys)?;
    let df_cats = df.column(category_column)?;
    let df_subs = df.column(subcategory_column)?;

    for group in &groups {
        let first = group.first_row();
        let key = (
            render_value(&df_cats.get(first)?),
            render_value(&df_subs.get(first)?),
        );
        let lambda = match stored.get(&key) {
            Some(lambda) => *lambda,
            None => return Err(PrepError::MissingLambda(group.label.clone())),
        };
        let Some(lambda) = lambda else { continue };

        let values: Vec<f64> = group
            .rows
            .iter()
            .filter_map(|&row| buffer[row])
            .collect();
        let inverted = inv_boxcox(&values, lambda);
        let mut it = inverted.into_iter();
        for &row in &group.rows {
            if buffer[row].is_some() {
                buffer[row] = it.next();
            }
        }
    }

    let mut out = df.clone();
    frame::replace_column(&mut out, value_column, buffer)?;
    Ok(out)
}
