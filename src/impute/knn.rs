//! K-nearest-neighbor imputation within a group.
//!
//! Rows are compared across all target columns at once using the
//! NaN-aware Euclidean distance, so a row's neighbors are the rows that
//! look most similar on whatever coordinates both happen to have.

use crate::stats;

/// Default neighbor count, matching the pipeline configuration default.
pub const DEFAULT_K_NEIGHBORS: usize = 5;

/// Fill missing cells in place.
///
/// `columns` is column-major: one buffer per target column, all of the
/// same (group) length. Fills are computed from the original values and
/// applied afterwards, so earlier fills never shift later distances.
pub fn fill(columns: &mut [Vec<Option<f64>>], k: usize) {
    if columns.is_empty() {
        return;
    }
    let rows = columns[0].len();
    let k = k.max(1);

    let mut patches: Vec<(usize, usize, f64)> = Vec::new();
    for (c, column) in columns.iter().enumerate() {
        for r in 0..rows {
            if column[r].is_some() {
                continue;
            }
            if let Some(value) = impute_cell(columns, r, c, k) {
                patches.push((c, r, value));
            }
        }
    }

    for (c, r, value) in patches {
        columns[c][r] = Some(value);
    }
}

fn impute_cell(columns: &[Vec<Option<f64>>], row: usize, col: usize, k: usize) -> Option<f64> {
    let rows = columns[0].len();

    // Candidate donors: rows that have the value, ranked by distance.
    let mut donors: Vec<(f64, f64)> = Vec::new();
    for other in 0..rows {
        if other == row {
            continue;
        }
        let Some(value) = columns[col][other] else { continue };
        if let Some(distance) = nan_euclidean(columns, row, other) {
            donors.push((distance, value));
        }
    }

    if donors.is_empty() {
        // No comparable rows at all; fall back to the column average.
        let present = stats::present(&columns[col]);
        return if present.is_empty() {
            None
        } else {
            Some(stats::mean(&present))
        };
    }

    donors.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    donors.truncate(k);

    // Exact matches dominate: average them unweighted.
    let exact: Vec<f64> = donors
        .iter()
        .filter(|(d, _)| *d == 0.0)
        .map(|(_, v)| *v)
        .collect();
    if !exact.is_empty() {
        return Some(stats::mean(&exact));
    }

    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;
    for (distance, value) in donors {
        let weight = 1.0 / distance;
        weight_sum += weight;
        value_sum += weight * value;
    }
    Some(value_sum / weight_sum)
}

/// Euclidean distance between two rows over the coordinates both have,
/// scaled up for the coordinates either is missing. `None` when the rows
/// share no coordinate.
fn nan_euclidean(columns: &[Vec<Option<f64>>], a: usize, b: usize) -> Option<f64> {
    let total = columns.len();
    let mut shared = 0usize;
    let mut sum_sq = 0.0;

    for column in columns {
        if let (Some(x), Some(y)) = (column[a], column[b]) {
            shared += 1;
            sum_sq += (x - y).powi(2);
        }
    }

    if shared == 0 {
        None
    } else {
        Some((total as f64 / shared as f64 * sum_sq).sqrt())
    }
}
