//! Group partitioning and column buffer helpers.
//!
//! Per-group stages never reorder or resize the table: they partition row
//! indices by key, compute on extracted buffers, and merge patched columns
//! back once. Groups are returned in order of first appearance so a run is
//! deterministic for a given input.

use std::collections::HashMap;

use polars::prelude::*;

use crate::error::{PrepError, Result};

/// One partition of a table: the rows sharing a group key.
#[derive(Debug, Clone)]
pub struct Group {
    /// Human-readable key, used in logs and error messages.
    pub label: String,
    /// Row indices belonging to this group, in original order.
    pub rows: Vec<usize>,
}

impl Group {
    /// Index of the group's first row, handy for materializing key values.
    pub fn first_row(&self) -> usize {
        self.rows[0]
    }
}

/// Render a cell value without the quoting `AnyValue`'s `Display` adds to
/// strings. Nulls render as `null`.
pub fn render_value(value: &AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => "null".to_string(),
        AnyValue::String(s) => (*s).to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => format!("{other}"),
    }
}

/// Fail with `ColumnNotFound` unless every named column exists.
pub fn ensure_columns(df: &DataFrame, columns: &[String]) -> Result<()> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(PrepError::ColumnNotFound(name.clone()));
        }
    }
    Ok(())
}

/// Partition row indices by the values of the key columns.
///
/// With an empty key list the whole table forms a single group labelled
/// `(all)`, which lets grouped and ungrouped code paths share one loop.
pub fn partition(df: &DataFrame, keys: &[String]) -> Result<Vec<Group>> {
    let height = df.height();
    if keys.is_empty() {
        return Ok(vec![Group {
            label: "(all)".to_string(),
            rows: (0..height).collect(),
        }]);
    }
    ensure_columns(df, keys)?;

    // Render each key column once; formatted values double as hash keys.
    let mut rendered: Vec<Vec<String>> = Vec::with_capacity(keys.len());
    for name in keys {
        let column = df.column(name)?;
        let mut values = Vec::with_capacity(height);
        for i in 0..height {
            values.push(render_value(&column.get(i)?));
        }
        rendered.push(values);
    }

    let mut order: Vec<Group> = Vec::new();
    let mut seen: HashMap<Vec<String>, usize> = HashMap::new();
    for row in 0..height {
        let key: Vec<String> = rendered.iter().map(|col| col[row].clone()).collect();
        match seen.get(&key) {
            Some(&slot) => order[slot].rows.push(row),
            None => {
                let label = format!("({})", key.join(", "));
                seen.insert(key, order.len());
                order.push(Group {
                    label,
                    rows: vec![row],
                });
            }
        }
    }

    Ok(order)
}

/// Extract a column as an optional f64 buffer, casting numerics as needed.
pub fn numeric_buffer(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PrepError::ColumnNotFound(name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().collect())
}

/// Replace a column with a patched buffer, preserving height and order.
pub fn replace_column(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}
