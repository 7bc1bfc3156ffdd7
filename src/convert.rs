//! Semantic type coercion for table columns.
//!
//! Columns are converted value by value so a failure can name the exact
//! offending value. Table-level conversion is tolerant: a column that
//! fails to convert is logged and left as-is while the rest proceed.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::warn;

use crate::error::{PrepError, Result};
use crate::frame::render_value;

/// Target semantic type for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
}

impl SemanticType {
    /// Name used in error messages and configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SemanticType {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "text" | "str" => Ok(Self::Text),
            "boolean" | "bool" => Ok(Self::Boolean),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            _ => Err(PrepError::conversion(s, "supported semantic type")),
        }
    }
}

/// Convert a single column to the given semantic type.
///
/// Fails with `ColumnNotFound` if the column is absent and with
/// `Conversion` on the first value that cannot be coerced.
pub fn convert_column(df: &DataFrame, name: &str, target: SemanticType) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| PrepError::ColumnNotFound(name.to_string()))?;
    let height = df.height();

    match target {
        SemanticType::Integer => {
            let mut out: Vec<Option<i64>> = Vec::with_capacity(height);
            for i in 0..height {
                out.push(to_integer(&column.get(i)?)?);
            }
            Ok(Series::new(name.into(), out))
        }
        SemanticType::Float => {
            let mut out: Vec<Option<f64>> = Vec::with_capacity(height);
            for i in 0..height {
                out.push(to_float(&column.get(i)?)?);
            }
            Ok(Series::new(name.into(), out))
        }
        SemanticType::Text => {
            let mut out: Vec<Option<String>> = Vec::with_capacity(height);
            for i in 0..height {
                let value = column.get(i)?;
                out.push(match value {
                    AnyValue::Null => None,
                    other => Some(render_value(&other)),
                });
            }
            Ok(Series::new(name.into(), out))
        }
        SemanticType::Boolean => {
            let mut out: Vec<Option<bool>> = Vec::with_capacity(height);
            for i in 0..height {
                out.push(to_boolean(&column.get(i)?)?);
            }
            Ok(Series::new(name.into(), out))
        }
        SemanticType::Timestamp => {
            let mut out: Vec<Option<i32>> = Vec::with_capacity(height);
            for i in 0..height {
                out.push(to_epoch_days(&column.get(i)?)?);
            }
            Ok(Series::new(name.into(), out).cast(&DataType::Date)?)
        }
    }
}

/// Convert every listed column of the table.
///
/// Per-column failures are logged as warnings and that column is left
/// unconverted; remaining columns still get processed.
pub fn convert_frame(mut df: DataFrame, column_types: &BTreeMap<String, String>) -> DataFrame {
    for (name, type_name) in column_types {
        let converted = SemanticType::from_str(type_name)
            .and_then(|target| convert_column(&df, name, target));
        match converted {
            Ok(series) => {
                // Replacing an existing column never changes the height.
                if let Err(e) = df.with_column(series) {
                    warn!(column = %name, "failed to attach converted column: {e}");
                }
            }
            Err(e) => warn!(column = %name, "conversion skipped: {e}"),
        }
    }
    df
}

fn to_integer(value: &AnyValue<'_>) -> Result<Option<i64>> {
    match value {
        AnyValue::Null => Ok(None),
        AnyValue::Int8(v) => Ok(Some(i64::from(*v))),
        AnyValue::Int16(v) => Ok(Some(i64::from(*v))),
        AnyValue::Int32(v) => Ok(Some(i64::from(*v))),
        AnyValue::Int64(v) => Ok(Some(*v)),
        AnyValue::UInt8(v) => Ok(Some(i64::from(*v))),
        AnyValue::UInt16(v) => Ok(Some(i64::from(*v))),
        AnyValue::UInt32(v) => Ok(Some(i64::from(*v))),
        AnyValue::UInt64(v) => Ok(Some(*v as i64)),
        AnyValue::Float32(v) => float_to_integer(f64::from(*v)),
        AnyValue::Float64(v) => float_to_integer(*v),
        AnyValue::Boolean(v) => Ok(Some(i64::from(*v))),
        AnyValue::String(s) => parse_integer(s),
        AnyValue::StringOwned(s) => parse_integer(s.as_str()),
        other => Err(PrepError::conversion(render_value(other), "integer")),
    }
}

fn parse_integer(s: &str) -> Result<Option<i64>> {
    s.trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| PrepError::conversion(s, "integer"))
}

// NaN and the infinities have no integer counterpart; an `as` cast would
// quietly turn them into 0 or a saturated extreme.
fn float_to_integer(v: f64) -> Result<Option<i64>> {
    if v.is_finite() {
        Ok(Some(v as i64))
    } else {
        Err(PrepError::conversion(v.to_string(), "integer"))
    }
}

fn to_float(value: &AnyValue<'_>) -> Result<Option<f64>> {
    match value {
        AnyValue::Null => Ok(None),
        AnyValue::Int8(v) => Ok(Some(f64::from(*v))),
        AnyValue::Int16(v) => Ok(Some(f64::from(*v))),
        AnyValue::Int32(v) => Ok(Some(f64::from(*v))),
        AnyValue::Int64(v) => Ok(Some(*v as f64)),
        AnyValue::UInt8(v) => Ok(Some(f64::from(*v))),
        AnyValue::UInt16(v) => Ok(Some(f64::from(*v))),
        AnyValue::UInt32(v) => Ok(Some(f64::from(*v))),
        AnyValue::UInt64(v) => Ok(Some(*v as f64)),
        AnyValue::Float32(v) => Ok(Some(f64::from(*v))),
        AnyValue::Float64(v) => Ok(Some(*v)),
        AnyValue::Boolean(v) => Ok(Some(f64::from(u8::from(*v)))),
        AnyValue::String(s) => parse_float(s),
        AnyValue::StringOwned(s) => parse_float(s.as_str()),
        other => Err(PrepError::conversion(render_value(other), "float")),
    }
}

fn parse_float(s: &str) -> Result<Option<f64>> {
    s.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| PrepError::conversion(s, "float"))
}

fn to_boolean(value: &AnyValue<'_>) -> Result<Option<bool>> {
    match value {
        AnyValue::Null => Ok(None),
        AnyValue::Boolean(v) => Ok(Some(*v)),
        AnyValue::String(s) => parse_boolean(s),
        AnyValue::StringOwned(s) => parse_boolean(s.as_str()),
        other => Err(PrepError::conversion(render_value(other), "boolean")),
    }
}

fn parse_boolean(s: &str) -> Result<Option<bool>> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        _ => Err(PrepError::conversion(s, "boolean")),
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

fn to_epoch_days(value: &AnyValue<'_>) -> Result<Option<i32>> {
    match value {
        AnyValue::Null => Ok(None),
        AnyValue::Date(days) => Ok(Some(*days)),
        AnyValue::Datetime(v, unit, _) => {
            let seconds = match unit {
                TimeUnit::Nanoseconds => v.div_euclid(1_000_000_000),
                TimeUnit::Microseconds => v.div_euclid(1_000_000),
                TimeUnit::Milliseconds => v.div_euclid(1_000),
            };
            Ok(Some(seconds.div_euclid(SECONDS_PER_DAY) as i32))
        }
        AnyValue::String(s) => parse_date(s).map(|d| Some(date_to_epoch_days(d))),
        AnyValue::StringOwned(s) => parse_date(s.as_str()).map(|d| Some(date_to_epoch_days(d))),
        other => Err(PrepError::conversion(render_value(other), "timestamp")),
    }
}

/// Parse a calendar date from the formats the raw extracts use.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();

    // Year-month shorthand like "2023-04".
    if trimmed.len() == 7 && trimmed.as_bytes()[4] == b'-' {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d") {
            return Ok(date);
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.date());
        }
    }

    Err(PrepError::conversion(s, "timestamp"))
}

/// Days from the Unix epoch to the given date.
pub fn date_to_epoch_days(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    date.signed_duration_since(epoch).num_days() as i32
}

/// Date for a days-from-epoch offset.
pub fn epoch_days_to_date(days: i32) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    epoch + chrono::Duration::days(i64::from(days))
}
