//! Monthly coverage diagnostics for grouped time series.
//!
//! For every group this reports the span of calendar months actually
//! covered, the span expected up to the most recently closed month, and
//! whether the difference points at in-between or tail-end gaps. The
//! stage is read-only: it produces a report table and never feeds back
//! into the pipeline data.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use crate::convert::{self, SemanticType};
use crate::error::{PrepError, Result};
use crate::frame;

const WARN_IN_BETWEEN: &str = "In-between months are missing";
const WARN_TAIL_END: &str = "Tail-end data is missing";

/// Inclusive count of calendar months spanned by `[first, last]`.
fn month_span(first: NaiveDate, last: NaiveDate) -> i32 {
    (last.year() - first.year()) * 12 + (last.month() as i32 - first.month() as i32) + 1
}

/// First day of the calendar month preceding `today`, i.e. the most
/// recently closed reporting month.
pub fn closed_month_floor(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is always valid")
}

/// Build the gap report for the table.
///
/// The reference date is injected rather than read from the process
/// clock so runs are reproducible; callers normally pass today's date.
///
/// # Arguments
/// * `df` - Input table (not modified)
/// * `group_by` - Grouping columns, one report row per distinct key
/// * `month_column` - Column holding the reporting period
/// * `today` - Reference date for the closed-month calculation
pub fn check_gaps(
    df: &DataFrame,
    group_by: &[String],
    month_column: &str,
    today: NaiveDate,
) -> Result<DataFrame> {
    let months = convert::convert_column(df, month_column, SemanticType::Timestamp)?;
    let days = months.cast(&DataType::Int32)?;
    let days = days.i32()?;

    let groups = frame::partition(df, group_by)?;
    let actual_last = closed_month_floor(today);

    let mut first_periods: Vec<i32> = Vec::with_capacity(groups.len());
    let mut last_periods: Vec<i32> = Vec::with_capacity(groups.len());
    let mut month_gaps: Vec<i32> = Vec::with_capacity(groups.len());
    let mut actual_gaps: Vec<i32> = Vec::with_capacity(groups.len());
    let mut delta_gaps: Vec<i32> = Vec::with_capacity(groups.len());
    let mut statuses: Vec<String> = Vec::with_capacity(groups.len());
    let mut pass_fails: Vec<&'static str> = Vec::with_capacity(groups.len());
    let mut first_rows: Vec<IdxSize> = Vec::with_capacity(groups.len());

    for group in &groups {
        let mut min_day: Option<i32> = None;
        let mut max_day: Option<i32> = None;
        for &row in &group.rows {
            if let Some(day) = days.get(row) {
                min_day = Some(min_day.map_or(day, |m| m.min(day)));
                max_day = Some(max_day.map_or(day, |m| m.max(day)));
            }
        }
        let (min_day, max_day) = match (min_day, max_day) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(PrepError::InvalidData {
                    group: group.label.clone(),
                    reason: format!("no parseable periods in column '{month_column}'"),
                })
            }
        };

        let first = convert::epoch_days_to_date(min_day);
        let last = convert::epoch_days_to_date(max_day);

        let month_gap = month_span(first, last);
        let actual_month_gap = month_span(first, actual_last);
        // The pass/fail threshold uses the same span formula up to the
        // closed month, recomputed per group from its first period.
        let expected_month_gap = month_span(first, actual_last);

        let mut warnings: Vec<&str> = Vec::new();
        if month_gap < expected_month_gap {
            warnings.push(WARN_IN_BETWEEN);
        }
        if actual_month_gap > month_gap {
            warnings.push(WARN_TAIL_END);
        }
        let status = if warnings.is_empty() {
            "Pass".to_string()
        } else {
            warnings.join("; ")
        };
        let pass_fail = if status.contains("missing") { "Fail" } else { "Pass" };

        first_rows.push(group.first_row() as IdxSize);
        first_periods.push(min_day);
        last_periods.push(max_day);
        month_gaps.push(month_gap);
        actual_gaps.push(actual_month_gap);
        delta_gaps.push(actual_month_gap - month_gap);
        statuses.push(status);
        pass_fails.push(pass_fail);
    }

    let computed = vec![
        Series::new("first_period".into(), first_periods).cast(&DataType::Date)?,
        Series::new("last_period".into(), last_periods).cast(&DataType::Date)?,
        Series::new("month_gap".into(), month_gaps),
        Series::new("actual_month_gap".into(), actual_gaps),
        Series::new("delta_month_gap".into(), delta_gaps),
        Series::new("status".into(), statuses),
        Series::new(
            "pass_fail".into(),
            pass_fails.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        ),
    ];

    if group_by.is_empty() {
        let columns = computed.into_iter().map(|s| s.into_column()).collect();
        return Ok(DataFrame::new(columns)?);
    }

    // Key columns keep their original dtypes by taking each group's
    // first row from the input.
    let idx = IdxCa::from_vec("first_rows".into(), first_rows);
    let mut report = df.select(group_by.iter().map(String::as_str))?.take(&idx)?;
    for series in computed {
        report.with_column(series)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_span_is_inclusive() {
        assert_eq!(month_span(ymd(2023, 1, 1), ymd(2023, 6, 1)), 6);
        assert_eq!(month_span(ymd(2023, 1, 15), ymd(2023, 1, 20)), 1);
        assert_eq!(month_span(ymd(2022, 11, 1), ymd(2023, 2, 1)), 4);
    }

    #[test]
    fn closed_month_floor_handles_january() {
        assert_eq!(closed_month_floor(ymd(2023, 9, 14)), ymd(2023, 8, 1));
        assert_eq!(closed_month_floor(ymd(2024, 1, 2)), ymd(2023, 12, 1));
    }

    #[test]
    fn complete_group_passes() {
        let df = df![
            "entity" => ["a", "a", "a"],
            "months" => ["2023-06-01", "2023-07-01", "2023-08-01"],
        ]
        .unwrap();
        let report = check_gaps(&df, &["entity".to_string()], "months", ymd(2023, 9, 14)).unwrap();
        assert_eq!(report.height(), 1);
        let status = report.column("status").unwrap().str().unwrap();
        assert_eq!(status.get(0), Some("Pass"));
        let pass = report.column("pass_fail").unwrap().str().unwrap();
        assert_eq!(pass.get(0), Some("Pass"));
    }

    #[test]
    fn tail_gap_example_from_monthly_data() {
        // Months 2023-01 .. 2023-06, reference date in September so the
        // closed month is 2023-08.
        let months: Vec<String> = (1..=6).map(|m| format!("2023-{m:02}-01")).collect();
        let df = df![
            "entity" => vec!["a"; 6],
            "months" => months,
        ]
        .unwrap();

        let report = check_gaps(&df, &["entity".to_string()], "months", ymd(2023, 9, 10)).unwrap();
        let gap = report.column("month_gap").unwrap().i32().unwrap();
        assert_eq!(gap.get(0), Some(6));
        let actual = report.column("actual_month_gap").unwrap().i32().unwrap();
        assert_eq!(actual.get(0), Some(8));
        let delta = report.column("delta_month_gap").unwrap().i32().unwrap();
        assert_eq!(delta.get(0), Some(2));
        let status = report.column("status").unwrap().str().unwrap();
        assert!(status.get(0).unwrap().contains(WARN_TAIL_END));
        let pass = report.column("pass_fail").unwrap().str().unwrap();
        assert_eq!(pass.get(0), Some("Fail"));
    }

    #[test]
    fn groups_are_reported_independently() {
        let df = df![
            "entity" => ["a", "a", "b"],
            "months" => ["2023-07-01", "2023-08-01", "2023-08-01"],
        ]
        .unwrap();
        let report = check_gaps(&df, &["entity".to_string()], "months", ymd(2023, 9, 1)).unwrap();
        assert_eq!(report.height(), 2);
        let gap = report.column("month_gap").unwrap().i32().unwrap();
        assert_eq!(gap.get(0), Some(2));
        assert_eq!(gap.get(1), Some(1));
    }

    #[test]
    fn input_table_is_left_untouched() {
        let df = df![
            "entity" => ["a"],
            "months" => ["2023-08-01"],
        ]
        .unwrap();
        let before = df.clone();
        let _ = check_gaps(&df, &["entity".to_string()], "months", ymd(2023, 9, 1)).unwrap();
        assert!(df.equals(&before));
    }
}
