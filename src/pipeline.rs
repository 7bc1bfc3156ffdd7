//! Pipeline orchestration: Convert -> GapCheck -> Impute -> OutlierTreat
//! -> BoxCox, persisting each stage's output.
//!
//! The gap check is a side branch: its report is written but never feeds
//! the next stage. Strategy names are resolved before any stage runs, so
//! a bad method name halts the run before anything is computed.

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::{boxcox, convert, gaps, impute, io, outlier};

/// Everything a pipeline run produces.
#[derive(Debug)]
pub struct PipelineArtifacts {
    pub converted: DataFrame,
    /// Missing when the gap check failed; the failure is logged and the
    /// rest of the pipeline still runs.
    pub gap_report: Option<DataFrame>,
    pub imputed: DataFrame,
    pub treated: DataFrame,
    pub transformed: DataFrame,
    pub lambdas: DataFrame,
}

/// Drop artifact columns the extract tooling adds ("Unnamed: 0" etc).
fn drop_unnamed_columns(df: DataFrame) -> DataFrame {
    let unnamed: Vec<PlSmallStr> = df
        .get_column_names()
        .iter()
        .filter(|name| name.starts_with("Unnamed:"))
        .map(|name| (*name).clone())
        .collect();
    if unnamed.is_empty() {
        df
    } else {
        df.drop_many(unnamed)
    }
}

/// Run every stage on an in-memory table.
///
/// `today` anchors the gap check's closed-month calculation; callers
/// outside of tests pass the current date.
pub fn process(
    input: DataFrame,
    config: &PipelineConfig,
    today: NaiveDate,
) -> Result<PipelineArtifacts> {
    let imputation = config.imputation()?;
    let outlier_method = config.outlier()?;

    let input = drop_unnamed_columns(input);
    info!(rows = input.height(), "starting preprocessing pipeline");

    let converted = convert::convert_frame(input, &config.column_types);

    let gap_report = match gaps::check_gaps(
        &converted,
        &config.group_by_columns,
        &config.month_variable,
        today,
    ) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!("gap check failed: {e}");
            None
        }
    };

    let imputed = impute::impute(
        &converted,
        &config.columns_to_impute,
        &config.group_by_columns,
        imputation,
    )?;

    let treated = outlier::handle_outliers(
        &imputed,
        &config.outlier_columns,
        &config.group_by_columns,
        outlier_method,
    )?;

    let (transformed, lambdas) = boxcox::transform(
        &treated,
        &config.value_column,
        &config.category_column,
        &config.subcategory_column,
    )?;

    info!("preprocessing pipeline completed");
    Ok(PipelineArtifacts {
        converted,
        gap_report,
        imputed,
        treated,
        transformed,
        lambdas,
    })
}

/// Read the source table, run every stage, and persist each artifact.
pub fn run(config: &PipelineConfig, today: NaiveDate) -> Result<()> {
    let input = io::read_table(&config.source_input_path)?;
    let mut artifacts = process(input, config, today)?;

    let mut outputs: Vec<(&mut DataFrame, &std::path::Path)> = vec![
        (&mut artifacts.converted, &config.dtype_output_path),
        (&mut artifacts.imputed, &config.imputed_output_path),
        (&mut artifacts.treated, &config.outlier_output_path),
        (&mut artifacts.transformed, &config.transformed_output_path),
        (&mut artifacts.lambdas, &config.lambda_output_path),
    ];
    if let Some(report) = artifacts.gap_report.as_mut() {
        outputs.push((report, &config.gap_check_output_path));
    }

    for (df, path) in outputs {
        if df.height() == 0 {
            warn!(path = %path.display(), "no data generated, skipping save");
            continue;
        }
        io::write_table(df, path, config.overwrite)?;
        info!(path = %path.display(), rows = df.height(), "artifact written");
    }

    Ok(())
}
