//! Pipeline configuration loaded from a YAML settings file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PrepError, Result};
use crate::impute::{ImputeMethod, DEFAULT_K_NEIGHBORS};
use crate::outlier::{OutlierMethod, DEFAULT_THRESHOLD};

/// Settings driving one pipeline run.
///
/// Strategy names stay as plain strings here and are resolved to their
/// closed enum variants up front via [`PipelineConfig::imputation`] and
/// [`PipelineConfig::outlier`], so a typo fails before any per-group
/// work starts.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Column name -> semantic type name for the conversion stage.
    #[serde(default)]
    pub column_types: BTreeMap<String, String>,
    /// Grouping columns shared by the gap check, imputation, and
    /// outlier stages.
    #[serde(default)]
    pub group_by_columns: Vec<String>,
    /// Column holding the reporting period.
    pub month_variable: String,

    #[serde(default = "default_imputation_method")]
    pub imputation_method: String,
    #[serde(default = "default_k_neighbors")]
    pub k_neighbors: usize,
    #[serde(default)]
    pub columns_to_impute: Vec<String>,

    #[serde(default)]
    pub outlier_columns: Vec<String>,
    #[serde(default = "default_outlier_method")]
    pub outlier_method: String,
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: f64,

    /// Value/category/subcategory columns for the Box-Cox stage.
    pub value_column: String,
    pub category_column: String,
    pub subcategory_column: String,

    // Storage paths.
    pub source_input_path: PathBuf,
    pub dtype_output_path: PathBuf,
    pub gap_check_output_path: PathBuf,
    pub imputed_output_path: PathBuf,
    pub outlier_output_path: PathBuf,
    pub transformed_output_path: PathBuf,
    pub lambda_output_path: PathBuf,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

fn default_imputation_method() -> String {
    "linear".to_string()
}

fn default_k_neighbors() -> usize {
    DEFAULT_K_NEIGHBORS
}

fn default_outlier_method() -> String {
    "zscore".to_string()
}

fn default_outlier_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_overwrite() -> bool {
    true
}

impl PipelineConfig {
    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PrepError::Config(format!("cannot read '{}': {e}", path.display())))?;
        serde_yaml::from_str(&text)
            .map_err(|e| PrepError::Config(format!("cannot parse '{}': {e}", path.display())))
    }

    /// Resolve the configured imputation strategy.
    pub fn imputation(&self) -> Result<ImputeMethod> {
        ImputeMethod::parse(&self.imputation_method, self.k_neighbors)
    }

    /// Resolve the configured outlier strategy.
    pub fn outlier(&self) -> Result<OutlierMethod> {
        OutlierMethod::parse(&self.outlier_method, self.outlier_threshold)
    }
}
