//! Error types for the tsprep library.

use thiserror::Error;

/// Result type alias for preprocessing operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Errors that can occur during preprocessing operations.
#[derive(Error, Debug)]
pub enum PrepError {
    /// A referenced column is absent from the table.
    #[error("column '{0}' does not exist in the table")]
    ColumnNotFound(String),

    /// A value cannot be coerced to the requested semantic type.
    #[error("cannot convert value '{value}' to {target}")]
    Conversion { value: String, target: String },

    /// An unknown strategy name was passed to the imputer or outlier handler.
    #[error("invalid method '{name}': choose from {expected}")]
    InvalidMethod { name: String, expected: String },

    /// Data violates a strategy's preconditions (e.g. non-positive values
    /// supplied to the Box-Cox transform).
    #[error("invalid data in group {group}: {reason}")]
    InvalidData { group: String, reason: String },

    /// The inverse transform could not resolve a group's lambda parameter.
    #[error("missing lambda value for group {0}")]
    MissingLambda(String),

    /// Table engine error.
    #[error("table engine error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Table storage error.
    #[error("storage error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PrepError {
    /// Convenience constructor for conversion failures.
    pub fn conversion(value: impl std::fmt::Display, target: impl Into<String>) -> Self {
        Self::Conversion {
            value: value.to_string(),
            target: target.into(),
        }
    }
}
