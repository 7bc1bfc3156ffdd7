//! # tsprep
//!
//! Batch conditioning for grouped time-series tables: semantic type
//! coercion, monthly coverage diagnostics, missing-value imputation,
//! outlier treatment, and a per-group Box-Cox transform with a stored
//! inverse.
//!
//! Stages compose into one deterministic pipeline; each consumes and
//! returns a full table, and grouped statistics never leak across group
//! boundaries.
//!
//! # Example
//!
//! ```
//! use polars::prelude::*;
//! use tsprep::impute::{impute, ImputeMethod};
//!
//! let df = df![
//!     "entity" => ["a", "a", "a", "a"],
//!     "sales" => [Some(1.0), None, None, Some(4.0)],
//! ].unwrap();
//!
//! let filled = impute(
//!     &df,
//!     &["sales".to_string()],
//!     &["entity".to_string()],
//!     ImputeMethod::Linear,
//! ).unwrap();
//! assert_eq!(filled.column("sales").unwrap().null_count(), 0);
//! ```

pub mod boxcox;
pub mod config;
pub mod convert;
pub mod error;
pub mod frame;
pub mod gaps;
pub mod impute;
pub mod io;
pub mod outlier;
pub mod pipeline;
pub mod stats;
pub mod window;

pub use error::{PrepError, Result};

pub mod prelude {
    pub use crate::boxcox::{inverse_transform, transform};
    pub use crate::config::PipelineConfig;
    pub use crate::convert::{convert_frame, SemanticType};
    pub use crate::error::{PrepError, Result};
    pub use crate::gaps::check_gaps;
    pub use crate::impute::{impute, ImputeMethod};
    pub use crate::outlier::{handle_outliers, OutlierMethod};
}
