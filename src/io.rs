//! Table storage: read and write tabular artifacts by path.
//!
//! Format is picked from the file extension: `.parquet` for Parquet,
//! anything else is treated as CSV with a header row.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::error::{PrepError, Result};

fn io_error(path: &Path, source: std::io::Error) -> PrepError {
    PrepError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
}

/// Read a table from the given path.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(io_error(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        ));
    }

    if is_parquet(path) {
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        Ok(ParquetReader::new(file).finish()?)
    } else {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }
}

/// Write a table to the given path, creating parent directories.
///
/// Refuses to clobber an existing file unless `overwrite` is set.
pub fn write_table(df: &mut DataFrame, path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(io_error(
            path,
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "refusing to overwrite"),
        ));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
        }
    }

    let file = File::create(path).map_err(|e| io_error(path, e))?;
    if is_parquet(path) {
        ParquetWriter::new(file).finish(df)?;
    } else {
        CsvWriter::new(file).include_header(true).finish(df)?;
    }
    Ok(())
}
