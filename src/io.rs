//! Reading Core exports and writing Derived tables.
//!
//! CSV and Parquet are supported, picked by file extension.

use crate::error::{Result, ResultExt as _, SurveyError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Rows scanned when inferring CSV column types.
const CSV_INFER_SCHEMA_ROWS: usize = 10_000;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Loads a table from a `.csv` or `.parquet` file.
///
/// # Errors
///
/// Returns an error for other extensions or when the file cannot be read.
pub fn load_df(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let ext = extension(path);

    let df = match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(CSV_INFER_SCHEMA_ROWS))
            .with_has_header(true)
            .finish()
            .and_then(LazyFrame::collect)
            .with_context(|| format!("Failed to read CSV {}", path.display()))?,
        "parquet" => ParquetReader::new(File::open(path)?)
            .finish()
            .with_context(|| format!("Failed to read Parquet {}", path.display()))?,
        _ => {
            return Err(SurveyError::Other(format!(
                "Unsupported file extension: '{ext}' ({})",
                path.display()
            )));
        }
    };

    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded table"
    );
    Ok(df)
}

/// Writes a table as Parquet when the extension is `.parquet`, CSV otherwise.
///
/// # Errors
///
/// Returns an error when the file cannot be created or written.
pub fn save_df(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    if extension(path) == "parquet" {
        let file = File::create(path).context("Failed to create Parquet file")?;
        ParquetWriter::new(file)
            .finish(df)
            .context("Failed to write Parquet file")?;
    } else {
        let file = File::create(path).context("Failed to create CSV file")?;
        CsvWriter::new(file)
            .include_header(true)
            .finish(df)
            .context("Failed to write CSV file")?;
    }

    tracing::debug!(path = %path.display(), rows = df.height(), "Saved table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_both_formats() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut df = df!(
            "response_id" => ["r1", "r2"],
            "boardings" => [1i64, 3]
        )?;

        for name in ["derived.csv", "derived.parquet"] {
            let path = dir.path().join(name);
            save_df(&mut df, &path)?;
            let loaded = load_df(&path)?;
            assert!(loaded.equals_missing(&df), "{name} did not round-trip");
        }
        Ok(())
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_df("survey.xlsx").unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }
}
