//! Write-once storage for standardized batches.
//!
//! Batches land under `root/operator=<op>/year=<yyyy>/batch_v<N>.parquet`
//! with a `batch_v<N>.meta.json` sidecar. A written batch is never replaced;
//! reprocessing a survey produces the next version.

use crate::error::{Result, ResultExt as _, SurveyError};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const BATCH_PREFIX: &str = "batch_v";
const BATCH_SUFFIX: &str = ".parquet";

/// Partition a batch is written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchKey {
    pub operator: String,
    pub year: i32,
}

impl BatchKey {
    pub fn new(operator: impl Into<String>, year: i32) -> Self {
        Self {
            operator: operator.into(),
            year,
        }
    }

    fn validate(&self) -> Result<()> {
        let operator = self.operator.trim();
        if operator.is_empty()
            || operator.contains(['/', '\\'])
            || operator == "."
            || operator == ".."
        {
            return Err(SurveyError::Config(format!(
                "Operator '{}' cannot be used as a partition name",
                self.operator
            )));
        }
        if !(1000..=9999).contains(&self.year) {
            return Err(SurveyError::Config(format!(
                "Survey year {} is not a four-digit year",
                self.year
            )));
        }
        Ok(())
    }
}

/// Sidecar describing a written batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub key: BatchKey,
    pub version: u32,
    pub rows: usize,
    pub columns: usize,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BatchSink {
    root: PathBuf,
}

impl BatchSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn partition_dir(&self, key: &BatchKey) -> PathBuf {
        self.root
            .join(format!("operator={}", key.operator.trim()))
            .join(format!("year={:04}", key.year))
    }

    /// Highest version already stored for the partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition directory cannot be listed.
    pub fn latest_version(&self, key: &BatchKey) -> Result<Option<u32>> {
        let dir = self.partition_dir(key);
        if !dir.exists() {
            return Ok(None);
        }

        let mut latest = None;
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name();
            if let Some(version) = name.to_str().and_then(parse_version) {
                latest = latest.max(Some(version));
            }
        }
        Ok(latest)
    }

    /// Writes a batch as the next free version of its partition.
    ///
    /// # Errors
    ///
    /// Returns an error for an unusable key, or when the file cannot be
    /// created or written. An existing file is never overwritten.
    pub fn write_batch(&self, df: &mut DataFrame, key: &BatchKey) -> Result<PathBuf> {
        key.validate()?;
        let dir = self.partition_dir(key);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create partition {}", dir.display()))?;

        let version = self.latest_version(key)?.map_or(1, |v| v + 1);
        let path = dir.join(batch_file_name(version));

        write_new_file(&path, |file| {
            ParquetWriter::new(file).finish(df)?;
            Ok(())
        })?;

        let metadata = BatchMetadata {
            key: key.clone(),
            version,
            rows: df.height(),
            columns: df.width(),
            written_at: Utc::now(),
        };
        write_metadata(&path, &metadata)?;

        tracing::info!(
            operator = %key.operator,
            year = key.year,
            version,
            rows = metadata.rows,
            path = %path.display(),
            "Batch written"
        );
        Ok(path)
    }

    /// Reads the sidecar of a stored batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar is missing or malformed.
    pub fn read_metadata(&self, key: &BatchKey, version: u32) -> Result<BatchMetadata> {
        let path = metadata_path(&self.partition_dir(key).join(batch_file_name(version)));
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read batch metadata {}", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn batch_file_name(version: u32) -> String {
    format!("{BATCH_PREFIX}{version}{BATCH_SUFFIX}")
}

fn parse_version(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(BATCH_PREFIX)?
        .strip_suffix(BATCH_SUFFIX)?
        .parse()
        .ok()
}

/// Creates `path`, failing if it exists, and hands it to `write`. A failed
/// write removes the file so it is not counted as a version.
fn write_new_file(path: &Path, write: impl FnOnce(File) -> Result<()>) -> Result<()> {
    let file = File::create_new(path)
        .with_context(|| format!("Refusing to overwrite batch {}", path.display()))?;

    if let Err(err) = write(file) {
        if let Err(cleanup) = fs::remove_file(path) {
            tracing::warn!(
                path = %path.display(),
                error = %cleanup,
                "Failed to remove partially written batch"
            );
        }
        return Err(err).context("Failed to write batch");
    }
    Ok(())
}

fn metadata_path(batch: &Path) -> PathBuf {
    batch.with_extension("meta.json")
}

fn write_metadata(batch: &Path, metadata: &BatchMetadata) -> Result<()> {
    let path = metadata_path(batch);
    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write batch metadata {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> PolarsResult<DataFrame> {
        df!("response_id" => ["r1", "r2"], "boardings" => [1i64, 2])
    }

    #[test]
    fn test_versions_increment_and_never_overwrite() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = BatchSink::new(dir.path());
        let key = BatchKey::new("BART", 2024);

        let first = sink.write_batch(&mut batch()?, &key)?;
        let second = sink.write_batch(&mut batch()?, &key)?;

        assert!(first.ends_with("operator=BART/year=2024/batch_v1.parquet"));
        assert!(second.ends_with("operator=BART/year=2024/batch_v2.parquet"));
        assert_eq!(sink.latest_version(&key)?, Some(2));

        let meta = sink.read_metadata(&key, 1)?;
        assert_eq!(meta.version, 1);
        assert_eq!(meta.rows, 2);
        Ok(())
    }

    #[test]
    fn test_partitions_are_independent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = BatchSink::new(dir.path());
        sink.write_batch(&mut batch()?, &BatchKey::new("BART", 2024))?;

        assert_eq!(sink.latest_version(&BatchKey::new("BART", 2023))?, None);
        assert_eq!(sink.latest_version(&BatchKey::new("Caltrain", 2024))?, None);
        Ok(())
    }

    #[test]
    fn test_rejects_unusable_keys() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = BatchSink::new(dir.path());
        assert!(sink.write_batch(&mut batch()?, &BatchKey::new("../up", 2024)).is_err());
        assert!(sink.write_batch(&mut batch()?, &BatchKey::new("BART", 24)).is_err());
        Ok(())
    }

    #[test]
    fn test_failed_write_leaves_no_version_behind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = BatchSink::new(dir.path());
        let key = BatchKey::new("BART", 2024);
        let partition = sink.partition_dir(&key);
        fs::create_dir_all(&partition)?;

        let path = partition.join(batch_file_name(1));
        let result = write_new_file(&path, |_| {
            Err(SurveyError::DataProcessing("disk full".to_owned()))
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(sink.latest_version(&key)?, None);
        assert!(sink.write_batch(&mut batch()?, &key)?.ends_with("batch_v1.parquet"));
        Ok(())
    }

    #[test]
    fn test_version_parsing_ignores_sidecars() {
        assert_eq!(parse_version("batch_v12.parquet"), Some(12));
        assert_eq!(parse_version("batch_v12.meta.json"), None);
        assert_eq!(parse_version("notes.txt"), None);
    }
}
