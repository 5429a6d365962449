//! Logging setup for the survey-standardize binary
//!
//! Log lines go to the console and to rotating files in the platform data
//! directory, so a failed batch run can be diagnosed after the fact.
//!
//! ## Features
//!
//! - **File Rotation**: Daily files, 10 retained
//! - **Structured Fields**: Stage, survey and crosswalk version travel as span fields
//! - **Multiple Targets**: Console + files
//! - **Error Tracking**: Separate `error` log holding warnings and errors only
//!
//! ## Usage
//!
//! ```no_run
//! use survey_standardize::logging;
//!
//! logging::init()?;
//! tracing::info!("Standardization started");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const APP_DIR: &str = "survey-standardize";
const LOG_PREFIX: &str = "survey-standardize";
const ERROR_LOG_PREFIX: &str = "error";
const RETAINED_LOG_FILES: usize = 10;

/// Log directory under the platform data directory, created on first use.
///
/// - Windows: `%APPDATA%/survey-standardize/logs`
/// - macOS: `~/Library/Application Support/survey-standardize/logs`
/// - Linux: `~/.local/share/survey-standardize/logs`
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    let log_dir = base_dir.join(APP_DIR).join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

fn appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(RETAINED_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create '{prefix}' file appender"))
}

/// Installs the global subscriber: pretty console output, an all-levels
/// file and a warnings-and-errors file. `RUST_LOG` overrides the default
/// `info` level.
///
/// # Errors
///
/// Returns error if the log directory or the file appenders cannot be created.
pub fn init() -> Result<()> {
    let log_dir = get_log_dir()?;
    let all_logs_appender = appender(&log_dir, LOG_PREFIX)?;
    let error_logs_appender = appender(&log_dir, ERROR_LOG_PREFIX)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .pretty();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), "Logging initialized");
    Ok(())
}

/// Path of today's all-levels log file.
pub fn get_current_log_path() -> Result<PathBuf> {
    let log_dir = get_log_dir()?;
    let today = chrono::Local::now().format("%Y-%m-%d");
    Ok(log_dir.join(format!("{LOG_PREFIX}.{today}.log")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() {
        let log_dir = get_log_dir().expect("Failed to get log dir");
        assert!(log_dir.ends_with("survey-standardize/logs"));
    }

    #[test]
    fn test_current_log_path_is_dated() {
        let path = get_current_log_path().expect("Failed to get log path");
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("survey-standardize."));
        assert!(name.ends_with(".log"));
    }
}
