//! # survey-standardize
//!
//! Command-line entry point for the standardization pipeline.
//!
//! ```bash
//! survey-standardize validate --input bart_2024_core.csv
//! survey-standardize process --input bart_2024_core.csv \
//!     --crosswalk reference/canonical_route_crosswalk.csv \
//!     --partition-root warehouse --operator BART --year 2024
//! survey-standardize explain TRANSFER_TYPE
//! ```
//!
//! Set `RUST_LOG=debug` to see per-stage log lines.

#![warn(clippy::all, rust_2018_idioms)]

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    survey_standardize::logging::init()?;

    let cli = cli::Cli::parse();
    cli::run_command(cli.command).inspect_err(|e| tracing::error!("{e:#}"))
}
