//! # survey_standardize - Transit On-Board Survey Standardization
//!
//! Turns preprocessed on-board survey exports (the vendor-agnostic **Core**
//! table) into the canonical **Derived** table: time-of-day buckets,
//! auto-sufficiency, race and language, the technology transfer chain, path
//! labels, tour purpose and trip distances.
//!
//! ## Quick Start
//!
//! ```no_run
//! use survey_standardize::config::PipelineConfig;
//! use survey_standardize::pipeline::{PipelineContext, ProcessOptions, process_survey_with_report};
//! use survey_standardize::reference::Crosswalk;
//!
//! let config = PipelineConfig::from_file("pipeline.json")?;
//! let crosswalk = Crosswalk::load("reference/canonical_route_crosswalk.csv")?;
//! let core = survey_standardize::io::load_df("bart_2024_core.csv")?;
//!
//! let ctx = PipelineContext::new(&config, &crosswalk);
//! let options = ProcessOptions {
//!     survey_name: Some("BART 2024".to_owned()),
//!     ..ProcessOptions::default()
//! };
//! let (derived, report) = process_survey_with_report(core, &ctx, &options)?;
//! println!("{}", report.summary());
//! # Ok::<(), survey_standardize::error::SurveyError>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`codebook`]: Closed vocabularies of every categorical column
//! - [`schema`]: Column names and the Core / Derived field contracts
//! - [`dependencies`]: What each stage reads, writes and requires
//! - [`validation`]: The gate that checks a Core table before any stage runs
//! - [`transforms`]: The standardization stages
//! - [`pipeline`]: Runs the gate, the stages and the output contract check
//! - [`reference`]: Route crosswalk and zone lookup collaborators
//! - [`storage`]: Write-once partitioned batch sink
//! - [`config`], [`error`], [`io`], [`logging`]: Supporting infrastructure
//!
//! ## Key Concepts
//!
//! ### Declared Column Contracts
//!
//! Every stage declares its column effects as a
//! [`dependencies::FieldDependencies`] value. The validation gate walks those
//! declarations in pipeline order, so a run reports every missing input up
//! front instead of failing stage by stage:
//!
//! ```no_run
//! use survey_standardize::config::PipelineConfig;
//! use survey_standardize::dependencies::writers_of;
//! use survey_standardize::transforms::declarations;
//!
//! let declarations = declarations(&PipelineConfig::default());
//! println!("{:?}", writers_of(&declarations, "BEST_MODE"));
//! ```
//!
//! ### Explicit Reference Data
//!
//! The route crosswalk is loaded once and passed to the pipeline by
//! reference through [`pipeline::PipelineContext`]; nothing reads reference
//! data from global state.

#![warn(clippy::all, rust_2018_idioms)]

pub mod codebook;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod frame;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod reference;
pub mod schema;
pub mod storage;
pub mod transforms;
pub mod validation;
