//! Standardization transforms.
//!
//! Each stage is a pure table function that declares its column contract as a
//! [`FieldDependencies`] value. The validation gate evaluates those
//! declarations up front; [`SurveyTransform::run`] re-checks them against the
//! live table right before the stage executes.

pub mod auto_sufficiency;
pub mod date_time;
pub mod demographics;
pub mod geocoding;
pub mod path_labels;
pub mod tour_purpose;
pub mod transfers;

use crate::config::PipelineConfig;
use crate::dependencies::{FieldDependencies, TransformKind};
use crate::error::{Result, SurveyError};
use crate::frame;
use polars::prelude::*;
use std::collections::HashSet;

pub use auto_sufficiency::AutoSufficiencyTransform;
pub use date_time::DateTimeTransform;
pub use demographics::DemographicsTransform;
pub use geocoding::GeocodingTransform;
pub use path_labels::PathLabelsTransform;
pub use tour_purpose::TourPurposeTransform;
pub use transfers::TransfersTransform;

/// One stage of the standardization pipeline.
pub trait SurveyTransform {
    fn kind(&self) -> TransformKind;

    /// Columns this stage reads, writes and drops, and the rules its input
    /// must satisfy.
    fn dependencies(&self) -> FieldDependencies;

    /// Applies the stage without checking its requirements.
    fn apply(&self, df: DataFrame) -> Result<DataFrame>;

    /// Checks the declared requirements against the table, then applies the
    /// stage.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError::MissingColumns`] when a requirement is violated,
    /// or whatever error the stage itself raises.
    fn run(&self, df: DataFrame) -> Result<DataFrame> {
        let available: HashSet<String> = frame::column_names(&df).into_iter().collect();
        let problems = self.dependencies().violations(&available);
        if !problems.is_empty() {
            return Err(SurveyError::MissingColumns {
                transform: self.kind(),
                problems,
            });
        }

        let _span = tracing::debug_span!("transform", stage = %self.kind()).entered();
        let width = df.width();
        let out = self.apply(df)?;
        tracing::debug!(
            rows = out.height(),
            columns_before = width,
            columns_after = out.width(),
            "Stage applied"
        );
        Ok(out)
    }
}

/// Declarations of every stage, in pipeline order.
pub fn declarations(config: &PipelineConfig) -> Vec<FieldDependencies> {
    vec![
        date_time::dependencies(),
        auto_sufficiency::dependencies(),
        demographics::dependencies(),
        transfers::dependencies(),
        path_labels::dependencies(),
        tour_purpose::dependencies(),
        geocoding::dependencies(config),
    ]
}
