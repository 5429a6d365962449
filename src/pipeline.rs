//! Pipeline orchestration: validation gate, the standardization stages in
//! their fixed order, then the output contract check.
//!
//! # Example
//!
//! ```no_run
//! use survey_standardize::config::PipelineConfig;
//! use survey_standardize::pipeline::{PipelineContext, ProcessOptions, process_survey};
//! use survey_standardize::reference::Crosswalk;
//!
//! let config = PipelineConfig::default();
//! let crosswalk = Crosswalk::load("reference/crosswalk_2024.csv")?;
//! let core = survey_standardize::io::load_df("core.parquet")?;
//!
//! let ctx = PipelineContext::new(&config, &crosswalk);
//! let derived = process_survey(core, &ctx, &ProcessOptions::default())?;
//! println!("{} rows standardized", derived.height());
//! # Ok::<(), survey_standardize::error::SurveyError>(())
//! ```

use crate::config::PipelineConfig;
use crate::dependencies::TransformKind;
use crate::error::{Result, SurveyError};
use crate::frame;
use crate::reference::{RouteTechnologyLookup, ZoneLookup};
use crate::schema;
use crate::transforms::{
    self, AutoSufficiencyTransform, DateTimeTransform, DemographicsTransform, GeocodingTransform,
    PathLabelsTransform, SurveyTransform, TourPurposeTransform, TransfersTransform,
};
use crate::validation;
use polars::prelude::*;
use std::time::{Duration, Instant};

/// Collaborators shared by every stage of a run.
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub config: &'a PipelineConfig,
    pub crosswalk: &'a dyn RouteTechnologyLookup,
    pub geocoder: Option<&'a dyn ZoneLookup>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(config: &'a PipelineConfig, crosswalk: &'a dyn RouteTechnologyLookup) -> Self {
        Self {
            config,
            crosswalk,
            geocoder: None,
        }
    }

    #[must_use]
    pub fn with_geocoder(mut self, geocoder: &'a dyn ZoneLookup) -> Self {
        self.geocoder = Some(geocoder);
        self
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Label carried on every log line of the run.
    pub survey_name: Option<String>,
    pub skip_geocoding: bool,
    pub skip_validation: bool,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub stages_applied: Vec<TransformKind>,
    pub skipped_stages: Vec<TransformKind>,
    pub validation_warnings: Vec<String>,
    pub duration: Duration,
}

impl RunReport {
    pub fn summary(&self) -> String {
        let skipped = if self.skipped_stages.is_empty() {
            String::new()
        } else {
            let names: Vec<_> = self
                .skipped_stages
                .iter()
                .copied()
                .map(TransformKind::as_str)
                .collect();
            format!(" (skipped: {})", names.join(", "))
        };
        format!(
            "{} rows, {} → {} columns, {} stages{skipped}, {} warning(s), {:.2}s",
            self.rows,
            self.columns_before,
            self.columns_after,
            self.stages_applied.len(),
            self.validation_warnings.len(),
            self.duration.as_secs_f64()
        )
    }
}

/// The stages of a run, in execution order.
pub fn standard_stages<'a>(
    ctx: &PipelineContext<'a>,
    options: &ProcessOptions,
) -> Vec<Box<dyn SurveyTransform + 'a>> {
    let mut stages: Vec<Box<dyn SurveyTransform + 'a>> = vec![
        Box::new(DateTimeTransform::new(ctx.config)),
        Box::new(AutoSufficiencyTransform),
        Box::new(DemographicsTransform),
        Box::new(TransfersTransform::new(ctx.crosswalk)),
        Box::new(PathLabelsTransform),
        Box::new(TourPurposeTransform),
    ];
    if !options.skip_geocoding {
        stages.push(Box::new(GeocodingTransform::new(ctx.config, ctx.geocoder)));
    }
    stages
}

/// Standardizes one Core table into the Derived table.
///
/// # Errors
///
/// Returns [`SurveyError::Validation`] when the gate rejects the input,
/// the first stage error otherwise, and [`SurveyError::Contract`] when the
/// output breaks the Derived contract.
pub fn process_survey(
    core: DataFrame,
    ctx: &PipelineContext<'_>,
    options: &ProcessOptions,
) -> Result<DataFrame> {
    process_survey_with_report(core, ctx, options).map(|(df, _)| df)
}

/// Same as [`process_survey`], also returning a [`RunReport`].
///
/// # Errors
///
/// See [`process_survey`].
pub fn process_survey_with_report(
    core: DataFrame,
    ctx: &PipelineContext<'_>,
    options: &ProcessOptions,
) -> Result<(DataFrame, RunReport)> {
    let start = Instant::now();
    let survey = options.survey_name.as_deref().unwrap_or("unnamed");
    let _span = tracing::info_span!(
        "process_survey",
        survey,
        crosswalk = ctx.crosswalk.version()
    )
    .entered();

    let rows = core.height();
    let columns_before = core.width();
    tracing::info!(rows, columns = columns_before, "Standardizing survey");

    let skipped_stages = if options.skip_geocoding {
        vec![TransformKind::Geocoding]
    } else {
        Vec::new()
    };

    let mut validation_warnings = Vec::new();
    let mut df = if options.skip_validation {
        tracing::warn!("Validation gate skipped; input is not checked against the Core contract");
        core
    } else {
        let declarations = transforms::declarations(ctx.config);
        let (df, report) = validation::gate(
            core,
            &declarations,
            &skipped_stages,
            ctx.config.strict_validation,
        )?;
        validation_warnings.extend(report.warnings().map(ToString::to_string));
        df
    };

    let mut stages_applied = Vec::new();
    for stage in standard_stages(ctx, options) {
        df = stage.run(df)?;
        stages_applied.push(stage.kind());
    }

    check_output_contract(&df, &stages_applied)?;

    let report = RunReport {
        rows: df.height(),
        columns_before,
        columns_after: df.width(),
        stages_applied,
        skipped_stages,
        validation_warnings,
        duration: start.elapsed(),
    };
    tracing::info!("{}", report.summary());

    Ok((df, report))
}

/// Checks the Derived contract: always-produced columns are present and every
/// categorical column a stage wrote holds only codebook values or null.
///
/// # Errors
///
/// Returns [`SurveyError::Contract`] listing every problem found.
pub fn check_output_contract(df: &DataFrame, stages_applied: &[TransformKind]) -> Result<()> {
    let mut problems = Vec::new();

    let all_non_geocoding_ran = TransformKind::ALL
        .iter()
        .filter(|k| **k != TransformKind::Geocoding)
        .all(|k| stages_applied.contains(k));
    if all_non_geocoding_ran {
        for column in schema::always_derived() {
            if !frame::has_column(df, column) {
                problems.push(format!("derived column '{column}' is missing"));
            }
        }
    }

    let written = transforms::declarations(&PipelineConfig::default())
        .into_iter()
        .filter(|d| stages_applied.contains(&d.transform))
        .flat_map(|d| d.writes);
    for column in written {
        if !frame::has_column(df, &column) {
            continue;
        }
        let Some(codebook) = schema::codebook_for(&column) else {
            continue;
        };
        let values = frame::string_values(df, &column)?;
        let outside = frame::sample(
            values
                .iter()
                .flatten()
                .map(String::as_str)
                .filter(|v| !codebook.contains(v)),
        );
        if !outside.is_empty() {
            problems.push(format!(
                "column '{column}' has values outside {}: {}",
                codebook.name(),
                outside.join(", ")
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(SurveyError::Contract(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::Technology;
    use crate::reference::{Crosswalk, RouteTechnology};
    use crate::schema::columns as c;

    fn crosswalk() -> Crosswalk {
        Crosswalk::from_records(
            "test",
            [(
                "BART".to_owned(),
                "BART".to_owned(),
                RouteTechnology {
                    technology: Technology::HeavyRail,
                    canonical_operator: "BART".to_owned(),
                    operator_detail: None,
                },
            )],
        )
    }

    fn core_frame() -> PolarsResult<DataFrame> {
        df!(
            "response_id" => ["r1", "r2"],
            "survey_id" => ["s1", "s1"],
            "original_id" => ["1", "2"],
            "day_of_the_week" => ["Tuesday", "Sunday"],
            "survey_time" => [Some("07:45:00"), None],
            "vehicles" => ["one", "zero"],
            "workers" => ["two", "one"],
            "race_dmy_wht" => [1i64, 0],
            "race_dmy_asn" => [0i64, 1],
            "vehicle_tech" => ["Local Bus", "Local Bus"],
            "first_route_before_survey_board" => [Some("BART"), None],
            "first_before_operator" => [Some("BART"), None]
        )
    }

    #[test]
    fn test_process_survey_derives_contract_columns() -> Result<()> {
        let config = PipelineConfig::default();
        let crosswalk = crosswalk();
        let ctx = PipelineContext::new(&config, &crosswalk);

        let (out, report) =
            process_survey_with_report(core_frame()?, &ctx, &ProcessOptions::default())?;

        for column in schema::always_derived() {
            assert!(frame::has_column(&out, column), "missing {column}");
        }
        assert_eq!(report.stages_applied, TransformKind::ALL.to_vec());
        assert!(report.skipped_stages.is_empty());
        assert_eq!(frame::int_values(&out, c::BOARDINGS)?, vec![Some(2), Some(1)]);
        assert_eq!(
            frame::string_values(&out, c::DAY_PART)?,
            vec![Some("AM PEAK".to_owned()), None]
        );
        Ok(())
    }

    #[test]
    fn test_summary_reads_rows_then_column_change() {
        let report = RunReport {
            rows: 4,
            columns_before: 20,
            columns_after: 71,
            stages_applied: TransformKind::ALL.to_vec(),
            skipped_stages: Vec::new(),
            validation_warnings: Vec::new(),
            duration: Duration::from_millis(250),
        };
        assert_eq!(
            report.summary(),
            "4 rows, 20 → 71 columns, 7 stages, 0 warning(s), 0.25s"
        );
    }

    #[test]
    fn test_skip_geocoding_is_reported() -> Result<()> {
        let config = PipelineConfig::default();
        let crosswalk = crosswalk();
        let ctx = PipelineContext::new(&config, &crosswalk);
        let options = ProcessOptions {
            skip_geocoding: true,
            ..ProcessOptions::default()
        };

        let (out, report) = process_survey_with_report(core_frame()?, &ctx, &options)?;
        assert_eq!(report.skipped_stages, vec![TransformKind::Geocoding]);
        assert!(!frame::has_column(&out, "distance_orig_dest"));
        assert!(report.summary().contains("skipped: geocoding"));
        Ok(())
    }

    #[test]
    fn test_validation_failure_stops_before_any_stage() -> Result<()> {
        let config = PipelineConfig::default();
        let crosswalk = crosswalk();
        let ctx = PipelineContext::new(&config, &crosswalk);
        let df = core_frame()?.drop("survey_id")?;

        let err = process_survey(df, &ctx, &ProcessOptions::default()).unwrap_err();
        assert!(matches!(err, SurveyError::Validation(_)));
        Ok(())
    }

    #[test]
    fn test_contract_rejects_values_outside_codebook() -> Result<()> {
        let df = df!("weekpart" => [Some("Weekday"), Some("HOLIDAY"), None])?;
        let err = check_output_contract(&df, &[TransformKind::DateTime]).unwrap_err();
        let SurveyError::Contract(msg) = err else {
            panic!("expected a contract error");
        };
        assert!(msg.contains("HOLIDAY"));
        Ok(())
    }

    #[test]
    fn test_contract_requires_always_derived_columns() -> Result<()> {
        let df = df!("response_id" => ["r1"])?;
        let all: Vec<_> = TransformKind::ALL.to_vec();
        assert!(check_output_contract(&df, &all).is_err());
        assert!(check_output_contract(&df, &[]).is_ok());
        Ok(())
    }
}
