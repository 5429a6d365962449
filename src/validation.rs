//! Validation gate for preprocessed survey tables.
//!
//! Checks a Core table against the Core contract and every scheduled
//! transform's column requirements before anything runs, so one run produces
//! the complete list of problems with actionable messages.

use crate::codebook::MISSING_SENTINEL;
use crate::config::PipelineConfig;
use crate::dependencies::{FieldDependencies, TransformKind};
use crate::error::{Result, SurveyError};
use crate::frame::{self, SAMPLE_LIMIT};
use crate::schema::{self, CORE_REQUIRED, columns as c};
use crate::transforms;
use polars::prelude::*;
use std::collections::HashSet;
use std::fmt;

/// Canonical field names and variants preprocessing scripts commonly emit
/// instead.
const NAMING_VARIANTS: &[(&str, &[&str])] = &[
    (c::SURVEY_TIME, &["survey_time_estimate", "time_of_survey"]),
    (c::DAY_OF_THE_WEEK, &["day_of_week", "weekday"]),
    (c::APPROXIMATE_AGE, &["age"]),
    (c::VEHICLES, &["vehicle_count", "autos"]),
    (c::WORKERS, &["worker_count"]),
    (c::ORIG_PURP, &["origin_purp", "orig_purpose"]),
    (c::DEST_PURP, &["destination_purp", "dest_purpose"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// A Core identifier is absent or entirely null.
    CoreRequired,
    /// A canonical field is absent but a known variant is present.
    FieldNaming,
    /// A transform's column-group rule is violated.
    TransformRequirement,
    /// A categorical column holds values outside its codebook.
    EnumValue,
}

impl IssueKind {
    pub fn is_error(self) -> bool {
        !matches!(self, Self::FieldNaming)
    }

    fn label(self) -> &'static str {
        match self {
            Self::CoreRequired => "CoreRequiredError",
            Self::FieldNaming => "FieldNamingWarning",
            Self::TransformRequirement => "TransformRequirementError",
            Self::EnumValue => "EnumValueError",
        }
    }
}

/// One itemized finding of the gate.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub transform: Option<TransformKind>,
    pub column: Option<String>,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind.label())?;
        if let Some(transform) = self.transform {
            write!(f, " {transform}:")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Every finding of one validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.kind.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.kind.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(
        &mut self,
        kind: IssueKind,
        transform: Option<TransformKind>,
        column: Option<&str>,
        message: String,
    ) {
        self.issues.push(ValidationIssue {
            kind,
            transform,
            column: column.map(str::to_owned),
            message,
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self.errors().count();
        let warnings = self.issues.len() - errors;
        write!(f, "{errors} error(s), {warnings} warning(s)")?;
        for (idx, issue) in self.issues.iter().enumerate() {
            write!(f, "\n  {}. {issue}", idx + 1)?;
        }
        Ok(())
    }
}

/// Validates a preprocessed table against the default pipeline's declarations.
///
/// Returns the table unchanged. In strict mode any error aborts with
/// [`SurveyError::Validation`] carrying every finding; otherwise findings are
/// logged and the table passes through unvalidated.
///
/// # Errors
///
/// Returns [`SurveyError::Validation`] in strict mode when the report holds
/// at least one error, or a data-processing error if a column cannot be read.
pub fn validate_preprocessed_input(
    df: DataFrame,
    skip_transforms: &[TransformKind],
    strict: bool,
) -> Result<DataFrame> {
    let declarations = transforms::declarations(&PipelineConfig::default());
    validate_with(df, &declarations, skip_transforms, strict)
}

/// Same as [`validate_preprocessed_input`] with explicit stage declarations,
/// given in pipeline order.
///
/// # Errors
///
/// See [`validate_preprocessed_input`].
pub fn validate_with(
    df: DataFrame,
    declarations: &[FieldDependencies],
    skip_transforms: &[TransformKind],
    strict: bool,
) -> Result<DataFrame> {
    gate(df, declarations, skip_transforms, strict).map(|(df, _)| df)
}

/// Runs the gate and hands back the table together with the findings that
/// did not abort the run.
///
/// # Errors
///
/// See [`validate_preprocessed_input`].
pub fn gate(
    df: DataFrame,
    declarations: &[FieldDependencies],
    skip_transforms: &[TransformKind],
    strict: bool,
) -> Result<(DataFrame, ValidationReport)> {
    let report = check_preprocessed_input(&df, declarations, skip_transforms)?;

    for warning in report.warnings() {
        tracing::warn!("{warning}");
    }

    if !report.has_errors() {
        tracing::debug!(rows = df.height(), "Preprocessed input passed validation");
        return Ok((df, report));
    }

    if strict {
        return Err(SurveyError::Validation(report));
    }

    tracing::warn!("Validation errors ignored in non-strict mode:\n{report}");
    Ok((df, report))
}

/// Runs every check and collects the findings without failing.
///
/// # Errors
///
/// Returns a data-processing error if a column cannot be read.
pub fn check_preprocessed_input(
    df: &DataFrame,
    declarations: &[FieldDependencies],
    skip_transforms: &[TransformKind],
) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    check_core_required(df, &mut report)?;
    check_field_naming(df, &mut report);
    check_transform_requirements(df, declarations, skip_transforms, &mut report);
    check_enum_values(df, &mut report)?;

    Ok(report)
}

fn check_core_required(df: &DataFrame, report: &mut ValidationReport) -> Result<()> {
    for column in CORE_REQUIRED {
        if !frame::has_column(df, column) {
            report.push(
                IssueKind::CoreRequired,
                None,
                Some(column),
                format!("Required Core column '{column}' is missing"),
            );
        } else if frame::is_entirely_null(df, column)? {
            report.push(
                IssueKind::CoreRequired,
                None,
                Some(column),
                format!("Required Core column '{column}' is entirely null"),
            );
        }
    }
    Ok(())
}

fn check_field_naming(df: &DataFrame, report: &mut ValidationReport) {
    for (canonical, variants) in NAMING_VARIANTS {
        if frame::has_column(df, canonical) {
            continue;
        }
        for variant in variants.iter().filter(|v| frame::has_column(df, v)) {
            report.push(
                IssueKind::FieldNaming,
                None,
                Some(*variant),
                format!("Found '{variant}' but expected '{canonical}'; rename it in preprocessing"),
            );
        }
    }
}

/// Walks the stages in pipeline order, checking each stage's rules against
/// the input columns plus what earlier scheduled stages will have written.
fn check_transform_requirements(
    df: &DataFrame,
    declarations: &[FieldDependencies],
    skip_transforms: &[TransformKind],
    report: &mut ValidationReport,
) {
    let mut available: HashSet<String> = frame::column_names(df).into_iter().collect();

    for declaration in declarations {
        if skip_transforms.contains(&declaration.transform) {
            continue;
        }
        for violation in declaration.violations(&available) {
            report.push(
                IssueKind::TransformRequirement,
                Some(declaration.transform),
                None,
                violation,
            );
        }
        declaration.apply_to(&mut available);
    }
}

fn check_enum_values(df: &DataFrame, report: &mut ValidationReport) -> Result<()> {
    for column in frame::column_names(df) {
        let Some(codebook) = schema::codebook_for(&column) else {
            continue;
        };
        let values = frame::string_values(df, &column)?;
        let invalid = invalid_values(&values, &codebook.values());
        if invalid.is_empty() {
            continue;
        }

        let sentinel = invalid.iter().any(|v| v == MISSING_SENTINEL);
        let mut message = format!(
            "Column '{column}' has values outside {} (sample: {}; valid: {})",
            codebook.name(),
            invalid.join(", "),
            capped(&codebook.values())
        );
        if sentinel {
            message.push_str(&format!(
                "; use null instead of the '{MISSING_SENTINEL}' sentinel"
            ));
        }
        report.push(IssueKind::EnumValue, None, Some(&column), message);
    }
    Ok(())
}

/// Distinct values outside `valid` (the null sentinel always counts as
/// invalid), sorted and capped.
fn invalid_values(values: &[Option<String>], valid: &[&str]) -> Vec<String> {
    frame::sample(
        values
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|v| *v == MISSING_SENTINEL || !valid.contains(v)),
    )
}

fn capped(values: &[&str]) -> String {
    let shown: Vec<_> = values.iter().take(SAMPLE_LIMIT).copied().collect();
    if values.len() > SAMPLE_LIMIT {
        format!("{}, ... ({} more)", shown.join(", "), values.len() - SAMPLE_LIMIT)
    } else {
        shown.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_frame() -> PolarsResult<DataFrame> {
        df!(
            "response_id" => ["r1", "r2"],
            "survey_id" => ["s1", "s1"],
            "original_id" => ["1", "2"],
            "day_of_the_week" => ["Monday", "Saturday"],
            "vehicles" => ["one", "two"],
            "workers" => ["one", "one"],
            "race_dmy_wht" => [1i64, 0],
            "vehicle_tech" => ["Local Bus", "Heavy Rail"]
        )
    }

    fn kinds(report: &ValidationReport) -> Vec<IssueKind> {
        report.issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_valid_core_table_passes() -> Result<()> {
        let df = core_frame()?;
        let declarations = transforms::declarations(&PipelineConfig::default());
        let report = check_preprocessed_input(&df, &declarations, &[])?;
        assert!(report.is_empty(), "unexpected issues: {report}");
        Ok(())
    }

    #[test]
    fn test_missing_and_null_identifiers_are_reported_together() -> Result<()> {
        let mut df = core_frame()?;
        df.drop_in_place("survey_id")?;
        df.with_column(Series::new("original_id".into(), [None::<&str>, None]))?;

        let report = check_preprocessed_input(&df, &[], &[])?;
        let core: Vec<_> = report
            .errors()
            .filter(|i| i.kind == IssueKind::CoreRequired)
            .collect();
        assert_eq!(core.len(), 2);
        assert!(core[0].message.contains("'survey_id' is missing"));
        assert!(core[1].message.contains("'original_id' is entirely null"));
        Ok(())
    }

    #[test]
    fn test_naming_variant_is_a_warning_only() -> Result<()> {
        let estimate = Column::from(Series::new(
            "survey_time_estimate".into(),
            ["08:00", "09:00"],
        ));
        let df = core_frame()?.hstack(&[estimate.clone()])?;
        let result = validate_preprocessed_input(df, &[], true);
        assert!(result.is_ok());

        let df = core_frame()?.hstack(&[estimate])?;
        let report = check_preprocessed_input(&df, &[], &[])?;
        assert_eq!(kinds(&report), vec![IssueKind::FieldNaming]);
        assert!(!report.has_errors());
        Ok(())
    }

    #[test]
    fn test_requirements_see_columns_written_by_earlier_stages() -> Result<()> {
        // Path labels need first_board_tech, which only transfers writes.
        let df = core_frame()?;
        let declarations = transforms::declarations(&PipelineConfig::default());
        let report = check_preprocessed_input(&df, &declarations, &[TransformKind::Transfers])?;
        let path_label_errors: Vec<_> = report
            .errors()
            .filter(|i| i.transform == Some(TransformKind::PathLabels))
            .collect();
        assert_eq!(path_label_errors.len(), 1);
        assert!(path_label_errors[0].message.contains("first_board_tech"));
        Ok(())
    }

    #[test]
    fn test_skipped_transforms_are_not_checked() -> Result<()> {
        let mut df = core_frame()?;
        df.drop_in_place("vehicles")?;
        df.drop_in_place("workers")?;
        let declarations = transforms::declarations(&PipelineConfig::default());

        let report = check_preprocessed_input(&df, &declarations, &[])?;
        assert!(report.has_errors());

        let report =
            check_preprocessed_input(&df, &declarations, &[TransformKind::AutoSufficiency])?;
        assert!(!report.has_errors(), "unexpected issues: {report}");
        Ok(())
    }

    #[test]
    fn test_enum_values_report_sample_and_sentinel() -> Result<()> {
        let gender = Column::from(Series::new("gender".into(), ["Missing", "female"]));
        let df = core_frame()?.hstack(&[gender])?;
        let report = check_preprocessed_input(&df, &[], &[])?;
        let issue = report.errors().next().unwrap();
        assert_eq!(issue.kind, IssueKind::EnumValue);
        assert_eq!(issue.column.as_deref(), Some("gender"));
        assert!(issue.message.contains("sample: Missing, female"));
        assert!(issue.message.contains("valid: Male, Female, Other"));
        assert!(issue.message.contains("sentinel"));
        Ok(())
    }

    #[test]
    fn test_strict_mode_aggregates_every_error() -> Result<()> {
        let mut df = core_frame()?;
        df.drop_in_place("response_id")?;
        df.drop_in_place("vehicle_tech")?;
        df.with_column(Series::new("day_of_the_week".into(), ["Mon", "Tue"]))?;

        let err = validate_preprocessed_input(df, &[], true).unwrap_err();
        let SurveyError::Validation(report) = &err else {
            panic!("expected a validation error, got {err}");
        };
        let kinds = kinds(report);
        assert!(kinds.contains(&IssueKind::CoreRequired));
        assert!(kinds.contains(&IssueKind::TransformRequirement));
        assert!(kinds.contains(&IssueKind::EnumValue));
        assert!(err.to_string().contains("error(s)"));
        Ok(())
    }

    #[test]
    fn test_lenient_mode_passes_table_through() -> Result<()> {
        let mut df = core_frame()?;
        df.drop_in_place("response_id")?;
        let width = df.width();
        let passed = validate_preprocessed_input(df, &[], false)?;
        assert_eq!(passed.width(), width);
        Ok(())
    }

    #[test]
    fn test_capped_valid_values() {
        assert_eq!(capped(&["a", "b"]), "a, b");
        assert_eq!(
            capped(&["a", "b", "c", "d", "e", "f", "g"]),
            "a, b, c, d, e, ... (2 more)"
        );
    }
}
