//! Error taxonomy for the standardization pipeline.
//!
//! Every failure the pipeline can raise is a [`SurveyError`] variant, so
//! callers can tell a contract violation (bad preprocessing output) apart from
//! an unmappable value or an unresolved reference lookup:
//!
//! ```
//! use survey_standardize::error::SurveyError;
//!
//! fn triage(err: &SurveyError) -> &'static str {
//!     match err {
//!         SurveyError::Validation(_) => "fix the preprocessing script",
//!         SurveyError::UnresolvedTransfers(_) => "extend the route crosswalk",
//!         SurveyError::UnmappableValues { .. } => "extend the value dictionary",
//!         _ => "investigate",
//!     }
//! }
//! ```
//!
//! The `ResultExt` trait adds `.context()` to any `Result` whose error converts
//! into a [`SurveyError`].

use crate::dependencies::TransformKind;
use crate::validation::ValidationReport;
use std::fmt;

/// A transfer leg whose (operator, route) pair the crosswalk could not resolve.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnresolvedTransfer {
    pub leg: &'static str,
    pub operator: Option<String>,
    pub route: String,
}

impl fmt::Display for UnresolvedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: operator '{}', route '{}'",
            self.leg,
            self.operator.as_deref().unwrap_or("<null>"),
            self.route
        )
    }
}

/// Main error type for pipeline operations.
#[derive(Debug)]
pub enum SurveyError {
    /// I/O errors (reading exports, writing batches)
    Io(std::io::Error),

    /// Polars errors
    DataProcessing(String),

    /// The input table broke the Core contract or a transform requirement
    Validation(ValidationReport),

    /// A non-null source value could not be mapped to the target vocabulary
    UnmappableValues { field: String, samples: Vec<String> },

    /// A transform was asked to run without the columns it declares
    MissingColumns {
        transform: TransformKind,
        problems: Vec<String>,
    },

    /// Transfer legs the route crosswalk could not resolve
    UnresolvedTransfers(Vec<UnresolvedTransfer>),

    /// The pipeline produced output outside the Derived contract
    Contract(String),

    /// Configuration errors
    Config(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for SurveyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Validation(report) => {
                write!(f, "Preprocessed input failed validation:\n{report}")
            }
            Self::UnmappableValues { field, samples } => write!(
                f,
                "Field '{field}' has values that cannot be mapped (sample: {})",
                samples.join(", ")
            ),
            Self::MissingColumns {
                transform,
                problems,
            } => write!(
                f,
                "Transform '{transform}' cannot run: {}",
                problems.join("; ")
            ),
            Self::UnresolvedTransfers(legs) => {
                write!(
                    f,
                    "{} transfer route(s) not found in the route crosswalk:",
                    legs.len()
                )?;
                for leg in legs {
                    write!(f, "\n  - {leg}")?;
                }
                Ok(())
            }
            Self::Contract(msg) => write!(f, "Output contract violated: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SurveyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SurveyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SurveyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for SurveyError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SurveyError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SurveyError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: SurveyError = e.into();
            SurveyError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: SurveyError = e.into();
            SurveyError::Other(format!("{}: {}", f(), err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SurveyError::DataProcessing("column not found".to_owned());
        assert_eq!(err.to_string(), "Data processing error: column not found");
    }

    #[test]
    fn test_unmappable_lists_samples() {
        let err = SurveyError::UnmappableValues {
            field: "vehicles".to_owned(),
            samples: vec!["lots".to_owned(), "many".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "Field 'vehicles' has values that cannot be mapped (sample: lots, many)"
        );
    }

    #[test]
    fn test_unresolved_transfers_name_every_leg() {
        let err = SurveyError::UnresolvedTransfers(vec![
            UnresolvedTransfer {
                leg: "first_before",
                operator: Some("AC Transit".to_owned()),
                route: "99X".to_owned(),
            },
            UnresolvedTransfer {
                leg: "first_after",
                operator: None,
                route: "12".to_owned(),
            },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 transfer route(s)"));
        assert!(text.contains("first_before: operator 'AC Transit', route '99X'"));
        assert!(text.contains("first_after: operator '<null>', route '12'"));
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "crosswalk.csv",
        ));

        let result: Result<()> = result.context("Failed to read crosswalk");
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read crosswalk")
        );
    }
}
