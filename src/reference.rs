//! Reference data consulted by the transforms.
//!
//! The route crosswalk maps an (operator, route) pair reported for a transfer
//! leg to a canonical technology and operator. It is loaded once per process,
//! never mutated, and handed to the pipeline explicitly, so a run can only
//! ever observe one version of it.

use crate::codebook::{Codebook as _, Technology};
use crate::error::{Result, ResultExt as _, SurveyError};
use crate::frame;
use polars::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// What the crosswalk knows about one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTechnology {
    pub technology: Technology,
    pub canonical_operator: String,
    pub operator_detail: Option<String>,
}

/// An (operator, route) pair with no crosswalk entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    pub operator: String,
    pub route: String,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no crosswalk entry for operator '{}', route '{}'",
            self.operator, self.route
        )
    }
}

impl std::error::Error for LookupError {}

/// Resolves transfer legs to technologies.
pub trait RouteTechnologyLookup {
    /// # Errors
    ///
    /// Returns [`LookupError`] when the pair is unknown.
    fn get_route_technology(
        &self,
        operator: &str,
        route: &str,
    ) -> std::result::Result<RouteTechnology, LookupError>;

    /// Label identifying the loaded reference data, logged with each run.
    fn version(&self) -> &str {
        "unversioned"
    }
}

/// Assigns coordinates to zones of a named zone system (TAZ, MAZ, PUMA, ...).
pub trait ZoneLookup {
    fn zone_id(&self, lat: f64, lon: f64, zone_type: &str) -> Option<String>;
}

/// Columns of a crosswalk export.
const OPERATOR: &str = "operator";
const ROUTE: &str = "route";
const TECHNOLOGY: &str = "technology";
const CANONICAL_OPERATOR: &str = "canonical_operator";
const OPERATOR_DETAIL: &str = "operator_detail";

/// In-memory route crosswalk. Keys are trimmed and case-folded so preprocessing
/// does not have to match the reference spelling exactly.
#[derive(Debug, Clone)]
pub struct Crosswalk {
    version: String,
    entries: HashMap<(String, String), RouteTechnology>,
}

impl Crosswalk {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            entries: HashMap::new(),
        }
    }

    /// Builds a crosswalk from `(operator, route, entry)` records. Later
    /// duplicates replace earlier ones.
    pub fn from_records(
        version: impl Into<String>,
        records: impl IntoIterator<Item = (String, String, RouteTechnology)>,
    ) -> Self {
        let mut crosswalk = Self::new(version);
        for (operator, route, entry) in records {
            crosswalk.entries.insert(key(&operator, &route), entry);
        }
        crosswalk
    }

    /// Loads a crosswalk CSV with columns
    /// `operator,route,technology,canonical_operator,operator_detail`. The
    /// file stem becomes the version label.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a row is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(0))
            .with_has_header(true)
            .finish()
            .and_then(LazyFrame::collect)
            .with_context(|| format!("Failed to read route crosswalk {}", path.display()))?;

        let version = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("crosswalk");
        Self::from_frame(version, &df)
    }

    /// Builds a crosswalk from an already loaded table.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError::Config`] naming missing columns, incomplete rows
    /// or unknown technologies.
    pub fn from_frame(version: &str, df: &DataFrame) -> Result<Self> {
        let missing: Vec<_> = [OPERATOR, ROUTE, TECHNOLOGY, CANONICAL_OPERATOR]
            .into_iter()
            .filter(|c| !frame::has_column(df, c))
            .collect();
        if !missing.is_empty() {
            return Err(SurveyError::Config(format!(
                "Route crosswalk is missing column(s): {}",
                missing.join(", ")
            )));
        }

        let operators = frame::string_values(df, OPERATOR)?;
        let routes = frame::string_values(df, ROUTE)?;
        let technologies = frame::string_values(df, TECHNOLOGY)?;
        let canonical = frame::string_values(df, CANONICAL_OPERATOR)?;
        let details = frame::optional_strings(df, OPERATOR_DETAIL)?;

        let mut crosswalk = Self::new(version);
        let mut problems = Vec::new();

        for (row, ((((operator, route), technology), canonical), detail)) in operators
            .into_iter()
            .zip(routes)
            .zip(technologies)
            .zip(canonical)
            .zip(details)
            .enumerate()
        {
            let (Some(operator), Some(route), Some(technology), Some(canonical)) =
                (operator, route, technology, canonical)
            else {
                problems.push(format!("row {}: incomplete entry", row + 1));
                continue;
            };
            let Some(technology) = Technology::parse(technology.trim()) else {
                problems.push(format!("row {}: unknown technology '{technology}'", row + 1));
                continue;
            };
            crosswalk.entries.insert(
                key(&operator, &route),
                RouteTechnology {
                    technology,
                    canonical_operator: canonical.trim().to_owned(),
                    operator_detail: detail.filter(|d| !d.trim().is_empty()),
                },
            );
        }

        if !problems.is_empty() {
            return Err(SurveyError::Config(format!(
                "Route crosswalk '{version}' has invalid rows: {}",
                problems.join("; ")
            )));
        }

        tracing::info!(
            version,
            entries = crosswalk.entries.len(),
            "Loaded route crosswalk"
        );
        Ok(crosswalk)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RouteTechnologyLookup for Crosswalk {
    fn get_route_technology(
        &self,
        operator: &str,
        route: &str,
    ) -> std::result::Result<RouteTechnology, LookupError> {
        self.entries
            .get(&key(operator, route))
            .cloned()
            .ok_or_else(|| LookupError {
                operator: operator.to_owned(),
                route: route.to_owned(),
            })
    }

    fn version(&self) -> &str {
        &self.version
    }
}

fn key(operator: &str, route: &str) -> (String, String) {
    (
        operator.trim().to_uppercase(),
        route.trim().to_uppercase(),
    )
}
