//! Pipeline configuration.
//!
//! Business tables that vary between survey programs (day-part hour ranges,
//! which location pairs get a distance, which zone systems get geocoded) are
//! data rather than code. They load from a JSON file and fall back to the
//! standard defaults for anything omitted.

use crate::codebook::DayPart;
use crate::error::{Result, ResultExt as _, SurveyError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hour range mapped to one day-part label. Half-open `[start_hour, end_hour)`
/// unless `end_inclusive` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPartRange {
    pub start_hour: u32,
    pub end_hour: u32,
    #[serde(default)]
    pub end_inclusive: bool,
    pub label: DayPart,
}

impl DayPartRange {
    pub fn new(start_hour: u32, end_hour: u32, label: DayPart) -> Self {
        Self {
            start_hour,
            end_hour,
            end_inclusive: false,
            label,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour
            && (hour < self.end_hour || (self.end_inclusive && hour == self.end_hour))
    }
}

/// Two locations whose great-circle distance is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationPair {
    pub from: String,
    pub to: String,
}

impl LocationPair {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_owned(),
            to: to.to_owned(),
        }
    }

    pub fn output_column(&self) -> String {
        format!("distance_{}_{}", self.from, self.to)
    }
}

/// A location to assign to a zone of the given zone system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneTarget {
    pub location: String,
    pub zone_type: String,
}

impl ZoneTarget {
    pub fn output_column(&self) -> String {
        format!("{}_{}", self.location, self.zone_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hour ranges for `day_part`; uncovered hours fall back to EVENING
    pub day_parts: Vec<DayPartRange>,
    /// Location pairs that get a `distance_<from>_<to>` column
    pub distance_pairs: Vec<LocationPair>,
    /// Locations to geocode into zones when a zone lookup is supplied
    pub zone_targets: Vec<ZoneTarget>,
    /// Abort on validation errors instead of logging them
    pub strict_validation: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            day_parts: vec![
                DayPartRange::new(3, 6, DayPart::EarlyAm),
                DayPartRange::new(6, 10, DayPart::AmPeak),
                DayPartRange::new(10, 15, DayPart::Midday),
                DayPartRange::new(15, 19, DayPart::PmPeak),
            ],
            distance_pairs: vec![
                LocationPair::new("orig", "dest"),
                LocationPair::new("survey_board", "survey_alight"),
                LocationPair::new("first_board", "last_alight"),
            ],
            zone_targets: Vec::new(),
            strict_validation: true,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`PipelineConfig::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Parse a configuration from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error for invalid JSON or an invalid configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks hour ranges and location names.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError::Config`] describing every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (idx, range) in self.day_parts.iter().enumerate() {
            if range.end_hour > 24 {
                problems.push(format!(
                    "day_parts[{idx}]: end_hour {} is past 24",
                    range.end_hour
                ));
            }
            if range.start_hour > range.end_hour {
                problems.push(format!(
                    "day_parts[{idx}]: start_hour {} is after end_hour {}",
                    range.start_hour, range.end_hour
                ));
            }
        }

        for pair in &self.distance_pairs {
            if pair.from.trim().is_empty() || pair.to.trim().is_empty() {
                problems.push("distance_pairs: location names must not be empty".to_owned());
            }
        }

        for target in &self.zone_targets {
            if target.location.trim().is_empty() || target.zone_type.trim().is_empty() {
                problems.push(
                    "zone_targets: location and zone_type must not be empty".to_owned(),
                );
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SurveyError::Config(problems.join("; ")))
        }
    }

    /// Day part for an hour of the day: first matching range, else EVENING.
    pub fn day_part_for_hour(&self, hour: u32) -> DayPart {
        self.day_parts
            .iter()
            .find(|range| range.contains(hour))
            .map_or(DayPart::Evening, |range| range.label)
    }
}
