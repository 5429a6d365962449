//! Household auto-sufficiency: vehicles relative to workers.

use super::SurveyTransform;
use crate::codebook::{AutoSufficiency, Codebook as _};
use crate::dependencies::{FieldDependencies, Requirement, TransformKind};
use crate::error::{Result, SurveyError};
use crate::frame;
use crate::schema::columns as c;
use polars::prelude::*;

/// Number words used by survey instruments, matched case-insensitively.
const COUNT_WORDS: [(&str, i64); 6] = [
    ("zero", 0),
    ("none", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
];

/// Top-coded answer, counted as four.
const FOUR_OR_MORE: &str = "four or more";

pub fn dependencies() -> FieldDependencies {
    FieldDependencies::new(TransformKind::AutoSufficiency)
        .reads(&[c::VEHICLES, c::WORKERS])
        .writes(&[c::VEHICLE_NUMERIC, c::WORKER_NUMERIC, c::AUTO_TO_WORKERS_RATIO])
        .requires(Requirement::required(&[c::VEHICLES, c::WORKERS]))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSufficiencyTransform;

impl SurveyTransform for AutoSufficiencyTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::AutoSufficiency
    }

    fn dependencies(&self) -> FieldDependencies {
        dependencies()
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut df = df;
        let vehicles = numeric_counts(&df, c::VEHICLES)?;
        let workers = numeric_counts(&df, c::WORKERS)?;

        let ratios: Vec<_> = vehicles
            .iter()
            .zip(&workers)
            .map(|(v, w)| auto_sufficiency(*v, *w).map(|r| r.as_str()))
            .collect();

        frame::put_ints(&mut df, c::VEHICLE_NUMERIC, vehicles)?;
        frame::put_ints(&mut df, c::WORKER_NUMERIC, workers)?;
        frame::put_codes(&mut df, c::AUTO_TO_WORKERS_RATIO, ratios)?;
        Ok(df)
    }
}

/// Maps a textual count to an integer: number words first, then integer
/// text such as `"2"` or `"2.0"`.
pub fn parse_count(value: &str) -> Option<i64> {
    let value = value.trim().to_lowercase();
    if value == FOUR_OR_MORE {
        return Some(4);
    }
    if let Some((_, n)) = COUNT_WORDS.iter().find(|(word, _)| *word == value) {
        return Some(*n);
    }
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().and_then(frame::whole_number))
}

/// Reads a household count column. Numeric columns are cast; text columns go
/// through [`parse_count`] and any value that does not map is fatal.
fn numeric_counts(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = df.column(name)?.as_materialized_series();
    if !matches!(series.dtype(), DataType::String) {
        let truncated = fractional_values(series)?;
        if truncated > 0 {
            tracing::warn!(
                field = name,
                truncated,
                "Fractional household counts truncated to whole numbers"
            );
        }
        let series = series.cast(&DataType::Int64)?;
        return Ok(series.i64()?.into_iter().collect());
    }

    let raw = frame::string_values(df, name)?;
    let counts: Vec<_> = raw
        .iter()
        .map(|value| value.as_deref().and_then(parse_count))
        .collect();

    let samples = frame::sample(
        raw.iter()
            .zip(&counts)
            .filter(|(_, count)| count.is_none())
            .filter_map(|(value, _)| value.as_deref()),
    );
    if !samples.is_empty() {
        return Err(SurveyError::UnmappableValues {
            field: name.to_owned(),
            samples,
        });
    }
    Ok(counts)
}

/// Number of finite non-whole values in a float column. Zero for any other
/// type.
fn fractional_values(series: &Series) -> PolarsResult<usize> {
    if !series.dtype().is_float() {
        return Ok(0);
    }
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite() && frame::whole_number(*v).is_none())
        .count())
}

/// Category for one household. Defined only when both counts are known and
/// the household has at least one worker or no vehicle.
pub fn auto_sufficiency(vehicles: Option<i64>, workers: Option<i64>) -> Option<AutoSufficiency> {
    let (vehicles, workers) = (vehicles?, workers?);
    if vehicles == 0 {
        Some(AutoSufficiency::ZeroAutos)
    } else if vehicles > 0 && workers > vehicles {
        Some(AutoSufficiency::AutosLessThanWorkers)
    } else if workers > 0 && workers <= vehicles {
        Some(AutoSufficiency::AutosAtLeastWorkers)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_words_and_numbers() {
        assert_eq!(parse_count("Zero"), Some(0));
        assert_eq!(parse_count(" none "), Some(0));
        assert_eq!(parse_count("Four or more"), Some(4));
        assert_eq!(parse_count("two"), Some(2));
        assert_eq!(parse_count("3"), Some(3));
        assert_eq!(parse_count("2.0"), Some(2));
        assert_eq!(parse_count("2.5"), None);
        assert_eq!(parse_count("lots"), None);
    }

    #[test]
    fn test_auto_sufficiency_categories() {
        assert_eq!(
            auto_sufficiency(Some(1), Some(2)),
            Some(AutoSufficiency::AutosLessThanWorkers)
        );
        assert_eq!(
            auto_sufficiency(Some(2), Some(2)),
            Some(AutoSufficiency::AutosAtLeastWorkers)
        );
        assert_eq!(
            auto_sufficiency(Some(0), Some(1)),
            Some(AutoSufficiency::ZeroAutos)
        );
        assert_eq!(
            auto_sufficiency(Some(0), Some(0)),
            Some(AutoSufficiency::ZeroAutos)
        );
    }

    #[test]
    fn test_ratio_is_partial() {
        assert_eq!(auto_sufficiency(Some(2), Some(0)), None);
        assert_eq!(auto_sufficiency(Some(-1), Some(2)), None);
        assert_eq!(auto_sufficiency(None, Some(2)), None);
        assert_eq!(auto_sufficiency(Some(0), None), None);
    }

    #[test]
    fn test_apply_mixes_text_and_numeric_columns() -> Result<()> {
        let df = df!(
            "vehicles" => [Some("one"), Some("Two"), Some("zero"), None],
            "workers" => [Some(2i64), Some(2), Some(1), Some(1)]
        )?;
        let out = AutoSufficiencyTransform.run(df)?;

        assert_eq!(
            frame::int_values(&out, c::VEHICLE_NUMERIC)?,
            vec![Some(1), Some(2), Some(0), None]
        );
        assert_eq!(
            frame::string_values(&out, c::AUTO_TO_WORKERS_RATIO)?,
            vec![
                Some("Autos < workers".to_owned()),
                Some("Autos >= workers".to_owned()),
                Some("Zero autos".to_owned()),
                None
            ]
        );
        Ok(())
    }

    #[test]
    fn test_fractional_float_counts_are_detected_and_truncated() -> Result<()> {
        let vehicles = Series::new("vehicles".into(), [Some(1.0), Some(2.5), None]);
        assert_eq!(fractional_values(&vehicles)?, 1);
        assert_eq!(
            fractional_values(&Series::new("workers".into(), [1i64, 2]))?,
            0
        );

        let df = df!("vehicles" => [Some(1.0), Some(2.5), None], "workers" => [1i64, 1, 1])?;
        let out = AutoSufficiencyTransform.run(df)?;
        assert_eq!(
            frame::int_values(&out, c::VEHICLE_NUMERIC)?,
            vec![Some(1), Some(2), None]
        );
        Ok(())
    }

    #[test]
    fn test_unmappable_values_are_fatal_with_samples() -> Result<()> {
        let df = df!(
            "vehicles" => ["lots", "one", "many", "lots"],
            "workers" => ["one", "one", "one", "one"]
        )?;
        let err = AutoSufficiencyTransform.run(df).unwrap_err();
        let SurveyError::UnmappableValues { field, samples } = err else {
            panic!("expected an unmappable-values error");
        };
        assert_eq!(field, "vehicles");
        assert_eq!(samples, vec!["lots", "many"]);
        Ok(())
    }
}
