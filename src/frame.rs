//! Typed column access over Polars frames.
//!
//! Preprocessing output is loosely typed: a count may arrive as `Int64`,
//! `Float64` or text, a flag as `Boolean`, `0/1` or `"true"`. These helpers
//! read a column into plain Rust vectors with one tolerant conversion rule
//! per target type, so the decision tables in the transforms stay row-wise
//! and readable.

use polars::prelude::*;
use std::collections::BTreeSet;

/// Cap for value samples quoted in error messages.
pub const SAMPLE_LIMIT: usize = 5;

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.as_str().to_owned())
        .collect()
}

/// True when the column exists and every row is null. An empty frame is
/// never "entirely null".
pub fn is_entirely_null(df: &DataFrame, name: &str) -> PolarsResult<bool> {
    let column = df.column(name)?;
    Ok(df.height() > 0 && column.null_count() == df.height())
}

/// Reads a column as text. Numbers and booleans are rendered by Polars' cast.
pub fn string_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_owned))
        .collect())
}

/// Reads a column as text, or all-null when the column is absent.
pub fn optional_strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    if has_column(df, name) {
        string_values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

/// Reads a column as floats; text that does not parse becomes null.
pub fn float_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(name)?.as_materialized_series();
    if matches!(series.dtype(), DataType::String) {
        return Ok(series
            .str()?
            .into_iter()
            .map(|value| value.and_then(|v| v.trim().parse::<f64>().ok()))
            .collect());
    }
    let series = series.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

pub fn optional_floats(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    if has_column(df, name) {
        float_values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

/// Reads a column as integers; fractional numbers and unparsable text become
/// null.
pub fn int_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    Ok(float_values(df, name)?
        .into_iter()
        .map(|value| value.and_then(whole_number))
        .collect())
}

pub fn optional_ints(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    if has_column(df, name) {
        int_values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

/// Converts a float to an integer only when it carries no fractional part.
pub fn whole_number(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0).then(|| value as i64)
}

/// Reads a yes/no column. Accepts booleans, non-zero numbers and the usual
/// textual spellings; anything else is null.
pub fn flag_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<bool>>> {
    let series = df.column(name)?.as_materialized_series();
    match series.dtype() {
        DataType::Boolean => Ok(series.bool()?.into_iter().collect()),
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|value| value.and_then(parse_flag))
            .collect()),
        _ => {
            let series = series.cast(&DataType::Float64)?;
            Ok(series
                .f64()?
                .into_iter()
                .map(|value| value.map(|v| v != 0.0))
                .collect())
        }
    }
}

/// Reads a flag column treating absent columns and nulls as `false`.
pub fn flags_or_false(df: &DataFrame, name: &str) -> PolarsResult<Vec<bool>> {
    if !has_column(df, name) {
        return Ok(vec![false; df.height()]);
    }
    Ok(flag_values(df, name)?
        .into_iter()
        .map(|value| value.unwrap_or(false))
        .collect())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "1.0" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "0.0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Parses every value of a text column with `parse`, leaving unparsable
/// values as null. Used for codebook columns the gate has already checked.
pub fn parsed_values<T>(
    df: &DataFrame,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> PolarsResult<Vec<Option<T>>> {
    Ok(optional_strings(df, name)?
        .into_iter()
        .map(|value| value.as_deref().and_then(&parse))
        .collect())
}

/// Distinct values in sorted order, capped at [`SAMPLE_LIMIT`].
pub fn sample<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    values
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(SAMPLE_LIMIT)
        .map(str::to_owned)
        .collect()
}

pub fn put_strings(
    df: &mut DataFrame,
    name: &str,
    values: Vec<Option<String>>,
) -> PolarsResult<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn put_codes(
    df: &mut DataFrame,
    name: &str,
    values: impl IntoIterator<Item = Option<&'static str>>,
) -> PolarsResult<()> {
    let values: Vec<Option<&str>> = values.into_iter().collect();
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn put_ints(df: &mut DataFrame, name: &str, values: Vec<Option<i64>>) -> PolarsResult<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn put_floats(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> PolarsResult<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn put_flags(df: &mut DataFrame, name: &str, values: Vec<bool>) -> PolarsResult<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Drops each listed column that exists; absent columns are ignored.
pub fn drop_if_present(df: &mut DataFrame, names: &[&str]) -> PolarsResult<()> {
    for name in names {
        if has_column(df, name) {
            df.drop_in_place(name)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values_accept_mixed_spellings() -> PolarsResult<()> {
        let df = df!(
            "as_text" => [Some("1"), Some("no"), Some("maybe"), None],
            "as_int" => [Some(1i64), Some(0), Some(2), None]
        )?;
        assert_eq!(
            flag_values(&df, "as_text")?,
            vec![Some(true), Some(false), None, None]
        );
        assert_eq!(
            flag_values(&df, "as_int")?,
            vec![Some(true), Some(false), Some(true), None]
        );
        Ok(())
    }

    #[test]
    fn test_int_values_reject_fractions() -> PolarsResult<()> {
        let df = df!("n" => [Some("3"), Some("2.0"), Some("2.5"), Some("x"), None])?;
        assert_eq!(int_values(&df, "n")?, vec![Some(3), Some(2), None, None, None]);
        Ok(())
    }

    #[test]
    fn test_missing_column_helpers() -> PolarsResult<()> {
        let df = df!("a" => [1i64, 2])?;
        assert_eq!(optional_strings(&df, "b")?, vec![None, None]);
        assert_eq!(flags_or_false(&df, "b")?, vec![false, false]);
        assert!(!has_column(&df, "b"));
        Ok(())
    }

    #[test]
    fn test_sample_is_sorted_distinct_and_capped() {
        let values = ["g", "a", "f", "a", "b", "c", "d", "e"];
        assert_eq!(sample(values), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_is_entirely_null() -> PolarsResult<()> {
        let df = df!("a" => [None::<&str>, None], "b" => [Some("x"), None])?;
        assert!(is_entirely_null(&df, "a")?);
        assert!(!is_entirely_null(&df, "b")?);
        Ok(())
    }
}
