//! `weekpart` and `day_part` from the survey day and time.

use super::SurveyTransform;
use crate::codebook::{Codebook as _, DayOfWeek, DayPart, Weekpart};
use crate::config::PipelineConfig;
use crate::dependencies::{FieldDependencies, Requirement, TransformKind};
use crate::error::Result;
use crate::frame;
use crate::schema::columns as c;
use chrono::{NaiveDateTime, NaiveTime, Timelike as _};
use polars::prelude::*;

/// Accepted time-of-day layouts, tried in order.
const TIME_FORMATS: [&str; 6] = [
    "%H:%M:%S",
    "%H:%M:%S%.f",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
    "%I:%M%p",
];

/// Full timestamps some exports use for the survey time.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

pub fn dependencies() -> FieldDependencies {
    FieldDependencies::new(TransformKind::DateTime)
        .reads(&[c::DAY_OF_THE_WEEK, c::SURVEY_TIME])
        .writes(&[c::WEEKPART, c::DAY_PART])
        .requires(Requirement::required(&[c::DAY_OF_THE_WEEK]))
}

#[derive(Debug, Clone)]
pub struct DateTimeTransform {
    config: PipelineConfig,
}

impl DateTimeTransform {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl SurveyTransform for DateTimeTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::DateTime
    }

    fn dependencies(&self) -> FieldDependencies {
        dependencies()
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut df = df.lazy().with_column(weekpart_expr()).collect()?;

        let times = frame::optional_strings(&df, c::SURVEY_TIME)?;
        let mut unparsed = 0usize;
        let day_parts: Vec<Option<&'static str>> = times
            .iter()
            .map(|time| {
                let time = time.as_deref()?;
                let hour = parse_hour(time);
                if hour.is_none() {
                    unparsed += 1;
                }
                hour.map(|h| self.config.day_part_for_hour(h).as_str())
            })
            .collect();
        if unparsed > 0 {
            tracing::debug!(unparsed, "Survey times that match no known format left null");
        }
        frame::put_codes(&mut df, c::DAY_PART, day_parts)?;

        Ok(df)
    }
}

/// Saturday and Sunday are the weekend; unknown or null days stay null.
fn weekpart_expr() -> Expr {
    let day = col(c::DAY_OF_THE_WEEK).cast(DataType::String);
    let any_of = |part: Weekpart| {
        DayOfWeek::ALL
            .iter()
            .filter(|d| d.weekpart() == part)
            .map(|d| day.clone().eq(lit(d.as_str())))
            .reduce(|a, b| a.or(b))
            .unwrap_or_else(|| lit(false))
    };

    when(any_of(Weekpart::Weekend))
        .then(lit(Weekpart::Weekend.as_str()))
        .when(any_of(Weekpart::Weekday))
        .then(lit(Weekpart::Weekday.as_str()))
        .otherwise(lit(NULL).cast(DataType::String))
        .alias(c::WEEKPART)
}

/// Hour of day from the first layout that parses, or `None`.
pub fn parse_hour(value: &str) -> Option<u32> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
        .or_else(|| {
            TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|timestamp| timestamp.time())
        })
        .map(|time| time.hour())
}

/// Day part for a raw survey time under `config`.
pub fn day_part(config: &PipelineConfig, survey_time: &str) -> Option<DayPart> {
    parse_hour(survey_time).map(|hour| config.day_part_for_hour(hour))
}
