//! Race, home language, fare medium and birth year.
//!
//! Race is an ordered rule table over the six race dummies. Rule order
//! matters: the White + Middle-Eastern exception must fire before the generic
//! multi-race rule.

use super::SurveyTransform;
use crate::codebook::{Codebook as _, Race};
use crate::dependencies::{FieldDependencies, Requirement, TransformKind};
use crate::error::Result;
use crate::frame;
use crate::schema::columns as c;
use polars::prelude::*;

const RACE_DUMMIES: [&str; 6] = [
    c::RACE_DMY_IND,
    c::RACE_DMY_ASN,
    c::RACE_DMY_BLK,
    c::RACE_DMY_HWI,
    c::RACE_DMY_WHT,
    c::RACE_DMY_MDL_ESTN,
];

const LANGUAGE_COLUMNS: [&str; 3] = [
    c::LANGUAGE_AT_HOME_BINARY,
    c::LANGUAGE_AT_HOME_DETAIL,
    c::LANGUAGE_AT_HOME_DETAIL_OTHER,
];

/// Free-text race answers this short are noise ("na", "-").
const MIN_OTHER_RACE_CHARS: usize = 3;

/// Marker for "see the detail column" in the language questions.
const OTHER_LANGUAGE: &str = "other";

pub fn dependencies() -> FieldDependencies {
    let mut race_shapes: Vec<&[&str]> = RACE_DUMMIES.iter().map(std::slice::from_ref).collect();
    race_shapes.push(&[c::RACE_CAT]);

    FieldDependencies::new(TransformKind::Demographics)
        .reads(&RACE_DUMMIES)
        .reads(&[c::RACE_CAT, c::RACE_OTHER_STRING])
        .reads(&LANGUAGE_COLUMNS)
        .reads(&[c::FARE_MEDIUM, c::CLIPPER_DETAIL])
        .reads(&[c::APPROXIMATE_AGE, c::SURVEY_YEAR])
        .writes(&[
            c::RACE,
            c::LANGUAGE_AT_HOME,
            c::FARE_MEDIUM,
            c::YEAR_BORN_FOUR_DIGIT,
        ])
        .drops(&RACE_DUMMIES)
        .drops(&[c::RACE_CAT, c::RACE_OTHER_STRING, c::CLIPPER_DETAIL])
        .drops(&LANGUAGE_COLUMNS)
        .requires(Requirement::one_of(&race_shapes))
        .requires(Requirement::all_or_none(&LANGUAGE_COLUMNS))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DemographicsTransform;

impl SurveyTransform for DemographicsTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::Demographics
    }

    fn dependencies(&self) -> FieldDependencies {
        dependencies()
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut df = df;
        derive_race(&mut df)?;
        derive_language(&mut df)?;
        derive_fare_medium(&mut df)?;
        derive_year_born(&mut df)?;
        Ok(df)
    }
}

/// One respondent's race answers. Missing dummies count as not selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaceAnswers {
    pub american_indian: bool,
    pub asian: bool,
    pub black: bool,
    pub pacific_islander: bool,
    pub white: bool,
    pub middle_eastern: bool,
    pub other_text: Option<String>,
    pub category: Option<Race>,
}

impl RaceAnswers {
    /// Count of Asian, Black, White and Middle-Eastern selections.
    pub fn dummy_sum_limited(&self) -> usize {
        [self.asian, self.black, self.white, self.middle_eastern]
            .into_iter()
            .filter(|selected| *selected)
            .count()
    }

    fn has_other_text(&self) -> bool {
        self.other_text
            .as_deref()
            .is_some_and(|text| text.trim().chars().count() >= MIN_OTHER_RACE_CHARS)
    }
}

/// Named race rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceRule {
    WhiteMiddleEastern,
    MultiRacial,
    OtherText,
    SingleRace,
    IndigenousOrPacific,
    Precategorized,
    Unresolved,
}

pub fn classify_race(answers: &RaceAnswers) -> (Race, RaceRule) {
    let limited = answers.dummy_sum_limited();

    if answers.white
        && answers.middle_eastern
        && !answers.asian
        && !answers.black
        && !answers.american_indian
        && !answers.pacific_islander
    {
        return (Race::White, RaceRule::WhiteMiddleEastern);
    }
    if limited >= 2 {
        return (Race::Other, RaceRule::MultiRacial);
    }
    if limited == 0 && answers.has_other_text() {
        return (Race::Other, RaceRule::OtherText);
    }
    if limited == 1 {
        let race = if answers.asian {
            Race::Asian
        } else if answers.black {
            Race::Black
        } else {
            Race::White
        };
        return (race, RaceRule::SingleRace);
    }
    if answers.american_indian || answers.pacific_islander {
        return (Race::Other, RaceRule::IndigenousOrPacific);
    }
    if let Some(category) = answers.category {
        return (category, RaceRule::Precategorized);
    }
    (Race::Missing, RaceRule::Unresolved)
}

fn derive_race(df: &mut DataFrame) -> Result<()> {
    let [ind, asn, blk, hwi, wht, mdl] = [
        frame::flags_or_false(df, c::RACE_DMY_IND)?,
        frame::flags_or_false(df, c::RACE_DMY_ASN)?,
        frame::flags_or_false(df, c::RACE_DMY_BLK)?,
        frame::flags_or_false(df, c::RACE_DMY_HWI)?,
        frame::flags_or_false(df, c::RACE_DMY_WHT)?,
        frame::flags_or_false(df, c::RACE_DMY_MDL_ESTN)?,
    ];
    let other_text = frame::optional_strings(df, c::RACE_OTHER_STRING)?;
    let categories = frame::parsed_values(df, c::RACE_CAT, Race::parse)?;

    let races: Vec<_> = (0..df.height())
        .map(|row| {
            let answers = RaceAnswers {
                american_indian: ind[row],
                asian: asn[row],
                black: blk[row],
                pacific_islander: hwi[row],
                white: wht[row],
                middle_eastern: mdl[row],
                other_text: other_text[row].clone(),
                category: categories[row],
            };
            Some(classify_race(&answers).0.as_str())
        })
        .collect();

    frame::put_codes(df, c::RACE, races)?;
    frame::drop_if_present(df, &RACE_DUMMIES)?;
    frame::drop_if_present(df, &[c::RACE_CAT, c::RACE_OTHER_STRING])?;
    Ok(())
}

/// Resolves the binary / detail / detail-other triplet to one uppercase value.
pub fn language_at_home<'a>(
    binary: Option<&'a str>,
    detail: Option<&'a str>,
    detail_other: Option<&'a str>,
) -> Option<String> {
    let is_other = |value: &str| value.trim().eq_ignore_ascii_case(OTHER_LANGUAGE);

    let mut language = binary?;
    if is_other(language) {
        language = detail?;
    }
    if is_other(language) {
        language = detail_other?;
    }
    Some(language.trim().to_uppercase())
}

fn derive_language(df: &mut DataFrame) -> Result<()> {
    if !LANGUAGE_COLUMNS.iter().all(|name| frame::has_column(df, name)) {
        return Ok(());
    }
    let binary = frame::string_values(df, c::LANGUAGE_AT_HOME_BINARY)?;
    let detail = frame::string_values(df, c::LANGUAGE_AT_HOME_DETAIL)?;
    let detail_other = frame::string_values(df, c::LANGUAGE_AT_HOME_DETAIL_OTHER)?;

    let languages: Vec<_> = binary
        .iter()
        .zip(&detail)
        .zip(&detail_other)
        .map(|((b, d), o)| language_at_home(b.as_deref(), d.as_deref(), o.as_deref()))
        .collect();

    frame::put_strings(df, c::LANGUAGE_AT_HOME, languages)?;
    frame::drop_if_present(df, &LANGUAGE_COLUMNS)?;
    Ok(())
}

/// A recorded smart-card product replaces the generic fare medium.
fn derive_fare_medium(df: &mut DataFrame) -> Result<()> {
    let has_fare = frame::has_column(df, c::FARE_MEDIUM);
    let has_clipper = frame::has_column(df, c::CLIPPER_DETAIL);
    if !has_fare && !has_clipper {
        return Ok(());
    }

    let fare = frame::optional_strings(df, c::FARE_MEDIUM)?;
    let clipper = frame::optional_strings(df, c::CLIPPER_DETAIL)?;
    let merged: Vec<_> = fare
        .into_iter()
        .zip(clipper)
        .map(|(fare, clipper)| clipper.or(fare).map(|value| value.to_lowercase()))
        .collect();

    frame::put_strings(df, c::FARE_MEDIUM, merged)?;
    frame::drop_if_present(df, &[c::CLIPPER_DETAIL])?;
    Ok(())
}

fn derive_year_born(df: &mut DataFrame) -> Result<()> {
    if !frame::has_column(df, c::APPROXIMATE_AGE) {
        return Ok(());
    }
    let ages = frame::int_values(df, c::APPROXIMATE_AGE)?;
    let years = frame::optional_ints(df, c::SURVEY_YEAR)?;
    let born: Vec<_> = ages
        .iter()
        .zip(&years)
        .map(|(age, year)| Some((*year)? - (*age)?))
        .collect();
    frame::put_ints(df, c::YEAR_BORN_FOUR_DIGIT, born)?;
    Ok(())
}
