//! Path labels: short mode codes, technologies used, best mode, transfer type
//! and time period.
//!
//! This stage only labels. Unknown technologies become null codes rather than
//! errors; route validity is the transfers stage's concern.

use super::SurveyTransform;
use crate::codebook::{Codebook as _, DayPart, ModeCode, Technology, TransferType};
use crate::dependencies::{FieldDependencies, Requirement, TransformKind};
use crate::error::Result;
use crate::frame;
use crate::schema::columns as c;
use polars::prelude::*;
use std::collections::BTreeSet;

/// Separator between operator and station pair in generated route labels.
const ROUTE_OPERATOR_SEPARATOR: &str = "___";
/// Separator between entry and exit stations in generated route labels.
const ROUTE_STATION_SEPARATOR: &str = "&&&";

/// `used<CODE>` flag column for each mode code.
pub const USED_COLUMNS: [(ModeCode, &str); 6] = [
    (ModeCode::LocalBus, c::USED_LB),
    (ModeCode::ExpressBus, c::USED_EB),
    (ModeCode::LightRail, c::USED_LR),
    (ModeCode::HeavyRail, c::USED_HR),
    (ModeCode::CommuterRail, c::USED_CR),
    (ModeCode::Ferry, c::USED_FR),
];

pub fn dependencies() -> FieldDependencies {
    let mut deps = FieldDependencies::new(TransformKind::PathLabels)
        .reads(&[
            c::VEHICLE_TECH,
            c::FIRST_BOARD_TECH,
            c::LAST_ALIGHT_TECH,
            c::BOARDINGS,
            c::DAY_PART,
            c::ROUTE,
            c::CANONICAL_OPERATOR,
            c::ONOFF_ENTER_STATION,
            c::ONOFF_EXIT_STATION,
        ])
        .writes(&[
            c::ROUTE,
            c::SURVEY_MODE,
            c::FIRST_BOARD_MODE,
            c::LAST_ALIGHT_MODE,
            c::USED_TOTAL,
            c::BEST_MODE,
            c::TRANSFER_TYPE,
            c::PERIOD,
        ])
        .requires(Requirement::required(&[
            c::VEHICLE_TECH,
            c::FIRST_BOARD_TECH,
            c::LAST_ALIGHT_TECH,
        ]));
    for (_, column) in USED_COLUMNS {
        deps = deps.writes(&[column]);
    }
    deps
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathLabelsTransform;

impl SurveyTransform for PathLabelsTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::PathLabels
    }

    fn dependencies(&self) -> FieldDependencies {
        dependencies()
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut df = df;

        let routes = route_labels(&df)?;
        frame::put_strings(&mut df, c::ROUTE, routes)?;

        let survey = mode_codes(&df, c::VEHICLE_TECH)?;
        let first = mode_codes(&df, c::FIRST_BOARD_TECH)?;
        let last = mode_codes(&df, c::LAST_ALIGHT_TECH)?;
        let boardings = frame::optional_ints(&df, c::BOARDINGS)?;

        let used: Vec<BTreeSet<ModeCode>> = survey
            .iter()
            .zip(&first)
            .zip(&last)
            .map(|((s, f), l)| [*s, *f, *l].into_iter().flatten().collect())
            .collect();

        for (code, column) in USED_COLUMNS {
            let flags = used.iter().map(|codes| codes.contains(&code)).collect();
            frame::put_flags(&mut df, column, flags)?;
        }

        let totals = used.iter().map(|codes| Some(codes.len() as i64)).collect();
        frame::put_ints(&mut df, c::USED_TOTAL, totals)?;

        frame::put_codes(
            &mut df,
            c::BEST_MODE,
            used.iter().map(|codes| Some(best_mode(codes).as_str())),
        )?;
        frame::put_codes(
            &mut df,
            c::TRANSFER_TYPE,
            used.iter()
                .zip(&boardings)
                .map(|(codes, boardings)| transfer_type(codes, *boardings).map(|t| t.as_str())),
        )?;

        frame::put_codes(&mut df, c::SURVEY_MODE, as_codes(&survey))?;
        frame::put_codes(&mut df, c::FIRST_BOARD_MODE, as_codes(&first))?;
        frame::put_codes(&mut df, c::LAST_ALIGHT_MODE, as_codes(&last))?;

        let periods = frame::parsed_values(&df, c::DAY_PART, DayPart::parse)?;
        frame::put_codes(
            &mut df,
            c::PERIOD,
            periods
                .into_iter()
                .map(|day_part| day_part.map(|d| d.period().as_str())),
        )?;

        Ok(df)
    }
}

/// Supplied routes are kept; missing ones are generated from the operator
/// and the entry/exit stations when all three are known.
fn route_labels(df: &DataFrame) -> Result<Vec<Option<String>>> {
    let supplied = frame::optional_strings(df, c::ROUTE)?;
    let operators = frame::optional_strings(df, c::CANONICAL_OPERATOR)?;
    let enters = frame::optional_strings(df, c::ONOFF_ENTER_STATION)?;
    let exits = frame::optional_strings(df, c::ONOFF_EXIT_STATION)?;

    Ok(supplied
        .into_iter()
        .zip(operators)
        .zip(enters)
        .zip(exits)
        .map(|(((route, operator), enter), exit)| {
            route.or_else(|| {
                Some(station_route(
                    operator.as_deref()?,
                    enter.as_deref()?,
                    exit.as_deref()?,
                ))
            })
        })
        .collect())
}

pub fn station_route(operator: &str, enter: &str, exit: &str) -> String {
    format!("{operator}{ROUTE_OPERATOR_SEPARATOR}{enter}{ROUTE_STATION_SEPARATOR}{exit}")
}

fn mode_codes(df: &DataFrame, column: &str) -> Result<Vec<Option<ModeCode>>> {
    Ok(frame::parsed_values(df, column, Technology::parse)?
        .into_iter()
        .map(|tech| tech.map(Technology::mode_code))
        .collect())
}

fn as_codes(codes: &[Option<ModeCode>]) -> Vec<Option<&'static str>> {
    codes.iter().map(|code| code.map(ModeCode::as_str)).collect()
}

/// Highest code in the hierarchy, local bus when nothing is known.
pub fn best_mode(used: &BTreeSet<ModeCode>) -> ModeCode {
    used.iter().max().copied().unwrap_or(ModeCode::LocalBus)
}

pub fn transfer_type(used: &BTreeSet<ModeCode>, boardings: Option<i64>) -> Option<TransferType> {
    let boardings = boardings?;
    let mut codes = used.iter().copied();
    let label = match (boardings, used.len()) {
        (1, _) => TransferType::NoTransfers,
        (_, 2) => match (codes.next(), codes.next()) {
            (Some(a), Some(b)) => TransferType::pair(a, b),
            _ => TransferType::Other,
        },
        (b, 1) if b > 1 => match codes.next() {
            Some(code) => TransferType::pair(code, code),
            None => TransferType::Other,
        },
        _ => TransferType::Other,
    };
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn used(codes: &[ModeCode]) -> BTreeSet<ModeCode> {
        codes.iter().copied().collect()
    }

    #[test]
    fn test_best_mode_hierarchy() {
        assert_eq!(
            best_mode(&used(&[ModeCode::Ferry, ModeCode::LightRail])),
            ModeCode::LightRail
        );
        assert_eq!(
            best_mode(&used(&[ModeCode::ExpressBus, ModeCode::Ferry])),
            ModeCode::Ferry
        );
        assert_eq!(
            best_mode(&used(&[ModeCode::HeavyRail, ModeCode::CommuterRail])),
            ModeCode::CommuterRail
        );
        assert_eq!(best_mode(&used(&[])), ModeCode::LocalBus);
    }

    #[test]
    fn test_transfer_type_labels() {
        let lb_hr = used(&[ModeCode::HeavyRail, ModeCode::LocalBus]);
        assert_eq!(transfer_type(&lb_hr, Some(2)), Some(TransferType::LbHr));
        assert_eq!(transfer_type(&lb_hr, Some(1)), Some(TransferType::NoTransfers));
        assert_eq!(
            transfer_type(&used(&[ModeCode::LocalBus]), Some(3)),
            Some(TransferType::LbLb)
        );
        assert_eq!(
            transfer_type(
                &used(&[ModeCode::LocalBus, ModeCode::Ferry, ModeCode::HeavyRail]),
                Some(3)
            ),
            Some(TransferType::Other)
        );
        assert_eq!(transfer_type(&lb_hr, None), None);
    }

    #[test]
    fn test_station_route_format() {
        assert_eq!(
            station_route("BART", "EMBARCADERO", "MONTGOMERY"),
            "BART___EMBARCADERO&&&MONTGOMERY"
        );
    }

    #[test]
    fn test_apply_labels_a_rail_trip() -> Result<()> {
        let df = df!(
            "vehicle_tech" => ["Heavy Rail", "Local Bus"],
            "first_board_tech" => [Some("Local Bus"), Some("Local Bus")],
            "last_alight_tech" => [Some("Heavy Rail"), None],
            "boardings" => [2i64, 1],
            "day_part" => [Some("AM PEAK"), None],
            "route" => [None, Some("51A")],
            "canonical_operator" => [Some("BART"), Some("AC TRANSIT")],
            "onoff_enter_station" => [Some("EMBARCADERO"), None],
            "onoff_exit_station" => [Some("MONTGOMERY"), None]
        )?;
        let out = PathLabelsTransform.run(df)?;

        assert_eq!(
            frame::string_values(&out, c::ROUTE)?,
            vec![
                Some("BART___EMBARCADERO&&&MONTGOMERY".to_owned()),
                Some("51A".to_owned())
            ]
        );
        assert_eq!(
            frame::string_values(&out, c::TRANSFER_TYPE)?,
            vec![Some("LB_HR".to_owned()), Some("NO_TRANSFERS".to_owned())]
        );
        assert_eq!(
            frame::string_values(&out, c::BEST_MODE)?,
            vec![Some("HR".to_owned()), Some("LB".to_owned())]
        );
        assert_eq!(frame::int_values(&out, c::USED_TOTAL)?, vec![Some(2), Some(1)]);
        assert_eq!(
            frame::flag_values(&out, c::USED_HR)?,
            vec![Some(true), Some(false)]
        );
        assert_eq!(
            frame::string_values(&out, c::LAST_ALIGHT_MODE)?,
            vec![Some("HR".to_owned()), None]
        );
        assert_eq!(
            frame::string_values(&out, c::PERIOD)?,
            vec![Some("AM".to_owned()), None]
        );
        Ok(())
    }
}
