//! Technology chain of the trip: transfer-leg technologies, boardings and
//! first/last technologies.
//!
//! Every populated leg must resolve through the route crosswalk. An unmapped
//! leg would silently undercount boardings, so all failures are collected and
//! the stage fails as a whole.

use super::SurveyTransform;
use crate::codebook::{Codebook as _, Technology};
use crate::dependencies::{FieldDependencies, Requirement, TransformKind};
use crate::error::{Result, SurveyError, UnresolvedTransfer};
use crate::frame;
use crate::reference::{RouteTechnology, RouteTechnologyLookup};
use crate::schema::{LegSide, TRANSFER_LEGS, TransferLeg, columns as c};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Presence flag column for each technology.
pub const PRESENCE_COLUMNS: [(Technology, &str); 6] = [
    (Technology::LocalBus, c::LOCAL_BUS_PRESENT),
    (Technology::ExpressBus, c::EXPRESS_BUS_PRESENT),
    (Technology::LightRail, c::LIGHT_RAIL_PRESENT),
    (Technology::HeavyRail, c::HEAVY_RAIL_PRESENT),
    (Technology::CommuterRail, c::COMMUTER_RAIL_PRESENT),
    (Technology::Ferry, c::FERRY_PRESENT),
];

pub fn dependencies() -> FieldDependencies {
    let mut deps = FieldDependencies::new(TransformKind::Transfers)
        .reads(&[c::VEHICLE_TECH])
        .writes(&[
            c::BOARDINGS,
            c::TRANSFER_FROM,
            c::TRANSFER_TO,
            c::FIRST_BOARD_TECH,
            c::LAST_ALIGHT_TECH,
        ])
        .requires(Requirement::required(&[c::VEHICLE_TECH]));

    for (_, column) in PRESENCE_COLUMNS {
        deps = deps.writes(&[column]);
    }
    for leg in &TRANSFER_LEGS {
        deps = deps
            .reads(&[leg.route, leg.operator])
            .writes(&[leg.technology])
            .requires(Requirement::all_or_none(&[leg.route, leg.operator]));
    }
    deps
}

pub struct TransfersTransform<'a> {
    crosswalk: &'a dyn RouteTechnologyLookup,
}

impl<'a> TransfersTransform<'a> {
    pub fn new(crosswalk: &'a dyn RouteTechnologyLookup) -> Self {
        Self { crosswalk }
    }
}

/// A populated leg after crosswalk lookup. `operator` is the value the
/// respondent's record supplied, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLeg {
    pub operator: String,
    pub technology: Technology,
}

/// Leg values for one row, resolved or not populated.
pub type ResolvedLegs = [Option<ResolvedLeg>; 6];

impl SurveyTransform for TransfersTransform<'_> {
    fn kind(&self) -> TransformKind {
        TransformKind::Transfers
    }

    fn dependencies(&self) -> FieldDependencies {
        dependencies()
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut df = df;
        let rows = self.resolve_legs(&df)?;
        let vehicle = frame::parsed_values(&df, c::VEHICLE_TECH, Technology::parse)?;

        for (idx, leg) in TRANSFER_LEGS.iter().enumerate() {
            let technologies: Vec<_> = rows
                .iter()
                .map(|legs| legs[idx].as_ref().map(|r| r.technology.as_str()))
                .collect();
            frame::put_codes(&mut df, leg.technology, technologies)?;
        }

        for (technology, column) in PRESENCE_COLUMNS {
            let present: Vec<bool> = rows
                .iter()
                .zip(&vehicle)
                .map(|(legs, vehicle)| {
                    *vehicle == Some(technology)
                        || legs
                            .iter()
                            .flatten()
                            .any(|leg| leg.technology == technology)
                })
                .collect();
            frame::put_flags(&mut df, column, present)?;
        }

        let boardings: Vec<_> = rows
            .iter()
            .map(|legs| Some(boardings(legs)))
            .collect();
        frame::put_ints(&mut df, c::BOARDINGS, boardings)?;

        let transfer_from: Vec<_> = rows.iter().map(transfer_from).collect();
        let transfer_to: Vec<_> = rows.iter().map(transfer_to).collect();
        frame::put_strings(&mut df, c::TRANSFER_FROM, transfer_from)?;
        frame::put_strings(&mut df, c::TRANSFER_TO, transfer_to)?;

        let first: Vec<_> = rows
            .iter()
            .zip(&vehicle)
            .map(|(legs, vehicle)| first_board_tech(legs, *vehicle).map(|t| t.as_str()))
            .collect();
        let last: Vec<_> = rows
            .iter()
            .zip(&vehicle)
            .map(|(legs, vehicle)| last_alight_tech(legs, *vehicle).map(|t| t.as_str()))
            .collect();
        frame::put_codes(&mut df, c::FIRST_BOARD_TECH, first)?;
        frame::put_codes(&mut df, c::LAST_ALIGHT_TECH, last)?;

        Ok(df)
    }
}

impl TransfersTransform<'_> {
    /// Looks up every populated leg of every row. Fails with the complete,
    /// deduplicated list of unresolved legs.
    fn resolve_legs(&self, df: &DataFrame) -> Result<Vec<ResolvedLegs>> {
        let mut rows: Vec<ResolvedLegs> = vec![Default::default(); df.height()];
        let mut unresolved = BTreeSet::new();

        for (idx, leg) in TRANSFER_LEGS.iter().enumerate() {
            let routes = frame::optional_strings(df, leg.route)?;
            let operators = frame::optional_strings(df, leg.operator)?;

            for (row, (route, operator)) in routes.into_iter().zip(operators).enumerate() {
                let Some(route) = route.filter(|r| !r.trim().is_empty()) else {
                    continue;
                };
                match self.lookup(leg, operator.as_deref(), &route) {
                    Ok(resolved) => rows[row][idx] = Some(resolved),
                    Err(failure) => {
                        unresolved.insert(failure);
                    }
                }
            }
        }

        if !unresolved.is_empty() {
            tracing::error!(
                count = unresolved.len(),
                crosswalk = self.crosswalk.version(),
                "Transfer legs missing from the route crosswalk"
            );
            return Err(SurveyError::UnresolvedTransfers(
                unresolved.into_iter().collect(),
            ));
        }
        Ok(rows)
    }

    fn lookup(
        &self,
        leg: &TransferLeg,
        operator: Option<&str>,
        route: &str,
    ) -> std::result::Result<ResolvedLeg, UnresolvedTransfer> {
        let Some(operator) = operator else {
            return Err(UnresolvedTransfer {
                leg: leg.name,
                operator: None,
                route: route.to_owned(),
            });
        };
        self.crosswalk
            .get_route_technology(operator, route)
            .map(|resolved: RouteTechnology| ResolvedLeg {
                operator: operator.trim().to_owned(),
                technology: resolved.technology,
            })
            .map_err(|err| UnresolvedTransfer {
                leg: leg.name,
                operator: Some(err.operator),
                route: err.route,
            })
    }
}

/// Resolved legs on one side of the surveyed ride, in trip-chain order.
fn legs_on(
    legs: &ResolvedLegs,
    side: LegSide,
) -> impl DoubleEndedIterator<Item = &ResolvedLeg> {
    legs.iter()
        .enumerate()
        .filter(move |(idx, _)| TRANSFER_LEGS[*idx].side == side)
        .filter_map(|(_, resolved)| resolved.as_ref())
}

/// One boarding for the surveyed vehicle plus one per resolved leg.
pub fn boardings(legs: &ResolvedLegs) -> i64 {
    1 + legs.iter().flatten().count() as i64
}

/// Operator of the leg boarded just before the surveyed vehicle, as supplied.
fn transfer_from(legs: &ResolvedLegs) -> Option<String> {
    legs_on(legs, LegSide::Before)
        .next_back()
        .map(|leg| leg.operator.clone())
}

/// Operator of the first leg after the surveyed vehicle, as supplied.
fn transfer_to(legs: &ResolvedLegs) -> Option<String> {
    let first_after = TRANSFER_LEGS
        .iter()
        .position(|leg| leg.side == LegSide::After)?;
    legs[first_after]
        .as_ref()
        .map(|leg| leg.operator.clone())
}

fn first_board_tech(legs: &ResolvedLegs, vehicle: Option<Technology>) -> Option<Technology> {
    legs_on(legs, LegSide::Before)
        .next()
        .map(|leg| leg.technology)
        .or(vehicle)
}

fn last_alight_tech(legs: &ResolvedLegs, vehicle: Option<Technology>) -> Option<Technology> {
    legs_on(legs, LegSide::After)
        .next_back()
        .map(|leg| leg.technology)
        .or(vehicle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Crosswalk;

    fn crosswalk() -> Crosswalk {
        let entry = |technology, operator: &str| RouteTechnology {
            technology,
            canonical_operator: operator.to_owned(),
            operator_detail: None,
        };
        Crosswalk::from_records(
            "test",
            [
                (
                    "AC Transit".to_owned(),
                    "51A".to_owned(),
                    entry(Technology::LocalBus, "AC TRANSIT"),
                ),
                (
                    "AC Transit (local)".to_owned(),
                    "51A".to_owned(),
                    entry(Technology::LocalBus, "AC TRANSIT"),
                ),
                (
                    "Muni".to_owned(),
                    "N".to_owned(),
                    entry(Technology::LightRail, "SF MUNI"),
                ),
                (
                    "Caltrain".to_owned(),
                    "Local".to_owned(),
                    entry(Technology::CommuterRail, "CALTRAIN"),
                ),
            ],
        )
    }

    fn leg_frame(
        before: [Option<(&str, &str)>; 3],
        after: [Option<(&str, &str)>; 3],
    ) -> PolarsResult<DataFrame> {
        let mut df = df!("vehicle_tech" => ["Heavy Rail"])?;
        for (leg, value) in TRANSFER_LEGS.iter().zip(before.iter().chain(after.iter())) {
            let (operator, route) = value.unzip();
            df.with_column(Series::new(leg.operator.into(), [operator]))?;
            df.with_column(Series::new(leg.route.into(), [route]))?;
        }
        Ok(df)
    }

    #[test]
    fn test_one_leg_each_side() -> Result<()> {
        let df = leg_frame(
            [Some(("AC Transit", "51A")), None, None],
            [Some(("Muni", "N")), None, None],
        )?;
        let crosswalk = crosswalk();
        let out = TransfersTransform::new(&crosswalk).run(df)?;

        assert_eq!(frame::int_values(&out, c::BOARDINGS)?, vec![Some(3)]);
        assert_eq!(frame::flag_values(&out, c::HEAVY_RAIL_PRESENT)?, vec![Some(true)]);
        assert_eq!(frame::flag_values(&out, c::LOCAL_BUS_PRESENT)?, vec![Some(true)]);
        assert_eq!(frame::flag_values(&out, c::LIGHT_RAIL_PRESENT)?, vec![Some(true)]);
        assert_eq!(frame::flag_values(&out, c::FERRY_PRESENT)?, vec![Some(false)]);
        assert_eq!(
            frame::string_values(&out, c::FIRST_BOARD_TECH)?,
            vec![Some("Local Bus".to_owned())]
        );
        assert_eq!(
            frame::string_values(&out, c::LAST_ALIGHT_TECH)?,
            vec![Some("Light Rail".to_owned())]
        );
        assert_eq!(
            frame::string_values(&out, c::TRANSFER_FROM)?,
            vec![Some("AC Transit".to_owned())]
        );
        assert_eq!(
            frame::string_values(&out, c::TRANSFER_TO)?,
            vec![Some("Muni".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn test_transfer_operators_are_reported_as_supplied() -> Result<()> {
        let df = leg_frame(
            [Some((" AC Transit (local) ", "51A")), None, None],
            [Some(("Muni", "N")), None, None],
        )?;
        let crosswalk = crosswalk();
        let out = TransfersTransform::new(&crosswalk).run(df)?;

        assert_eq!(
            frame::string_values(&out, c::TRANSFER_FROM)?,
            vec![Some("AC Transit (local)".to_owned())]
        );
        assert_eq!(
            frame::string_values(&out, TRANSFER_LEGS[0].technology)?,
            vec![Some("Local Bus".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn test_no_legs_falls_back_to_vehicle() -> Result<()> {
        let df = df!("vehicle_tech" => ["Ferry"])?;
        let crosswalk = crosswalk();
        let out = TransfersTransform::new(&crosswalk).run(df)?;

        assert_eq!(frame::int_values(&out, c::BOARDINGS)?, vec![Some(1)]);
        assert_eq!(
            frame::string_values(&out, c::FIRST_BOARD_TECH)?,
            vec![Some("Ferry".to_owned())]
        );
        assert_eq!(
            frame::string_values(&out, c::LAST_ALIGHT_TECH)?,
            vec![Some("Ferry".to_owned())]
        );
        assert_eq!(frame::string_values(&out, c::TRANSFER_FROM)?, vec![None]);
        Ok(())
    }

    #[test]
    fn test_transfer_from_prefers_leg_closest_to_surveyed_ride() -> Result<()> {
        let df = leg_frame(
            [Some(("Caltrain", "Local")), Some(("AC Transit", "51A")), None],
            [None, Some(("Muni", "N")), None],
        )?;
        let crosswalk = crosswalk();
        let out = TransfersTransform::new(&crosswalk).run(df)?;

        assert_eq!(
            frame::string_values(&out, c::TRANSFER_FROM)?,
            vec![Some("AC Transit".to_owned())]
        );
        assert_eq!(frame::string_values(&out, c::TRANSFER_TO)?, vec![None]);
        assert_eq!(
            frame::string_values(&out, c::FIRST_BOARD_TECH)?,
            vec![Some("Commuter Rail".to_owned())]
        );
        assert_eq!(
            frame::string_values(&out, c::LAST_ALIGHT_TECH)?,
            vec![Some("Light Rail".to_owned())]
        );
        assert_eq!(frame::int_values(&out, c::BOARDINGS)?, vec![Some(4)]);
        Ok(())
    }

    #[test]
    fn test_unresolved_legs_fail_the_whole_table() -> Result<()> {
        let df = leg_frame(
            [Some(("AC Transit", "99X")), None, None],
            [Some(("Muni", "N")), Some(("BART", "Red")), None],
        )?;
        let crosswalk = crosswalk();
        let err = TransfersTransform::new(&crosswalk).run(df).unwrap_err();

        let SurveyError::UnresolvedTransfers(legs) = err else {
            panic!("expected unresolved transfers");
        };
        let names: Vec<_> = legs.iter().map(|l| (l.leg, l.route.as_str())).collect();
        assert_eq!(names, vec![("first_before", "99X"), ("second_after", "Red")]);
        Ok(())
    }

    #[test]
    fn test_route_without_operator_is_rejected_by_requirements() -> Result<()> {
        let df = df!(
            "vehicle_tech" => ["Heavy Rail"],
            "first_route_before_survey_board" => ["51A"]
        )?;
        let crosswalk = crosswalk();
        let err = TransfersTransform::new(&crosswalk).run(df).unwrap_err();
        assert!(matches!(err, SurveyError::MissingColumns { .. }));
        Ok(())
    }
}
