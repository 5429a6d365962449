//! Column contracts for the Core input table and the Derived output table.
//!
//! Column names live in [`columns`] so transforms, the validation gate and the
//! dependency declarations all refer to the same constants.

use crate::codebook::CodebookKind;

pub mod columns {
    // Identifiers
    pub const RESPONSE_ID: &str = "response_id";
    pub const SURVEY_ID: &str = "survey_id";
    pub const ORIGINAL_ID: &str = "original_id";

    // Timing
    pub const DAY_OF_THE_WEEK: &str = "day_of_the_week";
    pub const SURVEY_TIME: &str = "survey_time";
    pub const WEEKPART: &str = "weekpart";
    pub const DAY_PART: &str = "day_part";

    // Household
    pub const VEHICLES: &str = "vehicles";
    pub const WORKERS: &str = "workers";
    pub const VEHICLE_NUMERIC: &str = "vehicle_numeric";
    pub const WORKER_NUMERIC: &str = "worker_numeric";
    pub const AUTO_TO_WORKERS_RATIO: &str = "auto_to_workers_ratio";

    // Person
    pub const GENDER: &str = "gender";
    pub const APPROXIMATE_AGE: &str = "approximate_age";
    pub const SURVEY_YEAR: &str = "survey_year";
    pub const YEAR_BORN_FOUR_DIGIT: &str = "year_born_four_digit";
    pub const WORK_STATUS: &str = "work_status";
    pub const STUDENT_STATUS: &str = "student_status";

    // Race
    pub const RACE_DMY_IND: &str = "race_dmy_ind";
    pub const RACE_DMY_ASN: &str = "race_dmy_asn";
    pub const RACE_DMY_BLK: &str = "race_dmy_blk";
    pub const RACE_DMY_HWI: &str = "race_dmy_hwi";
    pub const RACE_DMY_WHT: &str = "race_dmy_wht";
    pub const RACE_DMY_MDL_ESTN: &str = "race_dmy_mdl_estn";
    pub const RACE_CAT: &str = "race_cat";
    pub const RACE_OTHER_STRING: &str = "race_other_string";
    pub const RACE: &str = "race";

    // Language
    pub const LANGUAGE_AT_HOME_BINARY: &str = "language_at_home_binary";
    pub const LANGUAGE_AT_HOME_DETAIL: &str = "language_at_home_detail";
    pub const LANGUAGE_AT_HOME_DETAIL_OTHER: &str = "language_at_home_detail_other";
    pub const LANGUAGE_AT_HOME: &str = "language_at_home";

    // Fare
    pub const FARE_MEDIUM: &str = "fare_medium";
    pub const CLIPPER_DETAIL: &str = "clipper_detail";

    // Access / egress
    pub const ACCESS_MODE: &str = "access_mode";
    pub const EGRESS_MODE: &str = "egress_mode";

    // Surveyed vehicle and transfer chain
    pub const VEHICLE_TECH: &str = "vehicle_tech";
    pub const CANONICAL_OPERATOR: &str = "canonical_operator";
    pub const ONOFF_ENTER_STATION: &str = "onoff_enter_station";
    pub const ONOFF_EXIT_STATION: &str = "onoff_exit_station";
    pub const BOARDINGS: &str = "boardings";
    pub const TRANSFER_FROM: &str = "transfer_from";
    pub const TRANSFER_TO: &str = "transfer_to";
    pub const FIRST_BOARD_TECH: &str = "first_board_tech";
    pub const LAST_ALIGHT_TECH: &str = "last_alight_tech";

    pub const LOCAL_BUS_PRESENT: &str = "local_bus_present";
    pub const EXPRESS_BUS_PRESENT: &str = "express_bus_present";
    pub const LIGHT_RAIL_PRESENT: &str = "light_rail_present";
    pub const HEAVY_RAIL_PRESENT: &str = "heavy_rail_present";
    pub const COMMUTER_RAIL_PRESENT: &str = "commuter_rail_present";
    pub const FERRY_PRESENT: &str = "ferry_present";

    // Path labels
    pub const ROUTE: &str = "route";
    pub const SURVEY_MODE: &str = "survey_mode";
    pub const FIRST_BOARD_MODE: &str = "first_board_mode";
    pub const LAST_ALIGHT_MODE: &str = "last_alight_mode";
    pub const USED_LB: &str = "usedLB";
    pub const USED_EB: &str = "usedEB";
    pub const USED_LR: &str = "usedLR";
    pub const USED_HR: &str = "usedHR";
    pub const USED_CR: &str = "usedCR";
    pub const USED_FR: &str = "usedFR";
    pub const USED_TOTAL: &str = "usedTotal";
    pub const BEST_MODE: &str = "BEST_MODE";
    pub const TRANSFER_TYPE: &str = "TRANSFER_TYPE";
    pub const PERIOD: &str = "period";

    // Purposes
    pub const ORIG_PURP: &str = "orig_purp";
    pub const DEST_PURP: &str = "dest_purp";
    pub const TRIP_PURP: &str = "trip_purp";
    pub const TOUR_PURP: &str = "tour_purp";
    pub const TOUR_PURP_CASE: &str = "tour_purp_case";
    pub const AT_WORK_PRIOR_TO_ORIG_PURP: &str = "at_work_prior_to_orig_purp";
    pub const AT_WORK_AFTER_DEST_PURP: &str = "at_work_after_dest_purp";
    pub const AT_SCHOOL_PRIOR_TO_ORIG_PURP: &str = "at_school_prior_to_orig_purp";
    pub const AT_SCHOOL_AFTER_DEST_PURP: &str = "at_school_after_dest_purp";
}

use columns as c;

/// The three identifiers every Core row must carry.
pub const CORE_REQUIRED: [&str; 3] = [c::RESPONSE_ID, c::SURVEY_ID, c::ORIGINAL_ID];

/// Location prefixes with `_lat` / `_lon` columns in the Core table.
pub const LOCATIONS: [&str; 9] = [
    "orig",
    "dest",
    "survey_board",
    "survey_alight",
    "first_board",
    "last_alight",
    "home",
    "workplace",
    "school",
];

pub fn lat_column(location: &str) -> String {
    format!("{location}_lat")
}

pub fn lon_column(location: &str) -> String {
    format!("{location}_lon")
}

/// Which side of the surveyed ride a transfer leg sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegSide {
    Before,
    After,
}

/// One of the six optional transfer legs around the surveyed vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLeg {
    pub name: &'static str,
    pub side: LegSide,
    pub route: &'static str,
    pub operator: &'static str,
    pub technology: &'static str,
}

/// Legs in trip-chain order: before legs first to third, then after legs
/// first to third.
pub const TRANSFER_LEGS: [TransferLeg; 6] = [
    TransferLeg {
        name: "first_before",
        side: LegSide::Before,
        route: "first_route_before_survey_board",
        operator: "first_before_operator",
        technology: "first_before_technology",
    },
    TransferLeg {
        name: "second_before",
        side: LegSide::Before,
        route: "second_route_before_survey_board",
        operator: "second_before_operator",
        technology: "second_before_technology",
    },
    TransferLeg {
        name: "third_before",
        side: LegSide::Before,
        route: "third_route_before_survey_board",
        operator: "third_before_operator",
        technology: "third_before_technology",
    },
    TransferLeg {
        name: "first_after",
        side: LegSide::After,
        route: "first_route_after_survey_alight",
        operator: "first_after_operator",
        technology: "first_after_technology",
    },
    TransferLeg {
        name: "second_after",
        side: LegSide::After,
        route: "second_route_after_survey_alight",
        operator: "second_after_operator",
        technology: "second_after_technology",
    },
    TransferLeg {
        name: "third_after",
        side: LegSide::After,
        route: "third_route_after_survey_alight",
        operator: "third_after_operator",
        technology: "third_after_technology",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Flag,
    Category(CodebookKind),
}

/// Whether a Derived column appears in every pipeline output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Always,
    WhenSourcePresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        presence: Presence::WhenSourcePresent,
    }
}

const fn always(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        presence: Presence::Always,
    }
}

const fn category(name: &'static str, kind: CodebookKind) -> FieldSpec {
    field(name, FieldKind::Category(kind))
}

/// Typed Core fields. Location and transfer-leg columns are typed by
/// [`field_kind`] from their naming patterns.
pub const CORE_FIELDS: &[FieldSpec] = &[
    always(c::RESPONSE_ID, FieldKind::Text),
    always(c::SURVEY_ID, FieldKind::Text),
    always(c::ORIGINAL_ID, FieldKind::Text),
    category(c::DAY_OF_THE_WEEK, CodebookKind::DayOfWeek),
    field(c::SURVEY_TIME, FieldKind::Text),
    field(c::VEHICLES, FieldKind::Text),
    field(c::WORKERS, FieldKind::Text),
    category(c::GENDER, CodebookKind::Gender),
    field(c::APPROXIMATE_AGE, FieldKind::Integer),
    field(c::SURVEY_YEAR, FieldKind::Integer),
    category(c::WORK_STATUS, CodebookKind::WorkStatus),
    category(c::STUDENT_STATUS, CodebookKind::StudentStatus),
    field(c::RACE_DMY_IND, FieldKind::Flag),
    field(c::RACE_DMY_ASN, FieldKind::Flag),
    field(c::RACE_DMY_BLK, FieldKind::Flag),
    field(c::RACE_DMY_HWI, FieldKind::Flag),
    field(c::RACE_DMY_WHT, FieldKind::Flag),
    field(c::RACE_DMY_MDL_ESTN, FieldKind::Flag),
    category(c::RACE_CAT, CodebookKind::Race),
    field(c::RACE_OTHER_STRING, FieldKind::Text),
    field(c::LANGUAGE_AT_HOME_BINARY, FieldKind::Text),
    field(c::LANGUAGE_AT_HOME_DETAIL, FieldKind::Text),
    field(c::LANGUAGE_AT_HOME_DETAIL_OTHER, FieldKind::Text),
    field(c::FARE_MEDIUM, FieldKind::Text),
    field(c::CLIPPER_DETAIL, FieldKind::Text),
    category(c::ACCESS_MODE, CodebookKind::AccessMode),
    category(c::EGRESS_MODE, CodebookKind::AccessMode),
    category(c::VEHICLE_TECH, CodebookKind::Technology),
    field(c::CANONICAL_OPERATOR, FieldKind::Text),
    field(c::ONOFF_ENTER_STATION, FieldKind::Text),
    field(c::ONOFF_EXIT_STATION, FieldKind::Text),
    field(c::ROUTE, FieldKind::Text),
    category(c::ORIG_PURP, CodebookKind::Purpose),
    category(c::DEST_PURP, CodebookKind::Purpose),
    category(c::TRIP_PURP, CodebookKind::Purpose),
    field(c::AT_WORK_PRIOR_TO_ORIG_PURP, FieldKind::Flag),
    field(c::AT_WORK_AFTER_DEST_PURP, FieldKind::Flag),
    field(c::AT_SCHOOL_PRIOR_TO_ORIG_PURP, FieldKind::Flag),
    field(c::AT_SCHOOL_AFTER_DEST_PURP, FieldKind::Flag),
];

/// Pipeline-computed fields. Per-leg technologies, distances and zone
/// columns are typed by [`field_kind`] from their naming patterns.
pub const DERIVED_FIELDS: &[FieldSpec] = &[
    always(c::WEEKPART, FieldKind::Category(CodebookKind::Weekpart)),
    always(c::DAY_PART, FieldKind::Category(CodebookKind::DayPart)),
    always(c::VEHICLE_NUMERIC, FieldKind::Integer),
    always(c::WORKER_NUMERIC, FieldKind::Integer),
    always(
        c::AUTO_TO_WORKERS_RATIO,
        FieldKind::Category(CodebookKind::AutoSufficiency),
    ),
    always(c::RACE, FieldKind::Category(CodebookKind::Race)),
    field(c::LANGUAGE_AT_HOME, FieldKind::Text),
    field(c::YEAR_BORN_FOUR_DIGIT, FieldKind::Integer),
    always(c::BOARDINGS, FieldKind::Integer),
    always(c::TRANSFER_FROM, FieldKind::Text),
    always(c::TRANSFER_TO, FieldKind::Text),
    always(
        c::FIRST_BOARD_TECH,
        FieldKind::Category(CodebookKind::Technology),
    ),
    always(
        c::LAST_ALIGHT_TECH,
        FieldKind::Category(CodebookKind::Technology),
    ),
    always(c::LOCAL_BUS_PRESENT, FieldKind::Flag),
    always(c::EXPRESS_BUS_PRESENT, FieldKind::Flag),
    always(c::LIGHT_RAIL_PRESENT, FieldKind::Flag),
    always(c::HEAVY_RAIL_PRESENT, FieldKind::Flag),
    always(c::COMMUTER_RAIL_PRESENT, FieldKind::Flag),
    always(c::FERRY_PRESENT, FieldKind::Flag),
    always(c::SURVEY_MODE, FieldKind::Category(CodebookKind::ModeCode)),
    always(
        c::FIRST_BOARD_MODE,
        FieldKind::Category(CodebookKind::ModeCode),
    ),
    always(
        c::LAST_ALIGHT_MODE,
        FieldKind::Category(CodebookKind::ModeCode),
    ),
    always(c::USED_LB, FieldKind::Flag),
    always(c::USED_EB, FieldKind::Flag),
    always(c::USED_LR, FieldKind::Flag),
    always(c::USED_HR, FieldKind::Flag),
    always(c::USED_CR, FieldKind::Flag),
    always(c::USED_FR, FieldKind::Flag),
    always(c::USED_TOTAL, FieldKind::Integer),
    always(c::BEST_MODE, FieldKind::Category(CodebookKind::ModeCode)),
    always(
        c::TRANSFER_TYPE,
        FieldKind::Category(CodebookKind::TransferType),
    ),
    always(c::PERIOD, FieldKind::Category(CodebookKind::Period)),
    field(c::TOUR_PURP, FieldKind::Category(CodebookKind::Purpose)),
    field(c::TOUR_PURP_CASE, FieldKind::Text),
];

/// Type of a column of either table.
pub fn field_kind(name: &str) -> Option<FieldKind> {
    if let Some(spec) = CORE_FIELDS
        .iter()
        .chain(DERIVED_FIELDS.iter())
        .find(|f| f.name == name)
    {
        return Some(spec.kind);
    }

    if TRANSFER_LEGS.iter().any(|leg| leg.technology == name) {
        return Some(FieldKind::Category(CodebookKind::Technology));
    }

    let is_location_column = LOCATIONS
        .iter()
        .any(|loc| lat_column(loc) == name || lon_column(loc) == name);
    if is_location_column || name.starts_with("distance_") {
        return Some(FieldKind::Float);
    }

    None
}

/// Codebook backing a column, if the column is categorical.
pub fn codebook_for(name: &str) -> Option<CodebookKind> {
    match field_kind(name)? {
        FieldKind::Category(kind) => Some(kind),
        FieldKind::Text | FieldKind::Integer | FieldKind::Float | FieldKind::Flag => None,
    }
}

/// Derived columns every pipeline run must produce when all stages run.
pub fn always_derived() -> impl Iterator<Item = &'static str> {
    DERIVED_FIELDS
        .iter()
        .filter(|f| f.presence == Presence::Always)
        .map(|f| f.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_fields_have_unique_names() {
        let mut names: Vec<_> = CORE_FIELDS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CORE_FIELDS.len());
    }

    #[test]
    fn test_leg_technology_is_categorical() {
        assert_eq!(
            codebook_for("second_after_technology"),
            Some(CodebookKind::Technology)
        );
        assert_eq!(codebook_for(c::VEHICLE_TECH), Some(CodebookKind::Technology));
        assert_eq!(codebook_for(c::SURVEY_TIME), None);
        assert_eq!(codebook_for("not_a_column"), None);
    }

    #[test]
    fn test_location_columns_are_floats() {
        assert_eq!(field_kind("orig_lat"), Some(FieldKind::Float));
        assert_eq!(field_kind("distance_orig_dest"), Some(FieldKind::Float));
    }

    #[test]
    fn test_always_derived_excludes_optional_outputs() {
        let always: Vec<_> = always_derived().collect();
        assert!(always.contains(&c::BOARDINGS));
        assert!(!always.contains(&c::TOUR_PURP));
        assert!(!always.contains(&c::LANGUAGE_AT_HOME));
    }
}
