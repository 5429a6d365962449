//! Closed categorical vocabularies for the canonical survey schema.
//!
//! Every categorical column in the standard database is backed by one of the
//! enums below. Each enum owns exactly one string table, used both to parse
//! preprocessed input and to serialise derived output, so transform code never
//! compares against ad hoc string literals.

use std::fmt;

/// The sentinel some vendor exports use in place of null. It is never a valid
/// input value, even for codebooks that define it as an output.
pub const MISSING_SENTINEL: &str = "Missing";

/// A closed set of canonical values with one string form per value.
pub trait Codebook: Copy + Eq + 'static {
    /// Name used in error messages.
    const NAME: &'static str;

    /// Every value, in canonical order.
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// Exact match against the canonical string table.
    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == value)
    }

    fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.as_str()).collect()
    }
}

/// Error returned when a string is not part of a codebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCodeError {
    pub codebook: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid {} value", self.value, self.codebook)
    }
}

impl std::error::Error for UnknownCodeError {}

macro_rules! codebook {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl Codebook for $name {
            const NAME: &'static str = stringify!($name);
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownCodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <Self as Codebook>::parse(s).ok_or_else(|| UnknownCodeError {
                    codebook: <Self as Codebook>::NAME,
                    value: s.to_owned(),
                })
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = <String as serde::Deserialize>::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

codebook! {
    /// How the respondent reached the first boarding / left the last alighting.
    AccessMode {
        Walk => "walk",
        Bike => "bike",
        Knr => "knr",
        Pnr => "pnr",
        Tnc => "tnc",
        Other => "other",
    }
}

codebook! {
    DayOfWeek {
        Monday => "Monday",
        Tuesday => "Tuesday",
        Wednesday => "Wednesday",
        Thursday => "Thursday",
        Friday => "Friday",
        Saturday => "Saturday",
        Sunday => "Sunday",
    }
}

impl DayOfWeek {
    pub fn weekpart(self) -> Weekpart {
        match self {
            Self::Saturday | Self::Sunday => Weekpart::Weekend,
            Self::Monday | Self::Tuesday | Self::Wednesday | Self::Thursday | Self::Friday => {
                Weekpart::Weekday
            }
        }
    }
}

codebook! {
    Gender {
        Male => "Male",
        Female => "Female",
        Other => "Other",
    }
}

codebook! {
    /// Activity at a trip end. Also the vocabulary of `tour_purp`.
    Purpose {
        Home => "Home",
        Work => "Work",
        WorkRelated => "Work-related",
        BusinessApt => "Business apt",
        AtWork => "At work",
        School => "School",
        GradeSchool => "Grade school",
        HighSchool => "High school",
        University => "University",
        Escorting => "Escorting",
        Shopping => "Shopping",
        OtherMaintenance => "Other maintenance",
        SocialRecreation => "Social recreation",
        EatOut => "Eat out",
        OtherDiscretionary => "Other discretionary",
    }
}

impl Purpose {
    /// School purposes that are re-levelled by respondent age.
    pub fn is_age_levelled_school(self) -> bool {
        matches!(self, Self::School | Self::GradeSchool | Self::HighSchool)
    }
}

codebook! {
    /// Canonical transit technology of a vehicle or route.
    Technology {
        LocalBus => "Local Bus",
        ExpressBus => "Express Bus",
        LightRail => "Light Rail",
        HeavyRail => "Heavy Rail",
        CommuterRail => "Commuter Rail",
        Ferry => "Ferry",
    }
}

impl Technology {
    pub fn mode_code(self) -> ModeCode {
        match self {
            Self::LocalBus => ModeCode::LocalBus,
            Self::ExpressBus => ModeCode::ExpressBus,
            Self::LightRail => ModeCode::LightRail,
            Self::HeavyRail => ModeCode::HeavyRail,
            Self::CommuterRail => ModeCode::CommuterRail,
            Self::Ferry => ModeCode::Ferry,
        }
    }
}

codebook! {
    WorkStatus {
        FullOrPartTime => "Full- or part-time",
        NonWorker => "Non-worker",
    }
}

codebook! {
    StudentStatus {
        FullOrPartTime => "Full- or part-time",
        NonStudent => "Non-student",
    }
}

codebook! {
    Weekpart {
        Weekday => "Weekday",
        Weekend => "Weekend",
    }
}

codebook! {
    /// Coarse time-of-day bucket, in chronological order.
    DayPart {
        EarlyAm => "EARLY AM",
        AmPeak => "AM PEAK",
        Midday => "MIDDAY",
        PmPeak => "PM PEAK",
        Evening => "EVENING",
    }
}

impl DayPart {
    pub fn period(self) -> Period {
        match self {
            Self::EarlyAm => Period::EarlyAm,
            Self::AmPeak => Period::AmPeak,
            Self::Midday => Period::Midday,
            Self::PmPeak => Period::PmPeak,
            Self::Evening => Period::Evening,
        }
    }
}

codebook! {
    /// Short time-period code used by the path labels.
    Period {
        EarlyAm => "EA",
        AmPeak => "AM",
        Midday => "MD",
        PmPeak => "PM",
        Evening => "EV",
    }
}

codebook! {
    AutoSufficiency {
        ZeroAutos => "Zero autos",
        AutosLessThanWorkers => "Autos < workers",
        AutosAtLeastWorkers => "Autos >= workers",
    }
}

codebook! {
    Race {
        Asian => "Asian",
        Black => "Black",
        White => "White",
        Other => "Other",
        Missing => "Missing",
    }
}

codebook! {
    /// Short technology code. Declared from the bottom of the path-label
    /// hierarchy to the top, so the derived `Ord` is the hierarchy.
    ModeCode {
        LocalBus => "LB",
        ExpressBus => "EB",
        Ferry => "FR",
        LightRail => "LR",
        HeavyRail => "HR",
        CommuterRail => "CR",
    }
}

codebook! {
    TransferType {
        NoTransfers => "NO_TRANSFERS",
        LbLb => "LB_LB",
        EbEb => "EB_EB",
        FrFr => "FR_FR",
        LrLr => "LR_LR",
        HrHr => "HR_HR",
        CrCr => "CR_CR",
        LbEb => "LB_EB",
        LbFr => "LB_FR",
        LbLr => "LB_LR",
        LbHr => "LB_HR",
        LbCr => "LB_CR",
        EbFr => "EB_FR",
        EbLr => "EB_LR",
        EbHr => "EB_HR",
        EbCr => "EB_CR",
        FrLr => "FR_LR",
        FrHr => "FR_HR",
        FrCr => "FR_CR",
        LrHr => "LR_HR",
        LrCr => "LR_CR",
        HrCr => "HR_CR",
        Other => "OTHER",
    }
}

/// Fixed technology pairing table, lower-hierarchy code first.
const TRANSFER_PAIRS: &[(ModeCode, ModeCode, TransferType)] = &[
    (ModeCode::LocalBus, ModeCode::LocalBus, TransferType::LbLb),
    (ModeCode::ExpressBus, ModeCode::ExpressBus, TransferType::EbEb),
    (ModeCode::Ferry, ModeCode::Ferry, TransferType::FrFr),
    (ModeCode::LightRail, ModeCode::LightRail, TransferType::LrLr),
    (ModeCode::HeavyRail, ModeCode::HeavyRail, TransferType::HrHr),
    (ModeCode::CommuterRail, ModeCode::CommuterRail, TransferType::CrCr),
    (ModeCode::LocalBus, ModeCode::ExpressBus, TransferType::LbEb),
    (ModeCode::LocalBus, ModeCode::Ferry, TransferType::LbFr),
    (ModeCode::LocalBus, ModeCode::LightRail, TransferType::LbLr),
    (ModeCode::LocalBus, ModeCode::HeavyRail, TransferType::LbHr),
    (ModeCode::LocalBus, ModeCode::CommuterRail, TransferType::LbCr),
    (ModeCode::ExpressBus, ModeCode::Ferry, TransferType::EbFr),
    (ModeCode::ExpressBus, ModeCode::LightRail, TransferType::EbLr),
    (ModeCode::ExpressBus, ModeCode::HeavyRail, TransferType::EbHr),
    (ModeCode::ExpressBus, ModeCode::CommuterRail, TransferType::EbCr),
    (ModeCode::Ferry, ModeCode::LightRail, TransferType::FrLr),
    (ModeCode::Ferry, ModeCode::HeavyRail, TransferType::FrHr),
    (ModeCode::Ferry, ModeCode::CommuterRail, TransferType::FrCr),
    (ModeCode::LightRail, ModeCode::HeavyRail, TransferType::LrHr),
    (ModeCode::LightRail, ModeCode::CommuterRail, TransferType::LrCr),
    (ModeCode::HeavyRail, ModeCode::CommuterRail, TransferType::HrCr),
];

impl TransferType {
    /// Label for a transfer between two technologies, in either order.
    pub fn pair(a: ModeCode, b: ModeCode) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        TRANSFER_PAIRS
            .iter()
            .find(|(x, y, _)| *x == low && *y == high)
            .map_or(Self::Other, |(_, _, label)| *label)
    }
}

/// Runtime handle on a codebook, used by the schema to type columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodebookKind {
    AccessMode,
    DayOfWeek,
    Gender,
    Purpose,
    Technology,
    WorkStatus,
    StudentStatus,
    Weekpart,
    DayPart,
    Period,
    AutoSufficiency,
    Race,
    ModeCode,
    TransferType,
}

impl CodebookKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::AccessMode => AccessMode::NAME,
            Self::DayOfWeek => DayOfWeek::NAME,
            Self::Gender => Gender::NAME,
            Self::Purpose => Purpose::NAME,
            Self::Technology => Technology::NAME,
            Self::WorkStatus => WorkStatus::NAME,
            Self::StudentStatus => StudentStatus::NAME,
            Self::Weekpart => Weekpart::NAME,
            Self::DayPart => DayPart::NAME,
            Self::Period => Period::NAME,
            Self::AutoSufficiency => AutoSufficiency::NAME,
            Self::Race => Race::NAME,
            Self::ModeCode => ModeCode::NAME,
            Self::TransferType => TransferType::NAME,
        }
    }

    pub fn values(self) -> Vec<&'static str> {
        match self {
            Self::AccessMode => AccessMode::values(),
            Self::DayOfWeek => DayOfWeek::values(),
            Self::Gender => Gender::values(),
            Self::Purpose => Purpose::values(),
            Self::Technology => Technology::values(),
            Self::WorkStatus => WorkStatus::values(),
            Self::StudentStatus => StudentStatus::values(),
            Self::Weekpart => Weekpart::values(),
            Self::DayPart => DayPart::values(),
            Self::Period => Period::values(),
            Self::AutoSufficiency => AutoSufficiency::values(),
            Self::Race => Race::values(),
            Self::ModeCode => ModeCode::values(),
            Self::TransferType => TransferType::values(),
        }
    }

    pub fn contains(self, value: &str) -> bool {
        self.values().contains(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_exact() {
        assert_eq!(Technology::parse("Heavy Rail"), Some(Technology::HeavyRail));
        assert_eq!(Technology::parse("heavy rail"), None);
        assert!("Light Rail".parse::<Technology>().is_ok());
    }

    #[test]
    fn test_unknown_code_message() {
        let err = "Tram".parse::<Technology>().unwrap_err();
        assert_eq!(err.to_string(), "'Tram' is not a valid Technology value");
    }

    #[test]
    fn test_transfer_pair_orders_by_hierarchy() {
        assert_eq!(
            TransferType::pair(ModeCode::HeavyRail, ModeCode::LocalBus),
            TransferType::LbHr
        );
        assert_eq!(
            TransferType::pair(ModeCode::LocalBus, ModeCode::HeavyRail),
            TransferType::LbHr
        );
        assert_eq!(
            TransferType::pair(ModeCode::CommuterRail, ModeCode::Ferry),
            TransferType::FrCr
        );
        assert_eq!(
            TransferType::pair(ModeCode::Ferry, ModeCode::Ferry),
            TransferType::FrFr
        );
    }

    #[test]
    fn test_every_distinct_pair_has_a_label() {
        for a in ModeCode::ALL {
            for b in ModeCode::ALL {
                assert_ne!(TransferType::pair(*a, *b), TransferType::Other);
            }
        }
    }

    #[test]
    fn test_weekpart_from_day() {
        assert_eq!(DayOfWeek::Sunday.weekpart(), Weekpart::Weekend);
        assert_eq!(DayOfWeek::Friday.weekpart(), Weekpart::Weekday);
    }

    #[test]
    fn test_serde_uses_canonical_strings() {
        let json = serde_json::to_string(&DayPart::AmPeak).unwrap();
        assert_eq!(json, "\"AM PEAK\"");
        let back: DayPart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DayPart::AmPeak);
        assert!(serde_json::from_str::<DayPart>("\"LUNCH\"").is_err());
    }

    #[test]
    fn test_kind_values_match_enum() {
        assert!(CodebookKind::Race.contains(MISSING_SENTINEL));
        assert!(!CodebookKind::Gender.contains(MISSING_SENTINEL));
        assert_eq!(CodebookKind::Technology.values().len(), 6);
    }
}
