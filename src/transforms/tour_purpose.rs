//! Tour purpose from trip-end purposes, person status and at-work/at-school
//! flags.
//!
//! The classification is an ordered decision list. The first rule that
//! applies and yields a purpose sets both `tour_purp` and `tour_purp_case`.
//! Reordering the rules changes results.

use super::SurveyTransform;
use crate::codebook::{Codebook as _, Purpose, StudentStatus, WorkStatus};
use crate::dependencies::{FieldDependencies, TransformKind};
use crate::error::Result;
use crate::frame;
use crate::schema::columns as c;
use polars::prelude::*;

/// Youngest age counted as high school.
pub const HIGH_SCHOOL_MIN_AGE: i64 = 14;
/// Oldest age counted as high school.
pub const HIGH_SCHOOL_MAX_AGE: i64 = 18;

const INPUTS: [&str; 9] = [
    c::ORIG_PURP,
    c::DEST_PURP,
    c::WORK_STATUS,
    c::STUDENT_STATUS,
    c::APPROXIMATE_AGE,
    c::AT_WORK_PRIOR_TO_ORIG_PURP,
    c::AT_WORK_AFTER_DEST_PURP,
    c::AT_SCHOOL_PRIOR_TO_ORIG_PURP,
    c::AT_SCHOOL_AFTER_DEST_PURP,
];

pub fn dependencies() -> FieldDependencies {
    FieldDependencies::new(TransformKind::TourPurpose)
        .reads(&INPUTS)
        .reads(&[c::TRIP_PURP])
        .writes(&[
            c::TOUR_PURP,
            c::TOUR_PURP_CASE,
            c::ORIG_PURP,
            c::DEST_PURP,
            c::TRIP_PURP,
        ])
}

/// The trip as the decision list sees it, after school normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trip {
    pub orig: Option<Purpose>,
    pub dest: Option<Purpose>,
    pub work_status: Option<WorkStatus>,
    pub student_status: Option<StudentStatus>,
    pub age: Option<i64>,
    pub at_work_before: bool,
    pub at_work_after: bool,
    pub at_school_before: bool,
    pub at_school_after: bool,
}

impl Trip {
    fn either(&self, purpose: Purpose) -> bool {
        self.orig == Some(purpose) || self.dest == Some(purpose)
    }

    fn is(&self, orig: Purpose, dest: Purpose) -> bool {
        self.orig == Some(orig) && self.dest == Some(dest)
    }

    fn non_worker_non_student(&self) -> bool {
        self.work_status == Some(WorkStatus::NonWorker)
            && self.student_status == Some(StudentStatus::NonStudent)
    }

    fn school_by_age(&self) -> Option<Purpose> {
        Some(school_for_age(self.age))
    }
}

/// School level implied by age; unknown or adult ages count as university.
pub fn school_for_age(age: Option<i64>) -> Purpose {
    match age {
        Some(age) if age < HIGH_SCHOOL_MIN_AGE => Purpose::GradeSchool,
        Some(age) if age <= HIGH_SCHOOL_MAX_AGE => Purpose::HighSchool,
        _ => Purpose::University,
    }
}

/// Re-levels a school purpose by age. Adults keep their purpose unless
/// `adult_to_university` is set.
pub fn normalize_school(
    purpose: Option<Purpose>,
    age: Option<i64>,
    adult_to_university: bool,
) -> Option<Purpose> {
    let purpose = purpose?;
    if !purpose.is_age_levelled_school() {
        return Some(purpose);
    }
    Some(match age {
        Some(age) if age < HIGH_SCHOOL_MIN_AGE => Purpose::GradeSchool,
        Some(age) if age <= HIGH_SCHOOL_MAX_AGE => Purpose::HighSchool,
        Some(_) if adult_to_university => Purpose::University,
        _ => purpose,
    })
}

struct TourRule {
    case: &'static str,
    applies: fn(&Trip) -> bool,
    purpose: fn(&Trip) -> Option<Purpose>,
}

const RULES: &[TourRule] = &[
    TourRule {
        case: "home to work",
        applies: |t| t.is(Purpose::Home, Purpose::Work),
        purpose: |_| Some(Purpose::Work),
    },
    TourRule {
        case: "work to home",
        applies: |t| t.is(Purpose::Work, Purpose::Home),
        purpose: |_| Some(Purpose::Work),
    },
    TourRule {
        case: "grade school trip",
        applies: |t| t.either(Purpose::GradeSchool),
        purpose: |_| Some(Purpose::GradeSchool),
    },
    TourRule {
        case: "high school trip",
        applies: |t| t.either(Purpose::HighSchool),
        purpose: |_| Some(Purpose::HighSchool),
    },
    TourRule {
        case: "university trip",
        applies: |t| t.either(Purpose::University),
        purpose: |_| Some(Purpose::University),
    },
    TourRule {
        case: "unspecified school trip",
        applies: |t| t.either(Purpose::School),
        purpose: |_| Some(Purpose::University),
    },
    TourRule {
        case: "non-worker home to X",
        applies: |t| t.non_worker_non_student() && t.orig == Some(Purpose::Home),
        purpose: |t| t.dest,
    },
    TourRule {
        case: "non-worker X to home",
        applies: |t| t.non_worker_non_student() && t.dest == Some(Purpose::Home),
        purpose: |t| t.orig,
    },
    TourRule {
        case: "non-worker X to X",
        applies: |t| t.non_worker_non_student() && t.orig.is_some() && t.orig == t.dest,
        purpose: |t| t.orig,
    },
    TourRule {
        case: "non-worker escorting",
        applies: |t| t.non_worker_non_student() && t.either(Purpose::Escorting),
        purpose: |_| Some(Purpose::Escorting),
    },
    TourRule {
        case: "at-work subtour",
        applies: |t| t.at_work_before && t.at_work_after,
        purpose: |_| Some(Purpose::AtWork),
    },
    TourRule {
        case: "at-school subtour",
        applies: |t| t.at_school_before && t.at_school_after,
        purpose: Trip::school_by_age,
    },
    TourRule {
        case: "leaves work and returns",
        applies: |t| t.orig == Some(Purpose::Work) && t.at_work_after,
        purpose: |_| Some(Purpose::AtWork),
    },
    TourRule {
        case: "returns to work",
        applies: |t| t.dest == Some(Purpose::Work) && t.at_work_before,
        purpose: |_| Some(Purpose::AtWork),
    },
    TourRule {
        case: "work to non-home stop",
        applies: |t| t.orig == Some(Purpose::Work),
        purpose: |_| Some(Purpose::Work),
    },
    TourRule {
        case: "non-home stop to work",
        applies: |t| t.dest == Some(Purpose::Work),
        purpose: |_| Some(Purpose::Work),
    },
    TourRule {
        case: "from work, heading home",
        applies: |t| t.dest == Some(Purpose::Home) && t.at_work_before,
        purpose: |_| Some(Purpose::Work),
    },
    TourRule {
        case: "from home, heading to work",
        applies: |t| t.orig == Some(Purpose::Home) && t.at_work_after,
        purpose: |_| Some(Purpose::Work),
    },
    TourRule {
        case: "from school, heading home",
        applies: |t| t.dest == Some(Purpose::Home) && t.at_school_before,
        purpose: Trip::school_by_age,
    },
    TourRule {
        case: "from home, heading to school",
        applies: |t| t.orig == Some(Purpose::Home) && t.at_school_after,
        purpose: Trip::school_by_age,
    },
    TourRule {
        case: "home loop",
        applies: |t| t.is(Purpose::Home, Purpose::Home),
        purpose: |_| Some(Purpose::OtherDiscretionary),
    },
    TourRule {
        case: "home to X",
        applies: |t| t.orig == Some(Purpose::Home),
        purpose: |t| t.dest,
    },
    TourRule {
        case: "X to home",
        applies: |t| t.dest == Some(Purpose::Home),
        purpose: |t| t.orig,
    },
    TourRule {
        case: "origin purpose",
        applies: |t| t.orig.is_some(),
        purpose: |t| t.orig,
    },
];

/// Tour purpose and the case that produced it, or `None` when no rule fires.
pub fn classify_tour(trip: &Trip) -> Option<(Purpose, &'static str)> {
    RULES.iter().find_map(|rule| {
        if !(rule.applies)(trip) {
            return None;
        }
        let purpose = (rule.purpose)(trip)?;
        Some((recode(purpose), rule.case))
    })
}

/// Business purposes are reported as maintenance at the tour level.
fn recode(purpose: Purpose) -> Purpose {
    match purpose {
        Purpose::WorkRelated | Purpose::BusinessApt => Purpose::OtherMaintenance,
        other => other,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TourPurposeTransform;

impl SurveyTransform for TourPurposeTransform {
    fn kind(&self) -> TransformKind {
        TransformKind::TourPurpose
    }

    fn dependencies(&self) -> FieldDependencies {
        dependencies()
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let missing: Vec<_> = INPUTS
            .iter()
            .filter(|name| !frame::has_column(&df, name))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(?missing, "Tour purpose inputs absent, stage skipped");
            return Ok(df);
        }

        let mut df = df;
        let ages = frame::int_values(&df, c::APPROXIMATE_AGE)?;
        let normalize = |purposes: Vec<Option<Purpose>>, adult_to_university: bool| {
            purposes
                .into_iter()
                .zip(&ages)
                .map(|(purpose, age)| normalize_school(purpose, *age, adult_to_university))
                .collect::<Vec<_>>()
        };

        let orig = normalize(frame::parsed_values(&df, c::ORIG_PURP, Purpose::parse)?, false);
        let dest = normalize(frame::parsed_values(&df, c::DEST_PURP, Purpose::parse)?, false);
        let work = frame::parsed_values(&df, c::WORK_STATUS, WorkStatus::parse)?;
        let student = frame::parsed_values(&df, c::STUDENT_STATUS, StudentStatus::parse)?;
        let work_before = frame::flags_or_false(&df, c::AT_WORK_PRIOR_TO_ORIG_PURP)?;
        let work_after = frame::flags_or_false(&df, c::AT_WORK_AFTER_DEST_PURP)?;
        let school_before = frame::flags_or_false(&df, c::AT_SCHOOL_PRIOR_TO_ORIG_PURP)?;
        let school_after = frame::flags_or_false(&df, c::AT_SCHOOL_AFTER_DEST_PURP)?;

        let (tours, cases): (Vec<_>, Vec<_>) = (0..df.height())
            .map(|row| {
                let trip = Trip {
                    orig: orig[row],
                    dest: dest[row],
                    work_status: work[row],
                    student_status: student[row],
                    age: ages[row],
                    at_work_before: work_before[row],
                    at_work_after: work_after[row],
                    at_school_before: school_before[row],
                    at_school_after: school_after[row],
                };
                classify_tour(&trip)
                    .map(|(purpose, case)| (purpose.as_str(), case))
                    .unzip()
            })
            .unzip();

        frame::put_codes(&mut df, c::ORIG_PURP, orig.iter().map(|p| p.map(Purpose::as_str)))?;
        frame::put_codes(&mut df, c::DEST_PURP, dest.iter().map(|p| p.map(Purpose::as_str)))?;
        if frame::has_column(&df, c::TRIP_PURP) {
            let trip = normalize(frame::parsed_values(&df, c::TRIP_PURP, Purpose::parse)?, true);
            frame::put_codes(&mut df, c::TRIP_PURP, trip.iter().map(|p| p.map(Purpose::as_str)))?;
        }
        frame::put_codes(&mut df, c::TOUR_PURP, tours)?;
        frame::put_codes(&mut df, c::TOUR_PURP_CASE, cases)?;

        Ok(df)
    }
}
