//! Field-dependency declarations.
//!
//! Each transform declares the columns it reads, writes and drops, plus
//! requirement rules over column groups. The validation gate evaluates the
//! rules generically, and the same declarations answer "which stage produced
//! this column?" when a derived field disagrees with the legacy database.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// The transform stages of the standardization pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    DateTime,
    AutoSufficiency,
    Demographics,
    Transfers,
    PathLabels,
    TourPurpose,
    Geocoding,
}

impl TransformKind {
    pub const ALL: [Self; 7] = [
        Self::DateTime,
        Self::AutoSufficiency,
        Self::Demographics,
        Self::Transfers,
        Self::PathLabels,
        Self::TourPurpose,
        Self::Geocoding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DateTime => "date_time",
            Self::AutoSufficiency => "auto_sufficiency",
            Self::Demographics => "demographics",
            Self::Transfers => "transfers",
            Self::PathLabels => "path_labels",
            Self::TourPurpose => "tour_purpose",
            Self::Geocoding => "geocoding",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("Unknown transform '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// A declarative rule over groups of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Requirement {
    /// Every column of the group is present, or none is.
    AllOrNone(Vec<String>),
    /// At least one group is present in full.
    OneOfGroups(Vec<Vec<String>>),
}

impl Requirement {
    pub fn all_or_none(columns: &[&str]) -> Self {
        Self::AllOrNone(owned(columns))
    }

    pub fn one_of(groups: &[&[&str]]) -> Self {
        Self::OneOfGroups(groups.iter().map(|group| owned(group)).collect())
    }

    /// Every listed column must be present.
    pub fn required(columns: &[&str]) -> Self {
        Self::OneOfGroups(vec![owned(columns)])
    }

    /// Checks the rule against the available columns, describing the
    /// violation if there is one.
    pub fn check(&self, available: &HashSet<String>) -> Option<String> {
        match self {
            Self::AllOrNone(columns) => {
                let (present, missing): (Vec<_>, Vec<_>) =
                    columns.iter().partition(|c| available.contains(c.as_str()));
                if present.is_empty() || missing.is_empty() {
                    None
                } else {
                    Some(format!(
                        "columns must be supplied together: present {}, missing {}",
                        quoted(&present),
                        quoted(&missing)
                    ))
                }
            }
            Self::OneOfGroups(groups) => {
                let satisfied = groups
                    .iter()
                    .any(|group| group.iter().all(|c| available.contains(c.as_str())));
                if satisfied {
                    return None;
                }
                if let [group] = groups.as_slice() {
                    let missing: Vec<_> = group
                        .iter()
                        .filter(|c| !available.contains(c.as_str()))
                        .collect();
                    return Some(format!("missing required column(s) {}", quoted(&missing)));
                }
                let alternatives: Vec<_> = groups
                    .iter()
                    .map(|group| format!("[{}]", group.join(", ")))
                    .collect();
                Some(format!(
                    "needs one complete column group out of: {}",
                    alternatives.join(" or ")
                ))
            }
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::AllOrNone(columns) => columns.iter().map(String::as_str).collect(),
            Self::OneOfGroups(groups) => groups.iter().flatten().map(String::as_str).collect(),
        }
    }
}

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| (*c).to_owned()).collect()
}

fn quoted(columns: &[&String]) -> String {
    columns
        .iter()
        .map(|c| format!("'{c}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// What a transform reads, writes and drops, and the rules its input must
/// satisfy.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDependencies {
    pub transform: TransformKind,
    pub reads: Vec<String>,
    pub writes: Vec<String>,
    pub drops: Vec<String>,
    pub requirements: Vec<Requirement>,
}

impl FieldDependencies {
    pub fn new(transform: TransformKind) -> Self {
        Self {
            transform,
            reads: Vec::new(),
            writes: Vec::new(),
            drops: Vec::new(),
            requirements: Vec::new(),
        }
    }

    pub fn reads(mut self, columns: &[&str]) -> Self {
        self.reads.extend(owned(columns));
        self
    }

    pub fn writes(mut self, columns: &[&str]) -> Self {
        self.writes.extend(owned(columns));
        self
    }

    pub fn drops(mut self, columns: &[&str]) -> Self {
        self.drops.extend(owned(columns));
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Evaluates every requirement, returning one message per violation.
    pub fn violations(&self, available: &HashSet<String>) -> Vec<String> {
        self.requirements
            .iter()
            .filter_map(|rule| rule.check(available))
            .collect()
    }

    /// Applies this stage's column effects to a running column set.
    pub fn apply_to(&self, available: &mut HashSet<String>) {
        for column in &self.drops {
            available.remove(column);
        }
        available.extend(self.writes.iter().cloned());
    }
}

/// Stages that write a column.
pub fn writers_of(declarations: &[FieldDependencies], column: &str) -> Vec<TransformKind> {
    declarations
        .iter()
        .filter(|d| d.writes.iter().any(|w| w == column))
        .map(|d| d.transform)
        .collect()
}

/// Stages that read a column.
pub fn readers_of(declarations: &[FieldDependencies], column: &str) -> Vec<TransformKind> {
    declarations
        .iter()
        .filter(|d| d.reads.iter().any(|r| r == column))
        .map(|d| d.transform)
        .collect()
}

/// Every input column that feeds a derived column, following the chain back
/// through earlier stages. Used to explain mismatches against legacy output.
pub fn upstream_inputs(declarations: &[FieldDependencies], column: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut pending = vec![column.to_owned()];
    let mut inputs = Vec::new();

    while let Some(current) = pending.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let producers: Vec<_> = declarations
            .iter()
            .filter(|d| d.writes.contains(&current))
            .collect();
        if producers.is_empty() {
            if current != column {
                inputs.push(current);
            }
            continue;
        }
        for producer in producers {
            pending.extend(producer.reads.iter().filter(|r| **r != current).cloned());
        }
    }

    inputs.sort();
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available(columns: &[&str]) -> HashSet<String> {
        columns.iter().map(|c| (*c).to_owned()).collect()
    }

    #[test]
    fn test_all_or_none_allows_absent_group() {
        let rule = Requirement::all_or_none(&["a", "b"]);
        assert!(rule.check(&available(&[])).is_none());
        assert!(rule.check(&available(&["a", "b"])).is_none());
    }

    #[test]
    fn test_all_or_none_names_present_and_missing() {
        let rule = Requirement::all_or_none(&["a", "b", "c"]);
        let message = rule.check(&available(&["a"])).unwrap();
        assert!(message.contains("present 'a'"));
        assert!(message.contains("missing 'b', 'c'"));
    }

    #[test]
    fn test_one_of_groups_lists_alternatives() {
        let rule = Requirement::one_of(&[&["x", "y"], &["z"]]);
        assert!(rule.check(&available(&["z"])).is_none());
        let message = rule.check(&available(&["x"])).unwrap();
        assert!(message.contains("[x, y] or [z]"));
    }

    #[test]
    fn test_required_names_missing_column() {
        let rule = Requirement::required(&["vehicle_tech"]);
        let message = rule.check(&available(&[])).unwrap();
        assert_eq!(message, "missing required column(s) 'vehicle_tech'");
    }

    #[test]
    fn test_transform_kind_round_trips_through_from_str() {
        for kind in TransformKind::ALL {
            assert_eq!(kind.as_str().parse::<TransformKind>(), Ok(kind));
        }
        assert!("geocode".parse::<TransformKind>().is_err());
    }

    #[test]
    fn test_upstream_inputs_follow_the_chain() {
        let declarations = vec![
            FieldDependencies::new(TransformKind::Transfers)
                .reads(&["vehicle_tech", "first_route_before_survey_board"])
                .writes(&["first_board_tech"]),
            FieldDependencies::new(TransformKind::PathLabels)
                .reads(&["first_board_tech"])
                .writes(&["first_board_mode"]),
        ];
        assert_eq!(
            upstream_inputs(&declarations, "first_board_mode"),
            vec!["first_route_before_survey_board", "vehicle_tech"]
        );
        assert_eq!(
            writers_of(&declarations, "first_board_tech"),
            vec![TransformKind::Transfers]
        );
        assert_eq!(
            readers_of(&declarations, "first_board_tech"),
            vec![TransformKind::PathLabels]
        );
    }
}
