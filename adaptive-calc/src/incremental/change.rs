//! Classification of the delta between two projection inputs

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::projection::{InputField, ProjectionInput};

/// How a changed field affects the previous result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    /// Invalidates the whole simulation
    Critical,
    /// Only touches derived aggregates
    Minor,
    /// Periodic amount whose effect can be added in closed form
    AmountDelta,
}

/// Field classification table, fixed when the engine is built
///
/// Fields missing from the table never allow the incremental path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldClassification {
    classes: HashMap<InputField, FieldClass>,
}

impl Default for FieldClassification {
    fn default() -> Self {
        Self::empty()
            .classify(InputField::Version, FieldClass::Critical)
            .classify(InputField::Principal, FieldClass::Critical)
            .classify(InputField::AnnualRate, FieldClass::Critical)
            .classify(InputField::Years, FieldClass::Critical)
            .classify(InputField::CompoundFrequency, FieldClass::Critical)
            .classify(InputField::TaxRate, FieldClass::Minor)
            .classify(InputField::InflationRate, FieldClass::Minor)
            .classify(InputField::PeriodicContribution, FieldClass::AmountDelta)
    }
}

impl FieldClassification {
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    pub fn classify(mut self, field: InputField, class: FieldClass) -> Self {
        self.classes.insert(field, class);
        self
    }

    pub fn class_of(&self, field: InputField) -> Option<FieldClass> {
        self.classes.get(&field).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        };
        f.write_str(name)
    }
}

/// Outcome of diffing an input against the previously seen one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetection {
    pub has_changes: bool,
    pub changed_fields: BTreeSet<InputField>,
    /// Years whose figures differ from the previous result
    pub affected_periods: Vec<u32>,
    pub impact_level: ImpactLevel,
    pub can_use_incremental: bool,
}

impl ChangeDetection {
    fn full(changed_fields: BTreeSet<InputField>, impact_level: ImpactLevel, years: u32) -> Self {
        Self {
            has_changes: true,
            changed_fields,
            affected_periods: all_years(years),
            impact_level,
            can_use_incremental: false,
        }
    }
}

fn all_years(years: u32) -> Vec<u32> {
    (1..=years).collect()
}

/// Classify the change from `previous` to `current`
///
/// - no previous input: high impact, full recomputation
/// - any critical field: high impact, full recomputation
/// - only minor fields: low impact, incremental
/// - only the amount-delta field: medium impact, incremental
/// - anything else: medium impact, full recomputation
pub fn detect_changes(
    previous: Option<&ProjectionInput>,
    current: &ProjectionInput,
    classification: &FieldClassification,
) -> ChangeDetection {
    let Some(previous) = previous else {
        return ChangeDetection::full(
            InputField::ALL.into_iter().collect(),
            ImpactLevel::High,
            current.years,
        );
    };

    let changed_fields = previous.changed_fields(current);
    if changed_fields.is_empty() {
        return ChangeDetection {
            has_changes: false,
            changed_fields,
            affected_periods: Vec::new(),
            impact_level: ImpactLevel::Low,
            can_use_incremental: true,
        };
    }

    let classes: Vec<Option<FieldClass>> = changed_fields
        .iter()
        .map(|field| classification.class_of(*field))
        .collect();

    if classes.contains(&Some(FieldClass::Critical)) {
        return ChangeDetection::full(changed_fields, ImpactLevel::High, current.years);
    }

    if classes.iter().all(|class| *class == Some(FieldClass::Minor)) {
        return ChangeDetection {
            has_changes: true,
            changed_fields,
            affected_periods: Vec::new(),
            impact_level: ImpactLevel::Low,
            can_use_incremental: true,
        };
    }

    if classes.len() == 1 && classes[0] == Some(FieldClass::AmountDelta) {
        return ChangeDetection {
            has_changes: true,
            changed_fields,
            affected_periods: all_years(current.years),
            impact_level: ImpactLevel::Medium,
            can_use_incremental: true,
        };
    }

    ChangeDetection::full(changed_fields, ImpactLevel::Medium, current.years)
}
