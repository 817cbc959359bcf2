//! Typed, versioned projection input

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

pub const MAX_PRINCIPAL: f64 = 10_000_000.0;
pub const MAX_MONTHLY_CONTRIBUTION: f64 = 50_000.0;
pub const MAX_ANNUAL_RATE: f64 = 20.0;
pub const MAX_YEARS: u32 = 50;
pub const MAX_INFLATION_RATE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompoundFrequency {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl CompoundFrequency {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            CompoundFrequency::Monthly => 12,
            CompoundFrequency::Quarterly => 4,
            CompoundFrequency::Yearly => 1,
        }
    }
}

impl fmt::Display for CompoundFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompoundFrequency::Monthly => "monthly",
            CompoundFrequency::Quarterly => "quarterly",
            CompoundFrequency::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

impl FromStr for CompoundFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" => Ok(CompoundFrequency::Monthly),
            "quarterly" => Ok(CompoundFrequency::Quarterly),
            "yearly" | "annually" => Ok(CompoundFrequency::Yearly),
            other => Err(format!("unknown compound frequency: {}", other)),
        }
    }
}

/// Fields of [`ProjectionInput`], used by change detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    Version,
    Principal,
    PeriodicContribution,
    AnnualRate,
    Years,
    CompoundFrequency,
    TaxRate,
    InflationRate,
}

impl InputField {
    pub const ALL: [InputField; 8] = [
        InputField::Version,
        InputField::Principal,
        InputField::PeriodicContribution,
        InputField::AnnualRate,
        InputField::Years,
        InputField::CompoundFrequency,
        InputField::TaxRate,
        InputField::InflationRate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InputField::Version => "version",
            InputField::Principal => "principal",
            InputField::PeriodicContribution => "periodic_contribution",
            InputField::AnnualRate => "annual_rate",
            InputField::Years => "years",
            InputField::CompoundFrequency => "compound_frequency",
            InputField::TaxRate => "tax_rate",
            InputField::InflationRate => "inflation_rate",
        }
    }
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input of a savings projection
///
/// Rates are percentages. `periodic_contribution` is a monthly amount and
/// is spread evenly over the compounding periods of a year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub version: u32,
    pub principal: f64,
    pub periodic_contribution: f64,
    pub annual_rate: f64,
    pub years: u32,
    pub compound_frequency: CompoundFrequency,
    pub tax_rate: f64,
    pub inflation_rate: f64,
}

impl Default for ProjectionInput {
    fn default() -> Self {
        Self {
            version: 1,
            principal: 10_000.0,
            periodic_contribution: 500.0,
            annual_rate: 5.0,
            years: 10,
            compound_frequency: CompoundFrequency::Monthly,
            tax_rate: 0.0,
            inflation_rate: 0.0,
        }
    }
}

impl ProjectionInput {
    pub fn new(principal: f64, periodic_contribution: f64, annual_rate: f64, years: u32) -> Self {
        Self {
            principal,
            periodic_contribution,
            annual_rate,
            years,
            ..Default::default()
        }
    }

    pub fn with_frequency(mut self, frequency: CompoundFrequency) -> Self {
        self.compound_frequency = frequency;
        self
    }

    pub fn with_tax_rate(mut self, tax_rate: f64) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_inflation_rate(mut self, inflation_rate: f64) -> Self {
        self.inflation_rate = inflation_rate;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Check every field against its accepted range
    pub fn validate(&self) -> Result<()> {
        check_range(InputField::Principal, self.principal, 0.0, MAX_PRINCIPAL, false)?;
        check_range(
            InputField::PeriodicContribution,
            self.periodic_contribution,
            0.0,
            MAX_MONTHLY_CONTRIBUTION,
            true,
        )?;
        check_range(InputField::AnnualRate, self.annual_rate, 0.0, MAX_ANNUAL_RATE, true)?;
        check_range(InputField::TaxRate, self.tax_rate, 0.0, 100.0, true)?;
        check_range(
            InputField::InflationRate,
            self.inflation_rate,
            0.0,
            MAX_INFLATION_RATE,
            true,
        )?;

        if self.years == 0 || self.years > MAX_YEARS {
            return Err(RuntimeError::validation(
                InputField::Years.name(),
                format!("must be between 1 and {}", MAX_YEARS),
            ));
        }

        Ok(())
    }

    pub fn periods_per_year(&self) -> u32 {
        self.compound_frequency.periods_per_year()
    }

    /// Interest rate applied each compounding period
    pub fn periodic_rate(&self) -> f64 {
        self.annual_rate / 100.0 / self.periods_per_year() as f64
    }

    /// Amount added at the end of each compounding period
    pub fn contribution_per_period(&self) -> f64 {
        self.periodic_contribution * 12.0 / self.periods_per_year() as f64
    }

    pub fn total_periods(&self) -> u32 {
        self.years * self.periods_per_year()
    }

    /// Fields whose values differ from `other`
    pub fn changed_fields(&self, other: &ProjectionInput) -> BTreeSet<InputField> {
        InputField::ALL
            .into_iter()
            .filter(|field| !self.field_eq(other, *field))
            .collect()
    }

    fn field_eq(&self, other: &ProjectionInput, field: InputField) -> bool {
        match field {
            InputField::Version => self.version == other.version,
            InputField::Principal => self.principal == other.principal,
            InputField::PeriodicContribution => {
                self.periodic_contribution == other.periodic_contribution
            }
            InputField::AnnualRate => self.annual_rate == other.annual_rate,
            InputField::Years => self.years == other.years,
            InputField::CompoundFrequency => self.compound_frequency == other.compound_frequency,
            InputField::TaxRate => self.tax_rate == other.tax_rate,
            InputField::InflationRate => self.inflation_rate == other.inflation_rate,
        }
    }
}

fn check_range(field: InputField, value: f64, min: f64, max: f64, min_inclusive: bool) -> Result<()> {
    if !value.is_finite() {
        return Err(RuntimeError::validation(field.name(), "must be a finite number"));
    }

    let above_min = if min_inclusive { value >= min } else { value > min };
    if !above_min {
        let bound = if min_inclusive { "at least" } else { "greater than" };
        return Err(RuntimeError::validation(
            field.name(),
            format!("must be {} {}", bound, min),
        ));
    }

    if value > max {
        return Err(RuntimeError::validation(
            field.name(),
            format!("must not exceed {}", max),
        ));
    }

    Ok(())
}
