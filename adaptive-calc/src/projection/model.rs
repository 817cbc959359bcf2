//! Projection results

use serde::{Deserialize, Serialize};

use super::input::ProjectionInput;

/// One year of a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyProjection {
    pub year: u32,
    pub start_amount: f64,
    pub contributions: f64,
    pub interest: f64,
    pub end_amount: f64,
    /// Percentage growth over the year, 0 when the year starts empty
    pub growth_rate: f64,
}

impl YearlyProjection {
    pub fn new(year: u32, start_amount: f64, contributions: f64, interest: f64, end_amount: f64) -> Self {
        Self {
            year,
            start_amount,
            contributions,
            interest,
            end_amount,
            growth_rate: growth_rate(start_amount, end_amount),
        }
    }
}

pub(crate) fn growth_rate(start: f64, end: f64) -> f64 {
    if start > 0.0 {
        (end - start) / start * 100.0
    } else {
        0.0
    }
}

/// Full projection over the horizon plus aggregates
///
/// Aggregates are always derived from `yearly` through
/// [`ProjectionResult::from_yearly`], so a patched sequence and a
/// simulated one are summarised identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub yearly: Vec<YearlyProjection>,
    pub final_amount: f64,
    /// Principal plus every contribution
    pub total_contributions: f64,
    pub total_interest: f64,
    /// Annualised return on everything paid in, as a percentage
    pub effective_annual_rate: f64,
    /// Final amount after a flat tax on positive interest
    pub after_tax_final_amount: f64,
    /// Final amount in today's money
    pub real_final_amount: f64,
}

impl ProjectionResult {
    pub fn from_yearly(input: &ProjectionInput, yearly: Vec<YearlyProjection>) -> Self {
        let final_amount = yearly
            .last()
            .map(|year| year.end_amount)
            .unwrap_or(input.principal);
        let total_contributions =
            input.principal + yearly.iter().map(|year| year.contributions).sum::<f64>();
        let total_interest = final_amount - total_contributions;

        let years = yearly.len() as f64;
        let effective_annual_rate = if total_contributions > 0.0 && years > 0.0 {
            ((final_amount / total_contributions).powf(1.0 / years) - 1.0) * 100.0
        } else {
            0.0
        };

        let tax = total_interest.max(0.0) * input.tax_rate / 100.0;
        let deflator = (1.0 + input.inflation_rate / 100.0).powf(years);

        Self {
            yearly,
            final_amount,
            total_contributions,
            total_interest,
            effective_annual_rate,
            after_tax_final_amount: final_amount - tax,
            real_final_amount: final_amount / deflator,
        }
    }

    /// Same sequence, aggregates recomputed for `input`
    pub fn reaggregate(&self, input: &ProjectionInput) -> Self {
        Self::from_yearly(input, self.yearly.clone())
    }

    pub fn years(&self) -> u32 {
        self.yearly.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_years() -> Vec<YearlyProjection> {
        vec![
            YearlyProjection::new(1, 1000.0, 100.0, 50.0, 1150.0),
            YearlyProjection::new(2, 1150.0, 100.0, 60.0, 1310.0),
        ]
    }

    #[test]
    fn test_growth_rate() {
        let year = YearlyProjection::new(1, 1000.0, 0.0, 50.0, 1050.0);
        assert!((year.growth_rate - 5.0).abs() < 1e-12);

        let empty = YearlyProjection::new(1, 0.0, 100.0, 0.0, 100.0);
        assert_eq!(empty.growth_rate, 0.0);
    }

    #[test]
    fn test_aggregates() {
        let input = ProjectionInput::new(1000.0, 0.0, 5.0, 2)
            .with_tax_rate(25.0)
            .with_inflation_rate(2.0);
        let result = ProjectionResult::from_yearly(&input, two_years());

        assert_eq!(result.final_amount, 1310.0);
        assert_eq!(result.total_contributions, 1200.0);
        assert!((result.total_interest - 110.0).abs() < 1e-9);
        assert!((result.after_tax_final_amount - 1282.5).abs() < 1e-9);
        assert!((result.real_final_amount - 1310.0 / 1.0404).abs() < 1e-9);

        let expected_rate = ((1310.0_f64 / 1200.0).sqrt() - 1.0) * 100.0;
        assert!((result.effective_annual_rate - expected_rate).abs() < 1e-9);
        assert_eq!(result.years(), 2);
    }

    #[test]
    fn test_negative_interest_is_not_taxed() {
        let input = ProjectionInput::new(1000.0, 0.0, 0.0, 1).with_tax_rate(50.0);
        let yearly = vec![YearlyProjection::new(1, 1000.0, 0.0, -10.0, 990.0)];
        let result = ProjectionResult::from_yearly(&input, yearly);

        assert_eq!(result.after_tax_final_amount, 990.0);
    }

    #[test]
    fn test_reaggregate_keeps_sequence() {
        let input = ProjectionInput::new(1000.0, 0.0, 5.0, 2);
        let result = ProjectionResult::from_yearly(&input, two_years());

        let taxed = result.reaggregate(&input.clone().with_tax_rate(10.0));
        assert_eq!(taxed.yearly, result.yearly);
        assert_eq!(taxed.final_amount, result.final_amount);
        assert!(taxed.after_tax_final_amount < result.after_tax_final_amount);
    }
}
