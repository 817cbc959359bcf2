//! Period-by-period compounding simulation

use tracing::debug;

use super::input::ProjectionInput;
use super::model::{ProjectionResult, YearlyProjection};
use crate::error::Result;

/// Simulate the whole horizon from the principal
///
/// Each period the balance earns the periodic rate and then receives the
/// periodic contribution. The input is assumed valid.
///
/// The monthly contribution is spread evenly over the compounding periods
/// (`monthly * 12 / periods_per_year`) and paid at the end of each one.
/// Quarterly and yearly schedules therefore never receive a single
/// year-end lump sum, and no contribution earns interest in the period it
/// is paid.
pub fn simulate(input: &ProjectionInput) -> ProjectionResult {
    let rate = input.periodic_rate();
    let contribution = input.contribution_per_period();
    let periods = input.periods_per_year();

    let mut balance = input.principal;
    let mut yearly = Vec::with_capacity(input.years as usize);

    for year in 1..=input.years {
        let start = balance;
        let mut contributions = 0.0;
        let mut interest = 0.0;

        for _ in 0..periods {
            let earned = balance * rate;
            balance += earned + contribution;
            interest += earned;
            contributions += contribution;
        }

        yearly.push(YearlyProjection::new(year, start, contributions, interest, balance));
    }

    ProjectionResult::from_yearly(input, yearly)
}

/// Validating calculator suitable for the scheduler
pub async fn calculate_projection(input: ProjectionInput) -> Result<ProjectionResult> {
    input.validate()?;
    let result = simulate(&input);
    debug!(
        "Simulated {} years ({} periods), final amount {:.2}",
        input.years,
        input.total_periods(),
        result.final_amount
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::projection::input::CompoundFrequency;

    /// P(1+r)^n + C((1+r)^n - 1)/r
    fn closed_form(input: &ProjectionInput) -> f64 {
        let r = input.periodic_rate();
        let n = input.total_periods() as i32;
        let growth = (1.0 + r).powi(n);
        let c = input.contribution_per_period();
        if r == 0.0 {
            input.principal + c * n as f64
        } else {
            input.principal * growth + c * (growth - 1.0) / r
        }
    }

    #[test]
    fn test_matches_closed_form() {
        let inputs = [
            ProjectionInput::new(10_000.0, 500.0, 5.0, 10),
            ProjectionInput::new(10_000.0, 500.0, 5.0, 10).with_frequency(CompoundFrequency::Quarterly),
            ProjectionInput::new(2_500.0, 0.0, 7.5, 30).with_frequency(CompoundFrequency::Yearly),
            ProjectionInput::new(1_000.0, 250.0, 0.0, 5),
        ];

        for input in inputs {
            let result = simulate(&input);
            let expected = closed_form(&input);
            assert!(
                ((result.final_amount - expected) / expected).abs() < 1e-10,
                "{:?}: {} vs {}",
                input,
                result.final_amount,
                expected
            );
        }
    }

    #[test]
    fn test_yearly_sequence_is_consistent() {
        let input = ProjectionInput::new(10_000.0, 500.0, 5.0, 10);
        let result = simulate(&input);

        assert_eq!(result.yearly.len(), 10);
        assert_eq!(result.yearly[0].start_amount, 10_000.0);
        assert_eq!(result.total_contributions, 10_000.0 + 500.0 * 120.0);

        for pair in result.yearly.windows(2) {
            assert_eq!(pair[0].end_amount, pair[1].start_amount);
        }
        for year in &result.yearly {
            let rebuilt = year.start_amount + year.contributions + year.interest;
            assert!((rebuilt - year.end_amount).abs() < 1e-6);
            assert!(year.growth_rate > 0.0);
        }

        let interest: f64 = result.yearly.iter().map(|y| y.interest).sum();
        assert!((interest - result.total_interest).abs() < 1e-6);
    }

    #[test]
    fn test_contributions_paid_at_period_end() {
        // One yearly period: the 1 200 contributed earns nothing that year
        let yearly = simulate(
            &ProjectionInput::new(1_000.0, 100.0, 10.0, 1).with_frequency(CompoundFrequency::Yearly),
        );
        assert!((yearly.final_amount - 2_300.0).abs() < 1e-9);
        assert!((yearly.total_interest - 100.0).abs() < 1e-9);

        // Quarterly: 300 per quarter, the first quarter's interest is on principal alone
        let quarterly = simulate(
            &ProjectionInput::new(1_000.0, 100.0, 10.0, 1)
                .with_frequency(CompoundFrequency::Quarterly),
        );
        let q = 0.025;
        let mut balance = 1_000.0;
        for _ in 0..4 {
            balance = balance * (1.0 + q) + 300.0;
        }
        assert!((quarterly.final_amount - balance).abs() < 1e-9);
        assert_eq!(quarterly.yearly[0].contributions, 1_200.0);
    }

    #[test]
    fn test_zero_rate_has_no_interest() {
        let result = simulate(&ProjectionInput::new(1_000.0, 100.0, 0.0, 2));
        assert_eq!(result.final_amount, 1_000.0 + 2_400.0);
        assert_eq!(result.total_interest, 0.0);
        assert_eq!(result.effective_annual_rate, 0.0);
    }

    #[tokio::test]
    async fn test_calculator_validates() {
        let result = calculate_projection(ProjectionInput::new(1_000.0, 0.0, 5.0, 0)).await;
        assert!(matches!(result, Err(RuntimeError::Validation { .. })));

        let result = calculate_projection(ProjectionInput::default()).await.unwrap();
        assert_eq!(result.years(), 10);
    }
}
