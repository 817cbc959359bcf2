//! Derive a new projection from the previous one without resimulating

use crate::projection::model::{ProjectionResult, YearlyProjection};
use crate::projection::{InputField, ProjectionInput};

/// Fields a patch can absorb; anything else requires a full simulation
const PATCHABLE: [InputField; 3] = [
    InputField::PeriodicContribution,
    InputField::TaxRate,
    InputField::InflationRate,
];

/// Patch `previous` (computed for `old`) into the result for `new`
///
/// Returns `None` when the inputs differ in a field that reshapes the
/// simulation or the previous sequence does not cover the horizon.
pub fn patch(
    old: &ProjectionInput,
    previous: &ProjectionResult,
    new: &ProjectionInput,
) -> Option<ProjectionResult> {
    let changed = old.changed_fields(new);
    if changed.iter().any(|field| !PATCHABLE.contains(field)) {
        return None;
    }
    if previous.yearly.len() != new.years as usize {
        return None;
    }

    if changed.contains(&InputField::PeriodicContribution) {
        Some(apply_amount_delta(old, previous, new))
    } else {
        Some(previous.reaggregate(new))
    }
}

/// Add the compounded effect of a changed periodic contribution
///
/// A constant extra `d` per period grows to `d((1+r)^n - 1)/r` after `n`
/// periods, so every year-end balance shifts by that amount with `n` the
/// number of periods elapsed.
fn apply_amount_delta(
    old: &ProjectionInput,
    previous: &ProjectionResult,
    new: &ProjectionInput,
) -> ProjectionResult {
    let delta = new.contribution_per_period() - old.contribution_per_period();
    let rate = new.periodic_rate();
    let periods = new.periods_per_year();

    let accumulated = |elapsed: u32| -> f64 {
        if rate == 0.0 {
            delta * elapsed as f64
        } else {
            delta * ((1.0 + rate).powi(elapsed as i32) - 1.0) / rate
        }
    };

    let mut start = new.principal;
    let yearly = previous
        .yearly
        .iter()
        .map(|year| {
            let end = year.end_amount + accumulated(year.year * periods);
            let contributions = year.contributions + delta * periods as f64;
            let interest = end - start - contributions;
            let patched = YearlyProjection::new(year.year, start, contributions, interest, end);
            start = end;
            patched
        })
        .collect();

    ProjectionResult::from_yearly(new, yearly)
}
