//! Savings projection model and full simulation

pub mod input;
pub mod model;
pub mod simulate;

pub use input::{CompoundFrequency, InputField, ProjectionInput};
pub use model::{ProjectionResult, YearlyProjection};
pub use simulate::{calculate_projection, simulate};
