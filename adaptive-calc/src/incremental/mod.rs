//! Incremental recomputation of projections
//!
//! Change detection decides from a typed field classification whether the
//! previous result can be patched; the patch path is numerically
//! equivalent to a full simulation of the new input.

pub mod change;
pub mod engine;
pub mod patch;

pub use change::{detect_changes, ChangeDetection, FieldClass, FieldClassification, ImpactLevel};
pub use engine::{CalculationMetadata, CalculationOutcome, EngineConfig, IncrementalEngine};
