//! # Adaptive Calculation Runtime (adaptive-calc)
//!
//! Re-runs expensive savings projections without blocking and without
//! redundant work.
//!
//! - [`scheduler`]: priority queue with bounded concurrency, dependency
//!   gating, timeouts and retries
//! - [`incremental`]: classifies each new input against the previous one
//!   and patches the previous result when that is exact
//! - [`projection`]: the projection model and its full simulation
//!
//! Results are cached with [`adaptive_calc_cache`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use adaptive_calc::{
//!     CalculationCache, CalculationScheduler, IncrementalEngine, ProjectionInput, RuntimeConfig,
//! };
//!
//! # async fn example() -> adaptive_calc::Result<()> {
//! let config = RuntimeConfig::default();
//! let cache = Arc::new(CalculationCache::new(config.cache.clone()));
//! let scheduler = Arc::new(CalculationScheduler::new(config.scheduler.clone()));
//! cache.start()?;
//! scheduler.start()?;
//!
//! let engine = IncrementalEngine::new(cache, Some(scheduler), config.engine.clone());
//! let outcome = engine.calculate(ProjectionInput::new(10_000.0, 500.0, 5.0, 10)).await?;
//! println!("{:.2}", outcome.result.final_amount);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod incremental;
pub mod projection;
pub mod scheduler;

pub use adaptive_calc_cache::{CacheConfig, CacheStats, CalculationCache, EvictionStrategy};
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use incremental::{
    CalculationMetadata, CalculationOutcome, ChangeDetection, EngineConfig, FieldClass,
    FieldClassification, ImpactLevel, IncrementalEngine,
};
pub use projection::{CompoundFrequency, ProjectionInput, ProjectionResult, YearlyProjection};
pub use scheduler::{
    CalculationScheduler, QueueStatus, ScheduleOptions, SchedulerConfig, SchedulerStats,
    TaskHandle, TaskId, TaskPriority, TaskStatus,
};
