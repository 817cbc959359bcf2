//! # Calculation Scheduler
//!
//! Runs opaque async calculators under a priority queue with bounded
//! concurrency.
//!
//! - Strict priority tiers, first-come first-served within a tier
//! - Dependency gating on previously scheduled tasks
//! - Per-attempt timeout and bounded retry of retryable errors
//! - Cooperative cancellation: handles settle at once, running work is
//!   left to finish and its result discarded
//!
//! ```no_run
//! use adaptive_calc::scheduler::{CalculationScheduler, ScheduleOptions, SchedulerConfig, TaskPriority};
//!
//! # async fn example() -> adaptive_calc::Result<()> {
//! let scheduler = CalculationScheduler::new(SchedulerConfig::default());
//! scheduler.start()?;
//!
//! let handle = scheduler.schedule(
//!     |years: u32| async move { Ok::<_, adaptive_calc::RuntimeError>(years * 12) },
//!     10,
//!     ScheduleOptions::new().priority(TaskPriority::High),
//! );
//! assert_eq!(handle.await?, 120);
//!
//! scheduler.destroy();
//! # Ok(())
//! # }
//! ```

pub mod config;
mod queue;
#[allow(clippy::module_inception)]
mod scheduler;
pub mod task;

pub use config::{SchedulerConfig, SchedulerConfigBuilder};
pub use scheduler::{CalculationScheduler, QueueStatus, SchedulerStats};
pub use task::{
    CalculationTask, ScheduleOptions, TaskHandle, TaskId, TaskPriority, TaskStatus,
};
