//! Incremental projection engine
//!
//! Holds the most recent input and result of a single projection stream.
//! Each call is answered from the cache, by patching the held result, or
//! by a full simulation, optionally run through the scheduler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use adaptive_calc_cache::cache::config::duration_ms;
use adaptive_calc_cache::CalculationCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::change::{detect_changes, ChangeDetection, FieldClassification};
use super::patch::patch;
use crate::error::Result;
use crate::projection::{calculate_projection, simulate, ProjectionInput, ProjectionResult};
use crate::scheduler::{CalculationScheduler, ScheduleOptions, TaskPriority};

/// Cache priority given to stored projections
const RESULT_PRIORITY: i32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run full simulations through the scheduler when one is attached
    pub use_scheduler: bool,
    pub priority: TaskPriority,
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_scheduler: true,
            priority: TaskPriority::High,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationMetadata {
    pub cache_hit: bool,
    pub incremental_update: bool,
    pub calculation_time_ms: f64,
    pub affected_periods: Vec<u32>,
    /// Absent on cache hits
    pub change_detection: Option<ChangeDetection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationOutcome {
    pub result: ProjectionResult,
    pub metadata: CalculationMetadata,
}

#[derive(Debug, Clone)]
struct HeldProjection {
    input: ProjectionInput,
    result: ProjectionResult,
}

pub struct IncrementalEngine {
    cache: Arc<CalculationCache<ProjectionResult>>,
    scheduler: Option<Arc<CalculationScheduler>>,
    config: EngineConfig,
    classification: FieldClassification,
    last: Mutex<Option<HeldProjection>>,
}

impl IncrementalEngine {
    pub fn new(
        cache: Arc<CalculationCache<ProjectionResult>>,
        scheduler: Option<Arc<CalculationScheduler>>,
        config: EngineConfig,
    ) -> Self {
        info!(
            "Initializing incremental engine (scheduler: {})",
            scheduler.is_some() && config.use_scheduler
        );

        Self {
            cache,
            scheduler,
            config,
            classification: FieldClassification::default(),
            last: Mutex::new(None),
        }
    }

    /// Replace the field classification table
    pub fn with_classification(mut self, classification: FieldClassification) -> Self {
        self.classification = classification;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CalculationCache<ProjectionResult>> {
        &self.cache
    }

    pub fn scheduler(&self) -> Option<&Arc<CalculationScheduler>> {
        self.scheduler.as_ref()
    }

    /// Most recently seen input
    pub fn last_input(&self) -> Option<ProjectionInput> {
        self.last.lock().as_ref().map(|held| held.input.clone())
    }

    /// Forget the held input and result
    pub fn reset(&self) {
        *self.last.lock() = None;
        debug!("Incremental engine reset");
    }

    pub async fn calculate(&self, input: ProjectionInput) -> Result<CalculationOutcome> {
        self.calculate_with_dependencies(input, &[]).await
    }

    /// Calculate and store the result under the given cache dependencies
    ///
    /// On error the cache and the held result are left as they were.
    pub async fn calculate_with_dependencies(
        &self,
        input: ProjectionInput,
        dependencies: &[String],
    ) -> Result<CalculationOutcome> {
        let started = Instant::now();
        input.validate()?;

        let key = self.cache.generate_key(&input)?;
        if let Some(result) = self.cache.get(&key).await {
            debug!("Projection served from cache ({})", key);
            self.hold(input, result.clone());
            return Ok(CalculationOutcome {
                result,
                metadata: CalculationMetadata {
                    cache_hit: true,
                    incremental_update: false,
                    calculation_time_ms: elapsed_ms(started),
                    affected_periods: Vec::new(),
                    change_detection: None,
                },
            });
        }

        let previous = self.last.lock().clone();
        let detection = detect_changes(
            previous.as_ref().map(|held| &held.input),
            &input,
            &self.classification,
        );

        let patched = match &previous {
            Some(held) if detection.can_use_incremental => patch(&held.input, &held.result, &input),
            _ => None,
        };

        let incremental_update = patched.is_some();
        let result = match patched {
            Some(result) => result,
            None => self.compute_full(input.clone()).await?,
        };

        let calculation_time_ms = elapsed_ms(started);
        debug!(
            "Projection computed (impact: {}, incremental: {}, {:.3}ms)",
            detection.impact_level, incremental_update, calculation_time_ms
        );

        self.cache
            .set_with_dependencies(
                key,
                result.clone(),
                calculation_time_ms,
                dependencies.iter().cloned(),
                RESULT_PRIORITY,
            )
            .await;
        self.hold(input, result.clone());

        let affected_periods = if incremental_update {
            detection.affected_periods.clone()
        } else {
            (1..=result.years()).collect()
        };

        Ok(CalculationOutcome {
            result,
            metadata: CalculationMetadata {
                cache_hit: false,
                incremental_update,
                calculation_time_ms,
                affected_periods,
                change_detection: Some(detection),
            },
        })
    }

    async fn compute_full(&self, input: ProjectionInput) -> Result<ProjectionResult> {
        match &self.scheduler {
            Some(scheduler) if self.config.use_scheduler => {
                let options = ScheduleOptions::new()
                    .priority(self.config.priority)
                    .timeout(self.config.timeout)
                    .max_retries(self.config.max_retries)
                    .tag("projection");
                scheduler.schedule(calculate_projection, input, options).await
            }
            _ => Ok(simulate(&input)),
        }
    }

    fn hold(&self, input: ProjectionInput, result: ProjectionResult) {
        *self.last.lock() = Some(HeldProjection { input, result });
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
