//! Configuration for the calculation scheduler

use std::time::Duration;

use adaptive_calc_cache::cache::config::duration_ms;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on tasks in the RUNNING state
    pub max_concurrent_tasks: usize,

    /// Period of the dispatch loop
    #[serde(rename = "tick_interval_ms", with = "duration_ms")]
    pub tick_interval: Duration,

    /// Timeout for tasks scheduled without one
    #[serde(rename = "default_timeout_ms", with = "duration_ms")]
    pub default_timeout: Duration,

    pub default_max_retries: u32,

    /// Completed tasks kept for statistics
    pub history_limit: usize,

    /// Trailing window used for throughput
    #[serde(rename = "throughput_window_ms", with = "duration_ms")]
    pub throughput_window: Duration,

    /// How long settled task ids stay available as dependencies
    ///
    /// Ids still named by a queued task are kept regardless.
    #[serde(rename = "settled_retention_ms", with = "duration_ms")]
    pub settled_retention: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            tick_interval: Duration::from_millis(10),
            default_timeout: Duration::from_secs(30),
            default_max_retries: 2,
            history_limit: 100,
            throughput_window: Duration::from_secs(60),
            settled_retention: Duration::from_secs(600),
        }
    }
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(RuntimeError::Config(
                "max_concurrent_tasks must be greater than 0".to_string(),
            ));
        }

        if self.tick_interval.is_zero() {
            return Err(RuntimeError::Config(
                "tick_interval must be greater than 0".to_string(),
            ));
        }

        if self.default_timeout.is_zero() {
            return Err(RuntimeError::Config(
                "default_timeout must be greater than 0".to_string(),
            ));
        }

        if self.throughput_window.is_zero() {
            return Err(RuntimeError::Config(
                "throughput_window must be greater than 0".to_string(),
            ));
        }

        if self.settled_retention.is_zero() {
            return Err(RuntimeError::Config(
                "settled_retention must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    max_concurrent_tasks: Option<usize>,
    tick_interval: Option<Duration>,
    default_timeout: Option<Duration>,
    default_max_retries: Option<u32>,
    history_limit: Option<usize>,
    throughput_window: Option<Duration>,
    settled_retention: Option<Duration>,
}

impl SchedulerConfigBuilder {
    pub fn max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = Some(max);
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = Some(retries);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn throughput_window(mut self, window: Duration) -> Self {
        self.throughput_window = Some(window);
        self
    }

    pub fn settled_retention(mut self, retention: Duration) -> Self {
        self.settled_retention = Some(retention);
        self
    }

    pub fn build(self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();

        SchedulerConfig {
            max_concurrent_tasks: self
                .max_concurrent_tasks
                .unwrap_or(defaults.max_concurrent_tasks),
            tick_interval: self.tick_interval.unwrap_or(defaults.tick_interval),
            default_timeout: self.default_timeout.unwrap_or(defaults.default_timeout),
            default_max_retries: self
                .default_max_retries
                .unwrap_or(defaults.default_max_retries),
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
            throughput_window: self.throughput_window.unwrap_or(defaults.throughput_window),
            settled_retention: self.settled_retention.unwrap_or(defaults.settled_retention),
        }
    }
}
