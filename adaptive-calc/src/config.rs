//! Runtime configuration loaded from YAML
//!
//! ```yaml
//! cache:
//!   max_items: 500
//!   ttl_ms: 60000
//!   strategy: lfu
//! scheduler:
//!   max_concurrent_tasks: 2
//! engine:
//!   use_scheduler: false
//! ```
//!
//! Every section and field is optional.

use std::fs;
use std::path::Path;

use adaptive_calc_cache::{CacheConfig, CacheError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::incremental::EngineConfig;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub engine: EngineConfig,
}

impl RuntimeConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)
            .map_err(|e| RuntimeError::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        debug!("Loading runtime configuration from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| RuntimeError::Config(format!("failed to serialize: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate().map_err(|e| match e {
            CacheError::Config(message) => RuntimeError::Config(message),
            other => RuntimeError::Cache(other),
        })?;
        self.scheduler.validate()?;

        if self.engine.timeout.is_zero() {
            return Err(RuntimeError::Config(
                "engine timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskPriority;
    use adaptive_calc_cache::EvictionStrategy;
    use std::time::Duration;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = RuntimeConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
cache:
  max_items: 500
  ttl_ms: 60000
  strategy: lfu
scheduler:
  max_concurrent_tasks: 2
engine:
  use_scheduler: false
  priority: immediate
"#;
        let config = RuntimeConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.cache.max_items, 500);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.strategy, EvictionStrategy::Lfu);
        assert_eq!(config.cache.max_size_bytes, CacheConfig::default().max_size_bytes);
        assert_eq!(config.scheduler.max_concurrent_tasks, 2);
        assert_eq!(config.scheduler.tick_interval, Duration::from_millis(10));
        assert!(!config.engine.use_scheduler);
        assert_eq!(config.engine.priority, TaskPriority::Immediate);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let error = RuntimeConfig::from_yaml_str("cache:\n  max_items: 0\n").unwrap_err();
        assert!(matches!(error, RuntimeError::Config(ref m) if m.contains("max_items")));

        let error = RuntimeConfig::from_yaml_str("scheduler:\n  max_concurrent_tasks: 0\n").unwrap_err();
        assert!(matches!(error, RuntimeError::Config(_)));

        let error = RuntimeConfig::from_yaml_str("cache: [1, 2").unwrap_err();
        assert!(matches!(error, RuntimeError::Config(ref m) if m.starts_with("invalid YAML")));
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = RuntimeConfig::default();
        config.cache.strategy = EvictionStrategy::Priority;
        config.engine.max_retries = 5;

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("ttl_ms"));
        assert_eq!(RuntimeConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let error = RuntimeConfig::from_yaml_file("/nonexistent/adaptive-calc.yaml").unwrap_err();
        assert!(matches!(error, RuntimeError::Config(ref m) if m.starts_with("failed to read")));
    }
}
