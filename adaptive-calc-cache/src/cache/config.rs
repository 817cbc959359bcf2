//! Configuration for the calculation cache

use crate::cache::eviction::EvictionStrategy;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the calculation cache
///
/// Size and item limits are soft bounds: they are restored by eviction
/// before an insert, not checked on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum estimated size of all stored entries in bytes
    pub max_size_bytes: usize,

    /// Maximum number of entries
    pub max_items: usize,

    /// Time-to-live measured from insertion
    #[serde(rename = "ttl_ms", with = "duration_ms")]
    pub ttl: Duration,

    /// Interval of the background expiry sweep
    #[serde(rename = "cleanup_interval_ms", with = "duration_ms")]
    pub cleanup_interval: Duration,

    /// Which entries are evicted first when limits are exceeded
    pub strategy: EvictionStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 50 MB
            max_size_bytes: 50 * 1024 * 1024,
            max_items: 1_000,
            // Calculation results stay fresh for 5 minutes
            ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            strategy: EvictionStrategy::Lru,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(CacheError::Config("max_items must be greater than 0".to_string()));
        }

        if self.max_size_bytes == 0 {
            return Err(CacheError::Config(
                "max_size_bytes must be greater than 0".to_string(),
            ));
        }

        if self.ttl.is_zero() {
            return Err(CacheError::Config("ttl must be greater than 0".to_string()));
        }

        if self.cleanup_interval.is_zero() {
            return Err(CacheError::Config(
                "cleanup_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Item count eviction falls back to once it runs
    pub fn eviction_floor(&self) -> usize {
        (self.max_items as f64 * 0.8).floor() as usize
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    max_size_bytes: Option<usize>,
    max_items: Option<usize>,
    ttl: Option<Duration>,
    cleanup_interval: Option<Duration>,
    strategy: Option<EvictionStrategy>,
}

impl CacheConfigBuilder {
    /// Set maximum cache size in bytes
    pub fn max_size_bytes(mut self, size: usize) -> Self {
        self.max_size_bytes = Some(size);
        self
    }

    /// Set maximum number of cache entries
    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Set time-to-live for cache entries
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set background sweep interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Set eviction strategy
    pub fn strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            max_size_bytes: self.max_size_bytes.unwrap_or(defaults.max_size_bytes),
            max_items: self.max_items.unwrap_or(defaults.max_items),
            ttl: self.ttl.unwrap_or(defaults.ttl),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
            strategy: self.strategy.unwrap_or(defaults.strategy),
        }
    }
}

/// Preset configurations for common use cases
impl CacheConfig {
    /// Interactive what-if sessions: short TTL, frequent sweeps
    pub fn realtime() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
            max_items: 200,
            ttl: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(10),
            strategy: EvictionStrategy::Lru,
        }
    }

    /// Memory-constrained environments
    pub fn small() -> Self {
        Self {
            max_size_bytes: 2 * 1024 * 1024,
            max_items: 100,
            ..Default::default()
        }
    }

    /// Long-lived caches shared by many projections
    pub fn large() -> Self {
        Self {
            max_size_bytes: 512 * 1024 * 1024,
            max_items: 50_000,
            ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(300),
            strategy: EvictionStrategy::Lfu,
        }
    }
}

/// Serialize `Duration` fields as integer milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.max_items, 1_000);
        assert_eq!(config.strategy, EvictionStrategy::Lru);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut invalid_config = CacheConfig::default();
        invalid_config.max_items = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.ttl = Duration::ZERO;
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .ttl(Duration::from_secs(600))
            .max_items(5000)
            .max_size_bytes(50_000_000)
            .strategy(EvictionStrategy::Fifo)
            .build();

        assert_eq!(config.ttl, Duration::from_secs(600));
        assert_eq!(config.max_items, 5000);
        assert_eq!(config.max_size_bytes, 50_000_000);
        assert_eq!(config.strategy, EvictionStrategy::Fifo);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_eviction_floor() {
        let config = CacheConfig::builder().max_items(3).build();
        assert_eq!(config.eviction_floor(), 2);

        let config = CacheConfig::builder().max_items(100).build();
        assert_eq!(config.eviction_floor(), 80);
    }

    #[test]
    fn test_durations_serialize_as_millis() {
        let config = CacheConfig::builder()
            .ttl(Duration::from_millis(1500))
            .build();

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["ttl_ms"], 1500);
        assert_eq!(json["strategy"], "lru");

        let parsed: CacheConfig =
            serde_json::from_str(r#"{"ttl_ms": 250, "strategy": "priority"}"#).unwrap();
        assert_eq!(parsed.ttl, Duration::from_millis(250));
        assert_eq!(parsed.strategy, EvictionStrategy::Priority);
        assert_eq!(parsed.max_items, 1_000);
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(CacheConfig::realtime().ttl, Duration::from_secs(60));
        assert_eq!(CacheConfig::small().max_items, 100);
        assert_eq!(CacheConfig::large().strategy, EvictionStrategy::Lfu);
    }
}
