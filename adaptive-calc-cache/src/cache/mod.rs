//! # Calculation Cache
//!
//! In-memory store for expensive calculation results, keyed by a stable
//! hash of the calculator input.
//!
//! ## Features
//!
//! - **TTL-Based Expiration**: lazy expiry on access plus a periodic sweep
//! - **Pluggable Eviction**: LRU, LFU, FIFO or priority ordering
//! - **Soft Limits**: item and byte limits restored by eviction before inserts
//! - **Dependency Invalidation**: drop every result derived from a changed input
//! - **Stable Keys**: field order of the input never changes its key
//!
//! ## Example
//!
//! ```rust
//! use adaptive_calc_cache::cache::{CacheConfig, CalculationCache, EvictionStrategy};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::builder()
//!     .ttl(Duration::from_secs(300))
//!     .max_items(1_000)
//!     .strategy(EvictionStrategy::Lru)
//!     .build();
//!
//! let cache: CalculationCache<f64> = CalculationCache::new(config);
//!
//! let key = cache.generate_key(&serde_json::json!({"principal": 10000, "years": 10}))?;
//! cache.set(key.clone(), 16470.09, 1.5).await;
//!
//! if let Some(value) = cache.get(&key).await {
//!     println!("Cache hit: {}", value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod eviction;
pub mod invalidation;
pub mod key;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use eviction::EvictionStrategy;
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use key::generate_key;
pub use store::CalculationCache;
pub use types::{CacheKey, CacheStats};
