//! # Adaptive Calculation Cache (adaptive-calc-cache)
//!
//! Result cache for repeatedly re-run financial projections.
//!
//! ## Features
//!
//! - Async-first design using tokio
//! - TTL expiry, checked lazily on access and by a background sweep
//! - Size and item limits with LRU, LFU, FIFO or priority eviction
//! - Invalidation by key pattern or by dependency
//! - Stable content-addressed keys for any serializable input
//!
//! ## Lifecycle
//!
//! A cache does nothing in the background until it is started, and stops
//! its sweep when destroyed or dropped.
//!
//! ```no_run
//! use adaptive_calc_cache::{CacheConfig, CalculationCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache: CalculationCache<String> = CalculationCache::new(CacheConfig::default());
//!     cache.start()?;
//!
//!     cache.set("calc:demo".to_string(), "result".to_string(), 4.2).await;
//!     println!("{}", cache.stats().await);
//!
//!     cache.destroy().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    generate_key, CacheConfig, CacheConfigBuilder, CacheEntry, CacheKey, CacheMetadata,
    CacheStats, CalculationCache, EvictionStrategy, InvalidationEvent, InvalidationReason,
};
pub use error::{CacheError, Result};
