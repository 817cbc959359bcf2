//! Main cache store with TTL expiry, pluggable eviction and dependency invalidation

use crate::cache::{
    config::CacheConfig,
    entry::{estimate_size, CacheEntry},
    invalidation::{InvalidationEvent, InvalidationReason},
    key,
    types::{CacheKey, CacheStats},
};
use crate::error::{CacheError, Result};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Number of removal events kept for [`CalculationCache::recent_invalidations`]
pub const EVENT_LOG_LIMIT: usize = 64;

/// In-memory cache for calculation results
///
/// This implementation provides:
/// - Async access via RwLock, a single writer at a time
/// - Lazy TTL expiry on access plus an optional background sweep
/// - LRU/LFU/FIFO/priority eviction when size or item limits are exceeded
/// - Dependency-based and pattern-based invalidation
pub struct CalculationCache<V> {
    /// Cache configuration
    pub(crate) config: CacheConfig,

    /// Internal storage
    store: Arc<RwLock<CacheStore<V>>>,

    /// Background sweep, present between `start` and `destroy`
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// Internal cache storage
struct CacheStore<V> {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, CacheEntry<V>>,

    /// Sum of `size_bytes` over all entries
    total_size: usize,

    /// Logical clock for deterministic eviction ties
    clock: u64,

    /// Most recent removal events, oldest first
    events: VecDeque<InvalidationEvent>,

    hits: u64,
    misses: u64,
    cleanup_count: u64,
    evictions: u64,
    expirations: u64,
    invalidations: u64,
}

impl<V> CacheStore<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            total_size: 0,
            clock: 0,
            events: VecDeque::new(),
            hits: 0,
            misses: 0,
            cleanup_count: 0,
            evictions: 0,
            expirations: 0,
            invalidations: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.total_size = self.total_size.saturating_sub(entry.metadata.size_bytes);
        Some(entry)
    }

    fn remove_where<F>(&mut self, predicate: F) -> Vec<CacheKey>
    where
        F: Fn(&CacheEntry<V>) -> bool,
    {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            self.remove_entry(key);
        }

        keys
    }

    /// Count and log a removal; empty events are dropped
    fn record(&mut self, event: &InvalidationEvent) {
        if event.is_empty() {
            return;
        }

        let removed = event.len() as u64;
        match event.reason {
            InvalidationReason::Expired => self.expirations += removed,
            InvalidationReason::Evicted { .. } => self.evictions += removed,
            _ => self.invalidations += removed,
        }

        debug!("Removed {} cache entries ({})", event.len(), event.reason);
        self.events.push_back(event.clone());
        while self.events.len() > EVENT_LOG_LIMIT {
            self.events.pop_front();
        }
    }

    fn remove_expired(&mut self, ttl: Duration) -> InvalidationEvent {
        let expired = self.remove_where(|entry| entry.is_expired(ttl));
        self.cleanup_count += 1;

        let event = InvalidationEvent::new(InvalidationReason::Expired, expired);
        self.record(&event);
        event
    }

    fn expire(&mut self, key: &str) {
        self.remove_entry(key);
        let event = InvalidationEvent::new(InvalidationReason::Expired, vec![key.to_string()]);
        self.record(&event);
    }
}

impl<V> CalculationCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration
    ///
    /// No background work starts until [`CalculationCache::start`].
    pub fn new(config: CacheConfig) -> Self {
        info!(
            "Initializing calculation cache (strategy: {}, max_items: {}, max_size_bytes: {})",
            config.strategy, config.max_items, config.max_size_bytes
        );

        Self {
            config,
            store: Arc::new(RwLock::new(CacheStore::new())),
            sweeper: Mutex::new(None),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Generate the cache key for an input
    pub fn generate_key<T: Serialize + ?Sized>(&self, input: &T) -> Result<CacheKey> {
        key::generate_key(input)
    }

    /// Get a value, treating expired entries as misses and dropping them
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut store = self.store.write().await;
        let ttl = self.config.ttl;

        let expired = match store.entries.get(key) {
            Some(entry) => entry.is_expired(ttl),
            None => {
                debug!("Cache miss: {}", key);
                store.misses += 1;
                return None;
            }
        };

        if expired {
            store.expire(key);
            store.misses += 1;
            return None;
        }

        let seq = store.tick();
        store.hits += 1;
        let entry = store.entries.get_mut(key)?;
        entry.mark_accessed(seq);

        debug!("Cache hit: {}", key);
        Some(entry.value.clone())
    }

    /// Insert a value with no dependencies and default priority
    pub async fn set(&self, key: CacheKey, value: V, computation_time_ms: f64) {
        self.set_with_dependencies(key, value, computation_time_ms, Vec::<String>::new(), 1)
            .await
    }

    /// Insert a value, evicting first if limits would be exceeded
    ///
    /// An entry larger than `max_size_bytes` on its own is still accepted
    /// after everything else has been evicted. This is the escape hatch for
    /// memory pressure: the cache never refuses a computed result.
    pub async fn set_with_dependencies<I, S>(
        &self,
        key: CacheKey,
        value: V,
        computation_time_ms: f64,
        dependencies: I,
        priority: i32,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dependencies: HashSet<String> = dependencies.into_iter().map(Into::into).collect();
        let size = estimate_size(&key, &value);

        let mut store = self.store.write().await;

        if store.remove_entry(&key).is_some() {
            debug!("Replacing existing cache entry: {}", key);
        }

        self.evict_if_needed(&mut store, size);

        let seq = store.tick();
        let entry = CacheEntry::new(key.clone(), value, computation_time_ms, dependencies, priority, seq);
        store.total_size += entry.metadata.size_bytes;
        store.entries.insert(key.clone(), entry);

        debug!("Inserted cache entry: {} ({} bytes)", key, size);
    }

    /// Remove a single entry
    pub async fn delete(&self, key: &str) -> Option<V> {
        let mut store = self.store.write().await;

        let entry = store.remove_entry(key)?;
        store.record(&InvalidationEvent::new(
            InvalidationReason::Manual,
            vec![key.to_string()],
        ));
        Some(entry.value)
    }

    /// Check presence without touching access metadata
    pub async fn has(&self, key: &str) -> bool {
        let mut store = self.store.write().await;

        let expired = match store.entries.get(key) {
            Some(entry) => entry.is_expired(self.config.ttl),
            None => return false,
        };

        if expired {
            store.expire(key);
        }
        !expired
    }

    /// Remove every entry
    pub async fn clear(&self) {
        let mut store = self.store.write().await;

        let keys: Vec<CacheKey> = store.entries.drain().map(|(key, _)| key).collect();
        store.total_size = 0;

        info!("Cleared {} entries from cache", keys.len());
        store.record(&InvalidationEvent::new(InvalidationReason::Cleared, keys));
    }

    /// Remove all keys matching a regular expression, or every key
    pub async fn invalidate(&self, pattern: Option<&str>) -> Result<usize> {
        let Some(pattern) = pattern else {
            let mut store = self.store.write().await;
            let removed = store.remove_where(|_| true);
            let event = InvalidationEvent::new(InvalidationReason::Cleared, removed);
            info!("Invalidated all {} entries", event.len());
            store.record(&event);
            return Ok(event.len());
        };

        let regex = Regex::new(pattern).map_err(|source| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut store = self.store.write().await;
        let removed = store.remove_where(|entry| regex.is_match(&entry.key));

        let event = InvalidationEvent::new(
            InvalidationReason::Pattern {
                pattern: pattern.to_string(),
            },
            removed,
        );
        info!("Invalidated {} entries ({})", event.len(), event.reason);
        store.record(&event);

        Ok(event.len())
    }

    /// Remove every entry derived from `dependency`
    pub async fn invalidate_dependencies(&self, dependency: &str) -> usize {
        let mut store = self.store.write().await;
        let removed = store.remove_where(|entry| entry.depends_on(dependency));

        let event = InvalidationEvent::new(
            InvalidationReason::Dependency {
                dependency: dependency.to_string(),
            },
            removed,
        );
        info!("Invalidated {} entries ({})", event.len(), event.reason);
        store.record(&event);

        event.len()
    }

    /// Precompute values for inputs that are not cached yet
    ///
    /// Returns the number of entries populated. A failing computation is
    /// logged and skipped.
    pub async fn warmup<I, F, Fut, E>(&self, inputs: Vec<I>, compute: F) -> Result<usize>
    where
        I: Serialize,
        F: Fn(I) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: fmt::Display,
    {
        let mut populated = 0;

        for input in inputs {
            let key = self.generate_key(&input)?;
            if self.has(&key).await {
                continue;
            }

            let started = Instant::now();
            match compute(input).await {
                Ok(value) => {
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    self.set(key, value, elapsed_ms).await;
                    populated += 1;
                }
                Err(e) => {
                    warn!("Warmup computation failed for {}: {}", key, e);
                }
            }
        }

        info!("Cache warmup populated {} entries", populated);
        Ok(populated)
    }

    /// Remove all expired entries now
    pub async fn cleanup_expired(&self) -> InvalidationEvent {
        let mut store = self.store.write().await;
        store.remove_expired(self.config.ttl)
    }

    /// Start the periodic expiry sweep on the current tokio runtime
    ///
    /// An invalid configuration is rejected before anything is spawned.
    pub fn start(&self) -> Result<()> {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let store = Arc::clone(&self.store);
        let ttl = self.config.ttl;
        let interval = self.config.cleanup_interval;

        info!("Starting cache sweep (interval: {:?})", interval);

        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let mut store = store.write().await;
                store.remove_expired(ttl);
            }
        }));
        Ok(())
    }

    /// Stop the sweep and drop all entries
    pub async fn destroy(&self) {
        self.stop_sweeper();
        self.clear().await;
    }

    /// Whether the background sweep is running
    pub fn is_running(&self) -> bool {
        self.sweeper.lock().is_some()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;

        let total_items = store.entries.len();
        let average_computation_time_ms = if total_items == 0 {
            0.0
        } else {
            store
                .entries
                .values()
                .map(|e| e.metadata.computation_time_ms)
                .sum::<f64>()
                / total_items as f64
        };

        CacheStats {
            hits: store.hits,
            misses: store.misses,
            hit_rate: CacheStats::hit_rate_of(store.hits, store.misses),
            total_items,
            total_size_bytes: store.total_size,
            average_computation_time_ms,
            cleanup_count: store.cleanup_count,
            evictions: store.evictions,
            expirations: store.expirations,
            invalidations: store.invalidations,
        }
    }

    /// Get current cache size in bytes
    pub async fn size_bytes(&self) -> usize {
        self.store.read().await.total_size
    }

    /// Get number of entries in cache
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.entries.is_empty()
    }

    /// Recent removal events, oldest first, capped at [`EVENT_LOG_LIMIT`]
    pub async fn recent_invalidations(&self) -> Vec<InvalidationEvent> {
        self.store.read().await.events.iter().cloned().collect()
    }

    /// Internal: evict until the incoming entry fits
    ///
    /// Candidates are taken in strategy order. Eviction stops once the
    /// required space is free and, when the item limit triggered it, the
    /// entry count has fallen to 80% of `max_items`.
    fn evict_if_needed(&self, store: &mut CacheStore<V>, incoming_size: usize) {
        let over_items = store.entries.len() + 1 > self.config.max_items;
        let over_size = store.total_size + incoming_size > self.config.max_size_bytes;

        if !over_items && !over_size {
            return;
        }

        let required = (store.total_size + incoming_size).saturating_sub(self.config.max_size_bytes);
        let floor = self.config.eviction_floor();
        let strategy = self.config.strategy;

        let mut candidates: Vec<&CacheEntry<V>> = store.entries.values().collect();
        candidates.sort_by(|a, b| strategy.compare(&a.metadata, &b.metadata));

        let mut remaining = store.entries.len();
        let mut freed = 0;
        let mut victims = Vec::new();

        for entry in candidates {
            let space_ok = freed >= required;
            let items_ok = !over_items || remaining <= floor;
            if space_ok && items_ok {
                break;
            }

            freed += entry.metadata.size_bytes;
            remaining -= 1;
            victims.push(entry.key.clone());
        }

        for key in &victims {
            store.remove_entry(key);
        }
        store.record(&InvalidationEvent::new(
            InvalidationReason::Evicted { strategy },
            victims,
        ));

        if store.total_size + incoming_size > self.config.max_size_bytes {
            warn!(
                "Entry of {} bytes exceeds max_size_bytes ({}), storing anyway",
                incoming_size, self.config.max_size_bytes
            );
        }
    }

    fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
            info!("Stopped cache sweep");
        }
    }
}

impl<V> Drop for CalculationCache<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}
