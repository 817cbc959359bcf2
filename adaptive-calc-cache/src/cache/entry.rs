//! Cache entry management with TTL support

use crate::cache::types::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Fixed per-entry bookkeeping cost added to every size estimate
pub const ENTRY_OVERHEAD_BYTES: usize = std::mem::size_of::<CacheMetadata>();

/// A cached calculation result with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cache key
    pub key: CacheKey,

    /// The cached value
    pub value: V,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl<V: Serialize> CacheEntry<V> {
    /// Create a new entry; size is estimated once here and never changes
    pub fn new(
        key: CacheKey,
        value: V,
        computation_time_ms: f64,
        dependencies: HashSet<String>,
        priority: i32,
        seq: u64,
    ) -> Self {
        let now = Utc::now();
        let size_bytes = estimate_size(&key, &value);

        Self {
            key,
            value,
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                access_count: 0,
                computation_time_ms,
                size_bytes,
                dependencies,
                priority,
                inserted_seq: seq,
                touched_seq: seq,
            },
        }
    }
}

impl<V> CacheEntry<V> {
    /// Check whether the entry outlived `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self, seq: u64) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
        self.metadata.touched_seq = seq;
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        (Utc::now() - self.metadata.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Check if the entry was derived from `dependency`
    pub fn depends_on(&self, dependency: &str) -> bool {
        self.metadata.dependencies.contains(dependency)
    }
}

/// Metadata associated with a cache entry
///
/// `created_at` and `size_bytes` are fixed at insertion. Only the access
/// fields change, and only on a cache hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last access time (for LRU ordering)
    pub accessed_at: DateTime<Utc>,

    /// Number of cache hits served by this entry
    pub access_count: u64,

    /// How long the value took to compute
    pub computation_time_ms: f64,

    /// Estimated size of the entry in bytes
    pub size_bytes: usize,

    /// Keys this entry was derived from
    pub dependencies: HashSet<String>,

    /// Eviction priority, higher survives longer
    pub priority: i32,

    /// Logical clock value at insertion
    pub inserted_seq: u64,

    /// Logical clock value at the last insertion or hit
    pub touched_seq: u64,
}

/// Estimate the in-memory footprint from the serialized value
pub fn estimate_size<V: Serialize>(key: &str, value: &V) -> usize {
    let value_len = serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .unwrap_or(std::mem::size_of::<V>());

    key.len() + value_len + ENTRY_OVERHEAD_BYTES
}
