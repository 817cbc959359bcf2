//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type - hex digest of a canonicalized input
pub type CacheKey = String;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses (including expired lookups)
    pub misses: u64,

    /// `hits / (hits + misses)`, 0 before the first lookup
    pub hit_rate: f64,

    /// Number of entries currently in cache
    pub total_items: usize,

    /// Estimated size of all entries in bytes
    pub total_size_bytes: usize,

    /// Mean computation time over stored entries
    pub average_computation_time_ms: f64,

    /// Number of expiry sweeps performed
    pub cleanup_count: u64,

    /// Entries removed to restore size/item limits
    pub evictions: u64,

    /// Entries removed because their TTL elapsed
    pub expirations: u64,

    /// Entries removed by delete/invalidate calls
    pub invalidations: u64,
}

impl CacheStats {
    pub(crate) fn hit_rate_of(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, items: {}, size: {} bytes, evictions: {}, expirations: {} }}",
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.total_items,
            self.total_size_bytes,
            self.evictions,
            self.expirations
        )
    }
}
