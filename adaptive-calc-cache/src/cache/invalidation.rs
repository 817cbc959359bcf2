//! Reasons and events for entries leaving the cache

use crate::cache::eviction::EvictionStrategy;
use crate::cache::types::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why entries were removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// TTL elapsed, found lazily on access or by the sweep
    Expired,

    /// Removed to restore size/item limits
    Evicted { strategy: EvictionStrategy },

    /// Explicit `delete`
    Manual,

    /// Key matched an invalidation pattern
    Pattern { pattern: String },

    /// Entry listed the invalidated dependency
    Dependency { dependency: String },

    /// Whole cache cleared
    Cleared,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::Evicted { strategy } => write!(f, "{} eviction", strategy),
            InvalidationReason::Manual => write!(f, "manual removal"),
            InvalidationReason::Pattern { pattern } => write!(f, "pattern match: {}", pattern),
            InvalidationReason::Dependency { dependency } => {
                write!(f, "dependency invalidated: {}", dependency)
            }
            InvalidationReason::Cleared => write!(f, "cache cleared"),
        }
    }
}

/// Record of one removal pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,

    /// Keys that were removed
    pub keys: Vec<CacheKey>,
}

impl InvalidationEvent {
    pub fn new(reason: InvalidationReason, keys: Vec<CacheKey>) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            keys,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
