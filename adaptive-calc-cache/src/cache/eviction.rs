//! Pluggable eviction ordering
//!
//! Every strategy is a comparator over entry metadata. Entries that sort
//! first are evicted first; ties fall back to the logical access clock so
//! the order is deterministic even when wall-clock timestamps collide.

use crate::cache::entry::CacheMetadata;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Strategy deciding which entries leave the cache first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently accessed first
    #[default]
    Lru,

    /// Least frequently accessed first
    Lfu,

    /// Oldest insertion first
    Fifo,

    /// Lowest priority first
    Priority,
}

impl EvictionStrategy {
    /// Compare two entries; `Ordering::Less` means `a` is evicted before `b`
    pub fn compare(&self, a: &CacheMetadata, b: &CacheMetadata) -> Ordering {
        let primary = match self {
            EvictionStrategy::Lru => a.accessed_at.cmp(&b.accessed_at),
            EvictionStrategy::Lfu => a.access_count.cmp(&b.access_count),
            EvictionStrategy::Fifo => a.created_at.cmp(&b.created_at),
            EvictionStrategy::Priority => a.priority.cmp(&b.priority),
        };

        primary.then_with(|| match self {
            EvictionStrategy::Fifo => a.inserted_seq.cmp(&b.inserted_seq),
            _ => a.touched_seq.cmp(&b.touched_seq),
        })
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionStrategy::Lru => write!(f, "lru"),
            EvictionStrategy::Lfu => write!(f, "lfu"),
            EvictionStrategy::Fifo => write!(f, "fifo"),
            EvictionStrategy::Priority => write!(f, "priority"),
        }
    }
}

impl FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionStrategy::Lru),
            "lfu" => Ok(EvictionStrategy::Lfu),
            "fifo" => Ok(EvictionStrategy::Fifo),
            "priority" => Ok(EvictionStrategy::Priority),
            other => Err(format!("unknown eviction strategy: {}", other)),
        }
    }
}
