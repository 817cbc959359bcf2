//! Stable cache keys for calculation inputs
//!
//! Inputs are canonicalized through `serde_json::Value` with object fields
//! sorted recursively, so two inputs that are equal by value always hash
//! to the same key regardless of field order.

use crate::cache::types::CacheKey;
use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Prefix for every generated key
pub const KEY_PREFIX: &str = "calc";

/// Generate a stable key for any serializable input
pub fn generate_key<T: Serialize + ?Sized>(input: &T) -> Result<CacheKey> {
    let value = serde_json::to_value(input)?;
    let canonical = canonicalize(value);
    let text = serde_json::to_string(&canonical)?;

    let digest = Sha256::digest(text.as_bytes());
    Ok(format!("{}:{}", KEY_PREFIX, hex::encode(digest)))
}

/// Recursively sort object fields
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
