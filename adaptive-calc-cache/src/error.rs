//! Error types for cache operations
//!
//! Normal cache traffic (get/set/delete/evict) never fails. Errors only
//! arise from configuration, key generation and invalidation patterns.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalidation pattern is not a valid regular expression
    #[error("Invalid invalidation pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Input could not be serialized for key generation
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
