//! Error taxonomy for the calculation runtime
//!
//! Retryable errors (timeouts, calculator failures) are requeued silently
//! by the scheduler until `max_retries` is spent; every other variant
//! settles the caller's future on first occurrence.

use adaptive_calc_cache::CacheError;
use thiserror::Error;

use crate::scheduler::TaskId;

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Malformed calculator input
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Calculator did not settle within its timeout
    #[error("Task {task_id} timed out after {timeout_ms}ms")]
    Timeout { task_id: TaskId, timeout_ms: u64 },

    /// Calculator returned an error
    #[error("Calculator error: {0}")]
    Calculator(String),

    /// Task cancelled by the caller
    #[error("Task {0} was cancelled")]
    Cancelled(TaskId),

    /// Task dropped by `clear()` before it started
    #[error("Task {0} was dropped because the queue was cleared")]
    QueueCleared(TaskId),

    /// Retryable failures exhausted the retry budget
    #[error("Task {task_id} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        task_id: TaskId,
        attempts: u32,
        #[source]
        source: Box<RuntimeError>,
    },

    /// A prerequisite task failed or was cancelled
    #[error("Task {task_id} cannot run: dependency {dependency} did not complete")]
    DependencyFailed { task_id: TaskId, dependency: TaskId },

    /// Scheduler destroyed before the task settled
    #[error("Scheduler stopped before task {0} settled")]
    SchedulerStopped(TaskId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// Shorthand for a validation error on `field`
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the scheduler may requeue a task after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RuntimeError::Timeout { .. } | RuntimeError::Calculator(_)
        )
    }

    /// The innermost error, looking through retry exhaustion
    pub fn root_cause(&self) -> &RuntimeError {
        match self {
            RuntimeError::RetriesExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<String> for RuntimeError {
    fn from(s: String) -> Self {
        RuntimeError::Calculator(s)
    }
}

impl From<&str> for RuntimeError {
    fn from(s: &str) -> Self {
        RuntimeError::Calculator(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RuntimeError::validation("principal", "must be greater than 0");
        assert_eq!(
            error.to_string(),
            "Validation error on principal: must be greater than 0"
        );

        let timeout = RuntimeError::Timeout {
            task_id: TaskId::from("calc-1"),
            timeout_ms: 250,
        };
        assert!(timeout.to_string().contains("timed out after 250ms"));
    }

    #[test]
    fn test_retry_taxonomy() {
        assert!(RuntimeError::Calculator("boom".to_string()).is_retryable());
        assert!(RuntimeError::Timeout {
            task_id: TaskId::from("t"),
            timeout_ms: 1
        }
        .is_retryable());

        assert!(!RuntimeError::validation("years", "too long").is_retryable());
        assert!(!RuntimeError::Cancelled(TaskId::from("t")).is_retryable());
        assert!(!RuntimeError::QueueCleared(TaskId::from("t")).is_retryable());
    }

    #[test]
    fn test_root_cause() {
        let error = RuntimeError::RetriesExhausted {
            task_id: TaskId::from("t"),
            attempts: 3,
            source: Box::new(RuntimeError::Calculator("boom".to_string())),
        };

        assert!(matches!(error.root_cause(), RuntimeError::Calculator(_)));
        assert!(error.to_string().contains("after 3 attempts: Calculator error: boom"));
    }

    #[test]
    fn test_error_conversion() {
        let error: RuntimeError = "calculator failed".into();
        assert!(matches!(error, RuntimeError::Calculator(_)));

        let error: RuntimeError = CacheError::Config("bad".to_string()).into();
        assert!(matches!(error, RuntimeError::Cache(_)));
    }
}
