use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{Result, RuntimeError};

/// Unique identifier of a scheduled calculation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub(crate) fn generate(sequence: u64) -> Self {
        let short = Uuid::new_v4().simple().to_string();
        TaskId(format!("calc-{}-{}", sequence, &short[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

/// Priority tier; higher tiers always dispatch first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Immediate,
    High,
    #[default]
    Normal,
    Low,
    Background,
}

impl TaskPriority {
    /// Ordering weight of the tier
    pub fn weight(&self) -> u8 {
        match self {
            TaskPriority::Immediate => 4,
            TaskPriority::High => 3,
            TaskPriority::Normal => 2,
            TaskPriority::Low => 1,
            TaskPriority::Background => 0,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskPriority::Immediate => "immediate",
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
            TaskPriority::Background => "background",
        };
        f.write_str(name)
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(TaskPriority::Immediate),
            "high" => Ok(TaskPriority::High),
            "normal" => Ok(TaskPriority::Normal),
            "low" => Ok(TaskPriority::Low),
            "background" => Ok(TaskPriority::Background),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Valid lifecycle edges
    ///
    /// A queued task may also be cancelled, cleared or failed by a broken
    /// dependency without ever running.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, Pending)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Scheduler-side record of a calculation
///
/// The typed input and calculator live with the job; this record carries
/// everything the queue needs to order, gate and report on the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationTask {
    pub id: TaskId,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "timeout_ms", with = "adaptive_calc_cache::cache::config::duration_ms")]
    pub timeout: Duration,
    pub retry_count: u32,
    pub max_retries: u32,
    pub dependencies: HashSet<TaskId>,
    pub tags: Vec<String>,
    /// Wall time of the successful attempt
    pub actual_duration_ms: Option<f64>,
    /// Creation order, breaks ties within a priority tier
    pub(crate) sequence: u64,
}

impl CalculationTask {
    pub(crate) fn new(sequence: u64, options: &ResolvedOptions) -> Self {
        Self {
            id: TaskId::generate(sequence),
            priority: options.priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            timeout: options.timeout,
            retry_count: 0,
            max_retries: options.max_retries,
            dependencies: options.dependencies.iter().cloned().collect(),
            tags: options.tags.clone(),
            actual_duration_ms: None,
            sequence,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Attempt number of the next or current run (1-based)
    pub fn current_attempt(&self) -> u32 {
        self.retry_count + 1
    }

    fn transition(&mut self, next: TaskStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "invalid task transition {} -> {}",
            self.status,
            next
        );
        self.status = next;
    }

    pub(crate) fn start(&mut self) {
        self.transition(TaskStatus::Running);
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn complete(&mut self, duration: Duration) {
        self.transition(TaskStatus::Completed);
        self.completed_at = Some(Utc::now());
        self.actual_duration_ms = Some(duration.as_secs_f64() * 1000.0);
    }

    pub(crate) fn fail(&mut self) {
        self.transition(TaskStatus::Failed);
        self.completed_at = Some(Utc::now());
    }

    pub(crate) fn cancel(&mut self) {
        self.transition(TaskStatus::Cancelled);
        self.completed_at = Some(Utc::now());
    }

    /// Back to the queue after a retryable failure
    pub(crate) fn reset_for_retry(&mut self) {
        self.transition(TaskStatus::Pending);
        self.started_at = None;
    }
}

/// Per-task options; unset fields take the scheduler defaults
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    pub priority: Option<TaskPriority>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub dependencies: Vec<TaskId>,
    pub tags: Vec<String>,
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Run only after `task_id` has completed
    pub fn depends_on(mut self, task_id: &TaskId) -> Self {
        self.dependencies.push(task_id.clone());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Options after applying scheduler defaults
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub priority: TaskPriority,
    pub timeout: Duration,
    pub max_retries: u32,
    pub dependencies: Vec<TaskId>,
    pub tags: Vec<String>,
}

/// Caller side of a scheduled calculation
///
/// Awaiting the handle yields the calculator's output or the error that
/// settled the task. It settles exactly once.
#[derive(Debug)]
pub struct TaskHandle<O> {
    id: TaskId,
    receiver: oneshot::Receiver<Result<O>>,
}

impl<O> TaskHandle<O> {
    pub(crate) fn new(id: TaskId, receiver: oneshot::Receiver<Result<O>>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }
}

impl<O> Future for TaskHandle<O> {
    type Output = Result<O>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id.clone();
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped without settling: the scheduler went away
            Poll::Ready(Err(_)) => Poll::Ready(Err(RuntimeError::SchedulerStopped(id))),
            Poll::Pending => Poll::Pending,
        }
    }
}
