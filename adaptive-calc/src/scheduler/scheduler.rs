//! Priority scheduler for asynchronous calculations

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::SchedulerConfig;
use super::queue::TaskQueue;
use super::task::{CalculationTask, ResolvedOptions, ScheduleOptions, TaskHandle, TaskId};
use crate::error::{Result, RuntimeError};

/// Upper bound on the spacing of settled-id pruning passes
const PRUNE_INTERVAL: Duration = Duration::from_secs(1);

/// Type-erased unit of work held by the scheduler
///
/// Each attempt runs the calculator once; the output of a successful
/// attempt is kept until the scheduler settles the caller's handle.
trait Job: Send + Sync {
    fn attempt(self: Arc<Self>) -> BoxFuture<'static, Result<()>>;
    fn resolve(&self);
    fn reject(&self, error: RuntimeError);
}

struct CalculatorJob<F, I, O> {
    calculator: F,
    input: I,
    output: Mutex<Option<O>>,
    sender: Mutex<Option<oneshot::Sender<Result<O>>>>,
}

impl<F, Fut, E, I, O> Job for CalculatorJob<F, I, O>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
    E: Into<RuntimeError> + Send + 'static,
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    fn attempt(self: Arc<Self>) -> BoxFuture<'static, Result<()>> {
        let pending = (self.calculator)(self.input.clone());
        async move {
            let output = pending.await.map_err(Into::into)?;
            *self.output.lock() = Some(output);
            Ok(())
        }
        .boxed()
    }

    fn resolve(&self) {
        let sender = self.sender.lock().take();
        let output = self.output.lock().take();
        if let (Some(sender), Some(output)) = (sender, output) {
            let _ = sender.send(Ok(output));
        }
    }

    fn reject(&self, error: RuntimeError) {
        if let Some(sender) = self.sender.lock().take() {
            let _ = sender.send(Err(error));
        }
    }
}

struct TaskSlot {
    task: CalculationTask,
    job: Arc<dyn Job>,
}

struct CompletionRecord {
    at: Instant,
    duration_ms: f64,
}

#[derive(Default)]
struct SchedulerState {
    /// Queued and running tasks; settled tasks are dropped
    slots: HashMap<TaskId, TaskSlot>,
    queue: TaskQueue,
    running: HashSet<TaskId>,
    /// Completed tasks and when they settled, for dependency gating
    completed_ids: HashMap<TaskId, Instant>,
    /// Tasks that failed or were cancelled; their dependents cannot run
    abandoned_ids: HashMap<TaskId, Instant>,
    last_pruned: Option<Instant>,
    history: VecDeque<CompletionRecord>,
    next_sequence: u64,
    completed_total: u64,
    failed_total: u64,
    cancelled_total: u64,
    stopped: bool,
}

impl SchedulerState {
    /// First queued task whose dependencies have all completed
    fn next_admissible(&self) -> Option<TaskId> {
        self.queue
            .iter()
            .find(|id| {
                self.slots
                    .get(*id)
                    .map(|slot| {
                        slot.task
                            .dependencies
                            .iter()
                            .all(|dep| self.completed_ids.contains_key(dep))
                    })
                    .unwrap_or(false)
            })
            .cloned()
    }

    fn launch(&mut self, id: &TaskId) -> Option<(TaskId, Arc<dyn Job>, Duration)> {
        self.queue.remove(id);
        let slot = self.slots.get_mut(id)?;
        slot.task.start();
        self.running.insert(id.clone());

        debug!(
            "Task {} started (priority: {}, attempt: {})",
            id,
            slot.task.priority,
            slot.task.current_attempt()
        );

        Some((id.clone(), Arc::clone(&slot.job), slot.task.timeout))
    }

    /// Fail queued tasks that wait on an abandoned task, transitively
    fn reject_broken_dependencies(&mut self) {
        loop {
            let broken: Vec<(TaskId, TaskId)> = self
                .queue
                .iter()
                .filter_map(|id| {
                    let slot = self.slots.get(id)?;
                    slot.task
                        .dependencies
                        .iter()
                        .find(|dep| self.abandoned_ids.contains_key(*dep))
                        .map(|dep| (id.clone(), dep.clone()))
                })
                .collect();

            if broken.is_empty() {
                return;
            }

            for (id, dependency) in broken {
                self.queue.remove(&id);
                if let Some(mut slot) = self.slots.remove(&id) {
                    warn!("Task {} failed: dependency {} did not complete", id, dependency);
                    slot.task.fail();
                    self.failed_total += 1;
                    self.abandoned_ids.insert(id.clone(), Instant::now());
                    slot.job.reject(RuntimeError::DependencyFailed {
                        task_id: id,
                        dependency,
                    });
                }
            }
        }
    }

    fn record_completion(&mut self, duration: Duration, limit: usize) {
        self.history.push_back(CompletionRecord {
            at: Instant::now(),
            duration_ms: duration.as_secs_f64() * 1000.0,
        });
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    /// Forget settled ids older than `retention` that no pending task names
    ///
    /// Runs at most once per `retention` (capped at one second).
    fn prune_settled(&mut self, retention: Duration) {
        let now = Instant::now();
        let due = retention.min(PRUNE_INTERVAL);
        if let Some(last) = self.last_pruned {
            if now.duration_since(last) < due {
                return;
            }
        }
        self.last_pruned = Some(now);

        let referenced: HashSet<TaskId> = self
            .slots
            .values()
            .flat_map(|slot| slot.task.dependencies.iter().cloned())
            .collect();
        let keep = |id: &TaskId, settled: &Instant| {
            now.duration_since(*settled) < retention || referenced.contains(id)
        };

        let before = self.completed_ids.len() + self.abandoned_ids.len();
        self.completed_ids.retain(|id, settled| keep(id, settled));
        self.abandoned_ids.retain(|id, settled| keep(id, settled));
        let pruned = before - self.completed_ids.len() - self.abandoned_ids.len();

        if pruned > 0 {
            debug!("Pruned {} settled task ids", pruned);
        }
    }

    /// Drop a task as cancelled, whether queued or running
    fn cancel(&mut self, id: &TaskId, error: RuntimeError) -> bool {
        let Some(mut slot) = self.slots.remove(id) else {
            return false;
        };

        self.queue.remove(id);
        self.running.remove(id);
        slot.task.cancel();
        self.cancelled_total += 1;
        self.abandoned_ids.insert(id.clone(), Instant::now());
        slot.job.reject(error);
        true
    }
}

struct Shared {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    wake: Notify,
}

impl Shared {
    /// Start admissible tasks until the concurrency bound is reached
    fn dispatch(self: &Arc<Self>) {
        let launched = {
            let mut state = self.state.lock();
            state.reject_broken_dependencies();
            state.prune_settled(self.config.settled_retention);

            let mut launched = Vec::new();
            while state.running.len() < self.config.max_concurrent_tasks {
                let Some(id) = state.next_admissible() else {
                    break;
                };
                if let Some(launch) = state.launch(&id) {
                    launched.push(launch);
                }
            }
            launched
        };

        for (id, job, timeout) in launched {
            let shared = Arc::clone(self);
            tokio::spawn(shared.run(id, job, timeout));
        }
    }

    async fn run(self: Arc<Self>, id: TaskId, job: Arc<dyn Job>, timeout: Duration) {
        let started = Instant::now();

        let outcome = tokio::select! {
            result = job.attempt() => result,
            _ = tokio::time::sleep(timeout) => {
                warn!("Task {} timed out after {:?}", id, timeout);
                Err(RuntimeError::Timeout {
                    task_id: id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        self.finish(&id, outcome, started.elapsed());
        self.wake.notify_one();
    }

    fn finish(&self, id: &TaskId, outcome: Result<()>, elapsed: Duration) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        // Cancelled or destroyed while running: the result is discarded
        let Some(mut slot) = state.slots.remove(id) else {
            debug!("Discarding result of settled task {}", id);
            return;
        };
        state.running.remove(id);

        match outcome {
            Ok(()) => {
                slot.task.complete(elapsed);
                state.completed_ids.insert(id.clone(), Instant::now());
                state.completed_total += 1;
                state.record_completion(elapsed, self.config.history_limit);
                debug!("Task {} completed in {:?}", id, elapsed);
                slot.job.resolve();
            }
            Err(error) if error.is_retryable() && slot.task.retry_count < slot.task.max_retries => {
                slot.task.retry_count += 1;
                warn!(
                    "Task {} attempt {} failed, retrying: {}",
                    id, slot.task.retry_count, error
                );
                slot.task.reset_for_retry();
                state.queue.push(&slot.task);
                state.slots.insert(id.clone(), slot);
            }
            Err(error) => {
                let error = if error.is_retryable() {
                    slot.task.retry_count += 1;
                    RuntimeError::RetriesExhausted {
                        task_id: id.clone(),
                        attempts: slot.task.retry_count,
                        source: Box::new(error),
                    }
                } else {
                    error
                };

                warn!("Task {} failed: {}", id, error);
                slot.task.fail();
                state.failed_total += 1;
                state.abandoned_ids.insert(id.clone(), Instant::now());
                slot.job.reject(error);
            }
        }
    }
}

/// Snapshot of queued and running tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Pending tasks in dispatch order
    pub queued: Vec<CalculationTask>,
    pub running: Vec<CalculationTask>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerStats {
    pub queue_length: usize,
    pub running_tasks: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub cancelled_tasks: u64,
    /// Completions per second over the throughput window
    pub throughput: f64,
    /// `completed / (completed + failed)` as a percentage
    pub success_rate: f64,
    /// Mean duration over the completion history
    pub average_duration_ms: f64,
}

/// Priority scheduler with bounded concurrency
///
/// Tasks are queued by [`schedule`](Self::schedule) at any time but only
/// dispatched once [`start`](Self::start) has spawned the tick loop.
pub struct CalculationScheduler {
    shared: Arc<Shared>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl CalculationScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        info!(
            "Initializing calculation scheduler (max_concurrent_tasks: {}, tick: {:?})",
            config.max_concurrent_tasks, config.tick_interval
        );

        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(SchedulerState::default()),
                wake: Notify::new(),
            }),
            ticker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Queue `calculator(input)` and return a handle to its result
    ///
    /// The calculator may be invoked more than once when attempts time out
    /// or fail with a retryable error, so it should be free of side effects.
    pub fn schedule<F, Fut, E, I, O>(
        &self,
        calculator: F,
        input: I,
        options: ScheduleOptions,
    ) -> TaskHandle<O>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        E: Into<RuntimeError> + Send + 'static,
        I: Clone + Send + Sync + 'static,
        O: Send + 'static,
    {
        let config = &self.shared.config;
        let resolved = ResolvedOptions {
            priority: options.priority.unwrap_or_default(),
            timeout: options.timeout.unwrap_or(config.default_timeout),
            max_retries: options.max_retries.unwrap_or(config.default_max_retries),
            dependencies: options.dependencies,
            tags: options.tags,
        };

        let (sender, receiver) = oneshot::channel();
        let job = Arc::new(CalculatorJob {
            calculator,
            input,
            output: Mutex::new(None),
            sender: Mutex::new(Some(sender)),
        });

        let mut state = self.shared.state.lock();
        state.next_sequence += 1;
        let task = CalculationTask::new(state.next_sequence, &resolved);
        let id = task.id.clone();

        if state.stopped {
            job.reject(RuntimeError::SchedulerStopped(id.clone()));
            return TaskHandle::new(id, receiver);
        }

        debug!(
            "Scheduled task {} (priority: {}, dependencies: {})",
            id,
            task.priority,
            task.dependencies.len()
        );

        state.queue.push(&task);
        state.slots.insert(id.clone(), TaskSlot { task, job });
        drop(state);

        self.shared.wake.notify_one();
        TaskHandle::new(id, receiver)
    }

    /// Cancel a queued or running task
    ///
    /// The caller's handle rejects with `Cancelled` at once. A running
    /// calculation is left to finish and its result is discarded.
    pub fn cancel(&self, id: &TaskId) -> bool {
        let cancelled = self
            .shared
            .state
            .lock()
            .cancel(id, RuntimeError::Cancelled(id.clone()));

        if cancelled {
            debug!("Task {} cancelled", id);
            self.shared.wake.notify_one();
        }
        cancelled
    }

    /// Cancel every queued task; running tasks are unaffected
    pub fn clear(&self) -> usize {
        let mut state = self.shared.state.lock();
        let queued = state.queue.drain();
        let count = queued.len();

        for id in queued {
            state.cancel(&id, RuntimeError::QueueCleared(id.clone()));
        }
        drop(state);

        info!("Cleared {} queued tasks", count);
        count
    }

    pub fn get_queue_status(&self) -> QueueStatus {
        let state = self.shared.state.lock();

        let queued = state
            .queue
            .iter()
            .filter_map(|id| state.slots.get(id))
            .map(|slot| slot.task.clone())
            .collect();

        let mut running: Vec<CalculationTask> = state
            .running
            .iter()
            .filter_map(|id| state.slots.get(id))
            .map(|slot| slot.task.clone())
            .collect();
        running.sort_by_key(|task| (std::cmp::Reverse(task.priority.weight()), task.sequence));

        QueueStatus { queued, running }
    }

    pub fn get_stats(&self) -> SchedulerStats {
        let state = self.shared.state.lock();
        let now = Instant::now();
        let window = self.shared.config.throughput_window;

        let recent = state
            .history
            .iter()
            .filter(|record| now.duration_since(record.at) <= window)
            .count();

        let settled = state.completed_total + state.failed_total;
        let success_rate = if settled == 0 {
            0.0
        } else {
            state.completed_total as f64 / settled as f64 * 100.0
        };

        let average_duration_ms = if state.history.is_empty() {
            0.0
        } else {
            state.history.iter().map(|r| r.duration_ms).sum::<f64>() / state.history.len() as f64
        };

        SchedulerStats {
            queue_length: state.queue.len(),
            running_tasks: state.running.len(),
            completed_tasks: state.completed_total,
            failed_tasks: state.failed_total,
            cancelled_tasks: state.cancelled_total,
            throughput: recent as f64 / window.as_secs_f64(),
            success_rate,
            average_duration_ms,
        }
    }

    /// Spawn the dispatch loop on the current tokio runtime
    ///
    /// Fails with `Config` and spawns nothing when the configuration is
    /// invalid. Calling it on a running scheduler is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return Ok(());
        }
        self.shared.config.validate()?;
        self.shared.state.lock().stopped = false;

        let shared = Arc::clone(&self.shared);
        let period = shared.config.tick_interval;

        info!("Starting calculation scheduler (tick: {:?})", period);

        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shared.wake.notified() => {}
                }
                shared.dispatch();
            }
        }));
        Ok(())
    }

    /// Stop dispatching and reject every queued or running task
    pub fn destroy(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }

        let mut state = self.shared.state.lock();
        state.stopped = true;
        state.queue.drain();
        state.running.clear();

        let count = state.slots.len();
        for (id, mut slot) in state.slots.drain() {
            slot.task.cancel();
            slot.job.reject(RuntimeError::SchedulerStopped(id));
        }

        info!("Calculation scheduler destroyed ({} tasks rejected)", count);
    }

    /// Whether the dispatch loop is running
    pub fn is_running(&self) -> bool {
        self.ticker.lock().is_some()
    }
}

impl Drop for CalculationScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::task::TaskPriority;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scheduler(max_concurrent: usize) -> CalculationScheduler {
        CalculationScheduler::new(
            SchedulerConfig::builder()
                .max_concurrent_tasks(max_concurrent)
                .tick_interval(Duration::from_millis(5))
                .build(),
        )
    }

    async fn double(x: u32) -> Result<u32> {
        Ok(x * 2)
    }

    #[tokio::test]
    async fn test_schedule_and_resolve() {
        let scheduler = scheduler(2);
        scheduler.start().unwrap();

        let handle = scheduler.schedule(double, 21, ScheduleOptions::new());
        assert!(handle.id().as_str().starts_with("calc-"));
        assert_eq!(handle.await.unwrap(), 42);

        let stats = scheduler.get_stats();
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.success_rate, 100.0);
        assert!(stats.throughput > 0.0);

        scheduler.destroy();
    }

    #[tokio::test]
    async fn test_tasks_wait_for_start() {
        let scheduler = scheduler(1);
        let _handle = scheduler.schedule(double, 1, ScheduleOptions::new());
        tokio::time::sleep(Duration::from_millis(30)).await;

        let status = scheduler.get_queue_status();
        assert_eq!(status.queued.len(), 1);
        assert!(status.running.is_empty());
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_queue_status_in_dispatch_order() {
        let scheduler = scheduler(1);
        let low = scheduler.schedule(double, 1, ScheduleOptions::new().priority(TaskPriority::Low));
        let high = scheduler.schedule(double, 2, ScheduleOptions::new().priority(TaskPriority::High));

        let status = scheduler.get_queue_status();
        let ids: Vec<_> = status.queued.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![high.id().clone(), low.id().clone()]);
    }

    #[tokio::test]
    async fn test_validation_error_is_not_retried() {
        let scheduler = scheduler(1);
        scheduler.start().unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let handle = scheduler.schedule(
            move |_: ()| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(RuntimeError::validation("years", "must be at least 1")) }
            },
            (),
            ScheduleOptions::new().max_retries(3),
        );

        let error = handle.await.unwrap_err();
        assert!(matches!(error, RuntimeError::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.get_stats().failed_tasks, 1);

        scheduler.destroy();
    }

    #[tokio::test]
    async fn test_destroy_rejects_pending() {
        let scheduler = scheduler(1);
        let handle = scheduler.schedule(double, 1, ScheduleOptions::new());
        scheduler.destroy();

        assert!(matches!(handle.await, Err(RuntimeError::SchedulerStopped(_))));

        let late = scheduler.schedule(double, 2, ScheduleOptions::new());
        assert!(matches!(late.await, Err(RuntimeError::SchedulerStopped(_))));
    }

    fn settled_ids(scheduler: &CalculationScheduler) -> (usize, usize) {
        let state = scheduler.shared.state.lock();
        (state.completed_ids.len(), state.abandoned_ids.len())
    }

    #[tokio::test]
    async fn test_settled_ids_are_pruned() {
        let scheduler = CalculationScheduler::new(
            SchedulerConfig::builder()
                .tick_interval(Duration::from_millis(5))
                .settled_retention(Duration::from_millis(50))
                .build(),
        );
        scheduler.start().unwrap();

        scheduler.schedule(double, 1, ScheduleOptions::new()).await.unwrap();
        let cancelled = scheduler.schedule(double, 2, ScheduleOptions::new());
        assert!(scheduler.cancel(cancelled.id()));
        assert_eq!(settled_ids(&scheduler), (1, 1));

        let handles: Vec<_> = (0..19)
            .map(|i| scheduler.schedule(double, i, ScheduleOptions::new()))
            .collect();
        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(settled_ids(&scheduler), (0, 0));
        assert_eq!(scheduler.get_stats().completed_tasks, 20);

        scheduler.destroy();
    }

    #[tokio::test]
    async fn test_pruning_keeps_ids_named_by_queued_tasks() {
        let scheduler = CalculationScheduler::new(
            SchedulerConfig::builder()
                .max_concurrent_tasks(2)
                .tick_interval(Duration::from_millis(5))
                .settled_retention(Duration::from_millis(20))
                .build(),
        );
        scheduler.start().unwrap();

        let first = scheduler.schedule(double, 1, ScheduleOptions::new());
        let first_id = first.id().clone();
        first.await.unwrap();

        let slow = scheduler.schedule(
            |x: u32| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, RuntimeError>(x)
            },
            5,
            ScheduleOptions::new(),
        );
        let dependent = scheduler.schedule(
            double,
            3,
            ScheduleOptions::new().depends_on(&first_id).depends_on(slow.id()),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.shared.state.lock().completed_ids.contains_key(&first_id));

        assert_eq!(slow.await.unwrap(), 5);
        assert_eq!(dependent.await.unwrap(), 6);
        scheduler.destroy();
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let scheduler = scheduler(1);
        assert!(!scheduler.cancel(&TaskId::from("calc-missing")));
    }
}
