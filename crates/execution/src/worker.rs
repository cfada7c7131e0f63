//! Workers: capacity-bounded priority queues with retrying execution.
//!
//! A [`Worker`] owns its pending queue, capacity counter and histories. The
//! single-attempt step is delegated to an [`AttemptExecutor`], so local and
//! remote workers share admission, dependency checks and retries.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskpool_core::{RetryPolicy, SharedTask, TaskError, TaskId, WorkerId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dependency::{DependencyResolver, Resolution};
use crate::error::{AttemptError, WorkerError};
use crate::executor::{AttemptExecutor, LocalExecutor};
use crate::queue::PendingQueue;
use crate::stats::{NoopObserver, WorkerObserver, WorkerStats};

/// Capacity every worker starts with, in milliseconds of work.
pub const DEFAULT_CAPACITY_MS: u64 = 30_000;

/// Worker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Starting capacity in milliseconds
    pub capacity_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            capacity_ms: DEFAULT_CAPACITY_MS,
        }
    }
}

/// Why a task ended a batch in the failed history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Dependencies missing from this worker's completed history
    DependencyUnmet {
        /// Ids that were not completed yet
        missing: Vec<TaskId>,
    },
    /// The task depends on itself
    CircularDependency,
    /// Every attempt failed or timed out
    RetriesExhausted {
        /// Attempts consumed
        attempts: u32,
        /// Error from the final attempt, if any attempt ran
        last_error: Option<TaskError>,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependencyUnmet { missing } => {
                let ids: Vec<&str> = missing.iter().map(TaskId::as_str).collect();
                write!(f, "dependencies not met: {}", ids.join(", "))
            }
            Self::CircularDependency => write!(f, "task depends on itself"),
            Self::RetriesExhausted {
                attempts,
                last_error: Some(err),
            } => write!(f, "failed after {attempts} attempts: {err}"),
            Self::RetriesExhausted { attempts, .. } => {
                write!(f, "failed after {attempts} attempts")
            }
        }
    }
}

/// Entry of the failed history.
#[derive(Debug, Clone)]
pub struct FailedTask {
    /// The failed task
    pub task: SharedTask,
    /// What went wrong
    pub reason: FailureReason,
    /// When the failure was recorded
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug)]
struct WorkerState {
    capacity_ms: u64,
    pending: PendingQueue,
    completed: Vec<SharedTask>,
    completed_ids: HashSet<TaskId>,
    processed_load_ms: u64,
    failed: Vec<FailedTask>,
}

impl WorkerState {
    fn new(capacity_ms: u64) -> Self {
        Self {
            capacity_ms,
            pending: PendingQueue::default(),
            completed: Vec::new(),
            completed_ids: HashSet::new(),
            processed_load_ms: 0,
            failed: Vec::new(),
        }
    }
}

enum RunOutcome {
    Completed { attempts: u32 },
    Exhausted { attempts: u32, last_error: Option<TaskError> },
    Disconnected(String),
}

/// An execution unit with bounded capacity and a priority-ordered pending queue.
pub struct Worker {
    id: WorkerId,
    label: String,
    executor: Arc<dyn AttemptExecutor>,
    retry_policy: RetryPolicy,
    resolver: DependencyResolver,
    observer: Arc<dyn WorkerObserver>,
    state: Mutex<WorkerState>,
    // Serializes execute_tasks calls; admission stays open meanwhile.
    batch: Mutex<()>,
}

impl Worker {
    /// Create a worker that runs attempts through `executor`.
    pub fn new(executor: Arc<dyn AttemptExecutor>, retry_policy: RetryPolicy) -> Self {
        Self {
            id: WorkerId::new(),
            label: executor.describe(),
            executor,
            retry_policy,
            resolver: DependencyResolver::new(),
            observer: Arc::new(NoopObserver),
            state: Mutex::new(WorkerState::new(DEFAULT_CAPACITY_MS)),
            batch: Mutex::new(()),
        }
    }

    /// Create an in-process worker.
    pub fn local(retry_policy: RetryPolicy) -> Self {
        Self::new(Arc::new(LocalExecutor), retry_policy)
    }

    /// Apply a configuration. Only meaningful before any admission.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.state.get_mut().capacity_ms = config.capacity_ms;
        self
    }

    /// Attach an observer for stats snapshots.
    pub fn with_observer(mut self, observer: Arc<dyn WorkerObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override the label used in logs and stats.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Worker identity.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Worker label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Retry policy applied to every task.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Admit a task, reserving its duration against the remaining capacity.
    pub async fn add_task(&self, task: SharedTask) -> Result<(), WorkerError> {
        let stats = {
            let mut state = self.state.lock().await;
            let required_ms = task.duration_ms();
            let Some(remaining) = state.capacity_ms.checked_sub(required_ms) else {
                debug!(
                    worker = %self.id,
                    task = %task.id(),
                    required_ms,
                    remaining_ms = state.capacity_ms,
                    "Admission rejected"
                );
                return Err(WorkerError::CapacityExceeded {
                    task: task.id().clone(),
                    required_ms,
                    remaining_ms: state.capacity_ms,
                });
            };

            state.capacity_ms = remaining;
            info!(
                worker = %self.id,
                task = %task.id(),
                priority = %task.priority(),
                remaining_ms = remaining,
                "Task admitted"
            );
            state.pending.push(task);
            self.stats_of(&state)
        };

        self.observer.observe(&stats);
        Ok(())
    }

    /// Drain a snapshot of the pending queue in priority order.
    ///
    /// Returns the tasks completed by this call. Failed tasks are recorded and
    /// stay pending. A communication failure aborts the call, leaving the
    /// in-flight task and everything after it pending.
    pub async fn execute_tasks(&self) -> Result<Vec<SharedTask>, WorkerError> {
        let _batch = self.batch.lock().await;
        let snapshot = self.state.lock().await.pending.snapshot();
        debug!(worker = %self.id, tasks = snapshot.len(), "Executing batch");

        let mut completed_now = Vec::new();
        let mut outcome = Ok(());

        for (key, task) in snapshot {
            let resolution = {
                let state = self.state.lock().await;
                self.resolver.check(task.as_ref(), &state.completed_ids)
            };

            match resolution {
                Resolution::Ready => {}
                Resolution::Blocked(missing) => {
                    warn!(worker = %self.id, task = %task.id(), ?missing, "Dependencies not met");
                    self.record_failure(task, FailureReason::DependencyUnmet { missing })
                        .await;
                    continue;
                }
                Resolution::Circular(cycle) => {
                    warn!(worker = %self.id, task = %task.id(), ?cycle, "Circular dependency");
                    self.record_failure(task, FailureReason::CircularDependency)
                        .await;
                    continue;
                }
            }

            match self.run_with_retries(&task).await {
                RunOutcome::Completed { attempts } => {
                    let mut state = self.state.lock().await;
                    if state.pending.remove(key).is_some() {
                        let duration = task.duration_ms();
                        state.capacity_ms = state.capacity_ms.saturating_add(duration);
                        state.processed_load_ms = state.processed_load_ms.saturating_add(duration);
                    }
                    state.completed_ids.insert(task.id().clone());
                    state.completed.push(SharedTask::clone(&task));
                    info!(worker = %self.id, task = %task.id(), attempts, "Task completed");
                    completed_now.push(task);
                }
                RunOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(worker = %self.id, task = %task.id(), attempts, "Retries exhausted");
                    self.record_failure(
                        task,
                        FailureReason::RetriesExhausted {
                            attempts,
                            last_error,
                        },
                    )
                    .await;
                }
                RunOutcome::Disconnected(reason) => {
                    warn!(worker = %self.id, task = %task.id(), %reason, "Aborting batch");
                    outcome = Err(WorkerError::Communication {
                        task: task.id().clone(),
                        reason,
                    });
                    break;
                }
            }
        }

        let stats = self.stats().await;
        self.observer.observe(&stats);
        outcome.map(|()| completed_now)
    }

    async fn run_with_retries(&self, task: &SharedTask) -> RunOutcome {
        let max_attempts = self.retry_policy.max_retries;
        let mut last_error = None;
        let mut attempt = 0;

        while attempt < max_attempts {
            attempt += 1;
            match self.executor.attempt(task).await {
                Ok(()) if task.is_completed() => return RunOutcome::Completed { attempts: attempt },
                Ok(()) => {
                    last_error = Some(TaskError::ExecutionFailed {
                        id: task.id().clone(),
                        reason: "attempt returned without completing the task".to_string(),
                    });
                }
                Err(AttemptError::Task(err)) => {
                    debug!(task = %task.id(), attempt, error = %err, "Attempt failed");
                    last_error = Some(err);
                }
                Err(AttemptError::Communication(reason)) => {
                    return RunOutcome::Disconnected(reason);
                }
            }

            if attempt < max_attempts {
                if let Some(delay) = self.retry_policy.delay(attempt) {
                    debug!(task = %task.id(), attempt, ?delay, "Backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        RunOutcome::Exhausted {
            attempts: attempt,
            last_error,
        }
    }

    async fn record_failure(&self, task: SharedTask, reason: FailureReason) {
        let mut state = self.state.lock().await;
        state.failed.push(FailedTask {
            task,
            reason,
            failed_at: Utc::now(),
        });
    }

    /// Sum of durations of pending tasks.
    pub async fn total_load(&self) -> u64 {
        self.state.lock().await.pending.total_load()
    }

    /// Capacity left for admissions.
    pub async fn remaining_capacity(&self) -> u64 {
        self.state.lock().await.capacity_ms
    }

    /// Pending tasks in execution order.
    pub async fn pending_tasks(&self) -> Vec<SharedTask> {
        self.state.lock().await.pending.tasks()
    }

    /// Every task completed so far, oldest first.
    pub async fn completed_tasks(&self) -> Vec<SharedTask> {
        self.state.lock().await.completed.clone()
    }

    /// Every failure recorded so far, oldest first.
    pub async fn failed_tasks(&self) -> Vec<SharedTask> {
        let state = self.state.lock().await;
        state.failed.iter().map(|f| SharedTask::clone(&f.task)).collect()
    }

    /// Failed history with reasons and timestamps.
    pub async fn failure_log(&self) -> Vec<FailedTask> {
        self.state.lock().await.failed.clone()
    }

    /// Current counters.
    pub async fn stats(&self) -> WorkerStats {
        let state = self.state.lock().await;
        self.stats_of(&state)
    }

    fn stats_of(&self, state: &WorkerState) -> WorkerStats {
        WorkerStats {
            worker: self.id,
            label: self.label.clone(),
            pending_count: state.pending.len(),
            completed_count: state.completed.len(),
            failed_count: state.failed.len(),
            total_load_ms: state.pending.total_load(),
            processed_load_ms: state.processed_load_ms,
            remaining_capacity_ms: state.capacity_ms,
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DisconnectingExecutor, ScriptedTask, SilentExecutor};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use taskpool_core::{DependentTask, Priority, PriorityTask, SimpleTask, Task};

    fn ids(tasks: &[SharedTask]) -> Vec<String> {
        tasks.iter().map(|t| t.id().to_string()).collect()
    }

    fn fast_retries() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10), false)
    }

    #[tokio::test]
    async fn test_admission_respects_capacity() {
        let worker =
            Worker::local(RetryPolicy::default()).with_config(WorkerConfig { capacity_ms: 5000 });

        worker.add_task(Arc::new(SimpleTask::new(5000))).await.unwrap();
        assert_eq!(worker.remaining_capacity().await, 0);

        let err = worker.add_task(Arc::new(SimpleTask::new(1))).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::CapacityExceeded {
                required_ms: 1,
                remaining_ms: 0,
                ..
            }
        ));
        assert_eq!(worker.remaining_capacity().await, 0);
        assert_eq!(worker.pending_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dependency_chain_reserves_capacity() {
        let worker = Worker::local(RetryPolicy::default());
        let a = DependentTask::new(3000, Priority::High).with_timeout(5000);
        let b = DependentTask::new(3000, Priority::Medium)
            .with_timeout(5000)
            .with_dependency(a.id().clone());
        let c = DependentTask::new(2000, Priority::Low)
            .with_timeout(5000)
            .with_dependency(b.id().clone());

        for task in [a, b, c] {
            worker.add_task(Arc::new(task)).await.unwrap();
        }

        assert_eq!(worker.remaining_capacity().await, 22_000);
        assert_eq!(worker.total_load().await, 8000);
    }

    #[tokio::test]
    async fn test_executes_in_priority_order() {
        let worker = Worker::local(RetryPolicy::default());
        let low = Arc::new(PriorityTask::new(10, Priority::Low));
        let high = Arc::new(PriorityTask::new(10, Priority::High));
        let medium = Arc::new(PriorityTask::new(10, Priority::Medium));
        for task in [&low, &high, &medium] {
            worker.add_task(task.clone()).await.unwrap();
        }

        let done = worker.execute_tasks().await.unwrap();
        assert_eq!(
            ids(&done),
            vec![high.id().to_string(), medium.id().to_string(), low.id().to_string()]
        );
        assert_eq!(worker.remaining_capacity().await, DEFAULT_CAPACITY_MS);
    }

    #[tokio::test]
    async fn test_completed_tasks_leave_the_queue() {
        let worker = Worker::local(RetryPolicy::default());
        worker.add_task(Arc::new(SimpleTask::new(100))).await.unwrap();

        let first = worker.execute_tasks().await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(worker.pending_tasks().await.is_empty());

        let second = worker.execute_tasks().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(worker.completed_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unmet_dependency_fails_without_executing() {
        let worker = Worker::local(fast_retries());
        let task = ScriptedTask::new("child", 100, Priority::Low)
            .after("parent")
            .shared();
        worker.add_task(task.clone()).await.unwrap();

        let done = worker.execute_tasks().await.unwrap();

        assert!(done.is_empty());
        assert_eq!(task.calls(), 0);
        let log = worker.failure_log().await;
        assert_eq!(log.len(), 1);
        assert_eq!(
            log[0].reason,
            FailureReason::DependencyUnmet {
                missing: vec![TaskId::from("parent")]
            }
        );
    }

    #[tokio::test]
    async fn test_chain_completes_within_one_batch() {
        let worker = Worker::local(fast_retries());
        let a = ScriptedTask::new("a", 3000, Priority::High).shared();
        let b = ScriptedTask::new("b", 3000, Priority::Medium).after("a").shared();
        let c = ScriptedTask::new("c", 2000, Priority::Low).after("b").shared();
        // Admitted out of order; priority decides execution order.
        for task in [&c, &b, &a] {
            worker.add_task(task.clone()).await.unwrap();
        }

        let done = worker.execute_tasks().await.unwrap();

        assert_eq!(ids(&done), vec!["a", "b", "c"]);
        assert!(worker.failed_tasks().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_back_off_exponentially() {
        let worker = Worker::local(RetryPolicy::default());
        let task = ScriptedTask::new("flaky", 100, Priority::Low).failing(2).shared();
        worker.add_task(task.clone()).await.unwrap();

        let start = tokio::time::Instant::now();
        let done = worker.execute_tasks().await.unwrap();

        assert_eq!(ids(&done), vec!["flaky"]);
        assert_eq!(task.calls(), 3);
        // 2000ms after the first failure, 4000ms after the second.
        assert_eq!(start.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_task_keeps_its_reservation() {
        let worker = Worker::local(RetryPolicy::default());
        let task = ScriptedTask::new("doomed", 4000, Priority::Low).failing(10).shared();
        worker.add_task(task.clone()).await.unwrap();

        let start = tokio::time::Instant::now();
        let done = worker.execute_tasks().await.unwrap();

        assert!(done.is_empty());
        assert_eq!(task.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(6000));
        assert_eq!(worker.remaining_capacity().await, DEFAULT_CAPACITY_MS - 4000);
        assert_eq!(worker.pending_tasks().await.len(), 1);

        let log = worker.failure_log().await;
        assert!(matches!(
            log[0].reason,
            FailureReason::RetriesExhausted {
                attempts: 3,
                last_error: Some(TaskError::ExecutionFailed { .. })
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_consumes_one_attempt() {
        let worker = Worker::local(RetryPolicy::new(1, Duration::from_millis(2000), true));
        let task = DependentTask::new(7000, Priority::Low).with_timeout(5000);
        worker.add_task(Arc::new(task)).await.unwrap();

        let done = worker.execute_tasks().await.unwrap();

        assert!(done.is_empty());
        let log = worker.failure_log().await;
        assert!(matches!(
            log[0].reason,
            FailureReason::RetriesExhausted {
                attempts: 1,
                last_error: Some(TaskError::TimedOut { timeout_ms: 5000, .. })
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_retries_never_executes() {
        let worker = Worker::local(RetryPolicy::new(0, Duration::ZERO, false));
        let task = ScriptedTask::new("never", 10, Priority::Low).shared();
        worker.add_task(task.clone()).await.unwrap();

        assert!(worker.execute_tasks().await.unwrap().is_empty());
        assert_eq!(task.calls(), 0);
        assert!(matches!(
            worker.failure_log().await[0].reason,
            FailureReason::RetriesExhausted {
                attempts: 0,
                last_error: None
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_stays_open_during_a_batch() {
        let worker = Arc::new(Worker::local(RetryPolicy::default()));
        let flaky = ScriptedTask::new("flaky", 100, Priority::Low).failing(2).shared();
        worker.add_task(flaky.clone()).await.unwrap();

        let running = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.execute_tasks().await })
        };
        // Let the batch fail once and enter its first backoff.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(flaky.calls(), 1);

        let late = ScriptedTask::new("late", 200, Priority::High).shared();
        let admitted =
            tokio::time::timeout(Duration::from_millis(10), worker.add_task(late.clone())).await;
        assert!(matches!(admitted, Ok(Ok(()))));

        let done = running.await.unwrap().unwrap();

        assert_eq!(ids(&done), vec!["flaky"]);
        assert_eq!(late.calls(), 0);
        assert_eq!(ids(&worker.pending_tasks().await), vec!["late"]);
    }

    #[tokio::test]
    async fn test_self_dependent_task_is_circular() {
        let worker = Worker::local(fast_retries());
        let task = ScriptedTask::new("loop", 100, Priority::Low).after("loop").shared();
        worker.add_task(task.clone()).await.unwrap();

        assert!(worker.execute_tasks().await.unwrap().is_empty());
        assert_eq!(task.calls(), 0);
        let log = worker.failure_log().await;
        assert_eq!(log[0].reason, FailureReason::CircularDependency);
        assert_eq!(log[0].reason.to_string(), "task depends on itself");
        assert_eq!(worker.remaining_capacity().await, DEFAULT_CAPACITY_MS - 100);
    }

    #[tokio::test]
    async fn test_success_without_completion_counts_as_failure() {
        let worker = Worker::new(Arc::new(SilentExecutor), fast_retries());
        worker.add_task(Arc::new(SimpleTask::new(10))).await.unwrap();

        assert!(worker.execute_tasks().await.unwrap().is_empty());
        assert_eq!(worker.failed_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_communication_failure_aborts_the_batch() {
        let executor = DisconnectingExecutor {
            broken: TaskId::from("b"),
        };
        let worker = Worker::new(Arc::new(executor), fast_retries());
        let a = ScriptedTask::new("a", 1000, Priority::High).shared();
        let b = ScriptedTask::new("b", 1000, Priority::Medium).shared();
        let c = ScriptedTask::new("c", 1000, Priority::Low).shared();
        for task in [&a, &b, &c] {
            worker.add_task(task.clone()).await.unwrap();
        }

        let err = worker.execute_tasks().await.unwrap_err();

        assert!(matches!(err, WorkerError::Communication { ref task, .. } if task.as_str() == "b"));
        assert_eq!(ids(&worker.completed_tasks().await), vec!["a"]);
        assert_eq!(ids(&worker.pending_tasks().await), vec!["b", "c"]);
        assert_eq!(c.calls(), 0);
        assert_eq!(worker.remaining_capacity().await, DEFAULT_CAPACITY_MS - 2000);
    }

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<WorkerStats>>);

    impl WorkerObserver for Recorder {
        fn observe(&self, stats: &WorkerStats) {
            self.0.lock().unwrap().push(stats.clone());
        }
    }

    #[tokio::test]
    async fn test_observer_sees_admissions_and_batches() {
        let recorder = Arc::new(Recorder::default());
        let worker = Worker::local(RetryPolicy::default()).with_observer(recorder.clone());

        worker.add_task(Arc::new(SimpleTask::new(500))).await.unwrap();
        worker.execute_tasks().await.unwrap();

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].pending_count, 1);
        assert_eq!(seen[0].total_load_ms, 500);
        assert_eq!(seen[1].completed_count, 1);
        assert_eq!(seen[1].processed_load_ms, 500);
    }
}
