//! Time-bounded dependent task.
//!
//! Each attempt spawns the unit of work on its own tokio task and races it
//! against the task's deadline. The unit of work idles for the declared
//! duration and then fails with a configurable probability.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::id::TaskId;
use crate::record::TaskRecord;
use crate::task::{Priority, Task, TaskBase, TaskError};

/// Chance that a unit of work fails on its own.
pub const DEFAULT_FAILURE_RATE: f64 = 0.5;

/// Task with dependencies, a deadline and simulated flakiness.
#[derive(Debug, Clone)]
pub struct DependentTask {
    base: TaskBase,
    priority: Priority,
    timeout_ms: u64,
    dependencies: HashSet<TaskId>,
    failure_rate: f64,
}

impl DependentTask {
    /// Create a task with no dependencies and no deadline.
    pub fn new(duration_ms: u64, priority: Priority) -> Self {
        Self {
            base: TaskBase::new(duration_ms),
            priority,
            timeout_ms: 0,
            dependencies: HashSet::new(),
            failure_rate: DEFAULT_FAILURE_RATE,
        }
    }

    /// Rebuild an executable task from a wire record, keeping its id.
    pub fn from_record(record: TaskRecord) -> Self {
        Self {
            base: TaskBase::restore(record.id, record.duration_ms, record.completed),
            priority: record.priority,
            timeout_ms: record.timeout_ms,
            dependencies: record.dependency_ids.into_iter().collect(),
            failure_rate: DEFAULT_FAILURE_RATE,
        }
    }

    /// Set the per-attempt deadline in milliseconds.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, id: TaskId) -> Self {
        self.dependencies.insert(id);
        self
    }

    /// Set the probability of a spontaneous failure, clamped to `[0, 1]`.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self
    }

    /// Add a dependency to a task that has not been shared yet.
    pub fn add_dependency(&mut self, id: TaskId) {
        self.dependencies.insert(id);
    }

    /// Probability of a spontaneous failure.
    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

#[async_trait]
impl Task for DependentTask {
    fn id(&self) -> &TaskId {
        &self.base.id
    }

    fn duration_ms(&self) -> u64 {
        self.base.duration_ms
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn dependencies(&self) -> HashSet<TaskId> {
        self.dependencies.clone()
    }

    fn is_completed(&self) -> bool {
        self.base.is_completed()
    }

    fn mark_completed(&self) {
        self.base.mark_completed();
    }

    async fn execute(&self) -> Result<(), TaskError> {
        if self.base.is_completed() {
            return Ok(());
        }

        let id = self.base.id.clone();
        let mut work = tokio::spawn(simulate_work(
            id.clone(),
            Duration::from_millis(self.base.duration_ms),
            self.failure_rate,
        ));

        let joined = if self.timeout_ms == 0 {
            (&mut work).await
        } else {
            let deadline = Duration::from_millis(self.timeout_ms);
            let waited = tokio::time::timeout(deadline, &mut work).await;
            match waited {
                Ok(joined) => joined,
                Err(_) => {
                    work.abort();
                    // Wait for teardown so no attempt outlives its deadline.
                    let _ = work.await;
                    warn!(task = %id, timeout_ms = self.timeout_ms, "Task timed out");
                    return Err(TaskError::TimedOut {
                        id,
                        timeout_ms: self.timeout_ms,
                    });
                }
            }
        };

        match joined {
            Ok(Ok(())) => {
                self.base.mark_completed();
                info!(task = %id, "Task completed");
                Ok(())
            }
            Ok(Err(reason)) => {
                warn!(task = %id, %reason, "Task failed");
                Err(TaskError::ExecutionFailed { id, reason })
            }
            Err(join_error) => Err(TaskError::ExecutionFailed {
                id,
                reason: join_error.to_string(),
            }),
        }
    }
}

async fn simulate_work(id: TaskId, duration: Duration, failure_rate: f64) -> Result<(), String> {
    debug!(task = %id, ?duration, "Unit of work started");
    tokio::time::sleep(duration).await;

    let failed = rand::thread_rng().gen_bool(failure_rate);
    if failed {
        return Err("unit of work failed randomly".to_string());
    }

    debug!(task = %id, "Unit of work finished");
    Ok(())
}
