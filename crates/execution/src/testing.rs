//! Test doubles shared by the worker and scheduler tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use taskpool_core::{Priority, SharedTask, Task, TaskError, TaskId};

use crate::error::AttemptError;
use crate::executor::AttemptExecutor;

/// Task that fails a fixed number of attempts before succeeding, and counts calls.
#[derive(Debug)]
pub(crate) struct ScriptedTask {
    id: TaskId,
    duration_ms: u64,
    priority: Priority,
    dependencies: HashSet<TaskId>,
    failures_left: AtomicU32,
    calls: AtomicU32,
    completed: AtomicBool,
}

impl ScriptedTask {
    pub(crate) fn new(id: &str, duration_ms: u64, priority: Priority) -> Self {
        Self {
            id: TaskId::from(id),
            duration_ms,
            priority,
            dependencies: HashSet::new(),
            failures_left: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            completed: AtomicBool::new(false),
        }
    }

    pub(crate) fn failing(mut self, failures: u32) -> Self {
        self.failures_left = AtomicU32::new(failures);
        self
    }

    pub(crate) fn after(mut self, dependency: &str) -> Self {
        self.dependencies.insert(TaskId::from(dependency));
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn dependencies(&self) -> HashSet<TaskId> {
        self.dependencies.clone()
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    async fn execute(&self) -> Result<(), TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(TaskError::ExecutionFailed {
                id: self.id.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        self.mark_completed();
        Ok(())
    }
}

/// Executor that runs tasks locally but loses the connection on one task id.
pub(crate) struct DisconnectingExecutor {
    pub(crate) broken: TaskId,
}

#[async_trait]
impl AttemptExecutor for DisconnectingExecutor {
    fn describe(&self) -> String {
        "disconnecting".to_string()
    }

    async fn attempt(&self, task: &SharedTask) -> Result<(), AttemptError> {
        if task.id() == &self.broken {
            return Err(AttemptError::Communication("connection reset".to_string()));
        }
        task.execute().await.map_err(AttemptError::from)
    }
}

/// Executor that reports success without ever completing the task.
pub(crate) struct SilentExecutor;

#[async_trait]
impl AttemptExecutor for SilentExecutor {
    fn describe(&self) -> String {
        "silent".to_string()
    }

    async fn attempt(&self, _task: &SharedTask) -> Result<(), AttemptError> {
        Ok(())
    }
}
