//! Baseline and priority task variants.
//!
//! Both complete synchronously on their first attempt and never enforce a timeout.

use async_trait::async_trait;

use crate::id::TaskId;
use crate::task::{Priority, Task, TaskBase, TaskError};

/// Baseline task: always succeeds, runs at the default priority.
#[derive(Debug, Clone)]
pub struct SimpleTask {
    base: TaskBase,
}

impl SimpleTask {
    /// Create a task with the given estimated duration.
    pub fn new(duration_ms: u64) -> Self {
        Self {
            base: TaskBase::new(duration_ms),
        }
    }
}

#[async_trait]
impl Task for SimpleTask {
    fn id(&self) -> &TaskId {
        &self.base.id
    }

    fn duration_ms(&self) -> u64 {
        self.base.duration_ms
    }

    fn is_completed(&self) -> bool {
        self.base.is_completed()
    }

    fn mark_completed(&self) {
        self.base.mark_completed();
    }

    async fn execute(&self) -> Result<(), TaskError> {
        self.base.mark_completed();
        Ok(())
    }
}

/// Baseline task carrying an explicit priority.
#[derive(Debug, Clone)]
pub struct PriorityTask {
    base: TaskBase,
    priority: Priority,
}

impl PriorityTask {
    /// Create a task with the given duration and priority.
    pub fn new(duration_ms: u64, priority: Priority) -> Self {
        Self {
            base: TaskBase::new(duration_ms),
            priority,
        }
    }
}

#[async_trait]
impl Task for PriorityTask {
    fn id(&self) -> &TaskId {
        &self.base.id
    }

    fn duration_ms(&self) -> u64 {
        self.base.duration_ms
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn is_completed(&self) -> bool {
        self.base.is_completed()
    }

    fn mark_completed(&self) {
        self.base.mark_completed();
    }

    async fn execute(&self) -> Result<(), TaskError> {
        self.base.mark_completed();
        Ok(())
    }
}

impl std::fmt::Display for PriorityTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}ms, {}, completed: {})",
            self.base.id,
            self.base.duration_ms,
            self.priority,
            self.base.is_completed()
        )
    }
}
