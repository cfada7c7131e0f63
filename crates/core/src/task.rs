//! Task model - the unit of work distributed across workers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::id::TaskId;

/// Task priority. `High` sorts first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Drained before everything else
    High,
    /// Drained after high priority tasks
    Medium,
    /// Default priority
    #[default]
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

/// Errors raised by a single execution attempt of a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The unit of work itself failed
    #[error("task {id} execution failed: {reason}")]
    ExecutionFailed {
        /// Failing task
        id: TaskId,
        /// What went wrong
        reason: String,
    },

    /// The unit of work did not finish before the task's deadline
    #[error("task {id} timed out after {timeout_ms}ms")]
    TimedOut {
        /// Failing task
        id: TaskId,
        /// Deadline that expired
        timeout_ms: u64,
    },
}

impl TaskError {
    /// Id of the task that raised this error.
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::ExecutionFailed { id, .. } | Self::TimedOut { id, .. } => id,
        }
    }
}

/// A unit of work that a worker can admit and execute.
///
/// Implementations are shared between the worker's queue, its histories and
/// callers, so completion is tracked with interior mutability and only ever
/// moves from `false` to `true`.
#[async_trait]
pub trait Task: Send + Sync + std::fmt::Debug {
    /// Globally unique, immutable identifier.
    fn id(&self) -> &TaskId;

    /// Estimated duration in milliseconds, debited from worker capacity on admission.
    fn duration_ms(&self) -> u64;

    /// Scheduling priority.
    fn priority(&self) -> Priority {
        Priority::Low
    }

    /// Per-attempt deadline in milliseconds. Zero means no deadline.
    fn timeout_ms(&self) -> u64 {
        0
    }

    /// Ids of tasks that must complete before this one may run.
    ///
    /// Always an owned copy; mutating it never affects the task.
    fn dependencies(&self) -> HashSet<TaskId> {
        HashSet::new()
    }

    /// Whether the task has completed successfully.
    fn is_completed(&self) -> bool;

    /// Record successful completion. Used when execution happened elsewhere.
    fn mark_completed(&self);

    /// Run one execution attempt.
    async fn execute(&self) -> Result<(), TaskError>;
}

/// A task shared between queues, histories and callers.
pub type SharedTask = Arc<dyn Task>;

/// Identity, size and completion flag common to every task variant.
#[derive(Debug)]
pub(crate) struct TaskBase {
    pub(crate) id: TaskId,
    pub(crate) duration_ms: u64,
    completed: AtomicBool,
}

impl TaskBase {
    pub(crate) fn new(duration_ms: u64) -> Self {
        Self::restore(TaskId::new(), duration_ms, false)
    }

    pub(crate) fn restore(id: TaskId, duration_ms: u64, completed: bool) -> Self {
        Self {
            id,
            duration_ms,
            completed: AtomicBool::new(completed),
        }
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }
}

impl Clone for TaskBase {
    fn clone(&self) -> Self {
        Self::restore(self.id.clone(), self.duration_ms, self.is_completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
        assert_eq!(Priority::default(), Priority::Low);
    }

    #[test]
    fn test_priority_wire_names() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"HIGH\"");
        let p: Priority = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(p, Priority::Medium);
    }

    #[test]
    fn test_completion_is_sticky_across_clones() {
        let base = TaskBase::new(100);
        assert!(!base.is_completed());
        base.mark_completed();

        let copy = base.clone();
        assert!(copy.is_completed());
        assert_eq!(copy.id, base.id);
    }
}
