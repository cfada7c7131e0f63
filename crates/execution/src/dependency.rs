//! Dependency resolution for tasks.

use std::collections::HashSet;
use taskpool_core::{Task, TaskId};

/// Result of dependency resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// All dependencies satisfied, ready to execute
    Ready,
    /// Blocked by these tasks
    Blocked(Vec<TaskId>),
    /// Task depends on itself and can never run
    Circular(Vec<TaskId>),
}

/// Resolves task dependencies against a worker's completed history.
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver;

impl DependencyResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self
    }

    /// Check if a task's dependencies are satisfied.
    pub fn check(&self, task: &dyn Task, completed: &HashSet<TaskId>) -> Resolution {
        let dependencies = task.dependencies();

        if dependencies.is_empty() {
            return Resolution::Ready;
        }

        if dependencies.contains(task.id()) {
            return Resolution::Circular(vec![task.id().clone()]);
        }

        let mut blocked: Vec<TaskId> = dependencies
            .into_iter()
            .filter(|dep| !completed.contains(dep))
            .collect();

        if blocked.is_empty() {
            Resolution::Ready
        } else {
            blocked.sort();
            Resolution::Blocked(blocked)
        }
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}
