//! taskpool core data models.
//!
//! This crate defines the task abstraction shared by local workers, remote
//! workers and the remote execution endpoint.

#![warn(missing_docs)]

// Core identities
mod id;

// Tasks
mod task;
mod simple;
mod dependent;
mod record;

// Retry
mod retry;

// Re-exports
pub use id::{TaskId, WorkerId};

pub use task::{Priority, SharedTask, Task, TaskError};
pub use simple::{PriorityTask, SimpleTask};
pub use dependent::{DependentTask, DEFAULT_FAILURE_RATE};
pub use record::TaskRecord;

pub use retry::RetryPolicy;
