//! Errors raised by workers and the scheduler.

use taskpool_core::{TaskError, TaskId, WorkerId};

/// Error from a single execution attempt, as seen by a worker.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AttemptError {
    /// The task failed or timed out; counts as one consumed attempt
    #[error(transparent)]
    Task(#[from] TaskError),

    /// The execution backend could not be reached; aborts the batch
    #[error("worker communication failure: {0}")]
    Communication(String),
}

/// Errors raised by a worker.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    /// Admission rejected; nothing was mutated
    #[error("worker is full: task {task} needs {required_ms}ms, {remaining_ms}ms remaining")]
    CapacityExceeded {
        /// Rejected task
        task: TaskId,
        /// Duration the task would reserve
        required_ms: u64,
        /// Capacity left on the worker
        remaining_ms: u64,
    },

    /// Delegated execution failed; the rest of the batch was left pending
    #[error("failed to communicate with remote worker while running task {task}: {reason}")]
    Communication {
        /// Task that was in flight
        task: TaskId,
        /// Underlying failure
        reason: String,
    },
}

/// Errors raised by the scheduler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid input to a scheduler operation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The pool was empty when a task had to be placed
    #[error("no available worker to schedule task {task}")]
    NoAvailableWorker {
        /// Task that could not be placed
        task: TaskId,
    },

    /// Admission error from the selected worker, passed through unchanged
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// A worker failed during batch execution
    #[error("failed executing tasks on worker {worker}")]
    Execution {
        /// Worker that failed
        worker: WorkerId,
        /// What went wrong
        #[source]
        source: WorkerError,
    },
}
