//! Execution layer - workers, dependency resolution, and load-balanced scheduling.

#![warn(missing_docs)]

pub mod dependency;
pub mod error;
pub mod executor;
pub mod scheduler;
pub mod selector;
pub mod stats;
pub mod worker;

mod queue;

#[cfg(test)]
mod testing;

pub use dependency::{DependencyResolver, Resolution};
pub use error::{AttemptError, SchedulerError, WorkerError};
pub use executor::{AttemptExecutor, LocalExecutor};
pub use scheduler::{BatchReport, FailurePolicy, Scheduler, SchedulerConfig};
pub use selector::{LeastLoaded, SelectorStrategy, WorkerSelector};
pub use stats::{NoopObserver, WorkerObserver, WorkerStats};
pub use worker::{FailedTask, FailureReason, Worker, WorkerConfig, DEFAULT_CAPACITY_MS};
