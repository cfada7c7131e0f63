//! Single-attempt execution strategies.

use async_trait::async_trait;
use taskpool_core::SharedTask;

use crate::error::AttemptError;

/// Runs one attempt of a task.
///
/// Workers share the admission, dependency and retry algorithm and differ
/// only in the executor they are built with.
#[async_trait]
pub trait AttemptExecutor: Send + Sync {
    /// Short description used in logs and worker labels.
    fn describe(&self) -> String;

    /// Execute one attempt. On success the task must be marked completed.
    async fn attempt(&self, task: &SharedTask) -> Result<(), AttemptError>;
}

/// Executes tasks in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

#[async_trait]
impl AttemptExecutor for LocalExecutor {
    fn describe(&self) -> String {
        "local".to_string()
    }

    async fn attempt(&self, task: &SharedTask) -> Result<(), AttemptError> {
        task.execute().await.map_err(AttemptError::from)
    }
}
