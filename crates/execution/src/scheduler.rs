//! Load-balancing scheduler over a pool of workers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use taskpool_core::{SharedTask, WorkerId};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::{SchedulerError, WorkerError};
use crate::selector::{SelectorStrategy, WorkerSelector};
use crate::worker::Worker;

/// How a batch run reacts to a worker failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run on the first failing worker
    #[default]
    FailFast,
    /// Run every worker and report each outcome
    Isolate,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Policy used by [`Scheduler::execute`]
    pub failure_policy: FailurePolicy,
    /// Worker selection strategy
    pub selector: SelectorStrategy,
}

/// Per-worker outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Outcome of each visited worker, in visiting order
    pub outcomes: Vec<(WorkerId, Result<Vec<SharedTask>, WorkerError>)>,
}

impl BatchReport {
    /// Tasks completed by each worker that finished its batch.
    pub fn completed(&self) -> HashMap<WorkerId, Vec<SharedTask>> {
        self.outcomes
            .iter()
            .filter_map(|(id, outcome)| outcome.as_ref().ok().map(|done| (*id, done.clone())))
            .collect()
    }

    /// Workers whose batch was aborted.
    pub fn failures(&self) -> Vec<(WorkerId, &WorkerError)> {
        self.outcomes
            .iter()
            .filter_map(|(id, outcome)| outcome.as_ref().err().map(|err| (*id, err)))
            .collect()
    }

    /// True when no worker failed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_ok())
    }
}

/// Owns the worker pool and balances admissions across it.
pub struct Scheduler {
    pool: Mutex<Vec<Arc<Worker>>>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create an empty scheduler with the given configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Register a worker.
    pub async fn add_server(&self, worker: Arc<Worker>) -> Result<(), SchedulerError> {
        let mut pool = self.pool.lock().await;
        if pool.iter().any(|w| w.id() == worker.id()) {
            return Err(SchedulerError::InvalidArgument(format!(
                "worker {} is already in the pool",
                worker.id()
            )));
        }

        info!(worker = %worker.id(), label = worker.label(), "Worker added to pool");
        pool.push(worker);
        Ok(())
    }

    /// Admit a task on the least-loaded worker and return that worker's id.
    ///
    /// The chosen worker moves to the back of the pool whether or not it
    /// accepted the task, so equal loads rotate.
    pub async fn schedule_task(&self, task: SharedTask) -> Result<WorkerId, SchedulerError> {
        let mut pool = self.pool.lock().await;

        let mut loads = Vec::with_capacity(pool.len());
        for worker in pool.iter() {
            loads.push(worker.total_load().await);
        }

        let Some(index) = self.config.selector.select(&loads) else {
            return Err(SchedulerError::NoAvailableWorker {
                task: task.id().clone(),
            });
        };

        let worker = pool.remove(index);
        debug!(
            task = %task.id(),
            worker = %worker.id(),
            load_ms = loads[index],
            strategy = self.config.selector.name(),
            "Selected worker"
        );
        let admitted = worker.add_task(task).await;
        let id = worker.id();
        pool.push(worker);

        admitted.map(|()| id).map_err(SchedulerError::from)
    }

    /// Run every worker's batch, stopping at the first worker that fails.
    pub async fn execute_all(&self) -> Result<HashMap<WorkerId, Vec<SharedTask>>, SchedulerError> {
        let workers = self.pool.lock().await.clone();
        let mut completed = HashMap::with_capacity(workers.len());

        for worker in workers {
            match worker.execute_tasks().await {
                Ok(done) => {
                    completed.insert(worker.id(), done);
                }
                Err(source) => {
                    error!(worker = %worker.id(), error = %source, "Aborting run");
                    return Err(SchedulerError::Execution {
                        worker: worker.id(),
                        source,
                    });
                }
            }
        }

        Ok(completed)
    }

    /// Run every worker's batch, recording each failure without stopping.
    pub async fn execute_all_isolated(&self) -> BatchReport {
        let workers = self.pool.lock().await.clone();
        let mut report = BatchReport::default();

        for worker in workers {
            let outcome = worker.execute_tasks().await;
            if let Err(err) = &outcome {
                error!(worker = %worker.id(), error = %err, "Worker batch failed");
            }
            report.outcomes.push((worker.id(), outcome));
        }

        report
    }

    /// Run a batch with the configured failure policy.
    pub async fn execute(&self) -> Result<BatchReport, SchedulerError> {
        match self.config.failure_policy {
            FailurePolicy::FailFast => {
                let completed = self.execute_all().await?;
                Ok(BatchReport {
                    outcomes: completed.into_iter().map(|(id, done)| (id, Ok(done))).collect(),
                })
            }
            FailurePolicy::Isolate => Ok(self.execute_all_isolated().await),
        }
    }

    /// Copy of the pool ordered by ascending load.
    pub async fn snapshot(&self) -> Vec<Arc<Worker>> {
        let workers = self.pool.lock().await.clone();
        let mut keyed = Vec::with_capacity(workers.len());
        for worker in workers {
            keyed.push((worker.total_load().await, worker));
        }
        keyed.sort_by_key(|(load, _)| *load);
        keyed.into_iter().map(|(_, worker)| worker).collect()
    }

    /// Number of pooled workers.
    pub async fn len(&self) -> usize {
        self.pool.lock().await.len()
    }

    /// True when no worker is pooled.
    pub async fn is_empty(&self) -> bool {
        self.pool.lock().await.is_empty()
    }

    /// Active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
