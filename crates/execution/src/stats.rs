//! Read-only worker counters and the observer seam that receives them.

use serde::Serialize;
use taskpool_core::WorkerId;

/// Point-in-time counters for one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStats {
    /// Worker the counters belong to
    pub worker: WorkerId,
    /// Human-readable worker label
    pub label: String,
    /// Tasks admitted and not yet completed
    pub pending_count: usize,
    /// Tasks completed over the worker's lifetime
    pub completed_count: usize,
    /// Failure records over the worker's lifetime
    pub failed_count: usize,
    /// Sum of pending durations
    pub total_load_ms: u64,
    /// Sum of completed durations
    pub processed_load_ms: u64,
    /// Capacity left for admissions
    pub remaining_capacity_ms: u64,
}

impl WorkerStats {
    /// Mean duration of completed tasks, zero when nothing completed.
    pub fn average_completed_duration_ms(&self) -> f64 {
        if self.completed_count == 0 {
            return 0.0;
        }
        self.processed_load_ms as f64 / self.completed_count as f64
    }

    /// Completed share of all resolved tasks.
    pub fn success_ratio(&self) -> f64 {
        match self.resolved() {
            0 => 0.0,
            total => self.completed_count as f64 / total as f64,
        }
    }

    /// Failed share of all resolved tasks.
    pub fn failure_ratio(&self) -> f64 {
        match self.resolved() {
            0 => 0.0,
            total => self.failed_count as f64 / total as f64,
        }
    }

    fn resolved(&self) -> usize {
        self.completed_count.saturating_add(self.failed_count)
    }
}

/// Receives worker counters after admissions and batch executions.
///
/// Observers never get access to the worker itself.
pub trait WorkerObserver: Send + Sync {
    /// Called with a fresh snapshot.
    fn observe(&self, stats: &WorkerStats);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl WorkerObserver for NoopObserver {
    fn observe(&self, _stats: &WorkerStats) {}
}
