//! Threshold checks over worker counters.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use taskpool_execution::{WorkerObserver, WorkerStats};

use crate::alert::{Alert, AlertLevel, AlertSink};

/// Alert thresholds. A value strictly above a threshold triggers the alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorThresholds {
    /// Pending task count
    pub queue_size: usize,
    /// Failed share of resolved tasks, 0.0 to 1.0
    pub failure_rate: f64,
    /// Sum of completed durations
    pub processed_load_ms: u64,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            queue_size: 10,
            failure_rate: 0.10,
            processed_load_ms: 20_000,
        }
    }
}

/// Summary figures for one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Worker label
    pub worker: String,
    /// Mean completed duration
    pub average_execution_ms: f64,
    /// Completed share of resolved tasks
    pub success_rate: f64,
    /// Failed share of resolved tasks
    pub failure_rate: f64,
    /// Sum of completed durations
    pub processed_load_ms: u64,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== Performance statistics: {} =====", self.worker)?;
        writeln!(f, "Average execution time: {:.1} ms", self.average_execution_ms)?;
        writeln!(f, "Success rate: {:.1}%", self.success_rate * 100.0)?;
        writeln!(f, "Failure rate: {:.1}%", self.failure_rate * 100.0)?;
        write!(f, "Total load processed: {} ms", self.processed_load_ms)
    }
}

/// Watches worker snapshots and raises alerts when thresholds are crossed.
pub struct PerformanceMonitor {
    thresholds: MonitorThresholds,
    sink: Arc<dyn AlertSink>,
}

impl PerformanceMonitor {
    /// Create a monitor delivering to `sink`.
    pub fn new(thresholds: MonitorThresholds, sink: Arc<dyn AlertSink>) -> Self {
        Self { thresholds, sink }
    }

    /// Configured thresholds.
    pub fn thresholds(&self) -> &MonitorThresholds {
        &self.thresholds
    }

    /// Run the three checks against a snapshot.
    pub fn check(&self, stats: &WorkerStats) {
        let worker = stats.label.as_str();
        let limits = &self.thresholds;

        let queue = if stats.pending_count > limits.queue_size {
            Alert::new(
                AlertLevel::Warning,
                worker,
                format!("Task queue size exceeded threshold: {}", stats.pending_count),
            )
        } else {
            Alert::new(
                AlertLevel::Info,
                worker,
                format!("Task queue size is under control: {}", stats.pending_count),
            )
        };
        self.sink.deliver(queue);

        let rate = stats.failure_ratio();
        let failures = if rate > limits.failure_rate {
            Alert::new(
                AlertLevel::Critical,
                worker,
                format!("Failure rate exceeded threshold: {:.1}%", rate * 100.0),
            )
        } else {
            Alert::new(
                AlertLevel::Info,
                worker,
                format!("Failure rate within limits: {:.1}%", rate * 100.0),
            )
        };
        self.sink.deliver(failures);

        let load = stats.processed_load_ms;
        let processed = if load > limits.processed_load_ms {
            Alert::new(
                AlertLevel::Critical,
                worker,
                format!("Processed load exceeded threshold: {load} ms"),
            )
        } else {
            Alert::new(
                AlertLevel::Info,
                worker,
                format!("Processed load within limits: {load} ms"),
            )
        };
        self.sink.deliver(processed);
    }

    /// Summary figures for a snapshot.
    pub fn statistics(&self, stats: &WorkerStats) -> Statistics {
        Statistics {
            worker: stats.label.clone(),
            average_execution_ms: stats.average_completed_duration_ms(),
            success_rate: stats.success_ratio(),
            failure_rate: stats.failure_ratio(),
            processed_load_ms: stats.processed_load_ms,
        }
    }
}

impl WorkerObserver for PerformanceMonitor {
    fn observe(&self, stats: &WorkerStats) {
        self.check(stats);
    }
}
