//! Performance monitoring and alerting over worker counters.
//!
//! The monitor plugs into a worker as a [`taskpool_execution::WorkerObserver`]
//! and only ever reads [`taskpool_execution::WorkerStats`] snapshots.

#![warn(missing_docs)]

pub mod alert;
pub mod monitor;

pub use alert::{Alert, AlertLevel, AlertSink, MemoryAlertSink, TracingAlertSink};
pub use monitor::{MonitorThresholds, PerformanceMonitor, Statistics};
