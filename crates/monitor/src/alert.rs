//! Alerts and where they go.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    /// Within limits
    Info,
    /// Needs attention
    Warning,
    /// Threshold breached
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// One alert raised by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Severity
    pub level: AlertLevel,
    /// Human-readable message
    pub message: String,
    /// Label of the worker the alert is about
    pub worker: String,
    /// When the alert was raised
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Create an alert stamped with the current time.
    pub fn new(level: AlertLevel, worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            worker: worker.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Destination for alerts.
pub trait AlertSink: Send + Sync {
    /// Deliver an alert.
    fn deliver(&self, alert: Alert);
}

/// Emits alerts as log events, CRITICAL at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn deliver(&self, alert: Alert) {
        match alert.level {
            AlertLevel::Info => info!(worker = %alert.worker, "{}", alert.message),
            AlertLevel::Warning => warn!(worker = %alert.worker, "{}", alert.message),
            AlertLevel::Critical => error!(worker = %alert.worker, "{}", alert.message),
        }
    }
}

/// Keeps every alert in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every alert received so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Alerts at or above `level`.
    pub fn at_least(&self, level: AlertLevel) -> Vec<Alert> {
        self.alerts()
            .into_iter()
            .filter(|alert| alert.level >= level)
            .collect()
    }
}

impl AlertSink for MemoryAlertSink {
    fn deliver(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(alert);
    }
}
