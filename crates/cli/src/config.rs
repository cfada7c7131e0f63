//! Application configuration loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use taskpool_core::RetryPolicy;
use taskpool_execution::{SchedulerConfig, WorkerConfig};
use taskpool_monitor::MonitorThresholds;
use taskpool_remote::{EndpointConfig, RemoteConfig};
use tracing::debug;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid configuration
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// A `host:port` override could not be parsed
    #[error("invalid address {0:?}, expected HOST:PORT")]
    Address(String),
}

/// Every component's configuration, one TOML table each.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[worker]`
    pub worker: WorkerConfig,
    /// `[retry]`
    pub retry: RetryPolicy,
    /// `[remote]`
    pub remote: RemoteConfig,
    /// `[endpoint]`
    pub endpoint: EndpointConfig,
    /// `[monitor]`
    pub monitor: MonitorThresholds,
    /// `[scheduler]`
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        debug!(?path, "Loading config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Point the remote worker at `address` (`HOST:PORT`).
    pub fn set_remote_address(&mut self, address: &str) -> Result<(), ConfigError> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::Address(address.to_string()))?;
        let port = port
            .parse()
            .map_err(|_| ConfigError::Address(address.to_string()))?;
        if host.is_empty() {
            return Err(ConfigError::Address(address.to_string()));
        }

        self.remote.host = host.to_string();
        self.remote.port = port;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpool_execution::FailurePolicy;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.worker.capacity_ms, 30_000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.monitor.queue_size, 10);
    }

    #[test]
    fn test_partial_tables_keep_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [worker]
            capacity_ms = 60000

            [retry]
            exponential_backoff = false

            [remote]
            host = "10.0.0.7"

            [scheduler]
            failure_policy = "isolate"
            "#,
        )
        .unwrap();

        assert_eq!(config.worker.capacity_ms, 60_000);
        assert!(!config.retry.exponential_backoff);
        assert_eq!(config.retry.base_delay_ms, 2000);
        assert_eq!(config.remote.host, "10.0.0.7");
        assert_eq!(config.remote.port, taskpool_remote::DEFAULT_PORT);
        assert_eq!(config.scheduler.failure_policy, FailurePolicy::Isolate);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let path = std::env::temp_dir().join("taskpool-missing-config.toml");
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_reads_file() {
        let path =
            std::env::temp_dir().join(format!("taskpool-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[endpoint]\nfailure_rate = 0.0\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.endpoint.failure_rate, 0.0);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let path = std::env::temp_dir().join(format!("taskpool-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[worker\n").unwrap();

        let err = AppConfig::load(Some(&path)).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_remote_address_override() {
        let mut config = AppConfig::default();
        config.set_remote_address("remote.local:4000").unwrap();
        assert_eq!(config.remote.address(), "remote.local:4000");

        assert!(config.set_remote_address("no-port").is_err());
        assert!(config.set_remote_address(":4000").is_err());
        assert!(config.set_remote_address("host:99999").is_err());
    }
}
