//! Client side of a remote worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskpool_core::{RetryPolicy, SharedTask, TaskRecord};
use taskpool_execution::{AttemptError, AttemptExecutor, Worker};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::protocol::{read_outcome, write_record, Outcome, ProtocolError};

/// Port the endpoint listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 12345;

/// Where and how to reach a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Endpoint host
    pub host: String,
    /// Endpoint port
    pub port: u16,
    /// Limit for establishing the connection
    pub connect_timeout_ms: u64,
    /// Limit for sending the task and receiving the outcome
    pub response_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 5_000,
            response_timeout_ms: 60_000,
        }
    }
}

impl RemoteConfig {
    /// `host:port` string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Runs each attempt as one request/response exchange on a fresh connection.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    config: RemoteConfig,
}

impl RemoteExecutor {
    /// Create an executor for the given endpoint.
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    /// Endpoint configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Send one record and wait for the outcome token.
    pub async fn exchange(&self, record: &TaskRecord) -> Result<Outcome, ProtocolError> {
        let address = self.config.address();
        let connect_timeout_ms = self.config.connect_timeout_ms;
        let stream = timeout(
            Duration::from_millis(connect_timeout_ms),
            TcpStream::connect(&address),
        )
        .await
        .map_err(|_| ProtocolError::Timeout {
            phase: "connect",
            timeout_ms: connect_timeout_ms,
        })??;

        debug!(%address, task = %record.id, "Connected to remote endpoint");

        let response_timeout_ms = self.config.response_timeout_ms;
        timeout(Duration::from_millis(response_timeout_ms), async {
            let (reader, mut writer) = stream.into_split();
            write_record(&mut writer, record).await?;
            let mut reader = BufReader::new(reader);
            read_outcome(&mut reader).await
        })
        .await
        .map_err(|_| ProtocolError::Timeout {
            phase: "response",
            timeout_ms: response_timeout_ms,
        })?
    }
}

#[async_trait]
impl AttemptExecutor for RemoteExecutor {
    fn describe(&self) -> String {
        format!("remote({})", self.config.address())
    }

    async fn attempt(&self, task: &SharedTask) -> Result<(), AttemptError> {
        let record = TaskRecord::from_task(task.as_ref());
        match self.exchange(&record).await {
            Ok(Outcome::Ack) => {
                task.mark_completed();
                info!(task = %task.id(), "Remote endpoint acknowledged task");
                Ok(())
            }
            Ok(Outcome::Failed) => Err(AttemptError::Communication(format!(
                "remote endpoint reported FAILED for task {}",
                task.id()
            ))),
            Err(err) => Err(AttemptError::Communication(err.to_string())),
        }
    }
}

/// Build a worker that delegates every attempt to a remote endpoint.
pub fn remote_worker(config: RemoteConfig, retry_policy: RetryPolicy) -> Worker {
    Worker::new(Arc::new(RemoteExecutor::new(config)), retry_policy)
}
