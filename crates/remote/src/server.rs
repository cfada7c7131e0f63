//! Remote execution endpoint.

use std::future::Future;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use taskpool_core::{DependentTask, Task, TaskRecord, DEFAULT_FAILURE_RATE};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::client::DEFAULT_PORT;
use crate::protocol::{read_record, write_outcome, Outcome, ProtocolError};

/// Endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Address to listen on
    pub bind: String,
    /// Simulated failure chance applied to received tasks
    pub failure_rate: f64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bind: format!("127.0.0.1:{DEFAULT_PORT}"),
            failure_rate: DEFAULT_FAILURE_RATE,
        }
    }
}

/// Accepts one task per connection and answers ACK or FAILED.
#[derive(Debug)]
pub struct RemoteEndpoint {
    listener: TcpListener,
    failure_rate: f64,
}

impl RemoteEndpoint {
    /// Bind the listening socket.
    pub async fn bind(config: &EndpointConfig) -> Result<Self, ProtocolError> {
        let listener = TcpListener::bind(&config.bind).await?;
        Ok(Self {
            listener,
            failure_rate: config.failure_rate,
        })
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> Result<(), ProtocolError> {
        self.serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves. Connections already accepted finish on their own.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), ProtocolError>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr()?, "Remote endpoint listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!(%peer, "Accepted connection");
                            let failure_rate = self.failure_rate;
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, failure_rate).await {
                                    warn!(%peer, "Connection failed: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    break;
                }
            }
        }

        info!("Remote endpoint stopped");
        Ok(())
    }
}

async fn handle_connection(stream: TcpStream, failure_rate: f64) -> Result<Outcome, ProtocolError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let outcome = match read_record(&mut reader).await {
        Ok(record) => run_record(record, failure_rate).await,
        Err(ProtocolError::Io(e)) if e.kind() != std::io::ErrorKind::InvalidData => {
            return Err(ProtocolError::Io(e));
        }
        Err(ProtocolError::ConnectionClosed) => return Err(ProtocolError::ConnectionClosed),
        Err(e) => {
            warn!("Rejecting request: {}", e);
            Outcome::Failed
        }
    };

    write_outcome(&mut writer, outcome).await?;
    writer.shutdown().await?;
    Ok(outcome)
}

/// Execute one received task with single-attempt semantics.
pub async fn run_record(record: TaskRecord, failure_rate: f64) -> Outcome {
    let task = DependentTask::from_record(record).with_failure_rate(failure_rate);
    match task.execute().await {
        Ok(()) => {
            info!(task = %task.id(), "Remote task completed");
            Outcome::Ack
        }
        Err(e) => {
            warn!(task = %task.id(), "Remote task failed: {}", e);
            Outcome::Failed
        }
    }
}
