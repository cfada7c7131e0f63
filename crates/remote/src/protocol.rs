//! Line-framed wire protocol: one JSON task record in, one outcome token out.

use taskpool_core::TaskRecord;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame, excluding the trailing newline.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be decoded
    #[error("malformed task record: {0}")]
    Decode(#[from] serde_json::Error),

    /// The frame exceeded [`MAX_FRAME_BYTES`]
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge {
        /// Configured limit
        limit: usize,
    },

    /// The peer closed the connection before sending a frame
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The reply was neither ACK nor FAILED
    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(String),

    /// A phase of the exchange did not finish in time
    #[error("{phase} timed out after {timeout_ms}ms")]
    Timeout {
        /// Phase that timed out
        phase: &'static str,
        /// Limit that was hit
        timeout_ms: u64,
    },
}

/// Outcome token sent back by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The task completed remotely
    Ack,
    /// The task failed or timed out remotely
    Failed,
}

impl Outcome {
    /// Literal wire token.
    pub fn token(self) -> &'static str {
        match self {
            Self::Ack => "ACK",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a reply line. Anything but the two tokens is rejected.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        match line {
            "ACK" => Ok(Self::Ack),
            "FAILED" => Ok(Self::Failed),
            other => Err(ProtocolError::UnexpectedReply(other.to_string())),
        }
    }
}

async fn read_frame<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let limit = MAX_FRAME_BYTES as u64 + 1;
    let read = (&mut *reader).take(limit).read_line(&mut line).await?;

    if read == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    if !line.ends_with('\n') && line.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            limit: MAX_FRAME_BYTES,
        });
    }

    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

async fn write_frame<W>(writer: &mut W, payload: &str) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Send a task record as one JSON line.
pub async fn write_record<W>(writer: &mut W, record: &TaskRecord) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(record)?;
    write_frame(writer, &json).await
}

/// Receive one task record.
pub async fn read_record<R>(reader: &mut R) -> Result<TaskRecord, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_frame(reader).await?;
    Ok(serde_json::from_str(&line)?)
}

/// Send an outcome token.
pub async fn write_outcome<W>(writer: &mut W, outcome: Outcome) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, outcome.token()).await
}

/// Receive an outcome token.
pub async fn read_outcome<R>(reader: &mut R) -> Result<Outcome, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_frame(reader).await?;
    Outcome::parse(&line)
}
