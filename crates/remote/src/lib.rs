//! Remote execution: the client half of a remote worker and the endpoint it talks to.
//!
//! Each task travels on its own TCP connection as one JSON line. The endpoint
//! runs it once and answers with a single `ACK` or `FAILED` line.

#![warn(missing_docs)]

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{remote_worker, RemoteConfig, RemoteExecutor, DEFAULT_PORT};
pub use protocol::{Outcome, ProtocolError, MAX_FRAME_BYTES};
pub use server::{run_record, EndpointConfig, RemoteEndpoint};
