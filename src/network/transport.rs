//! Core transport abstractions for moving VM state between hosts.
//!
//! A transfer is one framed buffer: a 4-byte big-endian length followed by
//! that many payload bytes. The sender does not wait for an acknowledgement.

use bytes::Bytes;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port migrations are sent to unless configured otherwise.
pub const MIGRATION_PORT: u16 = 8080;

/// Largest accepted frame payload.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Could not open a connection to the destination.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A bounded network wait ran out.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Stream failed mid-transfer.
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),

    /// Frame length is outside `1..=MAX_FRAME_LEN`.
    #[error("invalid frame length {0} (max {MAX_FRAME_LEN})")]
    InvalidFrameLength(usize),

    /// No listener registered for the destination.
    #[error("peer not found: {0}")]
    PeerNotFound(Ipv4Addr),

    /// In-memory channel dropped by the other side.
    #[error("channel closed")]
    ChannelClosed,
}

/// Sending half of a migration.
#[async_trait::async_trait]
pub trait MigrationTransport: Send + Sync {
    /// Delivers `payload` to the migration listener at `target`.
    ///
    /// # Errors
    /// Returns `TransportError::InvalidFrameLength` for an empty or oversized payload,
    /// and a connect, timeout or io error when delivery fails. Never retried.
    async fn send_state(&self, target: Ipv4Addr, payload: Bytes) -> Result<(), TransportError>;
}

/// Receiving half of a migration.
#[async_trait::async_trait]
pub trait MigrationListener: Send + Sync {
    /// Waits for one incoming transfer and returns its payload.
    async fn receive_state(&self) -> Result<Bytes, TransportError>;
}

/// Checks a frame length against the accepted bounds.
pub fn check_frame_len(len: usize) -> Result<(), TransportError> {
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(TransportError::InvalidFrameLength(len));
    }
    Ok(())
}
