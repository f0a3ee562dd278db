//! TCP transport for migrations.
//!
//! Each transfer opens a fresh connection: the sender connects, writes one
//! length-prefixed frame, flushes and closes. The listener accepts exactly
//! one connection per [`MigrationListener::receive_state`] call.
//!
//! ```text
//! [len: u32 BE][payload: len bytes]
//! ```
//!
//! Connecting and reading are bounded by timeouts; accepting is not, since the
//! receiver is waiting for a single expected peer.

use crate::network::transport::{
    MIGRATION_PORT, MigrationListener, MigrationTransport, TransportError, check_frame_len,
};
use crate::{debug, info};
use bytes::Bytes;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::{Duration, timeout};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends migration frames over TCP.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    port: u16,
    connect_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(MIGRATION_PORT)
    }
}

impl TcpTransport {
    /// Creates a transport that sends to `port` on the target host.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait::async_trait]
impl MigrationTransport for TcpTransport {
    async fn send_state(&self, target: Ipv4Addr, payload: Bytes) -> Result<(), TransportError> {
        check_frame_len(payload.len())?;
        let addr = SocketAddr::from((target, self.port));

        let mut stream = match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => {
                return Err(TransportError::Timeout {
                    operation: "connect",
                    after: self.connect_timeout,
                });
            }
        };

        let len = (payload.len() as u32).to_be_bytes();
        stream.write_all(&len).await?;
        stream.write_all(&payload).await?;
        stream.flush().await?;
        stream.shutdown().await?;

        info!("Sent {} byte migration frame to {addr}", payload.len());
        Ok(())
    }
}

/// Accepts migration frames over TCP.
pub struct TcpMigrationListener {
    listener: TcpListener,
    read_timeout: Duration,
}

impl TcpMigrationListener {
    /// Binds the listening socket.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Address actually bound, useful after binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    async fn read_frame(stream: &mut TcpStream) -> Result<Bytes, TransportError> {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;
        check_frame_len(len)?;

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await?;
        Ok(Bytes::from(payload))
    }
}

#[async_trait::async_trait]
impl MigrationListener for TcpMigrationListener {
    async fn receive_state(&self) -> Result<Bytes, TransportError> {
        let (mut stream, peer) = self.listener.accept().await?;
        debug!("Accepted migration connection from {peer}");

        let payload = timeout(self.read_timeout, Self::read_frame(&mut stream))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "read",
                after: self.read_timeout,
            })??;

        info!("Received {} byte migration frame from {peer}", payload.len());
        Ok(payload)
    }
}
