//! In-memory transport for local testing and single-process simulation.
//!
//! Listeners register under an IPv4 address; senders route payloads to them
//! through async channels without any network I/O.

use crate::network::transport::{
    MigrationListener, MigrationTransport, TransportError, check_frame_len,
};
use bytes::Bytes;
use dashmap::DashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{Receiver, Sender, channel};

const CHANNEL_CAPACITY: usize = 16;

/// Routing table shared by every clone of the transport.
#[derive(Clone, Default)]
pub struct LocalTransport {
    peers: Arc<DashMap<Ipv4Addr, Sender<Bytes>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener at `addr`, replacing any previous one.
    pub fn listener(&self, addr: Ipv4Addr) -> LocalListener {
        let (tx, rx) = channel(CHANNEL_CAPACITY);
        self.peers.insert(addr, tx);
        LocalListener {
            addr,
            rx: Mutex::new(rx),
        }
    }

    pub fn is_registered(&self, addr: Ipv4Addr) -> bool {
        self.peers.contains_key(&addr)
    }
}

#[async_trait::async_trait]
impl MigrationTransport for LocalTransport {
    async fn send_state(&self, target: Ipv4Addr, payload: Bytes) -> Result<(), TransportError> {
        check_frame_len(payload.len())?;
        // Clone the sender so the map guard is not held across the await.
        let tx = match self.peers.get(&target) {
            Some(r) => r.value().clone(),
            None => return Err(TransportError::PeerNotFound(target)),
        };
        tx.send(payload)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// Receiving end registered with a [`LocalTransport`].
pub struct LocalListener {
    addr: Ipv4Addr,
    rx: Mutex<Receiver<Bytes>>,
}

impl LocalListener {
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
}

#[async_trait::async_trait]
impl MigrationListener for LocalListener {
    async fn receive_state(&self) -> Result<Bytes, TransportError> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    #[tokio::test]
    async fn test_send_message() {
        let transport = LocalTransport::new();
        let listener = transport.listener(HOST_B);
        assert!(transport.is_registered(HOST_B));

        let payload = Bytes::from("The first state.");
        transport.send_state(HOST_B, payload.clone()).await.unwrap();
        assert_eq!(listener.receive_state().await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_clones_share_routes() {
        let transport = LocalTransport::new();
        let sender = transport.clone();
        let listener = transport.listener(HOST_B);

        sender.send_state(HOST_B, Bytes::from("a")).await.unwrap();
        sender.send_state(HOST_B, Bytes::from("b")).await.unwrap();
        assert_eq!(listener.receive_state().await.unwrap(), "a");
        assert_eq!(listener.receive_state().await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_unknown_peer() {
        let transport = LocalTransport::new();
        assert!(matches!(
            transport.send_state(HOST_B, Bytes::from("x")).await,
            Err(TransportError::PeerNotFound(addr)) if addr == HOST_B
        ));
    }

    #[tokio::test]
    async fn test_dropped_listener() {
        let transport = LocalTransport::new();
        drop(transport.listener(HOST_B));
        assert!(matches!(
            transport.send_state(HOST_B, Bytes::from("x")).await,
            Err(TransportError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let transport = LocalTransport::new();
        let _listener = transport.listener(HOST_B);
        assert!(matches!(
            transport.send_state(HOST_B, Bytes::new()).await,
            Err(TransportError::InvalidFrameLength(0))
        ));
    }
}
