//! Network layer for moving VM state between hosts.
//!
//! - [`transport`]: Transport traits, framing bounds and error types
//! - [`tcp_transport`]: TCP sender and listener
//! - [`local_transport`]: In-memory transport for testing
//! - [`migration`]: Encode-and-send / receive-and-resume helpers

pub mod local_transport;
pub mod migration;
pub mod tcp_transport;
pub mod transport;
