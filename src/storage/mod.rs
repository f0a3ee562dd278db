//! Persistent VM storage.
//!
//! - [`snapshot_store`]: Register snapshots written by the `SNAPSHOT` instruction
//!   and read back at startup

pub mod snapshot_store;
