//! Minimal virtual machine monitor.
//!
//! Runs small register-machine programs in time slices, moves a running VM
//! to another host over TCP, and persists register snapshots to disk.

pub mod hypervisor;
pub mod network;
pub mod storage;
pub mod utils;
pub mod virtual_machine;
