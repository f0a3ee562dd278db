//! Hosting layer: VM configuration files and the round-robin scheduler.
//!
//! - [`config`]: `key=value` VM configuration and VM construction
//! - [`scheduler`]: Slice-based scheduling, migration hand-off and run reports

pub mod config;
pub mod scheduler;
