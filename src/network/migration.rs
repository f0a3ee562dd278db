//! Sender and receiver sides of a VM migration.
//!
//! The source encodes its halted state and ships it; the destination decodes
//! it and resumes one instruction past the source's `MIGRATE`.

use crate::info;
use crate::network::transport::{MigrationListener, MigrationTransport, TransportError};
use crate::virtual_machine::state::{FormatError, VmState};
use crate::virtual_machine::vm::VirtualMachine;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid migration buffer: {0}")]
    Format(#[from] FormatError),
}

/// Encodes `vm`'s state and sends it to `target`.
pub async fn migrate_out<T: MigrationTransport + ?Sized>(
    transport: &T,
    vm: &VirtualMachine,
    target: Ipv4Addr,
) -> Result<(), MigrationError> {
    let payload = vm.state().to_migration_bytes()?;
    transport.send_state(target, payload).await?;
    info!("{} migrated to {target} at pc {}", vm.name(), vm.pc());
    Ok(())
}

/// Waits for one migration and installs it into `vm`.
///
/// `vm` must already hold the same program as the source. Returns the state
/// as received, before the PC is advanced.
pub async fn receive_into<L: MigrationListener + ?Sized>(
    listener: &L,
    vm: &mut VirtualMachine,
) -> Result<VmState, MigrationError> {
    let payload = listener.receive_state().await?;
    let state = VmState::from_migration_bytes(&payload)?;
    vm.resume_after_migration(state);
    info!("{} resumed from migration at pc {}", vm.name(), vm.pc());
    Ok(state)
}
