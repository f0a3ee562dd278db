//! Round-robin scheduler.
//!
//! VMs run one slice per turn in insertion order. A VM that finishes,
//! migrates away or fails is never invoked again. A failure is recorded and
//! the remaining VMs keep running.

use crate::network::migration::{MigrationError, migrate_out};
use crate::network::transport::MigrationTransport;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::registers::RegisterDump;
use crate::virtual_machine::vm::{SliceStop, VirtualMachine};
use crate::{debug, error, info};
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Index of a VM in insertion order.
pub type VmId = usize;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VmStatus {
    Runnable,
    Finished,
    /// State handed to the VM at this address.
    Migrated(Ipv4Addr),
    Failed,
}

impl VmStatus {
    pub fn is_runnable(self) -> bool {
        self == VmStatus::Runnable
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmStatus::Runnable => f.write_str("runnable"),
            VmStatus::Finished => f.write_str("finished"),
            VmStatus::Migrated(target) => write!(f, "migrated to {target}"),
            VmStatus::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Vm(#[from] VMError),
    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),
}

/// A VM that stopped with an error.
#[derive(Debug)]
pub struct Failure {
    pub vm: VmId,
    pub name: String,
    pub error: SchedulerError,
}

/// Final state of one VM after [`Scheduler::run`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VmSummary {
    pub name: String,
    pub status: VmStatus,
    pub slices: usize,
    pub pc: usize,
}

#[derive(Debug, Default)]
pub struct ScheduleReport {
    /// One entry per VM, in insertion order.
    pub statuses: Vec<VmSummary>,
    pub failures: Vec<Failure>,
    /// Every register dump emitted during the run, in emission order.
    pub dumps: Vec<RegisterDump>,
}

impl ScheduleReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

struct Slot {
    vm: VirtualMachine,
    status: VmStatus,
    slices: usize,
}

pub struct Scheduler<T: MigrationTransport> {
    slots: Vec<Slot>,
    transport: T,
    failures: Vec<Failure>,
    dumps: Vec<RegisterDump>,
}

impl<T: MigrationTransport> Scheduler<T> {
    pub fn new(transport: T) -> Self {
        Self {
            slots: Vec::new(),
            transport,
            failures: Vec::new(),
            dumps: Vec::new(),
        }
    }

    /// Adds a configured, loaded VM. A VM whose PC is already past its last
    /// instruction starts out finished and is never run.
    pub fn add(&mut self, vm: VirtualMachine) -> VmId {
        let status = if vm.is_finished() {
            VmStatus::Finished
        } else {
            VmStatus::Runnable
        };
        self.slots.push(Slot {
            vm,
            status,
            slices: 0,
        });
        self.slots.len() - 1
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn status(&self, id: VmId) -> Option<VmStatus> {
        self.slots.get(id).map(|s| s.status)
    }

    pub fn vm(&self, id: VmId) -> Option<&VirtualMachine> {
        self.slots.get(id).map(|s| &s.vm)
    }

    /// Slices run so far by `id`.
    pub fn slices_run(&self, id: VmId) -> Option<usize> {
        self.slots.get(id).map(|s| s.slices)
    }

    pub fn any_runnable(&self) -> bool {
        self.slots.iter().any(|s| s.status.is_runnable())
    }

    /// Consumes the scheduler, returning the VMs in insertion order.
    pub fn into_vms(self) -> Vec<VirtualMachine> {
        self.slots.into_iter().map(|s| s.vm).collect()
    }

    /// Runs one slice of every runnable VM. Returns whether any VM is still
    /// runnable afterwards.
    pub async fn turn(&mut self) -> bool {
        for id in 0..self.slots.len() {
            if self.slots[id].status.is_runnable() {
                self.run_one(id).await;
            }
        }
        self.any_runnable()
    }

    /// Turns until no VM is runnable.
    pub async fn run(&mut self) -> ScheduleReport {
        while self.turn().await {}

        ScheduleReport {
            statuses: self
                .slots
                .iter()
                .map(|s| VmSummary {
                    name: s.vm.name().to_string(),
                    status: s.status,
                    slices: s.slices,
                    pc: s.vm.pc(),
                })
                .collect(),
            failures: std::mem::take(&mut self.failures),
            dumps: std::mem::take(&mut self.dumps),
        }
    }

    async fn run_one(&mut self, id: VmId) {
        let slot = &mut self.slots[id];
        debug!("Context switch to {} at pc {}", slot.vm.name(), slot.vm.pc());
        slot.slices += 1;

        let report = match slot.vm.run_slice() {
            Ok(report) => report,
            Err(e) => {
                self.fail(id, e.into());
                return;
            }
        };

        for dump in &report.dumps {
            println!("{dump}");
        }
        self.dumps.extend(report.dumps);

        let slot = &mut self.slots[id];
        debug!(
            "{} ran {} instructions: {}",
            slot.vm.name(),
            report.executed,
            report.stop
        );
        match report.stop {
            SliceStop::SliceExhausted => {}
            SliceStop::Finished => {
                info!("{} finished after {} slices", slot.vm.name(), slot.slices);
                slot.status = VmStatus::Finished;
            }
            SliceStop::MigrationRequested(target) => {
                match migrate_out(&self.transport, &slot.vm, target).await {
                    Ok(()) => slot.status = VmStatus::Migrated(target),
                    Err(e) => self.fail(id, e.into()),
                }
            }
        }
    }

    fn fail(&mut self, id: VmId, err: SchedulerError) {
        let slot = &mut self.slots[id];
        error!("{} failed at pc {}: {err}", slot.vm.name(), slot.vm.pc());
        slot.status = VmStatus::Failed;
        self.failures.push(Failure {
            vm: id,
            name: slot.vm.name().to_string(),
            error: err,
        });
    }
}
