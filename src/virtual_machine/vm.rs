//! Execution engine.
//!
//! One [`VirtualMachine`] owns a register file, a program counter and an
//! immutable [`Program`]. Each step decodes the line at the PC and applies it;
//! [`VirtualMachine::run_slice`] runs a bounded number of steps so a
//! scheduler can interleave several machines.

pub mod registers;
#[cfg(test)]
mod tests;

use crate::storage::snapshot_store;
use crate::virtual_machine::decoder::{OpcodeCase, decode};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::state::VmState;
use crate::{debug, info, warn};
use registers::{RegisterDump, RegisterFile};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;

/// Slice size used until [`VirtualMachine::configure`] is called.
pub const DEFAULT_SLICE: usize = 1;

/// Which side of a migration this VM plays.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VmRole {
    /// `MIGRATE` halts the VM so its state can be sent away.
    #[default]
    Source,
    /// `MIGRATE` is a no-op: this VM already is the destination.
    Destination,
}

/// Result of a single [`VirtualMachine::step`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Instruction applied, PC advanced.
    Executed,
    /// `DUMP_PROCESSOR_STATE` applied, PC advanced.
    Dumped(RegisterDump),
    /// Current instruction is `MIGRATE`; nothing executed, PC unchanged.
    MigrationRequested(Ipv4Addr),
    /// PC is past the last instruction.
    Finished,
}

/// Why [`VirtualMachine::run_slice`] returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SliceStop {
    /// Slice budget used up, more instructions remain.
    SliceExhausted,
    /// PC reached the end of the program.
    Finished,
    /// Halted in front of a `MIGRATE` instruction.
    MigrationRequested(Ipv4Addr),
}

impl fmt::Display for SliceStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceStop::SliceExhausted => f.write_str("slice exhausted"),
            SliceStop::Finished => f.write_str("finished"),
            SliceStop::MigrationRequested(target) => write!(f, "migration to {target}"),
        }
    }
}

/// Summary of one execution slice.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SliceReport {
    /// Instructions executed in this slice.
    pub executed: usize,
    pub stop: SliceStop,
    /// Register dumps requested by `DUMP_PROCESSOR_STATE`, in order.
    pub dumps: Vec<RegisterDump>,
}

/// A single virtual CPU.
pub struct VirtualMachine {
    /// Display name used in logs and dumps.
    name: String,
    registers: RegisterFile,
    pc: usize,
    program: Program,
    loaded: bool,
    /// Maximum instructions per slice.
    slice: usize,
    opcode_case: OpcodeCase,
    role: VmRole,
}

impl VirtualMachine {
    /// Creates a VM with zeroed registers, PC 0 and no program.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registers: RegisterFile::new(),
            pc: 0,
            program: Program::default(),
            loaded: false,
            slice: DEFAULT_SLICE,
            opcode_case: OpcodeCase::default(),
            role: VmRole::default(),
        }
    }

    pub fn with_opcode_case(mut self, case: OpcodeCase) -> Self {
        self.opcode_case = case;
        self
    }

    pub fn with_role(mut self, role: VmRole) -> Self {
        self.role = role;
        self
    }

    /// Sets the maximum number of instructions run per slice.
    pub fn configure(&mut self, slice: usize) -> Result<(), VMError> {
        if slice == 0 {
            return Err(VMError::InvalidSlice);
        }
        self.slice = slice;
        Ok(())
    }

    /// Installs the instruction sequence. Only the first call succeeds.
    pub fn load(&mut self, program: Program) -> Result<(), VMError> {
        if self.loaded {
            return Err(VMError::ProgramAlreadyLoaded);
        }
        self.program = program;
        self.loaded = true;
        Ok(())
    }

    /// Reads and installs a program file.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), VMError> {
        if self.loaded {
            return Err(VMError::ProgramAlreadyLoaded);
        }
        self.load(Program::from_file(path)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn slice(&self) -> usize {
        self.slice
    }

    pub fn role(&self) -> VmRole {
        self.role
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn program_len(&self) -> usize {
        self.program.len()
    }

    /// True once the PC has run past the last instruction.
    pub fn is_finished(&self) -> bool {
        self.pc >= self.program.len()
    }

    /// Snapshot of all registers in index order.
    pub fn dump_state(&self) -> RegisterDump {
        RegisterDump {
            vm_name: self.name.clone(),
            pc: self.pc,
            registers: self.registers,
        }
    }

    /// Current transferable state.
    pub fn state(&self) -> VmState {
        VmState {
            registers: self.registers,
            pc: self.pc,
        }
    }

    /// Replaces registers and PC wholesale.
    pub fn restore(&mut self, state: VmState) {
        self.registers = state.registers;
        self.pc = state.pc;
    }

    /// Installs state received from a migration source.
    ///
    /// The source halted in front of its `MIGRATE` instruction, so execution
    /// continues with the instruction after it.
    pub fn resume_after_migration(&mut self, state: VmState) {
        self.registers = state.registers;
        self.pc = state.pc.saturating_add(1);
    }

    /// Installs registers from a snapshot. Snapshots carry no PC, so the VM
    /// restarts from the first instruction.
    pub fn restore_registers(&mut self, registers: RegisterFile) {
        self.registers = registers;
        self.pc = 0;
    }

    /// Decodes and applies the instruction at the PC.
    pub fn step(&mut self) -> Result<Step, VMError> {
        let Some(line) = self.program.line(self.pc) else {
            return Ok(Step::Finished);
        };
        let instruction = decode(line, self.opcode_case).map_err(|source| VMError::Decode {
            pc: self.pc,
            line: line.to_string(),
            source,
        })?;

        if let Instruction::Migrate { target } = instruction {
            if self.role == VmRole::Source {
                return Ok(Step::MigrationRequested(target));
            }
            warn!(
                "{}: ignoring MIGRATE {} at pc {} on destination",
                self.name, target, self.pc
            );
        }

        let step = self.exec(instruction);
        self.pc += 1;
        Ok(step)
    }

    /// Runs up to one slice of instructions.
    ///
    /// Stops early at the end of the program or in front of a `MIGRATE`.
    /// A decode failure aborts the slice; instructions already executed keep
    /// their effects.
    pub fn run_slice(&mut self) -> Result<SliceReport, VMError> {
        let mut report = SliceReport {
            executed: 0,
            stop: SliceStop::SliceExhausted,
            dumps: Vec::new(),
        };

        while report.executed < self.slice {
            match self.step()? {
                Step::Executed => report.executed += 1,
                Step::Dumped(dump) => {
                    report.executed += 1;
                    report.dumps.push(dump);
                }
                Step::MigrationRequested(target) => {
                    report.stop = SliceStop::MigrationRequested(target);
                    return Ok(report);
                }
                Step::Finished => {
                    report.stop = SliceStop::Finished;
                    return Ok(report);
                }
            }
        }

        if self.is_finished() {
            report.stop = SliceStop::Finished;
        }
        Ok(report)
    }

    /// Applies one decoded instruction. PC handling is left to the caller.
    fn exec(&mut self, instruction: Instruction) -> Step {
        debug!("{} pc {}: {}", self.name, self.pc, instruction);
        let regs = &mut self.registers;
        match instruction {
            Instruction::Nop | Instruction::Migrate { .. } => {}
            Instruction::LoadImm { rd, imm } => regs.set(rd, imm),
            Instruction::Register { op, rd, rs, rt } => {
                regs.set(rd, op.apply(regs.get(rs), regs.get(rt)))
            }
            Instruction::AddImm { rd, rs, imm } => regs.set(rd, regs.get(rs).wrapping_add(imm)),
            Instruction::OrImm { rd, rs, imm } => regs.set(rd, regs.get(rs) | imm),
            Instruction::ShiftLeft { rd, rt, shamt } => {
                regs.set(rd, regs.get(rt).wrapping_shl(shamt))
            }
            Instruction::ShiftRightLogical { rd, rt, shamt } => {
                regs.set(rd, ((regs.get(rt) as u32) >> shamt) as i32)
            }
            Instruction::DumpState => return Step::Dumped(self.dump_state()),
            Instruction::Snapshot { path } => match snapshot_store::save(&path, regs) {
                Ok(()) => info!(
                    "{}: snapshot written to {} at pc {}",
                    self.name,
                    path.display(),
                    self.pc
                ),
                Err(e) => warn!("{}: continuing without snapshot: {e}", self.name),
            },
        }
        Step::Executed
    }
}
