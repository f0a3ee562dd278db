//! Register-machine virtual CPU.
//!
//! A VM executes a program of text instructions line by line. Lines are
//! decoded on the fly, so a malformed line only fails when the PC reaches it.
//!
//! # Architecture
//!
//! - **Registers**: 32 general-purpose `i32` registers `$0`..`$31`, all writable
//! - **Arithmetic**: Two's-complement with wraparound on overflow
//! - **Control**: `DUMP_PROCESSOR_STATE`, `MIGRATE <ipv4>` and `SNAPSHOT <path>`
//! - **Execution model**: Bounded slices of instructions driven by a scheduler
//!
//! # Modules
//!
//! - [`decoder`]: Text line to [`isa::Instruction`]
//! - [`errors`]: Decode and execution error types
//! - [`isa`]: Instruction set definition
//! - [`program`]: Immutable instruction sequence
//! - [`state`]: Transferable VM state and its binary encodings
//! - [`vm`]: Execution engine and register file

pub mod decoder;
pub mod errors;
pub mod isa;
pub mod program;
pub mod state;
pub mod vm;
