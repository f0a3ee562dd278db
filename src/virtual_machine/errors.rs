use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while turning one instruction line into an [`Instruction`](super::isa::Instruction).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Line does not start with a known mnemonic.
    #[error("unknown instruction '{0}'")]
    UnknownInstruction(String),
    /// Wrong number of operands for the mnemonic.
    #[error("{instruction} expects {expected} operand(s), got {actual}")]
    ArityMismatch {
        instruction: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Expected a register operand (e.g. `$3`) but got something else.
    #[error("expected register, got '{0}'")]
    ExpectedRegister(String),
    /// Register token is malformed or outside `$0`..`$31`.
    #[error("invalid register '{0}'")]
    InvalidRegister(String),
    /// Immediate is not a decimal 32-bit integer.
    #[error("invalid immediate '{0}'")]
    InvalidImmediate(String),
    /// Shift amount is not in `0..=31`.
    #[error("shift amount '{0}' out of range 0..=31")]
    InvalidShift(String),
    /// `MIGRATE` target is not a dotted IPv4 address.
    #[error("invalid migration address '{0}'")]
    InvalidAddress(String),
    /// `SNAPSHOT` without a path.
    #[error("SNAPSHOT requires a path")]
    MissingPath,
    /// Operand list is syntactically broken (empty operand, stray comma).
    #[error("malformed operand list '{0}'")]
    MalformedOperands(String),
}

/// Errors that abort a VM run or prevent it from starting.
#[derive(Debug, Error)]
pub enum VMError {
    /// Instruction at `pc` could not be decoded.
    #[error("pc {pc}: {source} (in '{line}')")]
    Decode {
        pc: usize,
        line: String,
        #[source]
        source: DecodeError,
    },
    /// Slice size of zero never makes progress.
    #[error("execution slice must be at least one instruction")]
    InvalidSlice,
    /// Program file does not exist or cannot be opened.
    #[error("program not found: {}", path.display())]
    ProgramNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Program file exists but could not be read.
    #[error("io error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Instruction sequence is installed once per VM.
    #[error("program already loaded")]
    ProgramAlreadyLoaded,
}
