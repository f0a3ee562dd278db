//! VM state and its binary encodings.
//!
//! # Migration buffer
//!
//! All integers are big-endian (network byte order):
//!
//! ```text
//! [pc: i32]
//! repeated until end of buffer:
//!   [name_len: i32][name: name_len ASCII bytes][value: i32]
//! ```
//!
//! Entries are written in ascending byte-wise order of the register name, so
//! `$1` precedes `$10` which precedes `$2`. The decoder accepts any order,
//! rejects unknown and duplicate names, and leaves missing registers at zero.
//!
//! # Snapshot block
//!
//! Exactly 32 little-endian `i32`s, register index 0..31, no header. The PC is
//! not part of the block: a VM restored from a snapshot always restarts at
//! PC 0.

use crate::virtual_machine::vm::registers::{REGISTER_COUNT, RegisterFile};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size in bytes of one snapshot block.
pub const SNAPSHOT_BLOCK_LEN: usize = REGISTER_COUNT * 4;

const MAX_NAME_LEN: usize = 16;

/// Malformed migration buffer or snapshot block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Input ended before a field was complete.
    #[error("truncated {field}: needed {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    /// Encoded PC is negative.
    #[error("negative program counter {0}")]
    NegativePc(i32),
    /// Register name length is negative or implausibly large.
    #[error("invalid register name length {0}")]
    InvalidNameLength(i32),
    /// Register name is not one of `$0`..`$31`.
    #[error("unknown register name {0:?}")]
    UnknownRegister(String),
    /// Register appears more than once.
    #[error("duplicate register {0}")]
    DuplicateRegister(String),
    /// Snapshot file is not exactly one block long.
    #[error("snapshot block must be {expected} bytes, got {actual}")]
    SnapshotSize { expected: usize, actual: usize },
    /// PC does not fit the 32-bit wire field.
    #[error("program counter {0} does not fit in 32 bits")]
    PcOverflow(usize),
}

/// The unit of state transfer: register file plus program counter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VmState {
    pub registers: RegisterFile,
    pub pc: usize,
}

fn take<'a>(
    input: &mut &'a [u8],
    n: usize,
    field: &'static str,
) -> Result<&'a [u8], FormatError> {
    if input.remaining() < n {
        return Err(FormatError::Truncated {
            field,
            needed: n,
            available: input.remaining(),
        });
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

fn take_i32(input: &mut &[u8], field: &'static str) -> Result<i32, FormatError> {
    let mut raw = take(input, 4, field)?;
    Ok(raw.get_i32())
}

impl VmState {
    /// Encodes the state as a migration buffer.
    pub fn to_migration_bytes(&self) -> Result<Bytes, FormatError> {
        let pc = i32::try_from(self.pc).map_err(|_| FormatError::PcOverflow(self.pc))?;
        let named = self.registers.lexicographic();
        let len = 4 + named.iter().map(|(n, _)| 8 + n.len()).sum::<usize>();

        let mut out = BytesMut::with_capacity(len);
        out.put_i32(pc);
        for (name, value) in named {
            out.put_i32(name.len() as i32);
            out.put_slice(name.as_bytes());
            out.put_i32(value);
        }
        Ok(out.freeze())
    }

    /// Decodes a migration buffer.
    pub fn from_migration_bytes(data: &[u8]) -> Result<Self, FormatError> {
        let mut input = data;
        let pc = take_i32(&mut input, "program counter")?;
        let pc = usize::try_from(pc).map_err(|_| FormatError::NegativePc(pc))?;

        let mut registers = RegisterFile::new();
        let mut seen = [false; REGISTER_COUNT];
        while input.has_remaining() {
            let name_len = take_i32(&mut input, "register name length")?;
            let len = usize::try_from(name_len)
                .ok()
                .filter(|&l| l <= MAX_NAME_LEN)
                .ok_or(FormatError::InvalidNameLength(name_len))?;
            let raw = take(&mut input, len, "register name")?;
            let name = String::from_utf8_lossy(raw).into_owned();
            let idx = RegisterFile::index_of(&name)
                .ok_or_else(|| FormatError::UnknownRegister(name.clone()))?;
            if seen[idx] {
                return Err(FormatError::DuplicateRegister(name));
            }
            seen[idx] = true;
            let value = take_i32(&mut input, "register value")?;
            registers.set(idx as u8, value);
        }

        Ok(Self { registers, pc })
    }
}

/// Encodes the register file as a snapshot block.
pub fn encode_snapshot(registers: &RegisterFile) -> [u8; SNAPSHOT_BLOCK_LEN] {
    let mut block = [0u8; SNAPSHOT_BLOCK_LEN];
    for (chunk, value) in block.chunks_exact_mut(4).zip(registers.as_array()) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    block
}

/// Decodes a snapshot block. The input must be exactly one block long.
pub fn decode_snapshot(data: &[u8]) -> Result<RegisterFile, FormatError> {
    if data.len() != SNAPSHOT_BLOCK_LEN {
        return Err(FormatError::SnapshotSize {
            expected: SNAPSHOT_BLOCK_LEN,
            actual: data.len(),
        });
    }
    let mut regs = [0i32; REGISTER_COUNT];
    let mut input = data;
    for slot in regs.iter_mut() {
        *slot = input.get_i32_le();
    }
    Ok(RegisterFile::from_array(regs))
}
