//! Instruction line decoder.
//!
//! Converts one line of assembly text into an [`Instruction`].
//!
//! # Syntax
//!
//! ```text
//! mnemonic operand1, operand2, ...  # optional comment
//! ```
//!
//! - Arithmetic mnemonics are lowercase (`li`, `add`, `srl`, ...)
//! - Control mnemonics are uppercase (`DUMP_PROCESSOR_STATE`, `MIGRATE`, `SNAPSHOT`)
//! - Registers use the `$` prefix (`$0` .. `$31`, no leading zeros)
//! - Immediates are decimal `i32` literals (e.g. `42`, `-1`)
//! - Blank lines and `#` comments decode to [`Instruction::Nop`]
//!
//! Whether mnemonics must match that spelling exactly is controlled by
//! [`OpcodeCase`], which is part of every VM's configuration.

use crate::virtual_machine::errors::DecodeError;
use crate::virtual_machine::isa::{Instruction, Reg, RegisterOp};
use crate::virtual_machine::vm::registers::RegisterFile;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;

const COMMENT_CHAR: char = '#';
const REGISTER_PREFIX: char = '$';

const MNEMONICS: &[&str] = &[
    "li",
    "add",
    "addi",
    "sub",
    "mul",
    "and",
    "or",
    "xor",
    "sll",
    "srl",
    "DUMP_PROCESSOR_STATE",
    "MIGRATE",
    "SNAPSHOT",
];

/// How mnemonics are matched against the instruction table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OpcodeCase {
    /// Mnemonics must be spelled exactly as listed (lowercase arithmetic,
    /// uppercase control instructions).
    #[default]
    Exact,
    /// Mnemonics match regardless of ASCII case.
    Insensitive,
}

impl FromStr for OpcodeCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(OpcodeCase::Exact),
            "insensitive" => Ok(OpcodeCase::Insensitive),
            other => Err(format!(
                "unknown opcode case '{other}' (expected 'exact' or 'insensitive')"
            )),
        }
    }
}

/// Resolve a raw mnemonic to its canonical spelling under `case`.
fn canonical_mnemonic(raw: &str, case: OpcodeCase) -> Option<&'static str> {
    MNEMONICS.iter().copied().find(|m| match case {
        OpcodeCase::Exact => *m == raw,
        OpcodeCase::Insensitive => m.eq_ignore_ascii_case(raw),
    })
}

/// Parse a register token like `$0`, `$31`.
pub(crate) fn parse_reg(tok: &str) -> Result<Reg, DecodeError> {
    if !tok.starts_with(REGISTER_PREFIX) {
        return Err(DecodeError::ExpectedRegister(tok.to_string()));
    }
    RegisterFile::index_of(tok)
        .map(|idx| idx as Reg)
        .ok_or_else(|| DecodeError::InvalidRegister(tok.to_string()))
}

/// Parse a decimal i32 immediate (optional leading `-`, no `+`).
pub(crate) fn parse_imm(tok: &str) -> Result<i32, DecodeError> {
    let digits = tok.strip_prefix('-').unwrap_or(tok);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidImmediate(tok.to_string()));
    }
    tok.parse::<i32>()
        .map_err(|_| DecodeError::InvalidImmediate(tok.to_string()))
}

/// Parse a shift amount in `0..=31`.
pub(crate) fn parse_shift(tok: &str) -> Result<u32, DecodeError> {
    if tok.is_empty() || !tok.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidShift(tok.to_string()));
    }
    match tok.parse::<u32>() {
        Ok(n) if n < i32::BITS => Ok(n),
        _ => Err(DecodeError::InvalidShift(tok.to_string())),
    }
}

/// Split a comma-separated operand list.
///
/// Empty input yields no operands; an empty operand or one containing
/// whitespace is rejected.
fn split_operands(rest: &str) -> Result<Vec<&str>, DecodeError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let ops: Vec<&str> = rest.split(',').map(str::trim).collect();
    if ops
        .iter()
        .any(|op| op.is_empty() || op.contains(char::is_whitespace))
    {
        return Err(DecodeError::MalformedOperands(rest.to_string()));
    }
    Ok(ops)
}

fn expect_arity<'a, const N: usize>(
    instruction: &'static str,
    ops: &[&'a str],
) -> Result<[&'a str; N], DecodeError> {
    <[&str; N]>::try_from(ops).map_err(|_| DecodeError::ArityMismatch {
        instruction,
        expected: N,
        actual: ops.len(),
    })
}

/// Decode one instruction line.
///
/// Never returns a partially parsed instruction: every operand of the
/// matched form must be present and valid, and nothing may follow it.
pub fn decode(line: &str, case: OpcodeCase) -> Result<Instruction, DecodeError> {
    let code = match line.find(COMMENT_CHAR) {
        Some(idx) => &line[..idx],
        None => line,
    }
    .trim();
    if code.is_empty() {
        return Ok(Instruction::Nop);
    }

    let split = code
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '_'))
        .unwrap_or(code.len());
    let (raw, rest) = code.split_at(split);
    if raw.is_empty() || !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        let token = code.split_whitespace().next().unwrap_or(code);
        return Err(DecodeError::UnknownInstruction(token.to_string()));
    }
    let mnemonic = canonical_mnemonic(raw, case)
        .ok_or_else(|| DecodeError::UnknownInstruction(raw.to_string()))?;

    match mnemonic {
        "SNAPSHOT" => {
            let path = rest.trim();
            if path.is_empty() {
                return Err(DecodeError::MissingPath);
            }
            Ok(Instruction::Snapshot {
                path: PathBuf::from(path),
            })
        }
        "DUMP_PROCESSOR_STATE" => {
            let ops = split_operands(rest)?;
            expect_arity::<0>(mnemonic, &ops)?;
            Ok(Instruction::DumpState)
        }
        "MIGRATE" => {
            let ops = split_operands(rest)?;
            let [addr] = expect_arity::<1>(mnemonic, &ops)?;
            let target = addr
                .parse::<Ipv4Addr>()
                .map_err(|_| DecodeError::InvalidAddress(addr.to_string()))?;
            Ok(Instruction::Migrate { target })
        }
        "li" => {
            let ops = split_operands(rest)?;
            let [rd, imm] = expect_arity::<2>(mnemonic, &ops)?;
            Ok(Instruction::LoadImm {
                rd: parse_reg(rd)?,
                imm: parse_imm(imm)?,
            })
        }
        "addi" => {
            let ops = split_operands(rest)?;
            let [rd, rs, imm] = expect_arity::<3>(mnemonic, &ops)?;
            Ok(Instruction::AddImm {
                rd: parse_reg(rd)?,
                rs: parse_reg(rs)?,
                imm: parse_imm(imm)?,
            })
        }
        "sll" | "srl" => {
            let ops = split_operands(rest)?;
            let [rd, rt, n] = expect_arity::<3>(mnemonic, &ops)?;
            let (rd, rt, shamt) = (parse_reg(rd)?, parse_reg(rt)?, parse_shift(n)?);
            Ok(if mnemonic == "sll" {
                Instruction::ShiftLeft { rd, rt, shamt }
            } else {
                Instruction::ShiftRightLogical { rd, rt, shamt }
            })
        }
        "or" => {
            let ops = split_operands(rest)?;
            let [rd, rs, third] = expect_arity::<3>(mnemonic, &ops)?;
            let (rd, rs) = (parse_reg(rd)?, parse_reg(rs)?);
            // Operand kind is decided by its lexical form.
            if third.starts_with(REGISTER_PREFIX) {
                Ok(Instruction::Register {
                    op: RegisterOp::Or,
                    rd,
                    rs,
                    rt: parse_reg(third)?,
                })
            } else {
                Ok(Instruction::OrImm {
                    rd,
                    rs,
                    imm: parse_imm(third)?,
                })
            }
        }
        other => {
            let op = RegisterOp::from_mnemonic(other)
                .ok_or_else(|| DecodeError::UnknownInstruction(raw.to_string()))?;
            let ops = split_operands(rest)?;
            let [rd, rs, rt] = expect_arity::<3>(op.mnemonic(), &ops)?;
            Ok(Instruction::Register {
                op,
                rd: parse_reg(rd)?,
                rs: parse_reg(rs)?,
                rt: parse_reg(rt)?,
            })
        }
    }
}
