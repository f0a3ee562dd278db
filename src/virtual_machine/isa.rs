//! Instruction set definitions.
//!
//! The [`for_each_register_op!`](crate::for_each_register_op) macro holds the
//! canonical list of three-register ALU operations and invokes a callback macro
//! for code generation, so the decoder and the engine share one definition.
//!
//! This module generates:
//! - The [`RegisterOp`] enum with mnemonics and wrapping semantics
//!
//! The remaining forms (`li`, `addi`, `or` with an immediate, shifts and the
//! uppercase control instructions) have distinct operand shapes and are listed
//! directly in [`Instruction`].

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Index of a register in the 32-entry register file.
pub type Reg = u8;

/// Invokes a callback macro with the three-register operation list.
#[macro_export]
macro_rules! for_each_register_op {
    ($callback:ident) => {
        $callback! {
            /// add rd, rs, rt ; rd = rs + rt
            Add, "add" => |a: i32, b: i32| a.wrapping_add(b),
            /// sub rd, rs, rt ; rd = rs - rt
            Sub, "sub" => |a: i32, b: i32| a.wrapping_sub(b),
            /// mul rd, rs, rt ; rd = rs * rt
            Mul, "mul" => |a: i32, b: i32| a.wrapping_mul(b),
            /// and rd, rs, rt ; rd = rs & rt
            And, "and" => |a: i32, b: i32| a & b,
            /// or rd, rs, rt ; rd = rs | rt
            Or, "or" => |a: i32, b: i32| a | b,
            /// xor rd, rs, rt ; rd = rs ^ rt
            Xor, "xor" => |a: i32, b: i32| a ^ b,
        }
    };
}

#[macro_export]
macro_rules! define_register_ops {
    (
        $(
            $(#[$doc:meta])*
            $name:ident, $mnemonic:literal => $apply:expr
        ),* $(,)?
    ) => {
        /// Operation of the `op rd, rs, rt` instruction family.
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum RegisterOp {
            $(
                $(#[$doc])*
                $name,
            )*
        }

        impl RegisterOp {
            /// All operations, in definition order.
            pub const ALL: &'static [RegisterOp] = &[$(RegisterOp::$name),*];

            /// Returns the assembly mnemonic for this operation.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( RegisterOp::$name => $mnemonic, )*
                }
            }

            /// Looks up an operation by its exact mnemonic.
            pub fn from_mnemonic(name: &str) -> Option<RegisterOp> {
                match name {
                    $( $mnemonic => Some(RegisterOp::$name), )*
                    _ => None,
                }
            }

            /// Applies the operation with two's-complement wraparound.
            pub fn apply(&self, a: i32, b: i32) -> i32 {
                match self {
                    $( RegisterOp::$name => ($apply)(a, b), )*
                }
            }
        }
    };
}

for_each_register_op!(define_register_ops);

/// A decoded instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
    /// Blank or comment-only line; occupies a PC slot.
    Nop,
    /// li rd, imm ; rd = imm
    LoadImm { rd: Reg, imm: i32 },
    /// op rd, rs, rt ; rd = rs op rt
    Register {
        op: RegisterOp,
        rd: Reg,
        rs: Reg,
        rt: Reg,
    },
    /// addi rd, rs, imm ; rd = rs + imm
    AddImm { rd: Reg, rs: Reg, imm: i32 },
    /// or rd, rs, imm ; rd = rs | imm
    OrImm { rd: Reg, rs: Reg, imm: i32 },
    /// sll rd, rt, n ; rd = rt << n
    ShiftLeft { rd: Reg, rt: Reg, shamt: u32 },
    /// srl rd, rt, n ; rd = rt >> n (logical)
    ShiftRightLogical { rd: Reg, rt: Reg, shamt: u32 },
    /// DUMP_PROCESSOR_STATE ; report all registers
    DumpState,
    /// MIGRATE a.b.c.d ; hand the VM over to the host at that address
    Migrate { target: Ipv4Addr },
    /// SNAPSHOT path ; persist the register file
    Snapshot { path: PathBuf },
}

impl Instruction {
    /// Returns the assembly mnemonic, or `""` for [`Instruction::Nop`].
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "",
            Instruction::LoadImm { .. } => "li",
            Instruction::Register { op, .. } => op.mnemonic(),
            Instruction::AddImm { .. } => "addi",
            Instruction::OrImm { .. } => "or",
            Instruction::ShiftLeft { .. } => "sll",
            Instruction::ShiftRightLogical { .. } => "srl",
            Instruction::DumpState => "DUMP_PROCESSOR_STATE",
            Instruction::Migrate { .. } => "MIGRATE",
            Instruction::Snapshot { .. } => "SNAPSHOT",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic();
        match self {
            Instruction::Nop => Ok(()),
            Instruction::LoadImm { rd, imm } => write!(f, "{m} ${rd}, {imm}"),
            Instruction::Register { rd, rs, rt, .. } => write!(f, "{m} ${rd}, ${rs}, ${rt}"),
            Instruction::AddImm { rd, rs, imm } | Instruction::OrImm { rd, rs, imm } => {
                write!(f, "{m} ${rd}, ${rs}, {imm}")
            }
            Instruction::ShiftLeft { rd, rt, shamt }
            | Instruction::ShiftRightLogical { rd, rt, shamt } => {
                write!(f, "{m} ${rd}, ${rt}, {shamt}")
            }
            Instruction::DumpState => f.write_str(m),
            Instruction::Migrate { target } => write!(f, "{m} {target}"),
            Instruction::Snapshot { path } => write!(f, "{m} {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_op_mnemonics_round_trip() {
        for op in RegisterOp::ALL {
            assert_eq!(RegisterOp::from_mnemonic(op.mnemonic()), Some(*op));
        }
        assert_eq!(RegisterOp::from_mnemonic("ADD"), None);
        assert_eq!(RegisterOp::from_mnemonic("addi"), None);
    }

    #[test]
    fn register_op_wraps() {
        assert_eq!(RegisterOp::Add.apply(i32::MAX, 1), i32::MIN);
        assert_eq!(RegisterOp::Sub.apply(i32::MIN, 1), i32::MAX);
        assert_eq!(RegisterOp::Mul.apply(0x4000_0000, 4), 0);
    }

    #[test]
    fn register_op_bitwise() {
        assert_eq!(RegisterOp::And.apply(0b1100, 0b1010), 0b1000);
        assert_eq!(RegisterOp::Or.apply(0b1100, 0b1010), 0b1110);
        assert_eq!(RegisterOp::Xor.apply(0b1100, 0b1010), 0b0110);
    }

    #[test]
    fn display_matches_source_syntax() {
        let instr = Instruction::Register {
            op: RegisterOp::Sub,
            rd: 2,
            rs: 3,
            rt: 4,
        };
        assert_eq!(instr.to_string(), "sub $2, $3, $4");
        let instr = Instruction::Migrate {
            target: Ipv4Addr::LOCALHOST,
        };
        assert_eq!(instr.to_string(), "MIGRATE 127.0.0.1");
    }
}
