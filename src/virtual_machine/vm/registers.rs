use crate::virtual_machine::isa::Reg;
use std::fmt;

/// Number of addressable registers.
pub const REGISTER_COUNT: usize = 32;

/// Register file holding VM state.
///
/// Provides 32 `i32` registers `$0`..`$31`, all zero at construction.
/// `$0` is an ordinary register; writes to it stick.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RegisterFile {
    regs: [i32; REGISTER_COUNT],
}

impl RegisterFile {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a register file from raw values in index order.
    pub fn from_array(regs: [i32; REGISTER_COUNT]) -> Self {
        Self { regs }
    }

    /// Returns the value in register `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= REGISTER_COUNT`. Indices produced by the decoder are
    /// always in range.
    pub fn get(&self, idx: Reg) -> i32 {
        self.regs[idx as usize]
    }

    /// Stores `value` into register `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= REGISTER_COUNT`.
    pub fn set(&mut self, idx: Reg, value: i32) {
        self.regs[idx as usize] = value;
    }

    /// Raw values in index order.
    pub fn as_array(&self) -> &[i32; REGISTER_COUNT] {
        &self.regs
    }

    /// Canonical name of register `idx` (`$0`..`$31`).
    pub fn name(idx: usize) -> String {
        format!("${idx}")
    }

    /// Resolves a canonical register name to its index.
    pub fn index_of(name: &str) -> Option<usize> {
        let digits = name.strip_prefix('$')?;
        if digits.is_empty() || digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<usize>().ok().filter(|&i| i < REGISTER_COUNT)
    }

    /// Register names and values ordered by the byte-wise order of the name
    /// (`$0`, `$1`, `$10`, ..., `$19`, `$2`, `$20`, ...).
    pub fn lexicographic(&self) -> Vec<(String, i32)> {
        let mut named: Vec<(String, i32)> = self
            .regs
            .iter()
            .enumerate()
            .map(|(i, v)| (Self::name(i), *v))
            .collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        named
    }
}

/// Point-in-time report of all registers of one VM, in index order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterDump {
    /// Name of the VM the dump was taken from.
    pub vm_name: String,
    /// Program counter at the time of the dump.
    pub pc: usize,
    /// Register values in index order.
    pub registers: RegisterFile,
}

impl RegisterDump {
    /// Value of register `idx` in this dump.
    ///
    /// # Panics
    /// Panics if `idx >= REGISTER_COUNT`.
    pub fn get(&self, idx: Reg) -> i32 {
        self.registers.get(idx)
    }
}

impl fmt::Display for RegisterDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Register values for {} (pc {})", self.vm_name, self.pc)?;
        for (i, v) in self.registers.as_array().iter().enumerate() {
            writeln!(f, "R{i}: {v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_register_is_writable() {
        let mut regs = RegisterFile::new();
        regs.set(0, 42);
        assert_eq!(regs.get(0), 42);
    }

    #[test]
    fn last_register_is_addressable() {
        let mut regs = RegisterFile::new();
        regs.set((REGISTER_COUNT - 1) as Reg, -5);
        assert_eq!(regs.get(31), -5);
    }

    #[test]
    #[should_panic]
    fn get_out_of_range_panics() {
        RegisterFile::new().get(REGISTER_COUNT as Reg);
    }

    #[test]
    #[should_panic]
    fn set_out_of_range_panics() {
        RegisterFile::new().set(REGISTER_COUNT as Reg, 1);
    }

    #[test]
    fn index_of_canonical_names() {
        assert_eq!(RegisterFile::index_of("$0"), Some(0));
        assert_eq!(RegisterFile::index_of("$31"), Some(31));
        assert_eq!(RegisterFile::index_of("$32"), None);
        assert_eq!(RegisterFile::index_of("$01"), None);
        assert_eq!(RegisterFile::index_of("$R0"), None);
        assert_eq!(RegisterFile::index_of("7"), None);
    }

    #[test]
    fn lexicographic_order_is_by_name_bytes() {
        let regs = RegisterFile::new();
        let names: Vec<String> = regs.lexicographic().into_iter().map(|(n, _)| n).collect();
        assert_eq!(&names[..4], ["$0", "$1", "$10", "$11"]);
        assert_eq!(names[11], "$19");
        assert_eq!(names[12], "$2");
        assert_eq!(names[13], "$20");
        assert_eq!(names.last().map(String::as_str), Some("$9"));
        assert_eq!(names.len(), REGISTER_COUNT);
    }

    #[test]
    fn dump_lists_all_registers_in_index_order() {
        let mut regs = RegisterFile::new();
        regs.set(3, 30);
        let dump = RegisterDump {
            vm_name: "vm".into(),
            pc: 4,
            registers: regs,
        };
        let text = dump.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), REGISTER_COUNT + 1);
        assert_eq!(lines[1], "R0: 0");
        assert_eq!(lines[4], "R3: 30");
        assert_eq!(lines[32], "R31: 0");
        assert_eq!(dump.get(3), 30);
    }
}
