//! Per-VM configuration files.
//!
//! ```text
//! # comment
//! vm_exec_slice_in_instructions=4
//! vm_binary=programs/counter.asm
//! vm_opcode_case=insensitive
//! ```

use crate::virtual_machine::decoder::OpcodeCase;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::{VirtualMachine, VmRole};
use crate::warn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const KEY_SLICE: &str = "vm_exec_slice_in_instructions";
pub const KEY_BINARY: &str = "vm_binary";
pub const KEY_OPCODE_CASE: &str = "vm_opcode_case";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: expected key=value, got {text:?}")]
    Syntax { line: usize, text: String },
    #[error("missing required key {0}")]
    MissingKey(&'static str),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Settings for one VM.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VmConfig {
    /// Instructions per slice, always at least 1.
    pub slice: usize,
    /// Program file, resolved against the working directory when relative.
    pub binary: PathBuf,
    pub opcode_case: OpcodeCase,
}

impl VmConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses `key=value` lines. The last occurrence of a key wins.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut slice = None;
        let mut binary = None;
        let mut opcode_case = OpcodeCase::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax {
                    line: idx + 1,
                    text: line.to_string(),
                });
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                KEY_SLICE => {
                    let n = value
                        .parse::<usize>()
                        .ok()
                        .filter(|&n| n > 0)
                        .ok_or_else(|| ConfigError::InvalidValue {
                            key: KEY_SLICE,
                            value: value.to_string(),
                        })?;
                    slice = Some(n);
                }
                KEY_BINARY => {
                    if value.is_empty() {
                        return Err(ConfigError::InvalidValue {
                            key: KEY_BINARY,
                            value: String::new(),
                        });
                    }
                    binary = Some(PathBuf::from(value));
                }
                KEY_OPCODE_CASE => {
                    opcode_case = value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: KEY_OPCODE_CASE,
                        value: value.to_string(),
                    })?;
                }
                other => warn!("Ignoring unknown config key {other:?} on line {}", idx + 1),
            }
        }

        Ok(Self {
            slice: slice.ok_or(ConfigError::MissingKey(KEY_SLICE))?,
            binary: binary.ok_or(ConfigError::MissingKey(KEY_BINARY))?,
            opcode_case,
        })
    }

    /// Creates a VM with this slice size and opcode case and loads its program.
    pub fn build_vm(
        &self,
        name: impl Into<String>,
        role: VmRole,
    ) -> Result<VirtualMachine, VMError> {
        let mut vm = VirtualMachine::new(name)
            .with_opcode_case(self.opcode_case)
            .with_role(role);
        vm.configure(self.slice)?;
        vm.load_file(&self.binary)?;
        Ok(vm)
    }
}
