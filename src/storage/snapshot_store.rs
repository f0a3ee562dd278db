//! File-backed register snapshots.
//!
//! A snapshot file holds exactly one
//! [`SNAPSHOT_BLOCK_LEN`](crate::virtual_machine::state::SNAPSHOT_BLOCK_LEN)-byte block (see
//! [`state`](crate::virtual_machine::state)). The PC is not stored, so a VM
//! restored from a snapshot restarts at PC 0.

use crate::virtual_machine::state::{FormatError, decode_snapshot, encode_snapshot};
use crate::virtual_machine::vm::registers::RegisterFile;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading or writing a snapshot file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed snapshot {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

/// Outcome of loading a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SnapshotLoad {
    /// File absent or empty: nothing to restore, defaults stand.
    ColdStart,
    /// Registers read from a complete block.
    Restored(RegisterFile),
}

/// Writes the register block to `path`, replacing any previous contents.
pub fn save<P: AsRef<Path>>(path: P, registers: &RegisterFile) -> Result<(), StoreError> {
    let path = path.as_ref();
    fs::write(path, encode_snapshot(registers)).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a snapshot from `path`.
///
/// A missing or empty file is a cold start. A file of any size other than
/// one block is rejected rather than partially applied.
pub fn load<P: AsRef<Path>>(path: P) -> Result<SnapshotLoad, StoreError> {
    let path = path.as_ref();
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SnapshotLoad::ColdStart),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if data.is_empty() {
        return Ok(SnapshotLoad::ColdStart);
    }
    decode_snapshot(&data)
        .map(SnapshotLoad::Restored)
        .map_err(|source| StoreError::Format {
            path: path.to_path_buf(),
            source,
        })
}
