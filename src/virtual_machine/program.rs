use crate::virtual_machine::errors::VMError;
use std::fs;
use std::io;
use std::path::Path;

/// Ordered instruction lines of one VM.
///
/// Every physical line of the source is one slot, blank ones included, so a
/// PC means the same line on every host that loads the same file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
    lines: Vec<String>,
}

impl Program {
    /// Builds a program from in-memory source text.
    pub fn from_source(source: &str) -> Self {
        Self {
            lines: source
                .lines()
                .map(|l| l.trim_end_matches('\r').to_string())
                .collect(),
        }
    }

    /// Builds a program from individual lines. A trailing `\r` is dropped,
    /// as in [`Program::from_source`].
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|l| {
                    let mut line: String = l.into();
                    line.truncate(line.trim_end_matches('\r').len());
                    line
                })
                .collect(),
        }
    }

    /// Reads a program file.
    ///
    /// A missing file is [`VMError::ProgramNotFound`]; any other read failure
    /// is [`VMError::Io`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VMError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(source) => Ok(Self::from_source(&source)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(VMError::ProgramNotFound {
                path: path.to_path_buf(),
                source: e,
            }),
            Err(e) => Err(VMError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Number of instruction slots.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Raw text at `pc`, if in range.
    pub fn line(&self, pc: usize) -> Option<&str> {
        self.lines.get(pc).map(String::as_str)
    }
}
