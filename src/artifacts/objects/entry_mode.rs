//! Tree entry modes
//!
//! Sod distinguishes three modes: regular files, executable files and
//! sub-trees. Symbolic links to files are scanned as their target content and
//! therefore carry a file mode.

use is_executable::IsExecutable;
use std::path::Path;

const MODE_REGULAR: u32 = 0o100644;
const MODE_EXECUTABLE: u32 = 0o100755;
const MODE_DIRECTORY: u32 = 0o40000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EntryMode {
    #[default]
    Regular,
    Executable,
    Directory,
}

impl EntryMode {
    pub fn from_file_path(path: &Path) -> Self {
        if path.is_executable() {
            EntryMode::Executable
        } else {
            EntryMode::Regular
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::Regular => MODE_REGULAR,
            EntryMode::Executable => MODE_EXECUTABLE,
            EntryMode::Directory => MODE_DIRECTORY,
        }
    }

    pub fn try_from_u32(mode: u32) -> anyhow::Result<Self> {
        match mode {
            MODE_REGULAR => Ok(EntryMode::Regular),
            MODE_EXECUTABLE => Ok(EntryMode::Executable),
            MODE_DIRECTORY => Ok(EntryMode::Directory),
            other => Err(anyhow::anyhow!("Unknown entry mode: {:o}", other)),
        }
    }

    pub fn from_octal_str(s: &str) -> anyhow::Result<Self> {
        let mode = u32::from_str_radix(s, 8)
            .map_err(|_| anyhow::anyhow!("Invalid octal entry mode: {}", s))?;
        Self::try_from_u32(mode)
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }
}
