//! Repository lock
//!
//! One sod process at a time: `.sod/lock` is created with create-exclusive
//! semantics when the repository is opened and removed when the guard drops,
//! on every exit path. A second invocation fails with a lock error instead
//! of corrupting state.

use crate::errors::SodError;
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "lock";

#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
}

impl RepoLock {
    pub fn acquire(sod_dir: &Path) -> anyhow::Result<RepoLock> {
        let path = sod_dir.join(LOCK_FILE);

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SodError::LockContention.into());
            }
            Err(source) => {
                return Err(SodError::IoFailure { path, source }.into());
            }
        };

        // the pid is informational, for whoever finds a stale lock
        let _ = writeln!(file, "{}", std::process::id());

        Ok(RepoLock { path })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to remove lock file {:?}: {}", self.path, error);
        }
    }
}
