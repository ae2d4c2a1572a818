//! Refs
//!
//! Sod keeps a single mutable pointer: the master branch at
//! `.sod/refs/heads/master`, a text file holding one hex digest and a
//! newline. Updates write a temp file in the same directory and rename it
//! into place, which is the single linearization point of a commit: a killed
//! process leaves either the old or the new digest, never a torn file.

use crate::artifacts::objects::digest::ContentDigest;
use crate::errors::SodError;
use derive_new::new;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the only branch
pub const MASTER: &str = "master";

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the sod directory (`.sod`)
    path: Box<Path>,
}

impl Refs {
    pub fn heads_path(&self) -> PathBuf {
        self.path.join("refs").join("heads")
    }

    fn master_path(&self) -> PathBuf {
        self.heads_path().join(MASTER)
    }

    /// Read the current head commit digest, if any commit exists
    pub fn read_head(&self) -> anyhow::Result<Option<ContentDigest>> {
        let master_path = self.master_path();
        if !master_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&master_path).map_err(|source| {
            SodError::IoFailure {
                path: master_path,
                source,
            }
        })?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        Ok(Some(ContentDigest::try_parse(content.to_string())?))
    }

    /// Point the master branch at a new commit, atomically
    pub fn update_head(&self, digest: &ContentDigest) -> anyhow::Result<()> {
        let heads = self.heads_path();
        std::fs::create_dir_all(&heads).map_err(|source| SodError::IoFailure {
            path: heads.clone(),
            source,
        })?;

        let temp_path = heads.join(format!("{}.tmp-{}", MASTER, rand::random::<u32>()));
        let mut file = std::fs::File::create(&temp_path).map_err(|source| SodError::IoFailure {
            path: temp_path.clone(),
            source,
        })?;
        writeln!(file, "{}", digest)
            .and_then(|_| file.sync_all())
            .map_err(|source| SodError::IoFailure {
                path: temp_path.clone(),
                source,
            })?;
        drop(file);

        std::fs::rename(&temp_path, self.master_path()).map_err(|source| SodError::IoFailure {
            path: self.master_path(),
            source,
        })?;
        Ok(())
    }
}
