//! Staging index
//!
//! Sod holds three logical trees: HEAD (the current ref's commit), STAGED
//! (what the next commit will record) and WORKING (the scanner's view of the
//! filesystem). The index persists STAGED as a delta against HEAD — a sorted
//! map of put/delete operations — so "changes staged for commit" survive
//! between invocations.
//!
//! Operations are normalized: staging a path back to its HEAD state removes
//! the operation, so an empty delta always means STAGED == HEAD.
//!
//! ## Persistence
//!
//! `.sod/index`, checksummed binary, written to a temp file and renamed into
//! place only after the mutating command has otherwise succeeded. A shared
//! file lock is held while reading.

use crate::artifacts::diff::FlatTree;
use crate::artifacts::index::checksum::{ChecksumReader, ChecksumWriter};
use crate::artifacts::index::index_entry::StageOp;
use crate::artifacts::index::{SIGNATURE, VERSION};
use crate::artifacts::objects::tree::TreeRecord;
use crate::errors::SodError;
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Index {
    /// Path to the index file (`.sod/index`)
    path: Box<Path>,
    /// Staged operations keyed by path
    ops: BTreeMap<PathBuf, StageOp>,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            ops: BTreeMap::new(),
        }
    }

    /// Load the persisted delta
    ///
    /// A missing file is an empty delta. A corrupt file is an error: unlike
    /// the digest cache the index is not rebuildable.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.ops.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let mut file = std::fs::File::open(&self.path).map_err(|source| SodError::IoFailure {
            path: self.path.to_path_buf(),
            source,
        })?;
        let mut lock = file_guard::lock(&mut file, file_guard::Lock::Shared, 0, 1)?;

        let mut reader = ChecksumReader::new(BufReader::new(&mut *lock));

        if reader.read_bytes(4)? != SIGNATURE {
            return Err(anyhow!("Invalid index file signature"));
        }
        if reader.read_u32()? != VERSION {
            return Err(anyhow!("Unsupported index file version"));
        }

        let count = reader.read_u32()?;
        for _ in 0..count {
            let (path, op) = StageOp::read_from(&mut reader)?;
            self.ops.insert(path, op);
        }

        reader.verify()?;
        Ok(())
    }

    /// Write the delta atomically
    pub fn save(&self) -> anyhow::Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("Invalid index path"))?;
        let temp_path = parent.join(format!("index.tmp-{}", rand::random::<u32>()));

        let file = std::fs::File::create(&temp_path).map_err(|source| SodError::IoFailure {
            path: temp_path.clone(),
            source,
        })?;

        let mut writer = ChecksumWriter::new(std::io::BufWriter::new(file));
        writer.write_bytes(SIGNATURE)?;
        writer.write_u32(VERSION)?;
        writer.write_u32(self.ops.len() as u32)?;
        for (path, op) in &self.ops {
            op.write_to(path, &mut writer)?;
        }
        writer.finish()?;

        std::fs::rename(&temp_path, &self.path).map_err(|source| SodError::IoFailure {
            path: self.path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// STAGED = HEAD + staged operations
    pub fn staged_flat(&self, head: &FlatTree) -> FlatTree {
        let mut staged = head.clone();
        for (path, op) in &self.ops {
            match op {
                StageOp::Put(record) => {
                    staged.insert(path.clone(), record.clone());
                }
                StageOp::Delete => {
                    staged.remove(path);
                }
            }
        }
        staged
    }

    /// Transcribe one working-tree state into STAGED
    ///
    /// `working` is the path's current record, or `None` when the file is
    /// gone. The operation is dropped when it would reproduce HEAD, keeping
    /// the delta minimal and `add` idempotent.
    pub fn stage(&mut self, path: &Path, working: Option<TreeRecord>, head: &FlatTree) {
        let head_record = head.get(path);

        match working {
            Some(record) => {
                if head_record == Some(&record) {
                    self.ops.remove(path);
                } else {
                    self.ops.insert(path.to_path_buf(), StageOp::Put(record));
                }
            }
            None => {
                if head_record.is_some() {
                    self.ops.insert(path.to_path_buf(), StageOp::Delete);
                } else {
                    self.ops.remove(path);
                }
            }
        }
    }

    /// Revert one path's staged state back to HEAD
    pub fn reset_path(&mut self, path: &Path) {
        self.ops.remove(path);
    }

    /// Drop every staged operation
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Paths with a staged operation
    pub fn staged_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.ops.keys()
    }

    pub fn is_clean(&self) -> bool {
        self.ops.is_empty()
    }
}
