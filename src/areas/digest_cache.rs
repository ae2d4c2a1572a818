//! Digest cache
//!
//! Maps each working-tree path to its last known content digest together
//! with the stat signature observed when that digest was computed. On scan,
//! an unchanged signature lets the scanner reuse the digest instead of
//! rereading gigabytes; any difference forces a rehash and replaces the
//! entry. `--rehash` bypasses the comparison entirely, which is how silent
//! corruption (content changed, stat unchanged) gets caught.
//!
//! The cache is persisted to `.sod/cache/digests` after a scan and is purely
//! an optimization: a missing or corrupt file costs one full rehash, never
//! correctness.

use crate::artifacts::index::checksum::{ChecksumReader, ChecksumWriter};
use crate::artifacts::index::index_entry::StatSignature;
use crate::artifacts::objects::digest::ContentDigest;
use crate::errors::SodError;
use std::collections::{BTreeSet, HashMap};
use std::io::BufReader;
use std::path::{Path, PathBuf};

const SIGNATURE: &[u8; 4] = b"SODC";
const VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheEntry {
    signature: StatSignature,
    digest: ContentDigest,
}

#[derive(Debug)]
pub struct DigestCache {
    path: Box<Path>,
    entries: HashMap<PathBuf, CacheEntry>,
    changed: bool,
}

impl DigestCache {
    /// Load the persisted cache; any defect falls back to an empty cache
    pub fn load(path: Box<Path>) -> Self {
        let entries = match Self::read_entries(&path) {
            Ok(entries) => entries,
            Err(error) => {
                if path.exists() {
                    tracing::warn!("discarding unreadable digest cache: {:#}", error);
                }
                HashMap::new()
            }
        };

        DigestCache {
            path,
            entries,
            changed: false,
        }
    }

    fn read_entries(path: &Path) -> anyhow::Result<HashMap<PathBuf, CacheEntry>> {
        use std::os::unix::ffi::OsStringExt;

        let file = std::fs::File::open(path)?;
        let mut reader = ChecksumReader::new(BufReader::new(file));

        if reader.read_bytes(4)? != SIGNATURE {
            return Err(anyhow::anyhow!("bad digest cache signature"));
        }
        if reader.read_u32()? != VERSION {
            return Err(anyhow::anyhow!("unsupported digest cache version"));
        }

        let count = reader.read_u32()?;
        let mut entries = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let path_len = reader.read_u32()? as usize;
            let path_bytes = reader.read_bytes(path_len)?;
            let entry_path = PathBuf::from(std::ffi::OsString::from_vec(path_bytes));

            let signature = StatSignature::read_from(&mut reader)?;
            let raw = reader.read_bytes(20)?;
            let digest = ContentDigest::read_raw_from(&mut raw.as_slice())?;

            entries.insert(entry_path, CacheEntry { signature, digest });
        }

        reader.verify()?;
        Ok(entries)
    }

    /// Digest for a path whose stat signature is unchanged
    pub fn lookup(&self, path: &Path, signature: &StatSignature) -> Option<ContentDigest> {
        self.entries
            .get(path)
            .filter(|entry| entry.signature == *signature)
            .map(|entry| entry.digest.clone())
    }

    /// Record a freshly computed digest
    pub fn record(&mut self, path: PathBuf, signature: StatSignature, digest: ContentDigest) {
        let entry = CacheEntry { signature, digest };
        if self.entries.get(&path) != Some(&entry) {
            self.entries.insert(path, entry);
            self.changed = true;
        }
    }

    /// Drop entries for paths that are no longer present
    ///
    /// Called after a full-tree scan with the set of paths seen.
    pub fn retain_paths(&mut self, seen: &BTreeSet<PathBuf>) {
        let before = self.entries.len();
        self.entries.retain(|path, _| seen.contains(path));
        if self.entries.len() != before {
            self.changed = true;
        }
    }

    /// Persist via temp file + rename, if anything changed
    pub fn persist(&mut self) -> anyhow::Result<()> {
        use std::os::unix::ffi::OsStrExt;

        if !self.changed {
            return Ok(());
        }

        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid digest cache path"))?;
        std::fs::create_dir_all(parent).map_err(|source| SodError::IoFailure {
            path: parent.to_path_buf(),
            source,
        })?;

        let temp_path = parent.join(format!("digests.tmp-{}", rand::random::<u32>()));
        let file = std::fs::File::create(&temp_path).map_err(|source| SodError::IoFailure {
            path: temp_path.clone(),
            source,
        })?;

        let mut writer = ChecksumWriter::new(std::io::BufWriter::new(file));
        writer.write_bytes(SIGNATURE)?;
        writer.write_u32(VERSION)?;
        writer.write_u32(self.entries.len() as u32)?;

        // deterministic order keeps repeated persists byte-identical
        let mut paths: Vec<_> = self.entries.keys().cloned().collect();
        paths.sort();
        for path in paths {
            let entry = &self.entries[&path];
            let path_bytes = path.as_os_str().as_bytes();
            writer.write_u32(path_bytes.len() as u32)?;
            writer.write_bytes(path_bytes)?;
            entry.signature.write_to(&mut writer)?;
            let mut raw = Vec::new();
            entry.digest.write_raw_to(&mut raw)?;
            writer.write_bytes(&raw)?;
        }

        writer.finish()?;
        std::fs::rename(&temp_path, &self.path).map_err(|source| SodError::IoFailure {
            path: self.path.to_path_buf(),
            source,
        })?;

        self.changed = false;
        Ok(())
    }
}
