//! Object database
//!
//! Stores trees and commits under `.sod/objects/<xx>/<38-hex>`, addressed by
//! the digest of their uncompressed canonical bytes. Files hold the
//! zlib-compressed serialization. Writes go through a temp file, fsync and
//! rename, so a crash never leaves a partial object at its final path, and
//! rewriting the same digest is a no-op. Reads memoize decompressed bytes
//! in a small bounded cache and verify the digest, surfacing corruption.

use crate::artifacts::diff::FlatTree;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, ObjectBox, Packable};
use crate::artifacts::objects::tree::{Tree, TreeRecord};
use crate::artifacts::objects::DIGEST_HEX_LENGTH;
use crate::errors::SodError;
use anyhow::Context;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// Entries held by the read memo before eviction
const MEMO_CAPACITY: usize = 256;

pub fn compress(data: &[u8]) -> anyhow::Result<Bytes> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .context("Unable to compress object content")?;
    encoder
        .finish()
        .map(Bytes::from)
        .context("Unable to finish compressing object content")
}

pub fn decompress(data: &[u8]) -> anyhow::Result<Bytes> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .context("Unable to decompress object content")?;
    Ok(Bytes::from(decompressed))
}

/// Bounded insertion-order memo of decompressed object bytes
#[derive(Debug, Default)]
struct ObjectMemo {
    map: HashMap<ContentDigest, Bytes>,
    order: VecDeque<ContentDigest>,
}

impl ObjectMemo {
    fn get(&self, digest: &ContentDigest) -> Option<Bytes> {
        self.map.get(digest).cloned()
    }

    fn put(&mut self, digest: ContentDigest, bytes: Bytes) {
        if self.map.contains_key(&digest) {
            return;
        }
        if self.order.len() >= MEMO_CAPACITY
            && let Some(evicted) = self.order.pop_front()
        {
            self.map.remove(&evicted);
        }
        self.order.push_back(digest.clone());
        self.map.insert(digest, bytes);
    }
}

/// Digest-addressed object store
#[derive(Debug)]
pub struct Database {
    /// Path to the objects directory (`.sod/objects`)
    path: Box<Path>,
    memo: Mutex<ObjectMemo>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database {
            path,
            memo: Mutex::new(ObjectMemo::default()),
        }
    }

    /// Store an object, returning its digest
    ///
    /// Content-addressed writes commute: if the object already exists the
    /// bytes on disk are identical and nothing is rewritten.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ContentDigest> {
        let content = object.serialize()?;
        let digest = ContentDigest::hash_bytes(&content);
        let object_path = self.path.join(digest.to_path());

        if !object_path.exists() {
            let object_dir = object_path
                .parent()
                .context("Invalid object path")?
                .to_path_buf();
            std::fs::create_dir_all(&object_dir).map_err(|source| SodError::IoFailure {
                path: object_dir.clone(),
                source,
            })?;

            let temp_path = object_dir.join(format!("tmp-obj-{}", rand::random::<u32>()));
            let compressed = compress(&content)?;

            let mut file =
                std::fs::File::create(&temp_path).map_err(|source| SodError::IoFailure {
                    path: temp_path.clone(),
                    source,
                })?;
            file.write_all(&compressed)
                .and_then(|_| file.sync_all())
                .map_err(|source| SodError::IoFailure {
                    path: temp_path.clone(),
                    source,
                })?;
            drop(file);

            std::fs::rename(&temp_path, &object_path).map_err(|source| SodError::IoFailure {
                path: object_path.clone(),
                source,
            })?;
        }

        Ok(digest)
    }

    /// Load the uncompressed bytes of an object
    pub fn load(&self, digest: &ContentDigest) -> anyhow::Result<Bytes> {
        if let Some(bytes) = self.memo.lock().unwrap_or_else(|e| e.into_inner()).get(digest) {
            return Ok(bytes);
        }

        let object_path = self.path.join(digest.to_path());
        let compressed = std::fs::read(&object_path).map_err(|_| {
            SodError::ObjectStoreCorruption(format!("missing object {}", digest))
        })?;
        let content = decompress(&compressed)?;

        if ContentDigest::hash_bytes(&content) != *digest {
            return Err(SodError::ObjectStoreCorruption(format!(
                "digest mismatch reading object {}",
                digest
            ))
            .into());
        }

        self.memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(digest.clone(), content.clone());
        Ok(content)
    }

    pub fn parse_object(&self, digest: &ContentDigest) -> anyhow::Result<ObjectBox> {
        ObjectBox::decode(self.load(digest)?)
    }

    pub fn parse_tree(&self, digest: &ContentDigest) -> anyhow::Result<Tree> {
        match self.parse_object(digest)? {
            ObjectBox::Tree(tree) => Ok(*tree),
            _ => Err(SodError::ObjectStoreCorruption(format!(
                "object {} is not a tree",
                digest
            ))
            .into()),
        }
    }

    pub fn parse_commit(&self, digest: &ContentDigest) -> anyhow::Result<Commit> {
        match self.parse_object(digest)? {
            ObjectBox::Commit(commit) => Ok(*commit),
            _ => Err(SodError::ObjectStoreCorruption(format!(
                "object {} is not a commit",
                digest
            ))
            .into()),
        }
    }

    /// Find all stored objects whose digest starts with the given hex prefix
    ///
    /// Used to resolve abbreviated commit arguments; more than one match
    /// means the prefix is ambiguous.
    pub fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ContentDigest>> {
        let mut matches = Vec::new();

        if prefix.len() < 2 || prefix.len() > DIGEST_HEX_LENGTH {
            return Ok(matches);
        }

        let dir_name = &prefix[..2];
        let file_prefix = &prefix[2..];
        let dir_path = self.path.join(dir_name);

        if dir_path.is_dir() {
            for entry in std::fs::read_dir(&dir_path)? {
                let entry = entry?;
                let file_name = entry.file_name();
                let file_name = file_name.to_string_lossy();

                if file_name.starts_with(file_prefix)
                    && let Ok(digest) =
                        ContentDigest::try_parse(format!("{}{}", dir_name, file_name))
                {
                    matches.push(digest);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }

    /// Flatten a stored tree into repo-relative file paths
    pub fn flatten_tree(&self, digest: &ContentDigest) -> anyhow::Result<FlatTree> {
        let mut flat = FlatTree::new();
        self.flatten_into(digest, Path::new(""), &mut flat)?;
        Ok(flat)
    }

    fn flatten_into(
        &self,
        digest: &ContentDigest,
        prefix: &Path,
        flat: &mut FlatTree,
    ) -> anyhow::Result<()> {
        let tree = self.parse_tree(digest)?;
        for (name, record) in tree.entries() {
            let path = prefix.join(OsStr::from_bytes(name));
            if record.is_tree() {
                self.flatten_into(&record.digest, &path, flat)?;
            } else {
                flat.insert(path, record.clone());
            }
        }
        Ok(())
    }

    /// Look up one path in a stored tree
    ///
    /// Walks the tree one component at a time; returns the file or subtree
    /// record at that path, if present.
    pub fn lookup_path(
        &self,
        tree_digest: &ContentDigest,
        path: &Path,
    ) -> anyhow::Result<Option<TreeRecord>> {
        let mut current = TreeRecord::new(tree_digest.clone(), EntryMode::Directory);

        for component in path.components() {
            let Component::Normal(name) = component else {
                return Ok(None);
            };
            if !current.is_tree() {
                return Ok(None);
            }
            let tree = self.parse_tree(&current.digest)?;
            match tree.get(name.as_bytes()) {
                Some(record) => current = record.clone(),
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }

    /// Materialize a flat path map into nested trees, bottom-up
    ///
    /// Every novel tree is written to the store; the root tree digest is
    /// returned. Called with the STAGED map by the commit engine.
    pub fn write_tree_from_flat(&self, flat: &FlatTree) -> anyhow::Result<ContentDigest> {
        // group files under their first path component
        let mut files: Vec<(Vec<u8>, &TreeRecord)> = Vec::new();
        let mut subdirs: BTreeMap<Vec<u8>, FlatTree> = BTreeMap::new();

        for (path, record) in flat {
            let mut components = path.components();
            let Some(Component::Normal(first)) = components.next() else {
                return Err(anyhow::anyhow!("Invalid tracked path: {:?}", path));
            };
            let rest: PathBuf = components.collect();

            if rest.as_os_str().is_empty() {
                files.push((first.as_bytes().to_vec(), record));
            } else {
                subdirs
                    .entry(first.as_bytes().to_vec())
                    .or_default()
                    .insert(rest, record.clone());
            }
        }

        let mut tree = Tree::new();
        for (name, subdir_flat) in &subdirs {
            let subtree_digest = self.write_tree_from_flat(subdir_flat)?;
            tree.insert(
                name.clone(),
                TreeRecord::new(subtree_digest, EntryMode::Directory),
            );
        }
        for (name, record) in files {
            tree.insert(name, (*record).clone());
        }

        self.store(&tree)
    }
}
