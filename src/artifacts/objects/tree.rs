//! Tree object
//!
//! A tree is the digest-addressed listing of one directory: entry names map
//! to the content digest of a file or the object digest of a child tree
//! (Merkle structure). Entry names are byte strings ordered byte-wise
//! ascending, so serialization is canonical and digests are stable.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<octal-mode> <name>\0<20-byte-digest>`

use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use derive_new::new;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// Digest and mode of one tree child (or one flattened path)
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeRecord {
    pub digest: ContentDigest,
    pub mode: EntryMode,
}

impl TreeRecord {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }
}

/// One directory listing
///
/// Entries are keyed by raw name bytes; the BTreeMap ordering is exactly the
/// canonical serialization order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<Vec<u8>, TreeRecord>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: Vec<u8>, record: TreeRecord) {
        self.entries.insert(name, record);
    }

    pub fn get(&self, name: &[u8]) -> Option<&TreeRecord> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Vec<u8>, &TreeRecord)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (Vec<u8>, TreeRecord)> {
        self.entries.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();
        for (name, record) in &self.entries {
            let header = format!("{:o} ", record.mode.as_u32());
            content_bytes.write_all(header.as_bytes())?;
            content_bytes.write_all(name)?;
            content_bytes.push(0);
            record.digest.write_raw_to(&mut content_bytes)?;
        }

        let mut tree_bytes = Vec::new();
        let header = format!("{} {}\0", self.object_type().as_str(), content_bytes.len());
        tree_bytes.write_all(header.as_bytes())?;
        tree_bytes.write_all(&content_bytes)?;

        Ok(Bytes::from(tree_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();

        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in entry mode"));
            }
            let mode_str = std::str::from_utf8(&mode_bytes)?;
            let mode = EntryMode::from_octal_str(mode_str)?;

            name_bytes.clear();
            let n = reader.read_until(b'\0', &mut name_bytes)?;
            if n == 0 || name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in entry name"));
            }

            let digest = ContentDigest::read_raw_from(&mut reader)
                .context("unexpected EOF in entry digest")?;

            entries.insert(name_bytes.clone(), TreeRecord::new(digest, mode));
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}
