//! Change-set computation
//!
//! Compares two trees into a flat `ChangeSet`. Stored trees are walked
//! recursively with an equal-digest short circuit, so unchanged subtrees are
//! never inflated; in-memory flat trees (STAGED, WORKING) are compared
//! directly.

use crate::areas::database::Database;
use crate::artifacts::diff::FlatTree;
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::tree::{Tree, TreeRecord};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Change of one path between two trees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added(TreeRecord),
    Deleted(TreeRecord),
    Modified { old: TreeRecord, new: TreeRecord },
}

impl Change {
    pub fn from_records(old: Option<TreeRecord>, new: Option<TreeRecord>) -> Option<Self> {
        match (old, new) {
            (None, Some(new)) => Some(Change::Added(new)),
            (Some(old), None) => Some(Change::Deleted(old)),
            (Some(old), Some(new)) if old != new => Some(Change::Modified { old, new }),
            _ => None,
        }
    }
}

/// Flat set of changes keyed by path
pub type ChangeSet = BTreeMap<PathBuf, Change>;

/// Diff engine over stored trees
#[derive(Debug)]
pub struct TreeDiff<'r> {
    database: &'r Database,
    change_set: ChangeSet,
}

impl<'r> TreeDiff<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeDiff {
            database,
            change_set: BTreeMap::new(),
        }
    }

    pub fn into_change_set(self) -> ChangeSet {
        self.change_set
    }

    /// Compare two tree digests recursively
    ///
    /// `None` stands for the empty tree. Subtrees with equal digests are
    /// skipped without loading.
    pub fn compare_digests(
        &mut self,
        old: Option<&ContentDigest>,
        new: Option<&ContentDigest>,
        prefix: &Path,
    ) -> anyhow::Result<()> {
        if old == new {
            return Ok(());
        }

        let old_tree = self.inflate(old)?;
        let new_tree = self.inflate(new)?;

        self.detect_deletions(&old_tree, &new_tree, prefix)?;
        self.detect_additions(&old_tree, &new_tree, prefix)?;

        Ok(())
    }

    fn inflate(&self, digest: Option<&ContentDigest>) -> anyhow::Result<Tree> {
        match digest {
            None => Ok(Tree::new()),
            Some(digest) => self.database.parse_tree(digest),
        }
    }

    fn detect_deletions(
        &mut self,
        old: &Tree,
        new: &Tree,
        prefix: &Path,
    ) -> anyhow::Result<()> {
        for (name, record) in old.entries() {
            let other = new.get(name);
            if other == Some(record) {
                continue;
            }

            let path = prefix.join(OsStr::from_bytes(name));

            let old_subtree = record.is_tree().then_some(&record.digest);
            let new_subtree = other.filter(|o| o.is_tree()).map(|o| &o.digest);
            if old_subtree.is_some() || new_subtree.is_some() {
                self.compare_digests(old_subtree, new_subtree, &path)?;
            }

            let old_file = (!record.is_tree()).then(|| record.clone());
            let new_file = other.filter(|o| !o.is_tree()).cloned();
            if let Some(change) = Change::from_records(old_file, new_file) {
                self.change_set.insert(path, change);
            }
        }

        Ok(())
    }

    fn detect_additions(
        &mut self,
        old: &Tree,
        new: &Tree,
        prefix: &Path,
    ) -> anyhow::Result<()> {
        for (name, record) in new.entries() {
            if old.get(name).is_some() {
                continue; // handled from the deletion side
            }

            let path = prefix.join(OsStr::from_bytes(name));
            if record.is_tree() {
                self.compare_digests(None, Some(&record.digest), &path)?;
            } else {
                self.change_set.insert(path, Change::Added(record.clone()));
            }
        }

        Ok(())
    }
}

/// Compare two in-memory flat trees
pub fn diff_flat(old: &FlatTree, new: &FlatTree) -> ChangeSet {
    let mut change_set = ChangeSet::new();

    for (path, record) in old {
        match new.get(path) {
            Some(other) if other == record => {}
            other => {
                if let Some(change) = Change::from_records(Some(record.clone()), other.cloned()) {
                    change_set.insert(path.clone(), change);
                }
            }
        }
    }
    for (path, record) in new {
        if !old.contains_key(path) {
            change_set.insert(path.clone(), Change::Added(record.clone()));
        }
    }

    change_set
}
