//! Auxiliary store registry
//!
//! Maintains the per-store snapshot caches under `.sod/cache/aux/<name>/`.
//! `aux update` enumerates a store's snapshot roots, opens each root as a
//! sod repository of its own (reads its master ref and streams its trees
//! through the snapshot source) and persists one reverse `{digest -> paths}`
//! index per snapshot. Caches for snapshot ids that no longer exist are
//! dropped.

use crate::areas::database::decompress;
use crate::areas::SOD_DIR;
use crate::artifacts::aux::plain::{SnapshotSource, source_for};
use crate::artifacts::aux::{AuxStoreSpec, SnapshotTree};
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::tree::Tree;
use crate::errors::SodError;
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Cache file name for a store whose template has no wildcard
const SINGLE_ROOT: &str = "@root";

#[derive(Debug)]
pub struct AuxRegistry {
    /// Path to the aux cache directory (`.sod/cache/aux`)
    cache_dir: Box<Path>,
}

impl AuxRegistry {
    pub fn new(cache_dir: Box<Path>) -> Self {
        AuxRegistry { cache_dir }
    }

    fn store_dir(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    /// Refresh the snapshot caches of one store
    pub fn update_store(&self, spec: &AuxStoreSpec) -> anyhow::Result<()> {
        let source = source_for(spec);
        let ids = source.list_snapshot_ids()?;
        let store_dir = self.store_dir(&spec.name);

        let mut kept_files = BTreeSet::new();

        let id_list: Vec<Option<String>> = match ids {
            None => vec![None],
            Some(ids) => ids.into_iter().map(Some).collect(),
        };

        for id in &id_list {
            let reference = spec.reference(id.as_deref());
            tracing::info!("updating {}", reference);

            let snapshot = read_snapshot(source.as_ref(), id.as_deref()).map_err(|error| {
                error.context(format!("failed to update {}", reference))
            })?;

            let file_name = cache_file_name(id.as_deref());
            snapshot.save(&store_dir.join(&file_name))?;
            kept_files.insert(file_name);
        }

        // drop caches for vanished snapshot ids
        if let Ok(entries) = std::fs::read_dir(&store_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if !kept_files.contains(&name.to_string_lossy().into_owned()) {
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }

        Ok(())
    }

    /// Remove a store's caches entirely
    pub fn remove_store(&self, name: &str) {
        let _ = std::fs::remove_dir_all(self.store_dir(name));
    }

    /// All cached snapshots of one store, sorted by id
    pub fn snapshots_of(&self, name: &str) -> Vec<(Option<String>, SnapshotTree)> {
        let mut snapshots = Vec::new();

        let Ok(entries) = std::fs::read_dir(self.store_dir(name)) else {
            return snapshots;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let id = match file_name.as_str() {
                SINGLE_ROOT => None,
                other => Some(other.to_string()),
            };
            match SnapshotTree::load(&entry.path()) {
                Ok(snapshot) => snapshots.push((id, snapshot)),
                Err(error) => {
                    tracing::warn!(
                        "discarding unreadable snapshot cache {:?}: {:#}",
                        entry.path(),
                        error
                    );
                }
            }
        }

        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }

    /// Reverse map: base commit digest -> snapshot references
    ///
    /// Used by the log walker to annotate revisions that have snapshots
    /// available.
    pub fn snapshots_by_commit(
        &self,
        specs: &[AuxStoreSpec],
    ) -> HashMap<ContentDigest, Vec<String>> {
        let mut by_commit: HashMap<ContentDigest, Vec<String>> = HashMap::new();

        for spec in specs {
            for (id, snapshot) in self.snapshots_of(&spec.name) {
                by_commit
                    .entry(snapshot.base_commit.clone())
                    .or_default()
                    .push(spec.reference(id.as_deref()));
            }
        }

        by_commit
    }
}

fn cache_file_name(id: Option<&str>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => SINGLE_ROOT.to_string(),
    }
}

/// Read an object out of a snapshot's own object store
fn read_snapshot_object(
    source: &dyn SnapshotSource,
    id: Option<&str>,
    digest: &ContentDigest,
) -> anyhow::Result<ObjectBox> {
    let rel = PathBuf::from(SOD_DIR).join("objects").join(digest.to_path());
    let compressed = source.read(id, &rel)?;
    let content = decompress(&compressed)?;

    if ContentDigest::hash_bytes(&content) != *digest {
        return Err(SodError::ObjectStoreCorruption(format!(
            "digest mismatch reading snapshot object {}",
            digest
        ))
        .into());
    }

    ObjectBox::decode(content)
}

/// Build the reverse index of one snapshot root
fn read_snapshot(source: &dyn SnapshotSource, id: Option<&str>) -> anyhow::Result<SnapshotTree> {
    let ref_rel = PathBuf::from(SOD_DIR)
        .join("refs")
        .join("heads")
        .join("master");
    let ref_bytes = source.read(id, &ref_rel)?;
    let ref_text = String::from_utf8_lossy(&ref_bytes);
    let base_commit = ContentDigest::try_parse(ref_text.trim().to_string())?;

    let commit = match read_snapshot_object(source, id, &base_commit)? {
        ObjectBox::Commit(commit) => *commit,
        _ => {
            return Err(SodError::ObjectStoreCorruption(format!(
                "snapshot head {} is not a commit",
                base_commit
            ))
            .into());
        }
    };

    let mut snapshot = SnapshotTree::new(base_commit, commit.tree().clone());
    collect_tree_paths(source, id, commit.tree(), Path::new(""), &mut snapshot)?;
    Ok(snapshot)
}

fn collect_tree_paths(
    source: &dyn SnapshotSource,
    id: Option<&str>,
    tree_digest: &ContentDigest,
    prefix: &Path,
    snapshot: &mut SnapshotTree,
) -> anyhow::Result<()> {
    let tree: Tree = match read_snapshot_object(source, id, tree_digest)? {
        ObjectBox::Tree(tree) => *tree,
        _ => {
            return Err(SodError::ObjectStoreCorruption(format!(
                "snapshot object {} is not a tree",
                tree_digest
            ))
            .into());
        }
    };

    for (name, record) in tree.entries() {
        let path = prefix.join(OsStr::from_bytes(name));
        if record.is_tree() {
            collect_tree_paths(source, id, &record.digest, &path, snapshot)?;
        } else {
            snapshot.insert(record.digest.clone(), path);
        }
    }
    Ok(())
}
