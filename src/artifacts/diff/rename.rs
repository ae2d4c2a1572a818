//! Rename and copy pairing
//!
//! Sod never holds file contents, so pairing is digest-only: a deletion and
//! an addition pair when digest and mode are both equal. This misses
//! rename-then-edit (which correctly stays D+A) but is cheap and fully
//! deterministic.
//!
//! Pairing is greedy and injective: each deletion consumes at most one
//! addition and vice versa. When several additions carry the deleted digest,
//! the one sharing the longest directory prefix with the deletion wins,
//! then the byte-smallest new path. A rename limit bounds the number of
//! candidate comparisons; once exceeded the remaining entries stay plain
//! A/D.
//!
//! Copy detection runs only when explicitly requested (filter letter `C`)
//! and only when every deletion found a rename partner: an unpaired
//! addition whose digest also belongs to a path present in both trees is
//! reported as a copy of that path.

use crate::artifacts::diff::tree_diff::{Change, ChangeSet};
use crate::artifacts::diff::{DiffEntry, DiffStatus};
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::tree::TreeRecord;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

/// Default for `diff.renameLimit` when unconfigured
pub const DEFAULT_RENAME_LIMIT: usize = 10000;

#[derive(Debug, Clone, Copy)]
pub struct RenameDetector {
    limit: usize,
}

impl RenameDetector {
    pub fn new(limit: usize) -> Self {
        RenameDetector { limit }
    }

    /// Turn a change set into diff entries, pairing renames
    ///
    /// `copy_sources` maps a digest to some path carrying it in both trees;
    /// passing `Some` enables copy detection.
    pub fn detect(
        &self,
        changes: ChangeSet,
        copy_sources: Option<&HashMap<ContentDigest, PathBuf>>,
    ) -> Vec<DiffEntry> {
        let mut entries = Vec::new();
        let mut deletions: Vec<(PathBuf, TreeRecord)> = Vec::new();
        let mut addition_buckets: BTreeMap<(String, u32), Vec<(PathBuf, TreeRecord)>> =
            BTreeMap::new();

        for (path, change) in changes {
            match change {
                Change::Modified { old, new } => entries.push(DiffEntry {
                    status: DiffStatus::Modified,
                    old_path: path.clone(),
                    new_path: path,
                    old_digest: Some(old.digest),
                    new_digest: Some(new.digest),
                }),
                Change::Deleted(record) => deletions.push((path, record)),
                Change::Added(record) => addition_buckets
                    .entry(bucket_key(&record))
                    .or_default()
                    .push((path, record)),
            }
        }

        let mut attempted = 0usize;
        let mut unpaired_deletions = Vec::new();

        for (deleted_path, record) in deletions {
            let bucket = addition_buckets.get_mut(&bucket_key(&record));
            let candidates = match bucket {
                Some(candidates) if !candidates.is_empty() => candidates,
                _ => {
                    unpaired_deletions.push((deleted_path, record));
                    continue;
                }
            };

            // a pairing that would push past the limit stays plain A/D
            if attempted + candidates.len() > self.limit {
                unpaired_deletions.push((deleted_path, record));
                continue;
            }
            attempted += candidates.len();

            // candidates are in new-path byte order already; a strictly
            // greater prefix length is required to displace an earlier one
            let mut best = 0;
            let mut best_prefix = shared_prefix_components(&deleted_path, &candidates[0].0);
            for (i, (candidate_path, _)) in candidates.iter().enumerate().skip(1) {
                let prefix = shared_prefix_components(&deleted_path, candidate_path);
                if prefix > best_prefix {
                    best = i;
                    best_prefix = prefix;
                }
            }

            let (new_path, new_record) = candidates.remove(best);
            entries.push(DiffEntry {
                status: DiffStatus::Renamed,
                old_path: deleted_path,
                new_path,
                old_digest: Some(record.digest),
                new_digest: Some(new_record.digest),
            });
        }

        let have_unpaired_deletions = !unpaired_deletions.is_empty();
        for (path, record) in unpaired_deletions {
            entries.push(DiffEntry {
                status: DiffStatus::Deleted,
                old_path: path.clone(),
                new_path: path,
                old_digest: Some(record.digest),
                new_digest: None,
            });
        }

        for (_, bucket) in addition_buckets {
            for (path, record) in bucket {
                let copy_source = match copy_sources {
                    Some(sources) if !have_unpaired_deletions => sources.get(&record.digest),
                    _ => None,
                };

                match copy_source {
                    Some(source) => entries.push(DiffEntry {
                        status: DiffStatus::Copied,
                        old_path: source.clone(),
                        new_path: path,
                        old_digest: Some(record.digest.clone()),
                        new_digest: Some(record.digest),
                    }),
                    None => entries.push(DiffEntry {
                        status: DiffStatus::Added,
                        old_path: path.clone(),
                        new_path: path,
                        old_digest: None,
                        new_digest: Some(record.digest),
                    }),
                }
            }
        }

        entries.sort_by(|a, b| {
            (&a.old_path, &a.new_path).cmp(&(&b.old_path, &b.new_path))
        });
        entries
    }
}

fn bucket_key(record: &TreeRecord) -> (String, u32) {
    (record.digest.as_ref().to_string(), record.mode.as_u32())
}

fn shared_prefix_components(a: &Path, b: &Path) -> usize {
    let parents = (
        a.parent().unwrap_or(Path::new("")),
        b.parent().unwrap_or(Path::new("")),
    );
    parents
        .0
        .components()
        .zip(parents.1.components())
        .take_while(|(x, y): &(Component, Component)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::entry_mode::EntryMode;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn record(content: &[u8]) -> TreeRecord {
        TreeRecord::new(ContentDigest::hash_bytes(content), EntryMode::Regular)
    }

    fn change_set(entries: Vec<(&str, Change)>) -> ChangeSet {
        entries
            .into_iter()
            .map(|(path, change)| (PathBuf::from(path), change))
            .collect()
    }

    #[test]
    fn exact_pair_becomes_rename() {
        let changes = change_set(vec![
            ("dir1/p.jpg", Change::Deleted(record(b"photo"))),
            ("dir2/p.jpg", Change::Added(record(b"photo"))),
        ]);

        let entries = RenameDetector::new(DEFAULT_RENAME_LIMIT).detect(changes, None);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DiffStatus::Renamed);
        assert_eq!(entries[0].old_path, PathBuf::from("dir1/p.jpg"));
        assert_eq!(entries[0].new_path, PathBuf::from("dir2/p.jpg"));
    }

    #[test]
    fn different_mode_does_not_pair() {
        let digest = ContentDigest::hash_bytes(b"script");
        let changes = change_set(vec![
            (
                "old.sh",
                Change::Deleted(TreeRecord::new(digest.clone(), EntryMode::Regular)),
            ),
            (
                "new.sh",
                Change::Added(TreeRecord::new(digest, EntryMode::Executable)),
            ),
        ]);

        let entries = RenameDetector::new(DEFAULT_RENAME_LIMIT).detect(changes, None);
        let statuses: Vec<_> = entries.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![DiffStatus::Added, DiffStatus::Deleted]);
    }

    #[test]
    fn prefers_longest_shared_directory_prefix() {
        let changes = change_set(vec![
            ("albums/2021/a.jpg", Change::Deleted(record(b"pic"))),
            ("albums/2021/raw/a.jpg", Change::Added(record(b"pic"))),
            ("elsewhere/a.jpg", Change::Added(record(b"pic"))),
        ]);

        let entries = RenameDetector::new(DEFAULT_RENAME_LIMIT).detect(changes, None);
        let rename = entries
            .iter()
            .find(|e| e.status == DiffStatus::Renamed)
            .unwrap();
        assert_eq!(rename.new_path, PathBuf::from("albums/2021/raw/a.jpg"));

        // the other addition stays plain
        assert!(entries
            .iter()
            .any(|e| e.status == DiffStatus::Added
                && e.new_path == PathBuf::from("elsewhere/a.jpg")));
    }

    #[test]
    fn prefix_tie_breaks_by_new_path_byte_order() {
        let changes = change_set(vec![
            ("a.jpg", Change::Deleted(record(b"pic"))),
            ("x/b.jpg", Change::Added(record(b"pic"))),
            ("x/a.jpg", Change::Added(record(b"pic"))),
        ]);

        let entries = RenameDetector::new(DEFAULT_RENAME_LIMIT).detect(changes, None);
        let rename = entries
            .iter()
            .find(|e| e.status == DiffStatus::Renamed)
            .unwrap();
        assert_eq!(rename.new_path, PathBuf::from("x/a.jpg"));
    }

    #[test]
    fn exceeded_limit_leaves_plain_additions_and_deletions() {
        let changes = change_set(vec![
            ("old/a", Change::Deleted(record(b"a"))),
            ("new/a", Change::Added(record(b"a"))),
            ("old/b", Change::Deleted(record(b"b"))),
            ("new/b", Change::Added(record(b"b"))),
        ]);

        let entries = RenameDetector::new(0).detect(changes, None);
        assert!(entries.iter().all(|e| e.status != DiffStatus::Renamed));
        assert!(entries.iter().any(|e| e.status == DiffStatus::Deleted));
        assert!(entries.iter().any(|e| e.status == DiffStatus::Added));
    }

    #[test]
    fn copy_detection_requires_no_unpaired_deletions() {
        let mut sources = HashMap::new();
        sources.insert(ContentDigest::hash_bytes(b"kept"), PathBuf::from("kept.txt"));

        // unpaired deletion present: no copies
        let changes = change_set(vec![
            ("twin.txt", Change::Added(record(b"kept"))),
            ("gone.txt", Change::Deleted(record(b"other"))),
        ]);
        let entries =
            RenameDetector::new(DEFAULT_RENAME_LIMIT).detect(changes, Some(&sources));
        assert!(entries.iter().all(|e| e.status != DiffStatus::Copied));

        // clean addition: copy recognized
        let changes = change_set(vec![("twin.txt", Change::Added(record(b"kept")))]);
        let entries =
            RenameDetector::new(DEFAULT_RENAME_LIMIT).detect(changes, Some(&sources));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DiffStatus::Copied);
        assert_eq!(entries[0].old_path, PathBuf::from("kept.txt"));
        assert_eq!(entries[0].new_path, PathBuf::from("twin.txt"));
    }

    proptest! {
        // No addition is consumed by two deletions and vice versa.
        #[test]
        fn pairing_is_injective(
            seeds in proptest::collection::vec((0u8..6, 0u8..4), 1..24)
        ) {
            let mut changes = ChangeSet::new();
            for (i, (content, dir)) in seeds.iter().enumerate() {
                let record = record(&[*content]);
                let path = PathBuf::from(format!("d{}/f{}", dir, i));
                if i % 2 == 0 {
                    changes.insert(path, Change::Deleted(record));
                } else {
                    changes.insert(path, Change::Added(record));
                }
            }

            let entries = RenameDetector::new(DEFAULT_RENAME_LIMIT).detect(changes, None);

            let mut seen_old = std::collections::HashSet::new();
            let mut seen_new = std::collections::HashSet::new();
            for entry in entries.iter().filter(|e| e.status == DiffStatus::Renamed) {
                prop_assert!(seen_old.insert(entry.old_path.clone()));
                prop_assert!(seen_new.insert(entry.new_path.clone()));
            }
        }
    }
}
