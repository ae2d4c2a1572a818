//! Porcelain commands
//!
//! Each file extends `Repository` with one user-facing command. Shared
//! diff plumbing lives here: change sets flow through rename detection, the
//! optional status filter, and one of the two output formats.

pub(crate) mod add;
pub(crate) mod aux;
pub(crate) mod commit;
pub(crate) mod config_cmd;
pub(crate) mod diff;
pub(crate) mod init;
pub(crate) mod log;
pub(crate) mod restore;
pub(crate) mod status;

use crate::artifacts::diff::filter::DiffFilter;
use crate::artifacts::diff::format::abbrev_width;
use crate::artifacts::diff::rename::RenameDetector;
use crate::artifacts::diff::tree_diff::ChangeSet;
use crate::artifacts::diff::{DiffEntry, FlatTree};
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::DIGEST_HEX_LENGTH;
use crate::artifacts::pathspec::Pattern;
use std::collections::HashMap;
use std::path::PathBuf;

/// Run a change set through rename pairing and the status filter
pub(crate) fn detect_and_filter(
    changes: ChangeSet,
    rename_limit: usize,
    filter: Option<&DiffFilter>,
    copy_sources: Option<&HashMap<ContentDigest, PathBuf>>,
) -> Vec<DiffEntry> {
    let mut entries = RenameDetector::new(rename_limit).detect(changes, copy_sources);
    if let Some(filter) = filter {
        entries.retain(|entry| filter.selects(entry.status));
    }
    entries
}

/// Display width for the old-digest column
pub(crate) fn display_width(entries: &[DiffEntry], abbrev: bool) -> usize {
    if !abbrev {
        return DIGEST_HEX_LENGTH;
    }
    abbrev_width(
        entries
            .iter()
            .flat_map(|entry| entry.old_digest.iter().chain(entry.new_digest.iter())),
    )
}

/// Restrict a flat tree to paths selected by the given patterns
///
/// No patterns means no restriction.
pub(crate) fn filter_flat(flat: &FlatTree, patterns: &[Pattern]) -> FlatTree {
    if patterns.is_empty() {
        return flat.clone();
    }
    flat.iter()
        .filter(|(path, _)| patterns.iter().any(|pattern| pattern.matches(path)))
        .map(|(path, record)| (path.clone(), record.clone()))
        .collect()
}

/// Copy sources: digests of paths unchanged between two trees
///
/// Used when the filter requests `C`: an addition matching one of these
/// digests is a copy of that path. The byte-smallest path wins when several
/// unchanged paths share a digest.
pub(crate) fn unmodified_sources(
    old: &FlatTree,
    new: &FlatTree,
) -> HashMap<ContentDigest, PathBuf> {
    let mut sources = HashMap::new();
    for (path, record) in old {
        if new.get(path) == Some(record) {
            sources
                .entry(record.digest.clone())
                .or_insert_with(|| path.clone());
        }
    }
    sources
}
