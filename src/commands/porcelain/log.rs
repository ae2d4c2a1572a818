use crate::areas::repository::Repository;
use crate::artifacts::diff::format::write_pretty;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::log::HistoryWalker;
use crate::commands::porcelain::{detect_and_filter, display_width};
use crate::errors::SodError;
use colored::Colorize;
use std::io::Write;
use std::path::Path;

impl Repository {
    /// Show the commit log
    ///
    /// Walks the parent chain from HEAD. Every commit with matching cached
    /// auxiliary snapshots is decorated with their references, so the log
    /// doubles as the answer to "which revisions can I still restore?".
    pub async fn log(&mut self, abbrev: bool, rename_limit: Option<usize>) -> anyhow::Result<()> {
        let Some((head_digest, _)) = self.head_commit()? else {
            return Err(SodError::BadArgument("no commit found".to_string()).into());
        };

        let limit = self.rename_limit(rename_limit);
        let specs = self.config().aux_stores()?;
        let snapshots_by_commit = self.aux_registry().snapshots_by_commit(&specs);

        for step in HistoryWalker::new(self.database(), head_digest.clone()) {
            let (digest, commit) = step?;

            let mut decorations = Vec::new();
            if digest == head_digest {
                decorations.push("HEAD".to_string());
            }
            if let Some(references) = snapshots_by_commit.get(&digest) {
                decorations.extend(references.iter().cloned());
            }
            let decoration = if decorations.is_empty() {
                String::new()
            } else {
                format!(" ({})", decorations.join(", "))
            };

            let parent_tree = match commit.parent() {
                Some(parent) => Some(self.database().parse_commit(parent)?.tree().clone()),
                None => None,
            };

            let mut tree_diff = TreeDiff::new(self.database());
            tree_diff.compare_digests(
                parent_tree.as_ref(),
                Some(commit.tree()),
                Path::new(""),
            )?;
            let entries = detect_and_filter(tree_diff.into_change_set(), limit, None, None);
            let width = display_width(&entries, abbrev);

            let header = format!("commit {}{}", digest, decoration);
            let mut writer = self.writer();
            writeln!(writer, "{}", header.as_str().yellow())?;
            writeln!(writer, "Date: {}", commit.author().readable_timestamp())?;
            writeln!(writer)?;
            for line in commit.message().lines() {
                writeln!(writer, "    {}", line)?;
            }
            writeln!(writer)?;
            write_pretty(&mut *writer, &entries, width)?;
            writeln!(writer)?;
        }

        Ok(())
    }
}
