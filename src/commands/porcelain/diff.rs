use crate::areas::repository::Repository;
use crate::artifacts::diff::filter::DiffFilter;
use crate::artifacts::diff::format::{write_pretty, write_raw};
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::commands::porcelain::{detect_and_filter, display_width, unmodified_sources};
use std::io::Write;
use std::path::Path;

impl Repository {
    /// Show differences between two commits
    ///
    /// `--null-terminated` implies `--raw`; `--raw` implies `--no-abbrev`.
    /// Copy detection only runs when the filter requests `C`, since it
    /// needs both trees fully flattened.
    #[allow(clippy::too_many_arguments)]
    pub async fn diff(
        &mut self,
        old_commitish: &str,
        new_commitish: Option<&str>,
        abbrev: bool,
        raw: bool,
        null_terminated: bool,
        filter: Option<&str>,
        rename_limit: Option<usize>,
    ) -> anyhow::Result<()> {
        let raw = raw || null_terminated;
        let abbrev = abbrev && !raw;

        let filter = filter.map(DiffFilter::parse).transpose()?;
        let limit = self.rename_limit(rename_limit);

        let (_, old_commit) = self.resolve_commitish(old_commitish)?;
        let (_, new_commit) = self.resolve_commitish(new_commitish.unwrap_or("HEAD"))?;

        let mut tree_diff = TreeDiff::new(self.database());
        tree_diff.compare_digests(
            Some(old_commit.tree()),
            Some(new_commit.tree()),
            Path::new(""),
        )?;

        let copy_sources = match &filter {
            Some(filter) if filter.wants_copies() => {
                let old_flat = self.database().flatten_tree(old_commit.tree())?;
                let new_flat = self.database().flatten_tree(new_commit.tree())?;
                Some(unmodified_sources(&old_flat, &new_flat))
            }
            _ => None,
        };

        let entries = detect_and_filter(
            tree_diff.into_change_set(),
            limit,
            filter.as_ref(),
            copy_sources.as_ref(),
        );

        let mut writer = self.writer();
        if raw {
            write_raw(&mut *writer, &entries, null_terminated)?;
        } else {
            let width = display_width(&entries, abbrev);
            write_pretty(&mut *writer, &entries, width)?;
        }

        Ok(())
    }
}
