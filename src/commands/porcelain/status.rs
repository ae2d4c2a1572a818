use crate::areas::repository::Repository;
use crate::areas::scanner::ScanOptions;
use crate::artifacts::diff::format::write_pretty;
use crate::artifacts::diff::tree_diff::diff_flat;
use crate::commands::porcelain::{detect_and_filter, display_width, filter_flat};
use std::io::Write;

impl Repository {
    /// Summarize changes since the last commit
    ///
    /// Two sections: HEAD vs STAGED ("staged for commit") and STAGED vs
    /// WORKING ("not staged"). `--rehash` bypasses the digest cache, which
    /// is how silently corrupted files surface as modified. `--ignored`
    /// appends the ignored-directory listing.
    #[allow(clippy::too_many_arguments)]
    pub async fn status(
        &mut self,
        pattern_args: &[String],
        staged_only: bool,
        rehash: bool,
        ignored: bool,
        abbrev: bool,
        rename_limit: Option<usize>,
    ) -> anyhow::Result<()> {
        let patterns = self.parse_patterns(pattern_args)?;
        let limit = self.rename_limit(rename_limit);

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let head = self.head_flat()?;
        let staged = index.staged_flat(&head);

        let head_view = filter_flat(&head, &patterns);
        let staged_view = filter_flat(&staged, &patterns);

        let staged_entries =
            detect_and_filter(diff_flat(&head_view, &staged_view), limit, None, None);

        let width = display_width(&staged_entries, abbrev);
        {
            let mut writer = self.writer();
            writeln!(writer, "Changes staged for commit:")?;
            write_pretty(&mut *writer, &staged_entries, width)?;
            writeln!(writer)?;
        }

        if !staged_only {
            let cache = self.cache();
            let mut cache = cache.lock().await;
            let outcome = self
                .scanner()
                .scan(
                    &mut cache,
                    &patterns,
                    ScanOptions {
                        rehash,
                        include_ignored: ignored,
                    },
                )
                .await?;

            // unreadable files are reported as errors, not as deletions
            let mut working_changes = diff_flat(&staged_view, &outcome.files);
            for error in &outcome.errors {
                working_changes.remove(&error.path);
            }
            let working_entries = detect_and_filter(working_changes, limit, None, None);

            let width = display_width(&working_entries, abbrev);
            let mut writer = self.writer();
            writeln!(writer, "Changes not staged for commit:")?;
            write_pretty(&mut *writer, &working_entries, width)?;
            writeln!(writer)?;

            if ignored {
                writeln!(writer, "Ignored files:")?;
                for dir in &outcome.ignored {
                    writeln!(writer, "  {}/", dir.display())?;
                }
                writeln!(writer)?;
            }

            for error in &outcome.errors {
                tracing::warn!("{}: {}", error.path.display(), error.message);
            }
        }

        Ok(())
    }
}
