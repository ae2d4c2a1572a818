use crate::areas::repository::Repository;
use crate::areas::scanner::ScanOptions;
use crate::errors::SodError;
use std::collections::BTreeSet;
use std::path::PathBuf;

impl Repository {
    /// Stage changes for recording with the next commit
    ///
    /// Each pattern is matched against the union of working-tree paths and
    /// tracked paths, which is what makes deletions stageable for files
    /// that no longer exist on disk. Every matched path has its current
    /// working state transcribed into STAGED, overwriting any previous
    /// stage for that path. Without patterns, everything is staged.
    pub async fn add(&mut self, pattern_args: &[String]) -> anyhow::Result<()> {
        let patterns = self.parse_patterns(pattern_args)?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let head = self.head_flat()?;
        let staged = index.staged_flat(&head);

        let cache = self.cache();
        let mut cache = cache.lock().await;
        let outcome = self
            .scanner()
            .scan(&mut cache, &patterns, ScanOptions::default())
            .await?;
        drop(cache);

        // unreadable files must not be mistaken for deletions
        let unreadable: BTreeSet<&PathBuf> =
            outcome.errors.iter().map(|error| &error.path).collect();

        let mut union: BTreeSet<&PathBuf> = outcome.files.keys().collect();
        union.extend(head.keys());
        union.extend(staged.keys());

        let matched_sets: Vec<Vec<PathBuf>> = if patterns.is_empty() {
            vec![union.iter().map(|path| (*path).clone()).collect()]
        } else {
            patterns
                .iter()
                .map(|pattern| {
                    let matched: Vec<PathBuf> = union
                        .iter()
                        .filter(|path| pattern.matches(path))
                        .map(|path| (*path).clone())
                        .collect();
                    if matched.is_empty() {
                        return Err(SodError::NoMatch(pattern.display().to_string()).into());
                    }
                    Ok(matched)
                })
                .collect::<anyhow::Result<_>>()?
        };

        for matched in matched_sets {
            for path in matched {
                if unreadable.contains(&path) {
                    tracing::warn!("not staging unreadable file {}", path.display());
                    continue;
                }
                let working = outcome.files.get(&path).cloned();
                index.stage(&path, working, &head);
            }
        }

        index.save()?;

        for error in &outcome.errors {
            tracing::warn!("{}: {}", error.path.display(), error.message);
        }
        Ok(())
    }

    /// Reset changes staged for recording with the next commit
    ///
    /// Matched staged entries revert to their HEAD state. Without patterns
    /// the whole staged delta is discarded.
    pub async fn reset(&mut self, pattern_args: &[String]) -> anyhow::Result<()> {
        let patterns = self.parse_patterns(pattern_args)?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if patterns.is_empty() {
            index.clear();
        } else {
            for pattern in &patterns {
                let matched: Vec<PathBuf> = index
                    .staged_paths()
                    .filter(|path| pattern.matches(path))
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    return Err(SodError::NoMatch(pattern.display().to_string()).into());
                }
                for path in matched {
                    index.reset_path(&path);
                }
            }
        }

        index.save()?;
        Ok(())
    }
}
