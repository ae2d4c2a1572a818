use crate::areas::repository::Repository;
use crate::artifacts::aux::plain::source_for;
use crate::artifacts::aux::{AuxStoreSpec, SnapshotTree};
use crate::artifacts::log::HistoryWalker;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::digest::ContentDigest;
use crate::errors::SodError;
use std::io::Write;
use std::path::{Path, PathBuf};

impl Repository {
    /// Restore file contents from an auxiliary data store
    ///
    /// The wanted digest comes from the tree of `--at COMMIT`, or from the
    /// most recent commit whose tree contains the path. Restoring a
    /// directory restores every file under it. Snapshots taken at the exact
    /// resolved commit are tried first, then any snapshot whose reverse
    /// index holds the digest. A working file that already carries the
    /// wanted digest is not rewritten.
    pub async fn restore(
        &mut self,
        path_arg: &str,
        at: Option<&str>,
        from_store: Option<&str>,
    ) -> anyhow::Result<()> {
        let rel = self.rel_path(path_arg);

        let (commit_digest, commit) = self.resolve_restore_commit(&rel, at)?;

        let record = self
            .database()
            .lookup_path(commit.tree(), &rel)?
            .ok_or_else(|| {
                SodError::NoMatch(format!(
                    "{} (not present in {})",
                    rel.display(),
                    commit_digest.abbreviate(10)
                ))
            })?;

        let targets: Vec<(PathBuf, ContentDigest)> = if record.is_tree() {
            self.database()
                .flatten_tree(&record.digest)?
                .into_iter()
                .map(|(sub_path, sub_record)| (rel.join(sub_path), sub_record.digest))
                .collect()
        } else {
            vec![(rel, record.digest)]
        };

        let snapshots = self.restore_candidates(from_store, &commit_digest)?;
        if snapshots.is_empty() {
            return Err(SodError::BadArgument(
                "no auxiliary store snapshots available; run 'sod aux update'".to_string(),
            )
            .into());
        }

        let mut restored = 0usize;
        let mut skipped = 0usize;
        let mut failed = Vec::new();

        for (path, digest) in &targets {
            match self.restore_one(path, digest, &snapshots)? {
                RestoreOutcome::Restored => restored += 1,
                RestoreOutcome::AlreadyPresent => skipped += 1,
                RestoreOutcome::Failed => failed.push(path.clone()),
            }
        }

        if !failed.is_empty() {
            return Err(SodError::BadArgument(format!(
                "could not restore: {}",
                failed
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
            .into());
        }
        if restored == 0 {
            return Err(SodError::BadArgument(
                "nothing to restore: working copy already matches".to_string(),
            )
            .into());
        }

        writeln!(
            self.writer(),
            "Restored {} file(s){}",
            restored,
            if skipped > 0 {
                format!(", {} already up to date", skipped)
            } else {
                String::new()
            }
        )?;
        Ok(())
    }

    /// Pick the commit whose tree defines the wanted digests
    fn resolve_restore_commit(
        &self,
        rel: &Path,
        at: Option<&str>,
    ) -> anyhow::Result<(ContentDigest, Commit)> {
        if let Some(commitish) = at {
            return self.resolve_commitish(commitish);
        }

        let Some((head_digest, _)) = self.head_commit()? else {
            return Err(SodError::BadArgument("no commit found".to_string()).into());
        };

        for step in HistoryWalker::new(self.database(), head_digest) {
            let (digest, commit) = step?;
            if self.database().lookup_path(commit.tree(), rel)?.is_some() {
                return Ok((digest, commit));
            }
        }

        Err(SodError::NoMatch(format!(
            "{} (never committed; try a different revision?)",
            rel.display()
        ))
        .into())
    }

    /// Cached snapshots ordered: exact-commit matches first
    fn restore_candidates(
        &self,
        from_store: Option<&str>,
        commit_digest: &ContentDigest,
    ) -> anyhow::Result<Vec<(AuxStoreSpec, Option<String>, SnapshotTree)>> {
        let specs = match from_store {
            Some(name) => {
                let spec = self.config().aux_store(name)?.ok_or_else(|| {
                    SodError::BadArgument(format!("no such auxiliary data store: {}", name))
                })?;
                vec![spec]
            }
            None => self.config().aux_stores()?,
        };

        let mut snapshots = Vec::new();
        for spec in specs {
            for (id, snapshot) in self.aux_registry().snapshots_of(&spec.name) {
                snapshots.push((spec.clone(), id, snapshot));
            }
        }

        // stable partition: exact-commit snapshots first, store order kept
        snapshots.sort_by_key(|(_, _, snapshot)| snapshot.base_commit != *commit_digest);
        Ok(snapshots)
    }

    fn restore_one(
        &self,
        path: &Path,
        digest: &ContentDigest,
        snapshots: &[(AuxStoreSpec, Option<String>, SnapshotTree)],
    ) -> anyhow::Result<RestoreOutcome> {
        let destination = self.root().join(path);

        if destination.is_file()
            && let Ok(current) = ContentDigest::hash_file(&destination)
            && current == *digest
        {
            tracing::info!("{} already matches, leaving untouched", path.display());
            return Ok(RestoreOutcome::AlreadyPresent);
        }

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SodError::IoFailure {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        for (spec, id, snapshot) in snapshots {
            let Some(snapshot_path) = snapshot.paths_for(digest).first() else {
                continue;
            };
            let reference = spec.reference(id.as_deref());
            tracing::info!("trying to restore {} from {}", path.display(), reference);

            // fetch next to the target, verify, then rename into place
            let temp = destination.with_extension(format!("sod-restore-{}", rand::random::<u32>()));
            let fetched = source_for(spec).fetch_to(id.as_deref(), snapshot_path, &temp);

            match fetched {
                Ok(()) => match ContentDigest::hash_file(&temp) {
                    Ok(current) if current == *digest => {
                        std::fs::rename(&temp, &destination).map_err(|source| {
                            SodError::IoFailure {
                                path: destination.clone(),
                                source,
                            }
                        })?;
                        return Ok(RestoreOutcome::Restored);
                    }
                    _ => {
                        tracing::warn!(
                            "snapshot {} returned wrong content for {}",
                            reference,
                            path.display()
                        );
                        let _ = std::fs::remove_file(&temp);
                    }
                },
                Err(error) => {
                    tracing::warn!("failed to restore from {}: {:#}", reference, error);
                    let _ = std::fs::remove_file(&temp);
                }
            }
        }

        Ok(RestoreOutcome::Failed)
    }
}

enum RestoreOutcome {
    Restored,
    AlreadyPresent,
    Failed,
}
