use crate::areas::config::KEY_SNAPSHOT_COMMAND;
use crate::areas::repository::Repository;
use crate::artifacts::diff::FlatTree;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::DIGEST_ABBREV_MIN;
use crate::errors::SodError;
use std::collections::HashSet;
use std::io::Write;

impl Repository {
    /// Record the staged changes as a new commit
    ///
    /// The staged tree is materialized bottom-up into the object store, the
    /// commit object written, and the ref moved by atomic rename — the
    /// single linearization point. Only then is the staged delta cleared.
    /// A snapshot command configured via `snapshot.command` runs afterwards
    /// when the commit introduces content absent from HEAD's whole tree;
    /// its failure is a warning, never a rollback.
    pub async fn commit(&mut self, message: &str, no_snapshot: bool) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if index.is_clean() {
            return Err(SodError::NothingToCommit.into());
        }

        let head = self.head_commit()?;
        let head_flat = self.head_flat()?;
        let staged = index.staged_flat(&head_flat);

        let tree_digest = self.database().write_tree_from_flat(&staged)?;
        if let Some((_, head_commit)) = &head
            && head_commit.tree() == &tree_digest
        {
            return Err(SodError::NothingToCommit.into());
        }

        let parent = head.as_ref().map(|(digest, _)| digest.clone());
        let commit = Commit::new(parent, tree_digest, self.author(), message.to_string());
        let commit_digest = self.database().store(&commit)?;

        self.refs().update_head(&commit_digest)?;

        index.clear();
        index.save()?;

        writeln!(
            self.writer(),
            "[master {}] {}",
            commit_digest.abbreviate(DIGEST_ABBREV_MIN),
            commit.short_message()
        )?;

        if !no_snapshot {
            self.maybe_run_snapshot_hook(&head_flat, &staged, &commit_digest);
        }

        Ok(())
    }

    /// Run the configured snapshot command after a content-introducing commit
    ///
    /// "New content" means at least one digest in the committed tree that
    /// appeared nowhere in HEAD's tree; a pure rename or deletion commit
    /// creates no snapshot. The command runs in a subshell with the commit
    /// digest as its first argument and inherits stdout/stderr.
    fn maybe_run_snapshot_hook(
        &self,
        head_flat: &FlatTree,
        committed: &FlatTree,
        commit_digest: &ContentDigest,
    ) {
        let Some(command) = self.config().get(KEY_SNAPSHOT_COMMAND) else {
            return;
        };
        if command.is_empty() {
            return;
        }

        let known: HashSet<&ContentDigest> =
            head_flat.values().map(|record| &record.digest).collect();
        let adds_new_content = committed
            .values()
            .any(|record| !known.contains(&record.digest));
        if !adds_new_content {
            tracing::debug!("no new content committed, skipping snapshot creation");
            return;
        }

        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .arg("sod-snapshot")
            .arg(commit_digest.as_ref())
            .status();

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!("snapshot command failed with {}", status);
            }
            Err(error) => {
                tracing::warn!("snapshot command could not be run: {}", error);
            }
        }
    }
}
