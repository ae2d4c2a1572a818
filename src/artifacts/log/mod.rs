//! Commit history traversal
//!
//! Sod keeps a single linear history: every commit has at most one parent.
//! The walker starts from a given commit and follows the parent chain
//! backwards.

use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::digest::ContentDigest;

pub struct HistoryWalker<'r> {
    database: &'r Database,
    next: Option<ContentDigest>,
}

impl<'r> HistoryWalker<'r> {
    pub fn new(database: &'r Database, start: ContentDigest) -> Self {
        HistoryWalker {
            database,
            next: Some(start),
        }
    }
}

impl Iterator for HistoryWalker<'_> {
    type Item = anyhow::Result<(ContentDigest, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let digest = self.next.take()?;

        match self.database.parse_commit(&digest) {
            Ok(commit) => {
                self.next = commit.parent().cloned();
                Some(Ok((digest, commit)))
            }
            Err(error) => Some(Err(error)),
        }
    }
}
