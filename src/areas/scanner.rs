//! Working-tree scanner
//!
//! Walks the repository root into a flat `{path -> (digest, mode)}` snapshot
//! without rehashing unchanged files. The walk is deterministic: directory
//! entries are visited in byte order of their names, and the result map is
//! sorted by path, so equal directory states scan to byte-identical output
//! regardless of worker count.
//!
//! ## Ignore rules
//!
//! A directory is ignored — reported, walked past, contents suppressed —
//! when it has an immediate child directory named `.git`, `.svn` or
//! `.snapshots`, or a file named `.sodignore`. Ignoring applies to
//! directories only. `.sod` itself is never scanned.
//!
//! ## Hashing
//!
//! Files whose stat signature matches the digest cache reuse the cached
//! digest. The rest are hashed on a `spawn_blocking` worker pool sized to
//! the number of hardware execution contexts; a semaphore permit is held
//! until the result has been accepted by the bounded result channel, so a
//! full queue applies backpressure to the pool. The collector is the single
//! writer of the cache. Symlinks to files hash as their target content;
//! symlinks to directories are not followed. Per-file errors (permissions,
//! vanished files) are collected and reported after the walk; only a failure
//! on the root itself aborts.

use crate::areas::digest_cache::DigestCache;
use crate::artifacts::diff::FlatTree;
use crate::artifacts::index::index_entry::StatSignature;
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::tree::TreeRecord;
use crate::artifacts::pathspec::Pattern;
use crate::errors::SodError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

/// Directory entries whose presence ignores the containing directory
const IGNORE_FLAG_DIRS: [&str; 3] = [".git", ".svn", ".snapshots"];
const IGNORE_FLAG_FILE: &str = ".sodignore";

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Bypass the digest cache and rehash every file
    pub rehash: bool,
    /// Collect the ignored-directory set
    pub include_ignored: bool,
}

/// One non-fatal failure encountered during a scan
#[derive(Debug)]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Scanned files, sorted by path
    pub files: FlatTree,
    /// Ignored directories, sorted
    pub ignored: Vec<PathBuf>,
    /// Per-file errors, in path order of discovery
    pub errors: Vec<ScanError>,
}

/// A file selected by the walk, waiting for its digest
#[derive(Debug)]
struct PendingFile {
    rel: PathBuf,
    abs: PathBuf,
    signature: StatSignature,
    mode: EntryMode,
}

#[derive(Debug)]
pub struct Scanner {
    root: Box<Path>,
}

impl Scanner {
    pub fn new(root: Box<Path>) -> Self {
        Scanner { root }
    }

    /// Scan the working tree
    ///
    /// `patterns` restricts the output (empty = everything). The cache is
    /// consulted and updated; after a full scan, entries for vanished paths
    /// are pruned and the cache is persisted.
    pub async fn scan(
        &self,
        cache: &mut DigestCache,
        patterns: &[Pattern],
        options: ScanOptions,
    ) -> anyhow::Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();
        let mut candidates = Vec::new();

        self.walk(Path::new(""), &mut candidates, &mut outcome)?;

        if !patterns.is_empty() {
            candidates.retain(|rel| patterns.iter().any(|pattern| pattern.matches(rel)));
        }

        let mut seen = BTreeSet::new();
        let mut pending = Vec::new();

        for rel in candidates {
            let abs = self.root.join(&rel);
            let metadata = match std::fs::metadata(&abs) {
                Ok(metadata) => metadata,
                Err(error) => {
                    if abs.symlink_metadata().is_ok() {
                        // broken symlink: nothing to hash
                        tracing::debug!("skipping dangling symlink {:?}", rel);
                    } else {
                        outcome.errors.push(ScanError {
                            path: rel,
                            message: error.to_string(),
                        });
                    }
                    continue;
                }
            };
            if !metadata.is_file() {
                continue; // symlink to a directory, fifo, socket
            }

            let signature = StatSignature::from(&metadata);
            let mode = EntryMode::from_file_path(&abs);
            seen.insert(rel.clone());

            if !options.rehash
                && let Some(digest) = cache.lookup(&rel, &signature)
            {
                outcome.files.insert(rel, TreeRecord::new(digest, mode));
                continue;
            }

            pending.push(PendingFile {
                rel,
                abs,
                signature,
                mode,
            });
        }

        self.hash_pending(pending, cache, &mut outcome).await?;

        if patterns.is_empty() {
            cache.retain_paths(&seen);
        }
        cache.persist()?;

        if options.include_ignored {
            if !patterns.is_empty() {
                outcome
                    .ignored
                    .retain(|dir| patterns.iter().any(|pattern| pattern.matches(dir)));
            }
            outcome.ignored.sort();
        } else {
            outcome.ignored.clear();
        }
        Ok(outcome)
    }

    /// Fan pending files out over the worker pool
    async fn hash_pending(
        &self,
        pending: Vec<PendingFile>,
        cache: &mut DigestCache,
        outcome: &mut ScanOutcome,
    ) -> anyhow::Result<()> {
        if pending.is_empty() {
            return Ok(());
        }

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::channel::<(PendingFile, std::io::Result<ContentDigest>)>(
            workers * 2,
        );

        let producer = async {
            for file in pending {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break; // semaphore never closes
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let abs = file.abs.clone();
                    let result =
                        match tokio::task::spawn_blocking(move || ContentDigest::hash_file(&abs))
                            .await
                        {
                            Ok(result) => result,
                            Err(join_error) => Err(std::io::Error::other(join_error)),
                        };
                    // keep the permit until the queue accepted the result,
                    // so a full queue throttles the pool
                    let _ = tx.send((file, result)).await;
                    drop(permit);
                });
            }
            drop(tx);
        };

        let consumer = async {
            while let Some((file, result)) = rx.recv().await {
                match result {
                    Ok(digest) => {
                        cache.record(file.rel.clone(), file.signature, digest.clone());
                        outcome
                            .files
                            .insert(file.rel, TreeRecord::new(digest, file.mode));
                    }
                    Err(error) => outcome.errors.push(ScanError {
                        path: file.rel,
                        message: error.to_string(),
                    }),
                }
            }
        };

        tokio::join!(producer, consumer);

        // channel drained after scan: error order must not depend on timing
        outcome.errors.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(())
    }

    /// Recursive deterministic walk collecting candidate files
    fn walk(
        &self,
        rel_dir: &Path,
        candidates: &mut Vec<PathBuf>,
        outcome: &mut ScanOutcome,
    ) -> anyhow::Result<()> {
        let abs_dir = self.root.join(rel_dir);

        let read = std::fs::read_dir(&abs_dir);
        let read = match read {
            Ok(read) => read,
            Err(source) => {
                if rel_dir.as_os_str().is_empty() {
                    // the root itself being unreadable is fatal
                    return Err(SodError::IoFailure {
                        path: abs_dir,
                        source,
                    }
                    .into());
                }
                outcome.errors.push(ScanError {
                    path: rel_dir.to_path_buf(),
                    message: source.to_string(),
                });
                return Ok(());
            }
        };

        let mut entries: Vec<(Vec<u8>, std::fs::DirEntry)> = Vec::new();
        for entry in read {
            match entry {
                Ok(entry) => {
                    use std::os::unix::ffi::OsStrExt;
                    entries.push((entry.file_name().as_bytes().to_vec(), entry));
                }
                Err(error) => outcome.errors.push(ScanError {
                    path: rel_dir.to_path_buf(),
                    message: error.to_string(),
                }),
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        if self.is_ignored_dir(&entries) {
            outcome.ignored.push(rel_dir.to_path_buf());
            return Ok(());
        }

        for (name, entry) in entries {
            if name == crate::areas::SOD_DIR.as_bytes() {
                continue;
            }

            let rel = rel_dir.join(entry.file_name());
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(error) => {
                    outcome.errors.push(ScanError {
                        path: rel,
                        message: error.to_string(),
                    });
                    continue;
                }
            };

            if file_type.is_dir() {
                self.walk(&rel, candidates, outcome)?;
            } else {
                // regular files and symlinks; the hash phase stats through
                // the link and drops non-files
                candidates.push(rel);
            }
        }

        Ok(())
    }

    fn is_ignored_dir(&self, entries: &[(Vec<u8>, std::fs::DirEntry)]) -> bool {
        entries.iter().any(|(name, entry)| {
            let Ok(file_type) = entry.file_type() else {
                return false;
            };
            let Some(name) = std::str::from_utf8(name).ok() else {
                return false;
            };
            (file_type.is_dir() && IGNORE_FLAG_DIRS.contains(&name))
                || (file_type.is_file() && name == IGNORE_FLAG_FILE)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::ffi::OsString;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn scanner_and_cache(dir: &TempDir) -> (Scanner, DigestCache) {
        let scanner = Scanner::new(dir.path().to_path_buf().into_boxed_path());
        // under .sod so the persisted cache never shows up in scan output
        let cache =
            DigestCache::load(dir.path().join(".sod").join("digests").into_boxed_path());
        (scanner, cache)
    }

    #[tokio::test]
    async fn scans_files_sorted_with_digests() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.txt", b"bee");
        write(dir.path(), "a/nested.txt", b"nested");
        write(dir.path(), "a.txt", b"hello");

        let (scanner, mut cache) = scanner_and_cache(&dir);
        let outcome = scanner
            .scan(&mut cache, &[], ScanOptions::default())
            .await
            .unwrap();

        let paths: Vec<_> = outcome.files.keys().cloned().collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("a/nested.txt"),
                PathBuf::from("b.txt")
            ]
        );
        assert_eq!(
            outcome.files[Path::new("a.txt")].digest,
            ContentDigest::hash_bytes(b"hello")
        );
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn repeated_scans_are_identical_and_cached() {
        let dir = TempDir::new().unwrap();
        for i in 0..40 {
            write(dir.path(), &format!("f{:02}.bin", i), &[i as u8; 100]);
        }

        let (scanner, mut cache) = scanner_and_cache(&dir);
        let first = scanner
            .scan(&mut cache, &[], ScanOptions::default())
            .await
            .unwrap();
        let second = scanner
            .scan(&mut cache, &[], ScanOptions::default())
            .await
            .unwrap();

        assert_eq!(first.files, second.files);
    }

    #[tokio::test]
    async fn rehash_sees_through_stale_cache() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "m.bin", b"original");

        let (scanner, mut cache) = scanner_and_cache(&dir);
        scanner
            .scan(&mut cache, &[], ScanOptions::default())
            .await
            .unwrap();

        // flip content but keep size and mtime, as corruption would
        let path = dir.path().join("m.bin");
        let metadata = std::fs::metadata(&path).unwrap();
        let mtime = filetime(&metadata);
        let flipped_content = b"originaX";
        std::fs::write(&path, flipped_content).unwrap();
        set_filetime(&path, mtime);

        let cached = scanner
            .scan(&mut cache, &[], ScanOptions::default())
            .await
            .unwrap();
        let rehashed = scanner
            .scan(
                &mut cache,
                &[],
                ScanOptions {
                    rehash: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // the stat-based scan still reports the old digest; --rehash does not
        assert_eq!(
            cached.files[Path::new("m.bin")].digest,
            ContentDigest::hash_bytes(b"original")
        );
        assert_eq!(
            rehashed.files[Path::new("m.bin")].digest,
            ContentDigest::hash_bytes(flipped_content)
        );
    }

    fn filetime(metadata: &std::fs::Metadata) -> (i64, i64) {
        use std::os::unix::fs::MetadataExt;
        (metadata.mtime(), metadata.mtime_nsec())
    }

    fn set_filetime(path: &Path, (seconds, nanos): (i64, i64)) {
        use std::os::unix::fs::MetadataExt;
        let file = std::fs::File::options().write(true).open(path).unwrap();
        let mtime = std::time::SystemTime::UNIX_EPOCH
            + std::time::Duration::new(seconds as u64, nanos as u32);
        file.set_times(std::fs::FileTimes::new().set_modified(mtime))
            .unwrap();
        let metadata = std::fs::metadata(path).unwrap();
        assert_eq!(metadata.mtime(), seconds);
    }

    #[tokio::test]
    async fn ignored_directories_are_suppressed_and_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tracked.txt", b"yes");
        write(dir.path(), "vendor/.sodignore", b"");
        write(dir.path(), "vendor/huge.bin", b"no");
        std::fs::create_dir_all(dir.path().join("checkout/.git")).unwrap();
        write(dir.path(), "checkout/code.c", b"no");

        let (scanner, mut cache) = scanner_and_cache(&dir);
        let outcome = scanner
            .scan(
                &mut cache,
                &[],
                ScanOptions {
                    include_ignored: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let paths: Vec<_> = outcome.files.keys().cloned().collect();
        assert_eq!(paths, vec![PathBuf::from("tracked.txt")]);
        assert_eq!(
            outcome.ignored,
            vec![PathBuf::from("checkout"), PathBuf::from("vendor")]
        );
    }

    #[tokio::test]
    async fn patterns_restrict_output() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.jpg", b"a");
        write(dir.path(), "b.png", b"b");
        write(dir.path(), "sub/c.jpg", b"c");

        let (scanner, mut cache) = scanner_and_cache(&dir);
        let patterns = vec![Pattern::parse(&OsString::from("*.jpg")).unwrap()];
        let outcome = scanner
            .scan(&mut cache, &patterns, ScanOptions::default())
            .await
            .unwrap();

        let paths: Vec<_> = outcome.files.keys().cloned().collect();
        assert_eq!(paths, vec![PathBuf::from("a.jpg")]);
    }

    #[tokio::test]
    async fn symlink_to_file_hashes_target_content() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "target.txt", b"linked content");
        std::os::unix::fs::symlink(dir.path().join("target.txt"), dir.path().join("alias.txt"))
            .unwrap();

        let (scanner, mut cache) = scanner_and_cache(&dir);
        let outcome = scanner
            .scan(&mut cache, &[], ScanOptions::default())
            .await
            .unwrap();

        assert_eq!(
            outcome.files[Path::new("alias.txt")].digest,
            ContentDigest::hash_bytes(b"linked content")
        );
    }
}
