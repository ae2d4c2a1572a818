//! Repository abstraction and coordination
//!
//! The `Repository` type wires the lower-level components together
//! (database, index, refs, scanner, digest cache, config, auxiliary
//! registry) and carries the repository-wide lock for the lifetime of a
//! command. The porcelain commands are implemented as `impl Repository`
//! blocks under `crate::commands`.
//!
//! Opening a repository walks upward from the working directory looking for
//! `.sod`; commands invoked from a subdirectory interpret their path
//! arguments relative to that subdirectory.

use crate::areas::SOD_DIR;
use crate::areas::aux_registry::AuxRegistry;
use crate::areas::config::{Config, KEY_HASH_ALGORITHM, KEY_RENAME_LIMIT, KEY_USER_NAME};
use crate::areas::database::Database;
use crate::areas::digest_cache::DigestCache;
use crate::areas::index::Index;
use crate::areas::lock::RepoLock;
use crate::areas::refs::Refs;
use crate::areas::scanner::Scanner;
use crate::artifacts::diff::FlatTree;
use crate::artifacts::diff::rename::DEFAULT_RENAME_LIMIT;
use crate::artifacts::objects::DIGEST_HEX_LENGTH;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::pathspec::Pattern;
use crate::errors::SodError;
use std::cell::{RefCell, RefMut};
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Object database directory name
const DATABASE_DIR: &str = "objects";
/// Index file name
const INDEX_FILE: &str = "index";
/// Config file name
const CONFIG_FILE: &str = "config";
/// Cache directory name
const CACHE_DIR: &str = "cache";
/// Digest cache file name
const DIGEST_CACHE_FILE: &str = "digests";
/// Aux cache directory name
const AUX_CACHE_DIR: &str = "aux";

/// Fallback author name when `user.name` is unset
const DEFAULT_AUTHOR: &str = "sod";

pub struct Repository {
    /// Repository root (the directory holding `.sod`)
    root: Box<Path>,
    /// Working directory relative to the root, prepended to path arguments
    cwd_prefix: PathBuf,
    /// Output writer (stdout in production, a buffer in tests)
    writer: RefCell<Box<dyn std::io::Write>>,
    database: Database,
    index: Arc<Mutex<Index>>,
    cache: Arc<Mutex<DigestCache>>,
    refs: Refs,
    config: Config,
    aux_registry: AuxRegistry,
    /// Held until the command finishes; released on every exit path
    _lock: RepoLock,
}

impl Repository {
    /// Open the repository containing the current working directory
    ///
    /// Walks upward until a `.sod` directory is found and takes the
    /// repository lock.
    pub fn discover(writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;

        let mut root = cwd.clone();
        loop {
            if root.join(SOD_DIR).is_dir() {
                break;
            }
            if !root.pop() {
                return Err(SodError::NotARepository.into());
            }
        }

        let cwd_prefix = cwd
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self::open(root.into_boxed_path(), cwd_prefix, writer)
    }

    fn open(
        root: Box<Path>,
        cwd_prefix: PathBuf,
        writer: Box<dyn std::io::Write>,
    ) -> anyhow::Result<Self> {
        let sod_dir = root.join(SOD_DIR);
        let lock = RepoLock::acquire(&sod_dir)?;

        let database = Database::new(sod_dir.join(DATABASE_DIR).into_boxed_path());
        let index = Index::new(sod_dir.join(INDEX_FILE).into_boxed_path());
        let cache = DigestCache::load(
            sod_dir
                .join(CACHE_DIR)
                .join(DIGEST_CACHE_FILE)
                .into_boxed_path(),
        );
        let refs = Refs::new(sod_dir.clone().into_boxed_path());
        let config = Config::load(sod_dir.join(CONFIG_FILE).into_boxed_path())?;
        let aux_registry = AuxRegistry::new(
            sod_dir
                .join(CACHE_DIR)
                .join(AUX_CACHE_DIR)
                .into_boxed_path(),
        );

        Ok(Repository {
            root,
            cwd_prefix,
            writer: RefCell::new(writer),
            database,
            index: Arc::new(Mutex::new(index)),
            cache: Arc::new(Mutex::new(cache)),
            refs,
            config,
            aux_registry,
            _lock: lock,
        })
    }

    /// Initialize a repository in the given directory
    pub fn init_at(path: &Path) -> anyhow::Result<()> {
        if !path.is_dir() {
            return Err(
                SodError::BadArgument(format!("not a directory: {}", path.display())).into(),
            );
        }

        let sod_dir = path.join(SOD_DIR);
        if sod_dir.exists() {
            return Err(SodError::BadArgument(format!(
                "attempt to reinitialize: {}",
                path.display()
            ))
            .into());
        }

        for dir in [
            sod_dir.join(DATABASE_DIR),
            sod_dir.join("refs").join("heads"),
            sod_dir.join(CACHE_DIR),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| SodError::IoFailure {
                path: dir.clone(),
                source,
            })?;
        }

        // the hash algorithm is fixed for the repository's lifetime
        let mut config = Config::load(sod_dir.join(CONFIG_FILE).into_boxed_path())?;
        config.set(KEY_HASH_ALGORITHM, "sha1");
        config.save()?;

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn writer(&self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn cache(&self) -> Arc<Mutex<DigestCache>> {
        self.cache.clone()
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn aux_registry(&self) -> &AuxRegistry {
        &self.aux_registry
    }

    pub fn scanner(&self) -> Scanner {
        Scanner::new(self.root.clone())
    }

    /// The head commit, if any
    pub fn head_commit(&self) -> anyhow::Result<Option<(ContentDigest, Commit)>> {
        match self.refs.read_head()? {
            Some(digest) => {
                let commit = self.database.parse_commit(&digest)?;
                Ok(Some((digest, commit)))
            }
            None => Ok(None),
        }
    }

    /// HEAD flattened to paths, empty before the first commit
    pub fn head_flat(&self) -> anyhow::Result<FlatTree> {
        match self.head_commit()? {
            Some((_, commit)) => self.database.flatten_tree(commit.tree()),
            None => Ok(FlatTree::new()),
        }
    }

    /// Resolve a commit argument: `HEAD`, a full digest, or an unambiguous
    /// hex prefix
    pub fn resolve_commitish(&self, commitish: &str) -> anyhow::Result<(ContentDigest, Commit)> {
        if commitish == "HEAD" {
            return self
                .head_commit()?
                .ok_or_else(|| SodError::BadArgument("no commit found".to_string()).into());
        }

        if commitish.len() < 2
            || commitish.len() > DIGEST_HEX_LENGTH
            || !commitish.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(
                SodError::BadArgument(format!("bad revision: {}", commitish)).into(),
            );
        }

        let mut matches = self.database.find_by_prefix(&commitish.to_ascii_lowercase())?;
        match matches.len() {
            0 => Err(SodError::BadArgument(format!("bad revision: {}", commitish)).into()),
            1 => {
                let digest = matches.swap_remove(0);
                let commit = self.database.parse_commit(&digest).map_err(|_| {
                    SodError::BadArgument(format!("not a commit: {}", commitish))
                })?;
                Ok((digest, commit))
            }
            _ => Err(
                SodError::BadArgument(format!("ambiguous revision: {}", commitish)).into(),
            ),
        }
    }

    /// Author identity for new commits
    pub fn author(&self) -> Author {
        let name = self
            .config
            .get(KEY_USER_NAME)
            .unwrap_or(DEFAULT_AUTHOR)
            .to_string();
        Author::new(name)
    }

    /// Effective rename limit: flag, then `diff.renameLimit`, then default
    pub fn rename_limit(&self, flag: Option<usize>) -> usize {
        if let Some(limit) = flag {
            return limit;
        }
        match self.config.get(KEY_RENAME_LIMIT).map(str::parse) {
            Some(Ok(limit)) => limit,
            Some(Err(_)) => {
                tracing::warn!("ignoring unparsable {} value", KEY_RENAME_LIMIT);
                DEFAULT_RENAME_LIMIT
            }
            None => DEFAULT_RENAME_LIMIT,
        }
    }

    /// Parse path arguments into repo-relative patterns
    ///
    /// Arguments are interpreted relative to the invocation directory, so
    /// under a subdirectory `photos/` the argument `*.jpg` becomes the
    /// repo-relative pattern `photos/*.jpg`.
    pub fn parse_patterns(&self, args: &[String]) -> anyhow::Result<Vec<Pattern>> {
        args.iter()
            .map(|arg| {
                let mut bytes = self.cwd_prefix.as_os_str().as_bytes().to_vec();
                if !bytes.is_empty() {
                    bytes.push(b'/');
                }
                bytes.extend_from_slice(OsStr::new(arg.as_str()).as_bytes());
                Pattern::parse(&OsString::from_vec(bytes))
            })
            .collect()
    }

    /// Repo-relative form of one non-pattern path argument
    pub fn rel_path(&self, arg: &str) -> PathBuf {
        self.cwd_prefix.join(arg)
    }
}
