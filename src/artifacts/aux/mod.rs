//! Auxiliary data stores
//!
//! An auxiliary store is an external snapshot collection of the working
//! tree — a plain local or SSH-reachable copy of the repository at some
//! earlier revision. Sod never stores file contents, so these snapshots are
//! the only place bytes can be restored from.
//!
//! The URL template names either a single snapshot root or, with one `*` in
//! its path, a whole family of roots; each root is itself a sod repository
//! whose head commit tells which revision the snapshot was taken after.

pub(crate) mod plain;

use crate::artifacts::index::checksum::{ChecksumReader, ChecksumWriter};
use crate::artifacts::objects::digest::ContentDigest;
use crate::errors::SodError;
use derive_new::new;
use std::collections::HashMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlScheme {
    File,
    Ssh,
}

/// Auxiliary store kind, derived from the URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxKind {
    PlainLocal,
    PlainRemote,
}

impl AuxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuxKind::PlainLocal => "plain-local",
            AuxKind::PlainRemote => "plain-remote",
        }
    }
}

/// Validated snapshot URL template
///
/// `file://PATH` or `ssh://HOST/PATH`, at most one `*` in the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    pub scheme: UrlScheme,
    pub host: Option<String>,
    pub path: String,
}

impl UrlTemplate {
    pub fn parse(url: &str) -> anyhow::Result<Self> {
        let bad = |reason: &str| SodError::BadArgument(format!("{}: {}", reason, url));

        let (scheme, host, path) = if let Some(rest) = url.strip_prefix("file://") {
            (UrlScheme::File, None, rest.to_string())
        } else if let Some(rest) = url.strip_prefix("ssh://") {
            let (host, path) = rest
                .split_once('/')
                .ok_or_else(|| bad("invalid URL: no path specified"))?;
            (
                UrlScheme::Ssh,
                Some(host.to_string()),
                format!("/{}", path),
            )
        } else if url.contains("://") {
            return Err(bad("unsupported URL: unrecognized scheme").into());
        } else {
            (UrlScheme::File, None, url.to_string())
        };

        if path.is_empty() {
            return Err(bad("invalid URL: no path specified").into());
        }
        if let Some(host) = &host {
            if host.is_empty() {
                return Err(bad("invalid URL: empty host").into());
            }
            if host.contains('*') {
                return Err(bad("unsupported URL: host must not contain '*'").into());
            }
        }
        if path.matches('*').count() > 1 {
            return Err(bad("unsupported URL: multiple '*' in path").into());
        }

        Ok(UrlTemplate { scheme, host, path })
    }

    pub fn has_wildcard(&self) -> bool {
        self.path.contains('*')
    }

    /// Snapshot root path with the wildcard expanded
    pub fn expand(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => self.path.replacen('*', id, 1),
            None => self.path.clone(),
        }
    }

    pub fn display(&self) -> String {
        match (&self.scheme, &self.host) {
            (UrlScheme::File, _) => format!("file://{}", self.path),
            (UrlScheme::Ssh, Some(host)) => format!("ssh://{}{}", host, self.path),
            (UrlScheme::Ssh, None) => format!("ssh://{}", self.path),
        }
    }
}

/// A registered auxiliary store
#[derive(Debug, Clone, new)]
pub struct AuxStoreSpec {
    pub name: String,
    pub url: UrlTemplate,
}

impl AuxStoreSpec {
    pub fn kind(&self) -> AuxKind {
        match self.url.scheme {
            UrlScheme::File => AuxKind::PlainLocal,
            UrlScheme::Ssh => AuxKind::PlainRemote,
        }
    }

    /// Validate a store name given on the command line
    pub fn check_name(name: &str) -> anyhow::Result<()> {
        if name.is_empty() || name.contains('/') || name.contains('.') {
            return Err(SodError::BadArgument(format!(
                "auxiliary store name may not be empty or contain '/' or '.': {}",
                name
            ))
            .into());
        }
        Ok(())
    }

    /// Reference string shown to the user: `name` or `name/id`
    pub fn reference(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/{}", self.name, id),
            None => self.name.clone(),
        }
    }
}

const SNAPSHOT_CACHE_SIGNATURE: &[u8; 4] = b"SAUX";
const SNAPSHOT_CACHE_VERSION: u32 = 1;

/// Cached view of one auxiliary snapshot
///
/// Records which commit the snapshot was taken after and a reverse
/// `{digest -> [path]}` index over its tree. Losing a cache costs an
/// `aux update`, never correctness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTree {
    pub base_commit: ContentDigest,
    pub tree: ContentDigest,
    pub paths_by_digest: HashMap<ContentDigest, Vec<PathBuf>>,
}

impl SnapshotTree {
    pub fn new(base_commit: ContentDigest, tree: ContentDigest) -> Self {
        SnapshotTree {
            base_commit,
            tree,
            paths_by_digest: HashMap::new(),
        }
    }

    pub fn insert(&mut self, digest: ContentDigest, path: PathBuf) {
        self.paths_by_digest.entry(digest).or_default().push(path);
    }

    pub fn paths_for(&self, digest: &ContentDigest) -> &[PathBuf] {
        self.paths_by_digest
            .get(digest)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use std::os::unix::ffi::OsStrExt;

        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid snapshot cache path"))?;
        std::fs::create_dir_all(parent).map_err(|source| SodError::IoFailure {
            path: parent.to_path_buf(),
            source,
        })?;
        let temp_path = parent.join(format!(
            ".tmp-{}-{}",
            rand::random::<u32>(),
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        ));

        let file = std::fs::File::create(&temp_path).map_err(|source| SodError::IoFailure {
            path: temp_path.clone(),
            source,
        })?;
        let mut writer = ChecksumWriter::new(std::io::BufWriter::new(file));
        writer.write_bytes(SNAPSHOT_CACHE_SIGNATURE)?;
        writer.write_u32(SNAPSHOT_CACHE_VERSION)?;

        let mut raw = Vec::new();
        self.base_commit.write_raw_to(&mut raw)?;
        self.tree.write_raw_to(&mut raw)?;
        writer.write_bytes(&raw)?;

        // deterministic order
        let mut pairs: Vec<(&ContentDigest, &PathBuf)> = self
            .paths_by_digest
            .iter()
            .flat_map(|(digest, paths)| paths.iter().map(move |path| (digest, path)))
            .collect();
        pairs.sort();

        writer.write_u32(pairs.len() as u32)?;
        for (digest, path) in pairs {
            let mut raw = Vec::new();
            digest.write_raw_to(&mut raw)?;
            writer.write_bytes(&raw)?;
            let path_bytes = path.as_os_str().as_bytes();
            writer.write_u32(path_bytes.len() as u32)?;
            writer.write_bytes(path_bytes)?;
        }

        writer.finish()?;
        std::fs::rename(&temp_path, path).map_err(|source| SodError::IoFailure {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use std::os::unix::ffi::OsStringExt;

        let file = std::fs::File::open(path).map_err(|source| SodError::IoFailure {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = ChecksumReader::new(BufReader::new(file));

        if reader.read_bytes(4)? != SNAPSHOT_CACHE_SIGNATURE {
            return Err(anyhow::anyhow!("bad snapshot cache signature"));
        }
        if reader.read_u32()? != SNAPSHOT_CACHE_VERSION {
            return Err(anyhow::anyhow!("unsupported snapshot cache version"));
        }

        let raw = reader.read_bytes(20)?;
        let base_commit = ContentDigest::read_raw_from(&mut raw.as_slice())?;
        let raw = reader.read_bytes(20)?;
        let tree = ContentDigest::read_raw_from(&mut raw.as_slice())?;

        let mut snapshot = SnapshotTree::new(base_commit, tree);
        let count = reader.read_u32()?;
        for _ in 0..count {
            let raw = reader.read_bytes(20)?;
            let digest = ContentDigest::read_raw_from(&mut raw.as_slice())?;
            let path_len = reader.read_u32()? as usize;
            let path_bytes = reader.read_bytes(path_len)?;
            snapshot.insert(
                digest,
                PathBuf::from(std::ffi::OsString::from_vec(path_bytes)),
            );
        }

        reader.verify()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn parses_file_urls() {
        let template = UrlTemplate::parse("file:///backups/main").unwrap();
        assert_eq!(template.scheme, UrlScheme::File);
        assert_eq!(template.host, None);
        assert_eq!(template.path, "/backups/main");
        assert!(!template.has_wildcard());
    }

    #[test]
    fn parses_ssh_urls_with_wildcard() {
        let template = UrlTemplate::parse("ssh://nas/backups/snap-*").unwrap();
        assert_eq!(template.scheme, UrlScheme::Ssh);
        assert_eq!(template.host.as_deref(), Some("nas"));
        assert!(template.has_wildcard());
        assert_eq!(template.expand(Some("2024")), "/backups/snap-2024");
    }

    #[test]
    fn scheme_less_urls_are_local_paths() {
        let template = UrlTemplate::parse("/backups/main").unwrap();
        assert_eq!(template.scheme, UrlScheme::File);
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(UrlTemplate::parse("http://host/path").is_err());
        assert!(UrlTemplate::parse("ssh://h*st/path").is_err());
        assert!(UrlTemplate::parse("file:///a/*/b/*").is_err());
        assert!(UrlTemplate::parse("ssh://hostonly").is_err());
    }

    #[test]
    fn kind_follows_scheme() {
        let local = AuxStoreSpec::new(
            "snap".to_string(),
            UrlTemplate::parse("file:///backups").unwrap(),
        );
        assert_eq!(local.kind(), AuxKind::PlainLocal);

        let remote = AuxStoreSpec::new(
            "nas".to_string(),
            UrlTemplate::parse("ssh://nas/backups").unwrap(),
        );
        assert_eq!(remote.kind(), AuxKind::PlainRemote);
    }

    #[test]
    fn store_names_are_validated() {
        assert!(AuxStoreSpec::check_name("snap").is_ok());
        assert!(AuxStoreSpec::check_name("a/b").is_err());
        assert!(AuxStoreSpec::check_name("a.b").is_err());
        assert!(AuxStoreSpec::check_name("").is_err());
    }

    #[test]
    fn snapshot_tree_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("aux").join("snap").join("@root");

        let mut snapshot = SnapshotTree::new(
            ContentDigest::hash_bytes(b"commit"),
            ContentDigest::hash_bytes(b"tree"),
        );
        snapshot.insert(ContentDigest::hash_bytes(b"a"), "photos/a.jpg".into());
        snapshot.insert(ContentDigest::hash_bytes(b"a"), "copies/a.jpg".into());
        snapshot.insert(ContentDigest::hash_bytes(b"b"), "b.txt".into());

        snapshot.save(&cache_path).unwrap();
        let mut loaded = SnapshotTree::load(&cache_path).unwrap();

        // path lists come back sorted
        for paths in loaded.paths_by_digest.values_mut() {
            paths.sort();
        }
        let mut expected = snapshot.clone();
        for paths in expected.paths_by_digest.values_mut() {
            paths.sort();
        }
        assert_eq!(loaded, expected);
    }
}
