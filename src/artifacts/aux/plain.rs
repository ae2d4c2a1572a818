//! Plain snapshot sources
//!
//! A plain auxiliary store is just a copy of the repository tree on some
//! filesystem. The `SnapshotSource` trait is the whole transport surface:
//! enumerate snapshot roots, read a file out of one, copy a file out of
//! one. The local implementation uses std::fs; the remote one shells out to
//! `ssh`/`scp`, which is treated as an external collaborator.

use crate::areas::SOD_DIR;
use crate::artifacts::aux::{AuxStoreSpec, UrlScheme, UrlTemplate};
use crate::errors::SodError;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait SnapshotSource {
    /// Enumerate snapshot ids by expanding the `*` wildcard
    ///
    /// `None` when the template has no wildcard and names a single root.
    /// Only roots that look like sod repositories (contain `.sod`) count.
    fn list_snapshot_ids(&self) -> anyhow::Result<Option<Vec<String>>>;

    /// Read a file from under a snapshot root
    fn read(&self, id: Option<&str>, rel: &Path) -> anyhow::Result<Vec<u8>>;

    /// Copy a file from under a snapshot root to a local destination
    fn fetch_to(&self, id: Option<&str>, rel: &Path, destination: &Path) -> anyhow::Result<()>;
}

pub fn source_for(spec: &AuxStoreSpec) -> Box<dyn SnapshotSource> {
    match spec.url.scheme {
        UrlScheme::File => Box::new(LocalSource {
            template: spec.url.clone(),
        }),
        UrlScheme::Ssh => Box::new(SshSource {
            host: spec.url.host.clone().unwrap_or_default(),
            template: spec.url.clone(),
        }),
    }
}

pub struct LocalSource {
    template: UrlTemplate,
}

impl LocalSource {
    fn root(&self, id: Option<&str>) -> PathBuf {
        PathBuf::from(self.template.expand(id))
    }
}

impl SnapshotSource for LocalSource {
    fn list_snapshot_ids(&self) -> anyhow::Result<Option<Vec<String>>> {
        let Some((prefix, suffix)) = self.template.path.split_once('*') else {
            return Ok(None);
        };

        // the wildcard is confined to one component, so enumerating the
        // directory holding it is enough
        let slash = prefix.rfind('/').map(|i| i + 1).unwrap_or(0);
        let dir = &prefix[..slash];
        let name_prefix = &prefix[slash..];

        let mut ids = Vec::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(Some(ids)),
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(id) = name.strip_prefix(name_prefix) else {
                continue;
            };

            let root = PathBuf::from(format!("{}{}{}", prefix, id, suffix));
            if root.join(SOD_DIR).is_dir() {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(Some(ids))
    }

    fn read(&self, id: Option<&str>, rel: &Path) -> anyhow::Result<Vec<u8>> {
        let path = self.root(id).join(rel);
        std::fs::read(&path).map_err(|source| SodError::IoFailure { path, source }.into())
    }

    fn fetch_to(&self, id: Option<&str>, rel: &Path, destination: &Path) -> anyhow::Result<()> {
        let path = self.root(id).join(rel);
        std::fs::copy(&path, destination)
            .map_err(|source| SodError::IoFailure { path, source })?;
        Ok(())
    }
}

pub struct SshSource {
    host: String,
    template: UrlTemplate,
}

impl SshSource {
    fn remote_path(&self, id: Option<&str>, rel: &Path) -> String {
        format!("{}/{}", self.template.expand(id), rel.display())
    }
}

/// Single-quote a string for a remote POSIX shell
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

impl SnapshotSource for SshSource {
    fn list_snapshot_ids(&self) -> anyhow::Result<Option<Vec<String>>> {
        let Some((prefix, suffix)) = self.template.path.split_once('*') else {
            return Ok(None);
        };

        // only roots that look like sod repositories match
        let sod_suffix = format!("{}/{}", suffix, SOD_DIR);
        let remote_command = format!(
            "ls -d {}*{}",
            shell_quote(prefix),
            shell_quote(&sod_suffix)
        );

        let output = Command::new("ssh")
            .arg(&self.host)
            .arg(remote_command)
            .output()
            .map_err(|error| SodError::RemoteFailure(format!("ssh: {}", error)))?;
        if !output.status.success() {
            return Err(SodError::RemoteFailure(format!(
                "listing snapshots on {}: {}",
                self.host,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut ids = Vec::new();
        for line in stdout.lines() {
            if let Some(rest) = line.strip_prefix(prefix)
                && let Some(id) = rest.strip_suffix(&sod_suffix)
            {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(Some(ids))
    }

    fn read(&self, id: Option<&str>, rel: &Path) -> anyhow::Result<Vec<u8>> {
        let remote_path = self.remote_path(id, rel);
        let output = Command::new("ssh")
            .arg(&self.host)
            .arg(format!("cat {}", shell_quote(&remote_path)))
            .output()
            .map_err(|error| SodError::RemoteFailure(format!("ssh: {}", error)))?;
        if !output.status.success() {
            return Err(SodError::RemoteFailure(format!(
                "reading {}:{}: {}",
                self.host,
                remote_path,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }
        Ok(output.stdout)
    }

    fn fetch_to(&self, id: Option<&str>, rel: &Path, destination: &Path) -> anyhow::Result<()> {
        let remote_path = self.remote_path(id, rel);
        let status = Command::new("scp")
            .arg("-q")
            .arg(format!("{}:{}", self.host, remote_path))
            .arg(destination)
            .status()
            .map_err(|error| SodError::RemoteFailure(format!("scp: {}", error)))?;
        if !status.success() {
            return Err(SodError::RemoteFailure(format!(
                "download failed: {}:{}",
                self.host, remote_path
            ))
            .into());
        }
        Ok(())
    }
}
