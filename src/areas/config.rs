//! Repository configuration
//!
//! `.sod/config` is a flat `key=value` file, one pair per line, `#` starting
//! a comment line. Three keys are exposed through `sod config`; the
//! `aux.<name>.url` / `aux.<name>.type` keys are managed by `sod aux` and
//! `core.hashAlgorithm` is written once at init.

use crate::artifacts::aux::{AuxStoreSpec, UrlTemplate};
use crate::errors::SodError;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

pub const KEY_SNAPSHOT_COMMAND: &str = "snapshot.command";
pub const KEY_USER_NAME: &str = "user.name";
pub const KEY_RENAME_LIMIT: &str = "diff.renameLimit";
pub const KEY_HASH_ALGORITHM: &str = "core.hashAlgorithm";

/// Keys accepted by `sod config`
pub const PUBLIC_KEYS: [&str; 3] = [KEY_SNAPSHOT_COMMAND, KEY_USER_NAME, KEY_RENAME_LIMIT];

const AUX_KEY_PATTERN: &str = r"^aux\.([^./=]+)\.url$";

#[derive(Debug)]
pub struct Config {
    path: Box<Path>,
    values: BTreeMap<String, String>,
}

impl Config {
    pub fn load(path: Box<Path>) -> anyhow::Result<Self> {
        let mut values = BTreeMap::new();

        if path.exists() {
            let content =
                std::fs::read_to_string(&path).map_err(|source| SodError::IoFailure {
                    path: path.to_path_buf(),
                    source,
                })?;
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    values.insert(key.trim().to_string(), value.to_string());
                }
            }
        }

        Ok(Config { path, values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn unset(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Require a key to be one `sod config` accepts
    pub fn check_public_key(key: &str) -> anyhow::Result<()> {
        if PUBLIC_KEYS.contains(&key) {
            Ok(())
        } else {
            Err(SodError::BadArgument(format!("no such configuration option: {}", key)).into())
        }
    }

    /// Persist atomically via temp file + rename
    pub fn save(&self) -> anyhow::Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid config path"))?;
        let temp_path = parent.join(format!("config.tmp-{}", rand::random::<u32>()));

        let mut file = std::fs::File::create(&temp_path).map_err(|source| SodError::IoFailure {
            path: temp_path.clone(),
            source,
        })?;
        for (key, value) in &self.values {
            writeln!(file, "{}={}", key, value).map_err(|source| SodError::IoFailure {
                path: temp_path.clone(),
                source,
            })?;
        }
        file.sync_all().map_err(|source| SodError::IoFailure {
            path: temp_path.clone(),
            source,
        })?;
        drop(file);

        std::fs::rename(&temp_path, &self.path).map_err(|source| SodError::IoFailure {
            path: self.path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// All registered auxiliary stores, sorted by name
    pub fn aux_stores(&self) -> anyhow::Result<Vec<AuxStoreSpec>> {
        let pattern = Regex::new(AUX_KEY_PATTERN)?;
        let mut stores = Vec::new();

        for (key, url) in &self.values {
            let Some(captures) = pattern.captures(key) else {
                continue;
            };
            let name = captures[1].to_string();
            stores.push(AuxStoreSpec::new(name, UrlTemplate::parse(url)?));
        }

        Ok(stores)
    }

    pub fn aux_store(&self, name: &str) -> anyhow::Result<Option<AuxStoreSpec>> {
        match self.get(&format!("aux.{}.url", name)) {
            Some(url) => Ok(Some(AuxStoreSpec::new(
                name.to_string(),
                UrlTemplate::parse(url)?,
            ))),
            None => Ok(None),
        }
    }

    pub fn add_aux_store(&mut self, name: &str, type_name: &str, url: &str) {
        self.set(&format!("aux.{}.url", name), url);
        self.set(&format!("aux.{}.type", name), type_name);
    }

    pub fn remove_aux_store(&mut self, name: &str) {
        self.unset(&format!("aux.{}.url", name));
        self.unset(&format!("aux.{}.type", name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        Config::load(dir.path().join("config").into_boxed_path()).unwrap()
    }

    #[test]
    fn set_save_reload() {
        let dir = TempDir::new().unwrap();

        let mut first = config(&dir);
        first.set(KEY_USER_NAME, "archivist");
        first.set(KEY_SNAPSHOT_COMMAND, "snapper create");
        first.save().unwrap();

        let second = config(&dir);
        assert_eq!(second.get(KEY_USER_NAME), Some("archivist"));
        assert_eq!(second.get(KEY_SNAPSHOT_COMMAND), Some("snapper create"));
        assert_eq!(second.get("missing"), None);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config"),
            "# header\n\nuser.name=someone\n",
        )
        .unwrap();

        let loaded = config(&dir);
        assert_eq!(loaded.get(KEY_USER_NAME), Some("someone"));
    }

    #[test]
    fn public_key_validation() {
        assert!(Config::check_public_key("user.name").is_ok());
        assert!(Config::check_public_key("aux.snap.url").is_err());
        assert!(Config::check_public_key("nonsense").is_err());
    }

    #[test]
    fn aux_stores_round_trip() {
        let dir = TempDir::new().unwrap();

        let mut cfg = config(&dir);
        cfg.add_aux_store("mirror", "plain", "file:///backups/mirror");
        cfg.add_aux_store("offsite", "plain", "ssh://nas/backups/*");
        cfg.save().unwrap();

        let stores = config(&dir).aux_stores().unwrap();
        let names: Vec<_> = stores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["mirror", "offsite"]);

        let mut cfg = config(&dir);
        cfg.remove_aux_store("mirror");
        assert_eq!(cfg.aux_stores().unwrap().len(), 1);
    }
}
