// src/pkgset.rs

//! Persisted package sets
//!
//! A package set is a YAML map of `FQN: true` stored under a root's
//! `var/db/x10/`. Two sets are used: `world` (what was asked for) and
//! `installed` (what is present). Reads take a shared lock and writes an
//! exclusive one on the set's sibling `.lock` file.

use crate::db::paths;
use crate::error::{Error, Result};
use crate::lock::DocumentLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageSet {
    /// `None` for a detached in-memory set
    backing_file: Option<PathBuf>,
    contents: BTreeMap<String, bool>,
}

impl PackageSet {
    /// Open and read the named set of a root
    pub fn open(root: &Path, name: &str) -> Result<Self> {
        let mut set = Self {
            backing_file: Some(paths::package_set_path(root, name)),
            contents: BTreeMap::new(),
        };
        set.read()?;
        Ok(set)
    }

    /// A set that is never persisted
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reload from disk; a missing file reads as an empty set
    pub fn read(&mut self) -> Result<()> {
        let Some(path) = &self.backing_file else {
            return Ok(());
        };

        let _lock = DocumentLock::shared(path)?;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.contents.clear();
                return Ok(());
            }
            Err(e) => {
                return Err(Error::StorageError(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        self.contents = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|e| Error::StorageError(format!("{}: {}", path.display(), e)))?
        };
        debug!("Read {} entries from {}", self.contents.len(), path.display());
        Ok(())
    }

    /// Persist the set
    pub fn write(&self) -> Result<()> {
        let Some(path) = &self.backing_file else {
            return Ok(());
        };

        let _lock = DocumentLock::exclusive(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_yaml::to_string(&self.contents)?;
        fs::write(path, raw).map_err(|e| {
            Error::StorageError(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    pub fn mark(&mut self, fqn: &str) {
        self.contents.insert(fqn.to_string(), true);
    }

    pub fn unmark(&mut self, fqn: &str) {
        self.contents.remove(fqn);
    }

    pub fn check(&self, fqn: &str) -> bool {
        self.contents.get(fqn).copied().unwrap_or(false)
    }

    /// Members in sorted order
    pub fn list(&self) -> Vec<String> {
        self.contents
            .iter()
            .filter(|(_, marked)| **marked)
            .map(|(fqn, _)| fqn.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.contents.clear();
    }

    pub fn len(&self) -> usize {
        self.contents.values().filter(|marked| **marked).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_set_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let set = PackageSet::open(temp_dir.path(), paths::WORLD_SET).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_mark_write_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut set = PackageSet::open(temp_dir.path(), paths::INSTALLED_SET).unwrap();
        set.mark("zlib-1.3_0");
        set.mark("glibc-2.38_0");
        set.mark("zlib-1.3_0");
        set.write().unwrap();

        let reopened = PackageSet::open(temp_dir.path(), paths::INSTALLED_SET).unwrap();
        assert_eq!(reopened.list(), vec!["glibc-2.38_0", "zlib-1.3_0"]);
        assert!(reopened.check("zlib-1.3_0"));
        assert!(!reopened.check("openssl-3_0"));

        let raw = fs::read_to_string(paths::package_set_path(
            temp_dir.path(),
            paths::INSTALLED_SET,
        ))
        .unwrap();
        assert!(raw.contains("zlib-1.3_0: true"));
    }

    #[test]
    fn test_unmark_and_clear() {
        let mut set = PackageSet::empty();
        set.mark("a-1_0");
        set.mark("b-1_0");
        set.unmark("a-1_0");
        assert_eq!(set.list(), vec!["b-1_0"]);

        set.clear();
        assert!(set.is_empty());
        // Detached sets write nowhere
        set.write().unwrap();
    }

    #[test]
    fn test_reads_existing_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = paths::package_set_path(temp_dir.path(), paths::WORLD_SET);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "virtual/base-1_0: true\nold-1_0: false\n").unwrap();

        let set = PackageSet::open(temp_dir.path(), paths::WORLD_SET).unwrap();
        assert_eq!(set.list(), vec!["virtual/base-1_0"]);
        assert_eq!(set.len(), 1);
    }
}
