// src/db/mod.rs

//! Package database
//!
//! Each target root keeps one YAML document at `var/db/x10/pkgdb.yml`
//! holding every known package record (keyed by FQN) and a provider index
//! mapping atoms to the FQN that satisfies them. All access goes through
//! [`PackageDatabase`], which takes the document's advisory lock: shared for
//! reads, exclusive for read-modify-write cycles.

pub mod binpkg;
mod index;
pub mod paths;

pub use index::StaleReason;

use crate::error::{Error, Result};
use crate::lock::DocumentLock;
use crate::spec::{Package, PackageRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parsed contents of the database document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseContents {
    /// FQN -> record
    pub packages: BTreeMap<String, PackageRecord>,
    /// Atom -> FQN
    #[serde(rename = "providerindex")]
    pub provider_index: BTreeMap<String, String>,
}

impl DatabaseContents {
    /// Map an atom to an FQN
    ///
    /// An exact FQN wins over the provider index.
    pub fn find_fqn(&self, atom: &str) -> Result<String> {
        if self.packages.contains_key(atom) {
            return Ok(atom.to_string());
        }
        self.provider_index
            .get(atom)
            .cloned()
            .ok_or_else(|| Error::NotFoundError(format!("Can't find FQN for {}", atom)))
    }

    pub fn get(&self, fqn: &str) -> Result<&PackageRecord> {
        self.packages
            .get(fqn)
            .ok_or_else(|| Error::NotFoundError(format!("No package record for {}", fqn)))
    }

    /// Record `fqn` as a provider of `atom`
    ///
    /// When several packages provide the same atom the lexicographically
    /// greatest FQN is kept, whatever order they are added in.
    pub fn maybe_add_provider(&mut self, atom: &str, fqn: &str) {
        match self.provider_index.get(atom) {
            Some(existing) if existing.as_str() >= fqn => {}
            _ => {
                self.provider_index.insert(atom.to_string(), fqn.to_string());
            }
        }
    }

    /// Add a record's own name and, if valid, its generated provides
    fn add_providers_for(&mut self, fqn: &str) {
        let Some(record) = self.packages.get(fqn) else {
            return;
        };
        let mut atoms = Vec::new();
        if record.generated_valid {
            atoms.extend(record.generated_provides.iter().cloned());
        }
        atoms.push(record.meta.name.clone());

        for atom in atoms {
            self.maybe_add_provider(&atom, fqn);
        }
    }

    /// Drop the provider index and rebuild it from the records
    pub fn rebuild_provider_index(&mut self) {
        self.provider_index.clear();
        let fqns: Vec<String> = self.packages.keys().cloned().collect();
        for fqn in fqns {
            self.add_providers_for(&fqn);
        }
    }

    /// Whether the recorded metadata for this package matches the spec exactly
    pub fn check_up_to_date(&self, package: &Package) -> bool {
        let fqn = package.fqn();
        match self.packages.get(&fqn) {
            Some(record) if record.meta == package.meta => {
                debug!("{} already in database, meta matches", fqn);
                true
            }
            Some(_) => {
                warn!("Meta for {} doesn't match the package tree", fqn);
                false
            }
            None => false,
        }
    }
}

/// Handle to a package database document
#[derive(Debug, Clone)]
pub struct PackageDatabase {
    backing_file: PathBuf,
}

impl PackageDatabase {
    pub fn new<P: Into<PathBuf>>(backing_file: P) -> Self {
        Self {
            backing_file: backing_file.into(),
        }
    }

    /// The database of a target root
    pub fn for_root(root: &Path) -> Self {
        Self::new(paths::pkgdb_path(root))
    }

    pub fn backing_file(&self) -> &Path {
        &self.backing_file
    }

    /// Read the database under a shared lock
    ///
    /// A missing document reads as an empty database.
    pub fn read(&self) -> Result<DatabaseContents> {
        let _lock = DocumentLock::shared(&self.backing_file)?;
        self.unlocked_read()
    }

    /// Replace the database under an exclusive lock
    pub fn write(&self, contents: &DatabaseContents) -> Result<()> {
        let _lock = DocumentLock::exclusive(&self.backing_file)?;
        self.unlocked_write(contents)
    }

    /// Read, modify and write back the database under one exclusive lock
    pub fn modify<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut DatabaseContents) -> Result<T>,
    {
        let _lock = DocumentLock::exclusive(&self.backing_file)?;
        let mut contents = self.unlocked_read()?;
        let result = f(&mut contents)?;
        self.unlocked_write(&contents)?;
        Ok(result)
    }

    fn unlocked_read(&self) -> Result<DatabaseContents> {
        let raw = match fs::read_to_string(&self.backing_file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No database at {}, starting empty", self.backing_file.display());
                return Ok(DatabaseContents::default());
            }
            Err(e) => {
                return Err(Error::StorageError(format!(
                    "Failed to read {}: {}",
                    self.backing_file.display(),
                    e
                )));
            }
        };

        if raw.trim().is_empty() {
            return Ok(DatabaseContents::default());
        }

        serde_yaml::from_str(&raw).map_err(|e| {
            Error::StorageError(format!("{}: {}", self.backing_file.display(), e))
        })
    }

    fn unlocked_write(&self, contents: &DatabaseContents) -> Result<()> {
        if let Some(parent) = self.backing_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_yaml::to_string(contents)?;
        fs::write(&self.backing_file, raw).map_err(|e| {
            Error::StorageError(format!(
                "Failed to write {}: {}",
                self.backing_file.display(),
                e
            ))
        })
    }

    /// Register a freshly built package
    ///
    /// Generated dependency lists are picked up from `output_dir` (the
    /// package's destdir). A missing list is fine; any other read failure,
    /// or `force_invalid`, marks the record's generated data invalid.
    pub fn update(&self, package: &Package, output_dir: &Path, force_invalid: bool) -> Result<()> {
        let fqn = package.fqn();
        let mut record = package.to_record();
        record.generated_valid = true;

        match read_generated(&output_dir.join("generated-depends")) {
            Ok(Some(depends)) => record.generated_depends = depends,
            Ok(None) => debug!("{}: no generated depends", fqn),
            Err(e) => {
                warn!("{}: failed to read generated depends: {}", fqn, e);
                record.generated_valid = false;
            }
        }

        match read_generated(&output_dir.join("generated-provides")) {
            Ok(Some(provides)) => record.generated_provides = provides,
            Ok(None) => debug!("{}: no generated provides", fqn),
            Err(e) => {
                warn!("{}: failed to read generated provides: {}", fqn, e);
                record.generated_valid = false;
            }
        }

        if force_invalid {
            record.generated_valid = false;
        }

        self.modify(|contents| {
            contents.packages.insert(fqn.clone(), record);
            contents.add_providers_for(&fqn);
            Ok(())
        })?;

        info!("Updated package database in {}", self.backing_file.display());
        Ok(())
    }
}

/// Read a generated list from disk; `Ok(None)` if the file does not exist
fn read_generated(path: &Path) -> std::io::Result<Option<Vec<String>>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(binpkg::parse_generated(&content))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
