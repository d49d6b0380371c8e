// src/lock.rs

//! Advisory file locks for persisted documents
//!
//! Every persisted document (the package database, each package set) is
//! guarded by a sibling `<document>.lock` file. Readers take a shared
//! `flock`, writers an exclusive one. Because the lock lives in the kernel
//! rather than in this process, it also serializes separate operator
//! invocations working on the same root.
//!
//! # Example
//!
//! ```ignore
//! use x10::lock::DocumentLock;
//!
//! let _guard = DocumentLock::exclusive("/target/var/db/x10/pkgdb.yml")?;
//! // ... read, modify, write ...
//! // Lock released on drop
//! ```

use crate::error::{Error, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Kind of lock held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// A held advisory lock on a document's sibling lock file
///
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct DocumentLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl DocumentLock {
    /// Path of the lock file guarding `document`
    pub fn lock_path(document: &Path) -> PathBuf {
        let mut name = OsString::from(document.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take a shared lock, blocking until no writer holds it
    pub fn shared<P: AsRef<Path>>(document: P) -> Result<Self> {
        Self::acquire(document.as_ref(), LockMode::Shared)
    }

    /// Take an exclusive lock, blocking until every other holder releases it
    pub fn exclusive<P: AsRef<Path>>(document: P) -> Result<Self> {
        Self::acquire(document.as_ref(), LockMode::Exclusive)
    }

    /// Try to take an exclusive lock without blocking
    ///
    /// Returns `Ok(None)` if another holder has the lock.
    pub fn try_exclusive<P: AsRef<Path>>(document: P) -> Result<Option<Self>> {
        let path = Self::lock_path(document.as_ref());
        let file = open_lock_file(&path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self {
                file,
                path,
                mode: LockMode::Exclusive,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::LockError(format!(
                "Failed to try-lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn acquire(document: &Path, mode: LockMode) -> Result<Self> {
        let path = Self::lock_path(document);
        let file = open_lock_file(&path)?;

        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|e| {
            Error::LockError(format!("Failed to lock {}: {}", path.display(), e))
        })?;

        debug!("Acquired {:?} lock on {}", mode, path.display());
        Ok(Self { file, path, mode })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well
        let _ = FileExt::unlock(&self.file);
        debug!("Released {:?} lock on {}", self.mode, self.path.display());
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            Error::LockError(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::LockError(format!("Failed to open {}: {}", path.display(), e)))
}
