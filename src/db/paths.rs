// src/db/paths.rs
//! Centralized path derivation inside a target root

use std::path::{Path, PathBuf};

/// Name of the package set listing explicitly requested packages
pub const WORLD_SET: &str = "world";

/// Name of the package set listing packages present in the root
pub const INSTALLED_SET: &str = "installed";

/// Directory holding a root's persisted state
pub fn db_dir(root: &Path) -> PathBuf {
    root.join("var").join("db").join("x10")
}

/// The root's package database
pub fn pkgdb_path(root: &Path) -> PathBuf {
    db_dir(root).join("pkgdb.yml")
}

/// A named package set in the root
pub fn package_set_path(root: &Path, name: &str) -> PathBuf {
    db_dir(root).join(name)
}

/// Build output directory for a package
pub fn destdir(root: &Path, fqn: &str) -> PathBuf {
    root.join("destdir").join(fqn)
}

/// Staging area used while installing a package
pub fn install_tmp_dir(root: &Path, fqn: &str) -> PathBuf {
    root.join("tmp").join("x10").join(fqn)
}
