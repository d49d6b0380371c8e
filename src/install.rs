// src/install.rs

//! Installing and removing binary packages in a target root
//!
//! Installation unpacks `<host_dir>/binpkgs/<FQN>.tar.xz` into a staging
//! directory under the root, copies the tree into place, runs the package's
//! triggers and marks the root's `installed` set. Loose files at the top of
//! the archive (`generated-depends`, `meta.yml`, ...) describe the package
//! and are not installed.
//!
//! Removal walks the same archive's manifest, deletes the files and then
//! any listed directories that ended up empty. Neither operation rolls back
//! on failure.

use crate::config::Context;
use crate::db::{binpkg, paths};
use crate::error::{Error, Result};
use crate::pkgset::PackageSet;
use crate::runner::ScriptRunner;
use crate::spec::{PackageRecord, SpecLoader};
use crate::trigger::TriggerExecutor;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Applies install and remove operations to a target root
pub trait Installer {
    /// Install a package; a package already marked installed is a no-op
    fn install(&self, package: &PackageRecord, root: &Path) -> Result<()>;

    /// Remove a package's files; files already gone are skipped
    fn remove(&self, package: &PackageRecord, root: &Path) -> Result<()>;
}

/// Installs from the binary package directory on the host
pub struct BinpkgInstaller<'a> {
    ctx: &'a Context,
    runner: &'a dyn ScriptRunner,
}

impl<'a> BinpkgInstaller<'a> {
    pub fn new(ctx: &'a Context, runner: &'a dyn ScriptRunner) -> Self {
        Self { ctx, runner }
    }

    fn copy_tree(&self, staging: &Path, root: &Path) -> Result<()> {
        for entry in WalkDir::new(staging).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::IoError(format!("Failed to walk {}: {}", staging.display(), e))
            })?;
            let relative = entry.path().strip_prefix(staging).map_err(|e| {
                Error::IoError(format!("{}: {}", entry.path().display(), e))
            })?;
            let file_type = entry.file_type();

            if entry.depth() == 1 && file_type.is_file() {
                continue;
            }

            let target = root.join(relative);
            if file_type.is_dir() {
                match fs::create_dir(&target) {
                    Ok(()) => debug!(" => {}", target.display()),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        debug!(" -- {}", target.display())
                    }
                    Err(e) => {
                        return Err(Error::IoError(format!(
                            "Failed to create {}: {}",
                            target.display(),
                            e
                        )));
                    }
                }
            } else {
                replace_with(entry.path(), &target, file_type.is_symlink())?;
                debug!(" {} => {}", entry.path().display(), target.display());
            }
        }
        Ok(())
    }
}

/// Copy a file or symlink over whatever non-directory is at `target`
fn replace_with(source: &Path, target: &Path, is_symlink: bool) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(existing) if !existing.is_dir() => fs::remove_file(target)?,
        _ => {}
    }

    if is_symlink {
        let link = fs::read_link(source)?;
        std::os::unix::fs::symlink(&link, target).map_err(|e| {
            Error::IoError(format!("Failed to link {}: {}", target.display(), e))
        })?;
    } else {
        fs::copy(source, target).map_err(|e| {
            Error::IoError(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;
    }
    Ok(())
}

impl Installer for BinpkgInstaller<'_> {
    fn install(&self, package: &PackageRecord, root: &Path) -> Result<()> {
        let fqn = package.fqn();
        let mut installed = PackageSet::open(root, paths::INSTALLED_SET)?;
        if installed.check(&fqn) {
            info!("Already installed: {}", fqn);
            return Ok(());
        }

        info!("Installing: {} -> {}", fqn, root.display());

        let staging = paths::install_tmp_dir(root, &fqn);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        binpkg::unpack(&self.ctx.binpkg_path(&fqn), &staging)?;

        self.copy_tree(&staging, root)?;
        fs::remove_dir_all(&staging)?;

        let spec = SpecLoader::new(self.ctx).load_record(package)?;
        TriggerExecutor::new(self.runner, root).run(&spec)?;

        installed.mark(&fqn);
        installed.write()
    }

    fn remove(&self, package: &PackageRecord, root: &Path) -> Result<()> {
        let fqn = package.fqn();
        let members = binpkg::list_members(&self.ctx.binpkg_path(&fqn))?;

        let mut files: Vec<PathBuf> = Vec::new();
        let mut dirs: Vec<PathBuf> = Vec::new();
        for member in members {
            if !member.is_dir && member.path.components().count() == 1 {
                continue;
            }

            let target = root.join(&member.path);
            match fs::symlink_metadata(&target) {
                Ok(metadata) if metadata.is_dir() => dirs.push(target),
                Ok(_) => files.push(target),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("{}: {} already gone", fqn, target.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        for file in &files {
            match fs::remove_file(file) {
                Ok(()) => debug!(" <= {}", file.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("{}: {} already gone", fqn, file.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Deepest first so parents empty out before they are checked
        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        for dir in &dirs {
            let is_empty = match fs::read_dir(dir) {
                Ok(mut entries) => entries.next().is_none(),
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            };
            if is_empty {
                fs::remove_dir(dir)?;
                debug!(" <= {}", dir.display());
            }
        }

        let mut installed = PackageSet::open(root, paths::INSTALLED_SET)?;
        installed.unmark(&fqn);
        installed.write()?;
        info!("Removed: {}", fqn);
        Ok(())
    }
}
