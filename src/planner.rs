// src/planner.rs

//! Install planning
//!
//! A plan converges a root's `installed` set onto the resolved closure of a
//! desired set: install what is missing in resolution order, then remove
//! whatever is installed but no longer wanted.

use crate::db::{paths, DatabaseContents};
use crate::error::{Error, Result};
use crate::install::Installer;
use crate::pkgset::PackageSet;
use crate::resolver::Resolver;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Remove,
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOperation {
    pub fqn: String,
    pub action: Action,
}

impl PackageOperation {
    pub fn install(fqn: &str) -> Self {
        Self {
            fqn: fqn.to_string(),
            action: Action::Install,
        }
    }

    pub fn remove(fqn: &str) -> Self {
        Self {
            fqn: fqn.to_string(),
            action: Action::Remove,
        }
    }
}

impl fmt::Display for PackageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Action::Install => write!(f, " Install:  {}", self.fqn),
            Action::Remove => write!(f, "  Remove:  {}", self.fqn),
        }
    }
}

/// Compute the operations that bring `root` to `desired`
///
/// Resolution must be complete: a package without valid generated data has
/// to be built before it can be planned.
pub fn plan(
    resolver: &Resolver<'_>,
    root: &Path,
    desired: &PackageSet,
) -> Result<Vec<PackageOperation>> {
    let resolution = resolver.resolve(desired.list())?;
    if !resolution.complete {
        return Err(Error::IncompleteResolution(
            "package list is not complete - build first".to_string(),
        ));
    }

    let installed = PackageSet::open(root, paths::INSTALLED_SET)?;
    let mut wanted = HashSet::new();
    let mut operations = Vec::new();

    for fqn in resolution.fqns() {
        if !installed.check(&fqn) {
            debug!(" => {}", fqn);
            operations.push(PackageOperation::install(&fqn));
        }
        wanted.insert(fqn);
    }

    for fqn in installed.list() {
        if !wanted.contains(&fqn) {
            debug!(" <= {}", fqn);
            operations.push(PackageOperation::remove(&fqn));
        }
    }

    Ok(operations)
}

/// Log a plan for the operator
pub fn check_plan(operations: &[PackageOperation]) {
    if operations.is_empty() {
        info!("(nothing to do)");
        return;
    }

    info!("Here's the plan:");
    info!("");
    for operation in operations {
        info!("{}", operation);
    }
}

/// Execute a plan in order
pub fn apply(
    installer: &dyn Installer,
    contents: &DatabaseContents,
    root: &Path,
    operations: &[PackageOperation],
) -> Result<()> {
    for operation in operations {
        let record = contents.get(&operation.fqn)?;
        match operation.action {
            Action::Install => installer.install(record, root)?,
            Action::Remove => installer.remove(record, root)?,
        }
    }
    Ok(())
}
