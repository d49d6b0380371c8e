// src/db/index.rs

//! Indexing the package tree into a database
//!
//! Every spec in the package tree is loaded in parallel and compared with
//! its database record. Stale records are replaced by a fresh projection of
//! the spec, then the provider index is rebuilt over the merged contents.
//! The whole rescan holds the database's exclusive lock.

use super::{binpkg, DatabaseContents, PackageDatabase};
use crate::config::Context;
use crate::error::Result;
use crate::spec::{discover_specs, Package, PackageRecord, SpecLoader};
use rayon::prelude::*;
use std::fmt;
use std::fs::{self, Metadata};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// Why a database record is refreshed from the package tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No record, or recorded metadata differs from the spec
    Outdated,
    /// Record has no valid generated data
    NotBuilt,
    /// The binary package could not be stat'ed
    MissingBinpkg,
    /// The spec file is newer than the binary package
    SourceNewer,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StaleReason::Outdated => "outdated",
            StaleReason::NotBuilt => "not built",
            StaleReason::MissingBinpkg => "stat error on binpkg",
            StaleReason::SourceNewer => "source is newer",
        };
        f.write_str(reason)
    }
}

fn mtime_secs(metadata: &Metadata) -> Option<u64> {
    metadata
        .modified()
        .ok()?
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

/// Decide whether a package's record needs refreshing
///
/// Checks run in a fixed order and the first reason found is reported.
pub fn staleness(
    contents: &DatabaseContents,
    package: &Package,
    source: Option<&Metadata>,
    binpkg: Option<&Metadata>,
) -> Option<StaleReason> {
    if !contents.check_up_to_date(package) {
        return Some(StaleReason::Outdated);
    }

    let built = contents
        .packages
        .get(&package.fqn())
        .is_some_and(|record| record.generated_valid);
    if !built {
        return Some(StaleReason::NotBuilt);
    }

    let Some(binpkg) = binpkg else {
        return Some(StaleReason::MissingBinpkg);
    };

    match (source.and_then(mtime_secs), mtime_secs(binpkg)) {
        (Some(src), Some(pkg)) if src > pkg => Some(StaleReason::SourceNewer),
        _ => None,
    }
}

impl PackageDatabase {
    /// Rescan the package tree and refresh the database
    ///
    /// Returns the number of records that were refreshed. The first spec
    /// that fails to load aborts the scan and nothing is written.
    pub fn index_from_repo(&self, ctx: &Context) -> Result<usize> {
        let packages_dir = &ctx.config.packages;
        info!("Indexing {} into {}", packages_dir.display(), self.backing_file.display());

        self.modify(|contents| {
            let specs = discover_specs(packages_dir)?;
            let loader = SpecLoader::new(ctx);

            let snapshot: &DatabaseContents = contents;
            let staged: Vec<Option<(String, PackageRecord)>> = specs
                .par_iter()
                .map(|path| index_one(ctx, &loader, snapshot, path))
                .collect::<Result<_>>()?;

            let mut updated = 0;
            for (fqn, record) in staged.into_iter().flatten() {
                contents.packages.insert(fqn, record);
                updated += 1;
            }

            info!("Rebuilding provider cache");
            pull_generated_from_binpkgs(ctx, contents);
            contents.rebuild_provider_index();

            Ok(updated)
        })
        .inspect(|updated| {
            info!(
                "Updated package database in {} ({} records refreshed)",
                self.backing_file.display(),
                updated
            );
        })
    }
}

fn index_one(
    ctx: &Context,
    loader: &SpecLoader<'_>,
    contents: &DatabaseContents,
    path: &Path,
) -> Result<Option<(String, PackageRecord)>> {
    debug!("Indexing {}", path.display());
    let package = loader.load_package(path)?;
    let fqn = package.fqn();

    let source = fs::metadata(path)?;
    let binpkg = fs::metadata(ctx.binpkg_path(&fqn)).ok();

    match staleness(contents, &package, Some(&source), binpkg.as_ref()) {
        Some(reason) => {
            info!("{}: updating database ({})", fqn, reason);
            Ok(Some((fqn, package.to_record())))
        }
        None => Ok(None),
    }
}

/// Fill in generated data for unbuilt records whose binary package exists
fn pull_generated_from_binpkgs(ctx: &Context, contents: &mut DatabaseContents) {
    for (fqn, record) in contents.packages.iter_mut() {
        if record.generated_valid {
            continue;
        }
        let binpkg_path = ctx.binpkg_path(fqn);
        if !binpkg_path.exists() {
            continue;
        }

        info!("{}: pulling generated info from binpkg", fqn);
        let mut ok = true;

        match binpkg::read_member(&binpkg_path, "./generated-depends") {
            Ok(Some(content)) => record.generated_depends = binpkg::parse_generated(&content),
            Ok(None) => debug!("{}: no generated-depends in binpkg", fqn),
            Err(e) => {
                warn!("{}: {}", fqn, e);
                ok = false;
            }
        }

        match binpkg::read_member(&binpkg_path, "./generated-provides") {
            Ok(Some(content)) => record.generated_provides = binpkg::parse_generated(&content),
            Ok(None) => debug!("{}: no generated-provides in binpkg", fqn),
            Err(e) => {
                warn!("{}: {}", fqn, e);
                ok = false;
            }
        }

        if ok {
            record.generated_valid = true;
        }
    }
}
