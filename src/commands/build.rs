// src/commands/build.rs

//! Build command - build a package into a target root

use super::target_root;
use anyhow::{Context as _, Result};
use std::path::Path;
use tracing::info;
use x10::build::Builder;
use x10::config::MaterializeMode;
use x10::db::PackageDatabase;
use x10::install::BinpkgInstaller;
use x10::runner::ContainerRunner;
use x10::{world, Context};

/// Build a package
///
/// The package tree is indexed first. A package that is already built is
/// skipped unless `force` is set. In reconcile mode the root is reset to
/// the base package once the build is done.
pub fn cmd_build(
    ctx: &Context,
    package: &str,
    root: Option<&Path>,
    force: bool,
    no_reset: bool,
) -> Result<()> {
    let root = target_root(ctx, root);

    PackageDatabase::for_root(&root)
        .index_from_repo(ctx)
        .context("Failed to index package tree")?;

    let mode = if no_reset {
        MaterializeMode::Additive
    } else {
        ctx.config.materialize_mode()
    };

    let runner = ContainerRunner::new(ctx);
    let installer = BinpkgInstaller::new(ctx, &runner);
    let mut builder = Builder::new(ctx, &runner, &installer, &root).with_mode(mode);

    let built = builder
        .build_if_needed(package, force || ctx.config.build.force)
        .with_context(|| format!("Failed to build {}", package))?;

    if built && mode == MaterializeMode::Reconcile {
        info!("Removing autodeps");
        world::reset(ctx, &installer, &root)
            .with_context(|| format!("Failed to reset {}", root.display()))?;
    }

    Ok(())
}
