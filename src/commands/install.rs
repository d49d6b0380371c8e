// src/commands/install.rs

//! Install, install-plan and reset commands

use anyhow::{Context as _, Result};
use std::path::Path;
use x10::db::PackageDatabase;
use x10::install::BinpkgInstaller;
use x10::planner;
use x10::resolver::Resolver;
use x10::runner::ContainerRunner;
use x10::{world, Context};

/// Add a package to a root's world set and converge the root
pub fn cmd_install(ctx: &Context, atom: &str, root: &Path) -> Result<()> {
    let contents = PackageDatabase::for_root(root)
        .read()
        .context("Failed to read package database")?;
    let world = world::add_to_world(&contents, root, atom)
        .with_context(|| format!("Failed to add {} to world", atom))?;

    let runner = ContainerRunner::new(ctx);
    let installer = BinpkgInstaller::new(ctx, &runner);
    world::converge(ctx, &installer, root, &world)
        .with_context(|| format!("Failed to install {} into {}", atom, root.display()))?;

    Ok(())
}

/// Show the plan for installing a package without applying it
pub fn cmd_install_plan(ctx: &Context, atom: &str, root: &Path) -> Result<()> {
    let contents = PackageDatabase::for_root(root)
        .read()
        .context("Failed to read package database")?;
    let world = world::add_to_world(&contents, root, atom)
        .with_context(|| format!("Failed to add {} to world", atom))?;

    let resolver = Resolver::new(&contents, ctx.config.use_generated_dependencies);
    let operations = planner::plan(&resolver, root, &world)
        .with_context(|| format!("Failed to plan install of {}", atom))?;
    planner::check_plan(&operations);

    Ok(())
}

/// Reduce a root to the base package
pub fn cmd_reset(ctx: &Context, root: &Path) -> Result<()> {
    let runner = ContainerRunner::new(ctx);
    let installer = BinpkgInstaller::new(ctx, &runner);
    world::reset(ctx, &installer, root)
        .with_context(|| format!("Failed to reset {}", root.display()))?;
    Ok(())
}
