// src/commands/query.rs

//! Read-only commands: show, show-db, list-install, list-build

use super::target_root;
use anyhow::{Context as _, Result};
use std::path::Path;
use tracing::warn;
use x10::db::PackageDatabase;
use x10::resolver::{DependencyType, Resolver};
use x10::spec::SpecLoader;
use x10::Context;

/// Print the composed form of a spec file
pub fn cmd_show(ctx: &Context, spec: &Path) -> Result<()> {
    let package = SpecLoader::new(ctx)
        .load_package(spec)
        .with_context(|| format!("Failed to load {}", spec.display()))?;
    print!("{}", serde_yaml::to_string(&package)?);
    Ok(())
}

/// Print the package database of a root
pub fn cmd_show_db(ctx: &Context, root: Option<&Path>) -> Result<()> {
    let root = target_root(ctx, root);
    let contents = PackageDatabase::for_root(&root)
        .read()
        .context("Failed to read package database")?;
    print!("{}", serde_yaml::to_string(&contents)?);
    Ok(())
}

fn list_deps(ctx: &Context, atom: &str, root: Option<&Path>, dep_type: DependencyType) -> Result<()> {
    let root = target_root(ctx, root);
    let contents = PackageDatabase::for_root(&root)
        .read()
        .context("Failed to read package database")?;

    let resolution = Resolver::new(&contents, ctx.config.use_generated_dependencies)
        .install_deps(atom, dep_type)
        .with_context(|| format!("Failed to resolve {} dependencies of {}", dep_type, atom))?;

    for fqn in resolution.fqns() {
        println!("{}", fqn);
    }
    if !resolution.complete {
        warn!("Dependency list is incomplete; build the packages without generated data first");
    }
    Ok(())
}

/// List the packages installing `atom` pulls in
pub fn cmd_list_install(ctx: &Context, atom: &str, root: Option<&Path>) -> Result<()> {
    list_deps(ctx, atom, root, DependencyType::Run)
}

/// List the packages building `atom` needs
pub fn cmd_list_build(ctx: &Context, atom: &str, root: Option<&Path>) -> Result<()> {
    list_deps(ctx, atom, root, DependencyType::Build)
}
