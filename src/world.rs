// src/world.rs

//! The `world` set of a target root
//!
//! `world` lists the packages that were explicitly asked for. Everything
//! else in the root is there because something in `world` depends on it,
//! so converging a root means planning against `world` and applying it.

use crate::config::Context;
use crate::db::{paths, DatabaseContents, PackageDatabase};
use crate::error::Result;
use crate::install::Installer;
use crate::pkgset::PackageSet;
use crate::planner::{self, PackageOperation};
use crate::resolver::Resolver;
use std::path::Path;
use tracing::info;

/// Resolve `atom` and mark it in the root's world set
///
/// The returned set is not written back; callers persist it once the
/// root has been converged.
pub fn add_to_world(contents: &DatabaseContents, root: &Path, atom: &str) -> Result<PackageSet> {
    let fqn = contents.find_fqn(atom)?;
    let mut world = PackageSet::open(root, paths::WORLD_SET)?;
    world.mark(&fqn);
    Ok(world)
}

/// Plan `world` against the root, apply the plan, then persist `world`
pub fn converge(
    ctx: &Context,
    installer: &dyn Installer,
    root: &Path,
    world: &PackageSet,
) -> Result<Vec<PackageOperation>> {
    let contents = PackageDatabase::for_root(root).read()?;
    let resolver = Resolver::new(&contents, ctx.config.use_generated_dependencies);

    let operations = planner::plan(&resolver, root, world)?;
    planner::check_plan(&operations);
    planner::apply(installer, &contents, root, &operations)?;

    world.write()?;
    Ok(operations)
}

/// Make `world` exactly `atoms` and converge the root onto it
pub fn reconcile<S: AsRef<str>>(
    ctx: &Context,
    installer: &dyn Installer,
    root: &Path,
    atoms: &[S],
) -> Result<Vec<PackageOperation>> {
    let contents = PackageDatabase::for_root(root).read()?;

    let mut world = PackageSet::open(root, paths::WORLD_SET)?;
    world.clear();
    for atom in atoms {
        world.mark(&contents.find_fqn(atom.as_ref())?);
    }

    converge(ctx, installer, root, &world)
}

/// Reduce the root to the base package and its closure
pub fn reset(ctx: &Context, installer: &dyn Installer, root: &Path) -> Result<Vec<PackageOperation>> {
    info!("Resetting {} to {}", root.display(), ctx.config.build.base_package);
    reconcile(ctx, installer, root, &[ctx.config.build.base_package.as_str()])
}
