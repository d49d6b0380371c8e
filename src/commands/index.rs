// src/commands/index.rs

//! Index command - rescan the package tree into a root's database

use super::target_root;
use anyhow::{Context as _, Result};
use std::path::Path;
use tracing::info;
use x10::db::PackageDatabase;
use x10::Context;

pub fn cmd_index(ctx: &Context, root: Option<&Path>) -> Result<()> {
    let root = target_root(ctx, root);
    let db = PackageDatabase::for_root(&root);

    let updated = db.index_from_repo(ctx).with_context(|| {
        format!(
            "Failed to index {} into {}",
            ctx.config.packages.display(),
            db.backing_file().display()
        )
    })?;

    info!("Indexed package tree ({} records refreshed)", updated);
    Ok(())
}
