// src/commands/gensum.rs

//! Gensum command - fetch sources and regenerate their checksums

use super::target_root;
use anyhow::{Context as _, Result};
use std::path::Path;
use x10::build::run_stage;
use x10::runner::ContainerRunner;
use x10::spec::SpecLoader;
use x10::Context;

/// Stages run by gensum, in order
const GENSUM_STAGES: &[&str] = &["fetch", "_gensum"];

pub fn cmd_gensum(ctx: &Context, spec: &Path, root: Option<&Path>) -> Result<()> {
    let root = target_root(ctx, root);
    let package = SpecLoader::new(ctx)
        .load_package(spec)
        .with_context(|| format!("Failed to load {}", spec.display()))?;

    let runner = ContainerRunner::new(ctx);
    for stage in GENSUM_STAGES {
        run_stage(ctx, &runner, &package, stage, &root)
            .with_context(|| format!("{}: stage {} failed", package.fqn(), stage))?;
    }
    Ok(())
}
