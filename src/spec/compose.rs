// src/spec/compose.rs

//! Loading spec files and composing their layers
//!
//! A spec file names zero or more layers (themselves spec files under
//! `<packages>/layers/`) and then gives its own `package` layer. Layers are
//! loaded recursively and folded left to right with per-field rules:
//!
//! - `meta`, `stageorder`, `workdir`: the last layer that sets one wins
//! - dependency, source and patch lists: concatenated
//! - stages: pre-scripts appended, post-scripts prepended, `script` and
//!   `useworkdir` replaced by the last layer that sets them
//! - `environment`, `triggerdata`: later keys overwrite earlier ones

use super::format::{Package, PackageRecord, SpecFile, SpecLayer, Stage};
use super::RESERVED_DIRS;
use crate::config::Context;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Fold layers into one composite layer
pub fn compose<'l, I>(layers: I) -> SpecLayer
where
    I: IntoIterator<Item = &'l SpecLayer>,
{
    let mut composite = SpecLayer::default();

    for layer in layers {
        if layer.meta.is_some() {
            composite.meta = layer.meta.clone();
        }

        let depends = &mut composite.depends;
        depends.host_build.extend(layer.depends.host_build.iter().cloned());
        depends.build.extend(layer.depends.build.iter().cloned());
        depends.test.extend(layer.depends.test.iter().cloned());
        depends.run.extend(layer.depends.run.iter().cloned());

        composite.sources.extend(layer.sources.iter().cloned());

        for (name, stage) in &layer.stages {
            let merged = composite.stages.entry(name.clone()).or_default();

            merged.pre_script.extend(stage.pre_script.iter().cloned());

            // Later layers wrap earlier ones: their post-script runs first
            let mut post_script = stage.post_script.clone();
            post_script.append(&mut merged.post_script);
            merged.post_script = post_script;

            if stage.script.is_some() {
                merged.script = stage.script.clone();
            }
            if stage.use_workdir.is_some() {
                merged.use_workdir = stage.use_workdir;
            }
        }

        if layer.stage_order.as_ref().is_some_and(|order| !order.is_empty()) {
            composite.stage_order = layer.stage_order.clone();
        }

        for (key, value) in &layer.environment {
            composite.environment.insert(key.clone(), value.clone());
        }

        if !layer.workdir.is_empty() {
            composite.workdir = layer.workdir.clone();
        }

        if let Some(patches) = &layer.patches {
            composite
                .patches
                .get_or_insert_with(Vec::new)
                .extend(patches.iter().cloned());
        }

        composite.trigger_data.overlay(&layer.trigger_data);
    }

    composite
}

impl Package {
    /// Finalize a composite layer into a package; metadata is required
    pub fn from_layer(layer: SpecLayer) -> Result<Self> {
        let meta = layer
            .meta
            .ok_or_else(|| Error::ParseError("No package metadata in any layer".to_string()))?;

        let stages = layer
            .stages
            .into_iter()
            .map(|(name, stage)| {
                let stage = Stage {
                    pre_script: stage.pre_script,
                    script: stage.script,
                    post_script: stage.post_script,
                    use_workdir: stage.use_workdir.unwrap_or(false),
                };
                (name, stage)
            })
            .collect();

        Ok(Self {
            meta,
            depends: layer.depends,
            sources: layer.sources,
            stages,
            stage_order: layer.stage_order.unwrap_or_default(),
            environment: layer.environment,
            workdir: layer.workdir,
            patches: layer.patches,
            trigger_data: layer.trigger_data,
        })
    }
}

/// Spec files under the package tree, skipping layers and auxiliary files
pub fn discover_specs(packages: &Path) -> Result<Vec<PathBuf>> {
    let mut specs = Vec::new();

    let walker = WalkDir::new(packages)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| RESERVED_DIRS.contains(&name)))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to walk {}: {}", packages.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_spec = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if is_spec {
            specs.push(entry.into_path());
        }
    }

    Ok(specs)
}

/// Loads spec files relative to the configured package tree
pub struct SpecLoader<'a> {
    ctx: &'a Context,
}

impl<'a> SpecLoader<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Load and compose the spec file at `path`
    pub fn load_package(&self, path: &Path) -> Result<Package> {
        let layer = self.load_layer(path, &mut Vec::new())?;
        Package::from_layer(layer)
    }

    /// Load the spec behind a database record
    ///
    /// `<packages>/<name>.yml` is tried first. Specs kept under another
    /// file name or in a subdirectory are found by searching the package
    /// tree for the one whose FQN matches the record.
    pub fn load_record(&self, record: &PackageRecord) -> Result<Package> {
        let fqn = record.fqn();

        let by_name = self.ctx.spec_path(&record.meta.name);
        if by_name.is_file() {
            let package = self.load_package(&by_name)?;
            if package.fqn() == fqn {
                return Ok(package);
            }
        }

        let packages = &self.ctx.config.packages;
        for path in discover_specs(packages)? {
            if path == by_name {
                continue;
            }
            let package = self.load_package(&path)?;
            if package.fqn() == fqn {
                debug!("Found spec for {} at {}", fqn, path.display());
                return Ok(package);
            }
        }

        Err(Error::NotFoundError(format!(
            "No spec for {} under {}",
            fqn,
            packages.display()
        )))
    }

    fn load_layer(&self, path: &Path, stack: &mut Vec<PathBuf>) -> Result<SpecLayer> {
        if stack.iter().any(|p| p == path) {
            let chain: Vec<String> = stack
                .iter()
                .chain(std::iter::once(&path.to_path_buf()))
                .map(|p| p.display().to_string())
                .collect();
            return Err(Error::ParseError(format!(
                "Layer cycle: {}",
                chain.join(" -> ")
            )));
        }

        debug!("Loading spec {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        let spec: SpecFile = serde_yaml::from_str(&content)
            .map_err(|e| Error::ParseError(format!("{}: {}", path.display(), e)))?;

        let own = spec.package.ok_or_else(|| {
            Error::ParseError(format!("{}: missing 'package' section", path.display()))
        })?;

        stack.push(path.to_path_buf());
        let mut layers = Vec::with_capacity(spec.layers.len() + 1);
        for name in &spec.layers {
            debug!("Applying layer {} to {}", name, path.display());
            layers.push(self.load_layer(&self.ctx.layer_path(name), stack)?);
        }
        stack.pop();

        layers.push(own);
        Ok(compose(&layers))
    }
}
