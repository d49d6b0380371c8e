// src/config.rs

//! Configuration and the application context
//!
//! Configuration is read from one or more TOML files given as a
//! colon-separated list. Later files override earlier ones key by key, with
//! tables merged one level deep. The resulting [`Config`] is wrapped in a
//! [`Context`] that is built once at startup and handed to every subsystem.
//!
//! # Example x10.toml
//!
//! ```toml
//! packages = "/srv/x10/packages"
//! host_dir = "/srv/x10/host"
//! target_root = "/srv/x10/targets/default"
//! use_generated_dependencies = true
//!
//! [build]
//! reset = true
//! base_package = "virtual/base-minimal"
//!
//! [runner]
//! program = "podman"
//! image = "x10_base"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default configuration search path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/x10.toml:./etc/x10.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the package spec tree
    pub packages: PathBuf,
    /// Host-side state (binary packages live in `<host_dir>/binpkgs`)
    pub host_dir: PathBuf,
    /// Directory whose `etc/` is mounted read-only into build containers
    pub base_dir: PathBuf,
    /// Default target root for commands that are not given one
    pub target_root: PathBuf,
    /// Extend run dependencies with the generated dependencies of built packages
    pub use_generated_dependencies: bool,
    pub build: BuildConfig,
    pub runner: RunnerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packages: PathBuf::from("./packages"),
            host_dir: PathBuf::from("./host"),
            base_dir: PathBuf::from("."),
            target_root: PathBuf::from("./target"),
            use_generated_dependencies: true,
            build: BuildConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

/// Build orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Reconcile the target root to exactly the stage dependencies before
    /// each stage. When false, dependencies are only ever added.
    pub reset: bool,
    /// Rebuild the requested package even if it is already built
    pub force: bool,
    /// Atom of the package every reconciled root starts from
    pub base_package: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            reset: true,
            force: false,
            base_package: "virtual/base-minimal".to_string(),
        }
    }
}

/// Container runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub program: String,
    pub image: String,
    pub shell: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "podman".to_string(),
            image: "x10_base".to_string(),
            shell: "/usr/bin/bash".to_string(),
        }
    }
}

/// How a target root is brought in line with a stage's dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeMode {
    /// Rewrite the world set and converge the root, removing anything else
    Reconcile,
    /// Install missing dependencies and never remove anything
    Additive,
}

impl Config {
    /// Load configuration from a colon-separated list of TOML files
    ///
    /// Files that cannot be read are skipped with a warning.
    pub fn load(paths: &str) -> Result<Self> {
        let mut merged = toml::Table::new();

        for path in paths.split(':').filter(|p| !p.is_empty()) {
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping config file {}: {}", path, e);
                    continue;
                }
            };
            debug!("Reading config file {}", path);

            let table: toml::Table = toml::from_str(&content)
                .map_err(|e| Error::ParseError(format!("{}: {}", path, e)))?;
            merge_table(&mut merged, table);
        }

        Self::from_table(merged)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn from_table(table: toml::Table) -> Result<Self> {
        Ok(toml::Value::Table(table).try_into::<Config>()?)
    }

    pub fn materialize_mode(&self) -> MaterializeMode {
        if self.build.reset {
            MaterializeMode::Reconcile
        } else {
            MaterializeMode::Additive
        }
    }
}

/// Merge `overlay` into `base`; nested tables are merged one level deep
fn merge_table(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                for (k, v) in incoming {
                    existing.insert(k, v);
                }
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Application context shared by every subsystem for one invocation
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Spec file for a package name
    pub fn spec_path(&self, name: &str) -> PathBuf {
        self.config.packages.join(format!("{}.yml", name))
    }

    /// Spec file for a named layer
    pub fn layer_path(&self, name: &str) -> PathBuf {
        self.config
            .packages
            .join(crate::spec::LAYERS_DIR)
            .join(format!("{}.yml", name))
    }

    /// Auxiliary files directory for a package (mounted at `/pkgfiles`)
    pub fn files_dir(&self, name: &str) -> PathBuf {
        self.config.packages.join(crate::spec::FILES_DIR).join(name)
    }

    pub fn binpkg_dir(&self) -> PathBuf {
        self.config.host_dir.join("binpkgs")
    }

    /// Binary artifact for an FQN
    pub fn binpkg_path(&self, fqn: &str) -> PathBuf {
        self.binpkg_dir().join(format!("{}.tar.xz", fqn))
    }

    pub fn target_root(&self) -> &Path {
        &self.config.target_root
    }
}
