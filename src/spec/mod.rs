// src/spec/mod.rs

//! Package specs
//!
//! A package tree holds one `<name>.yml` spec per package, reusable partial
//! specs under `layers/`, and per-package auxiliary files under
//! `files/<name>/`.

mod compose;
mod environment;
mod format;

pub use compose::{compose, discover_specs, SpecLoader};
pub use format::{
    Package, PackageRecord, SpecDepends, SpecFile, SpecLayer, SpecMeta, SpecSource, SpecStage,
    Stage,
};

/// Subdirectory of the package tree holding layers
pub const LAYERS_DIR: &str = "layers";

/// Subdirectory of the package tree holding per-package files
pub const FILES_DIR: &str = "files";

/// Directories in the package tree that never contain package specs
pub const RESERVED_DIRS: &[&str] = &[LAYERS_DIR, FILES_DIR];
