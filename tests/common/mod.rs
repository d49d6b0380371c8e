// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use x10::config::Config;
use x10::db::{paths, PackageDatabase};
use x10::install::Installer;
use x10::pkgset::PackageSet;
use x10::runner::{Mount, ScriptRunner};
use x10::spec::PackageRecord;
use x10::{Context, Error, Result};
use xz2::write::XzEncoder;

/// Create a workspace with a package tree, a host dir and a target root.
///
/// Returns (TempDir, Context) - keep the TempDir alive to prevent cleanup.
pub fn setup_workspace() -> (TempDir, Context) {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();

    let mut config = Config::default();
    config.packages = base.join("packages");
    config.host_dir = base.join("host");
    config.base_dir = base.to_path_buf();
    config.target_root = base.join("target");
    config.build.base_package = "base".to_string();

    fs::create_dir_all(&config.packages).unwrap();
    fs::create_dir_all(config.host_dir.join("binpkgs")).unwrap();
    fs::create_dir_all(&config.target_root).unwrap();

    (temp_dir, Context::new(config))
}

/// Write `<packages>/<name>.yml`
pub fn write_spec(ctx: &Context, name: &str, yaml: &str) -> PathBuf {
    let path = ctx.spec_path(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, yaml).unwrap();
    path
}

/// Write `<packages>/layers/<name>.yml`
pub fn write_layer(ctx: &Context, name: &str, yaml: &str) -> PathBuf {
    let path = ctx.layer_path(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, yaml).unwrap();
    path
}

fn yaml_list(items: &[&str]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("\"{}\"", i)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Spec text for a package at version 1 with one script per stage
pub fn simple_spec(name: &str, build: &[&str], run: &[&str], stages: &[&str]) -> String {
    let mut yaml = format!(
        "package:\n  meta:\n    name: {}\n    version: \"1\"\n  depends:\n    build: {}\n    run: {}\n  stageorder: {}\n",
        name,
        yaml_list(build),
        yaml_list(run),
        yaml_list(stages),
    );
    if stages.is_empty() {
        yaml.push_str("  stages: {}\n");
    } else {
        yaml.push_str("  stages:\n");
    }
    for stage in stages {
        yaml.push_str(&format!("    {}:\n      script: \"echo {} {}\"\n", stage, name, stage));
    }
    yaml
}

/// Write a binary package for `fqn`
///
/// `files` are (path, content) pairs relative to the root; their parent
/// directories are added as directory entries. `generated_depends` is
/// stored as the top-level `generated-depends` member when given.
pub fn write_binpkg(
    ctx: &Context,
    fqn: &str,
    files: &[(&str, &str)],
    generated_depends: Option<&[&str]>,
) -> PathBuf {
    let path = ctx.binpkg_path(fqn);
    let file = fs::File::create(&path).unwrap();
    let mut builder = tar::Builder::new(XzEncoder::new(file, 6));

    let mut dirs: Vec<PathBuf> = Vec::new();
    for (name, _) in files {
        for ancestor in Path::new(name).ancestors().skip(1) {
            if !ancestor.as_os_str().is_empty() && !dirs.iter().any(|d| d == ancestor) {
                dirs.push(ancestor.to_path_buf());
            }
        }
    }
    dirs.sort();
    for dir in &dirs {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        builder
            .append_data(&mut header, format!("./{}/", dir.display()), std::io::empty())
            .unwrap();
    }

    let mut members: Vec<(String, String)> = files
        .iter()
        .map(|(name, content)| (format!("./{}", name), content.to_string()))
        .collect();
    if let Some(depends) = generated_depends {
        members.push(("./generated-depends".to_string(), depends.join("\n")));
    }

    for (name, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o644);
        header.set_size(content.len() as u64);
        builder.append_data(&mut header, name, content.as_bytes()).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
    path
}

/// Index the package tree into the context's target root
pub fn index(ctx: &Context) -> PackageDatabase {
    let db = PackageDatabase::for_root(ctx.target_root());
    db.index_from_repo(ctx).unwrap();
    db
}

pub fn installed(root: &Path) -> Vec<String> {
    PackageSet::open(root, paths::INSTALLED_SET).unwrap().list()
}

pub fn world(root: &Path) -> Vec<String> {
    PackageSet::open(root, paths::WORLD_SET).unwrap().list()
}

/// Records scripts instead of running them
///
/// Scripts containing `fail_on` fail with a `ScriptExecutionError`.
#[derive(Default)]
pub struct RecordingRunner {
    pub scripts: RefCell<Vec<String>>,
    pub mounts: RefCell<Vec<Mount>>,
    pub fail_on: Option<String>,
}

impl RecordingRunner {
    /// Last non-empty line of every recorded script
    pub fn commands(&self) -> Vec<String> {
        self.scripts
            .borrow()
            .iter()
            .filter_map(|script| script.lines().rev().find(|l| !l.trim().is_empty()))
            .map(str::to_string)
            .collect()
    }
}

impl ScriptRunner for RecordingRunner {
    fn run_script(&self, _root: &Path, script: &str, mounts: &[Mount]) -> Result<()> {
        self.scripts.borrow_mut().push(script.to_string());
        self.mounts.borrow_mut().extend(mounts.iter().cloned());

        if let Some(pattern) = &self.fail_on
            && script.contains(pattern.as_str())
        {
            return Err(Error::ScriptExecutionError {
                status: "exit status: 1".to_string(),
                stdout: Vec::new(),
                stderr: vec![format!("failed: {}", pattern)],
            });
        }
        Ok(())
    }
}

/// Tracks the installed set without touching any files
#[derive(Default)]
pub struct RecordingInstaller {
    pub operations: RefCell<Vec<String>>,
}

impl Installer for RecordingInstaller {
    fn install(&self, package: &PackageRecord, root: &Path) -> Result<()> {
        let fqn = package.fqn();
        let mut set = PackageSet::open(root, paths::INSTALLED_SET)?;
        if set.check(&fqn) {
            return Ok(());
        }
        self.operations.borrow_mut().push(format!("install {}", fqn));
        set.mark(&fqn);
        set.write()
    }

    fn remove(&self, package: &PackageRecord, root: &Path) -> Result<()> {
        let fqn = package.fqn();
        self.operations.borrow_mut().push(format!("remove {}", fqn));
        let mut set = PackageSet::open(root, paths::INSTALLED_SET)?;
        set.unmark(&fqn);
        set.write()
    }
}
