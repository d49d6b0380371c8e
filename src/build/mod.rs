// src/build/mod.rs

//! Build orchestration
//!
//! A build walks a package's `stageorder`. For each stage it:
//!
//! 1. resolves the stage's dependencies (build deps for configure, build and
//!    install; test deps for test; nothing otherwise),
//! 2. builds any resolved dependency that has no valid generated data,
//! 3. brings the target root in line with those dependencies,
//! 4. runs the stage script in the root.
//!
//! The `package` stage also records the package's metadata next to its
//! output and registers it in the root's database. After the last stage,
//! run-dependencies that were never built are built too.
//!
//! A dependency that is still not validly built after its build (it has no
//! `package` stage, say) is not built again in the same session; stages that
//! need it go ahead with an incomplete resolution.
//!
//! Builds recurse through dependencies depth-first. A package that is
//! reached again while it is still being built is a circular build
//! dependency and aborts the build.

use crate::config::{Context, MaterializeMode};
use crate::db::{paths, PackageDatabase};
use crate::error::{Error, Result};
use crate::install::Installer;
use crate::resolver::{Resolution, Resolver};
use crate::runner::{Mount, ScriptRunner};
use crate::spec::{Package, PackageRecord, SpecLoader};
use crate::world;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stages that need the package's build dependencies
pub const BUILD_STAGES: &[&str] = &["configure", "build", "install"];

/// Stage that needs the package's test dependencies
pub const TEST_STAGE: &str = "test";

/// Terminal stage producing the package's output
pub const PACKAGE_STAGE: &str = "package";

/// Dependency atoms a stage needs installed in the root
pub fn stage_dependencies<'p>(package: &'p Package, stage: &str) -> &'p [String] {
    if BUILD_STAGES.contains(&stage) {
        &package.depends.build
    } else if stage == TEST_STAGE {
        &package.depends.test
    } else {
        &[]
    }
}

/// Run one stage script of a package against a root
///
/// A stage the package does not define is skipped. After the `package`
/// stage, `meta.yml` and `depends.yml` are written to the package's destdir
/// and the package is registered in the root's database.
pub fn run_stage(
    ctx: &Context,
    runner: &dyn ScriptRunner,
    package: &Package,
    stage: &str,
    root: &Path,
) -> Result<()> {
    let fqn = package.fqn();
    info!("{}: running stage {}", fqn, stage);

    let Some(script) = package.stage_script(stage) else {
        info!("{}:   <empty stage>", fqn);
        return Ok(());
    };

    let mut mounts = Vec::new();
    let files_dir = ctx.files_dir(&package.meta.name);
    debug!("files dir: {}", files_dir.display());
    if files_dir.is_dir() {
        mounts.push(Mount::new(std::path::absolute(&files_dir)?, "/pkgfiles"));
    }

    runner.run_script(root, &script, &mounts)?;

    if stage == PACKAGE_STAGE {
        let output_dir = paths::destdir(root, &fqn);
        write_artifacts(package, &output_dir)?;
        PackageDatabase::for_root(root).update(package, &output_dir, false)?;
    }

    Ok(())
}

/// Persist the package's metadata and dependency lists with its output
fn write_artifacts(package: &Package, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)?;

    let meta = serde_yaml::to_string(&package.meta)?;
    fs::write(output_dir.join("meta.yml"), meta).map_err(|e| {
        Error::IoError(format!("Error while writing package metadata: {}", e))
    })?;

    let depends = serde_yaml::to_string(&package.depends)?;
    fs::write(output_dir.join("depends.yml"), depends).map_err(|e| {
        Error::IoError(format!("Error while writing package dependencies: {}", e))
    })?;

    Ok(())
}

/// Drives builds into one target root
pub struct Builder<'a> {
    ctx: &'a Context,
    runner: &'a dyn ScriptRunner,
    installer: &'a dyn Installer,
    root: PathBuf,
    mode: MaterializeMode,
    /// FQNs currently being built, outermost first
    building: Vec<String>,
    /// FQNs whose build was started in this session
    attempted: HashSet<String>,
}

impl<'a> Builder<'a> {
    pub fn new(
        ctx: &'a Context,
        runner: &'a dyn ScriptRunner,
        installer: &'a dyn Installer,
        root: &Path,
    ) -> Self {
        Self {
            ctx,
            runner,
            installer,
            root: root.to_path_buf(),
            mode: ctx.config.materialize_mode(),
            building: Vec::new(),
            attempted: HashSet::new(),
        }
    }

    pub fn with_mode(mut self, mode: MaterializeMode) -> Self {
        self.mode = mode;
        self
    }

    fn database(&self) -> PackageDatabase {
        PackageDatabase::for_root(&self.root)
    }

    /// Build `atom` unless it is already built; returns whether it was built
    ///
    /// A package whose build already finished in this session is not built
    /// again unless `force` is set, even if it is still not validly built.
    /// Reaching a package that is still being built is a circular build
    /// dependency.
    pub fn build_if_needed(&mut self, atom: &str, force: bool) -> Result<bool> {
        let contents = self.database().read()?;
        let fqn = contents.find_fqn(atom)?;
        let record = contents.get(&fqn)?;

        if !force {
            if record.generated_valid {
                info!("{}: (already built)", fqn);
                return Ok(false);
            }
            if self.attempted.contains(&fqn) && !self.building.contains(&fqn) {
                debug!("{}: already built once, still not valid", fqn);
                return Ok(false);
            }
        }

        let package = SpecLoader::new(self.ctx).load_record(record)?;
        self.build(&package)?;
        Ok(true)
    }

    /// Build `atom` whether or not it is already built
    pub fn build_by_name(&mut self, atom: &str) -> Result<()> {
        self.build_if_needed(atom, true).map(|_| ())
    }

    /// Build a package and, recursively, whatever it needs
    pub fn build(&mut self, package: &Package) -> Result<()> {
        let fqn = package.fqn();
        if self.building.contains(&fqn) {
            let mut chain = self.building.clone();
            chain.push(fqn);
            return Err(Error::CyclicDependency(chain));
        }

        self.attempted.insert(fqn.clone());
        self.building.push(fqn);
        let result = self.build_stages(package);
        self.building.pop();
        result
    }

    fn build_stages(&mut self, package: &Package) -> Result<()> {
        let fqn = package.fqn();
        info!("Building: {}", fqn);

        for stage in &package.stage_order {
            info!("{}: {}", fqn, stage);
            let dependencies = self.prepare_dependencies(package, stage)?;
            self.materialize(&dependencies)?;
            run_stage(self.ctx, self.runner, package, stage, &self.root)?;
        }

        info!("{}: building dependencies (run)", fqn);
        for atom in &package.depends.run {
            self.build_if_needed(atom, false)?;
        }

        info!("Built: {}", fqn);
        Ok(())
    }

    fn resolve_stage(&self, package: &Package, stage: &str) -> Result<Resolution> {
        let contents = self.database().read()?;
        let resolver = Resolver::new(&contents, self.ctx.config.use_generated_dependencies);
        let resolution = resolver.resolve(stage_dependencies(package, stage))?;
        if !resolution.complete {
            warn!(
                "{}: dependencies for {} are incomplete",
                package.fqn(),
                stage
            );
        }
        Ok(resolution)
    }

    /// Resolve a stage's dependencies, building unbuilt ones first
    fn prepare_dependencies(&mut self, package: &Package, stage: &str) -> Result<Resolution> {
        let resolution = self.resolve_stage(package, stage)?;

        let unbuilt: Vec<String> = resolution
            .packages
            .iter()
            .filter(|record| !record.generated_valid)
            .map(PackageRecord::fqn)
            .collect();
        if unbuilt.is_empty() {
            return Ok(resolution);
        }

        // Building one dependency may build a later one too
        for fqn in &unbuilt {
            info!("{}: building dependency {}", package.fqn(), fqn);
            self.build_if_needed(fqn, false)?;
        }

        // Freshly built records may carry new generated dependencies
        self.resolve_stage(package, stage)
    }

    /// Bring the root's installed packages in line with a stage's needs
    fn materialize(&self, dependencies: &Resolution) -> Result<()> {
        for fqn in dependencies.fqns() {
            info!("To install: {}", fqn);
        }

        match self.mode {
            MaterializeMode::Reconcile => {
                let mut desired = vec![self.ctx.config.build.base_package.clone()];
                desired.extend(dependencies.fqns());
                world::reconcile(self.ctx, self.installer, &self.root, &desired)?;
            }
            MaterializeMode::Additive => {
                for record in &dependencies.packages {
                    self.installer.install(record, &self.root)?;
                }
            }
        }
        Ok(())
    }
}
