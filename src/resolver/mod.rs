// src/resolver/mod.rs

//! Dependency resolution
//!
//! Resolution computes the run-dependency closure of a set of atoms as a
//! fixpoint over a worklist rather than a recursive walk. Each pass takes a
//! sorted snapshot of the outstanding FQNs; a package is resolved once every
//! one of its dependencies is resolved. Output order therefore puts
//! dependencies before dependents and is identical across runs given the
//! same database contents.
//!
//! When generated dependencies are in use, a record without valid generated
//! data is still expanded through its declared dependencies, but the result
//! is flagged incomplete.
//!
//! A dependency cycle stalls the fixpoint. The stalled cycle that waits on
//! nothing else is then resolved as a whole, in FQN order, so packages that
//! depend on the cycle still come after every member of it.

use crate::db::DatabaseContents;
use crate::error::Result;
use crate::spec::PackageRecord;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Which dependency list of a top-level package seeds resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyType {
    HostBuild,
    Build,
    Test,
    /// The package itself and its run-dependency closure
    Run,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DependencyType::HostBuild => "hostbuild",
            DependencyType::Build => "build",
            DependencyType::Test => "test",
            DependencyType::Run => "run",
        };
        f.write_str(name)
    }
}

/// Result of a resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Records in dependency order, each exactly once
    pub packages: Vec<PackageRecord>,
    /// False if some record's generated dependencies were needed but invalid
    pub complete: bool,
}

impl Resolution {
    pub fn fqns(&self) -> Vec<String> {
        self.packages.iter().map(PackageRecord::fqn).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Resolves atoms against one snapshot of a package database
pub struct Resolver<'a> {
    contents: &'a DatabaseContents,
    use_generated: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(contents: &'a DatabaseContents, use_generated: bool) -> Self {
        Self {
            contents,
            use_generated,
        }
    }

    /// Compute the run-dependency closure of `seed`
    ///
    /// Fails with `NotFoundError` as soon as any atom cannot be mapped to a
    /// known package.
    pub fn resolve<I, S>(&self, seed: I) -> Result<Resolution>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outstanding = BTreeSet::new();
        for atom in seed {
            outstanding.insert(self.contents.find_fqn(atom.as_ref())?);
        }

        let mut complete = true;
        let mut warned = HashSet::new();
        let mut resolved = HashSet::new();
        let mut order: Vec<String> = Vec::new();

        while !outstanding.is_empty() {
            debug!("(iteration; {} left)", outstanding.len());
            let snapshot: Vec<String> = outstanding.iter().cloned().collect();
            let mut progress = false;

            for fqn in &snapshot {
                debug!("Evaluating: {}", fqn);
                let record = self.contents.get(fqn)?;

                if self.use_generated && !record.generated_valid {
                    if warned.insert(fqn.clone()) {
                        warn!("Need to evaluate {} but no generated depends", fqn);
                    }
                    complete = false;
                }

                let mut all_resolved = true;
                for atom in self.depends(record) {
                    let depend = self.contents.find_fqn(atom)?;
                    if depend != *fqn && !resolved.contains(&depend) {
                        debug!(" => outstanding dependency: {}", depend);
                        all_resolved = false;
                        if outstanding.insert(depend) {
                            progress = true;
                        }
                    }
                }

                if all_resolved {
                    debug!(" => RESOLVED: {}", fqn);
                    outstanding.remove(fqn);
                    resolved.insert(fqn.clone());
                    order.push(fqn.clone());
                    progress = true;
                }
            }

            // Everything left waits on something else that is left, so some
            // cycle waits on nothing outside itself. Resolve it as a unit.
            if !progress {
                for fqn in self.sink_cycle(&outstanding)? {
                    debug!("Breaking dependency cycle at {}", fqn);
                    outstanding.remove(&fqn);
                    resolved.insert(fqn.clone());
                    order.push(fqn);
                }
            }
        }

        let packages = order
            .iter()
            .map(|fqn| self.contents.get(fqn).cloned())
            .collect::<Result<Vec<_>>>()?;

        Ok(Resolution { packages, complete })
    }

    /// Atoms a record depends on: declared run deps, plus generated ones
    /// when those are in use and valid
    fn depends<'r>(&self, record: &'r PackageRecord) -> Vec<&'r str> {
        let mut depends: Vec<&str> = record.depends.run.iter().map(String::as_str).collect();
        if self.use_generated && record.generated_valid {
            depends.extend(record.generated_depends.iter().map(String::as_str));
        }
        depends
    }

    /// The first (by FQN) strongly connected group of outstanding packages
    /// that depends on no outstanding package outside itself
    ///
    /// Self-dependencies are ignored, so when no pass can make progress the
    /// group is a real cycle and every dependent of it sorts after it.
    fn sink_cycle(&self, outstanding: &BTreeSet<String>) -> Result<Vec<String>> {
        let mut edges: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for fqn in outstanding {
            let mut targets = Vec::new();
            for atom in self.depends(self.contents.get(fqn)?) {
                let depend = self.contents.find_fqn(atom)?;
                if depend != *fqn && outstanding.contains(&depend) {
                    targets.push(depend);
                }
            }
            edges.insert(fqn.as_str(), targets);
        }

        let reachable = |start: &str| -> BTreeSet<String> {
            let mut seen = BTreeSet::new();
            let mut stack = vec![start.to_string()];
            while let Some(fqn) = stack.pop() {
                for target in edges.get(fqn.as_str()).into_iter().flatten() {
                    if seen.insert(target.clone()) {
                        stack.push(target.clone());
                    }
                }
            }
            seen
        };

        for fqn in outstanding {
            let downstream = reachable(fqn);
            if !downstream.contains(fqn) {
                continue;
            }
            let is_sink = downstream
                .iter()
                .all(|other| other == fqn || reachable(other).contains(fqn));
            if is_sink {
                return Ok(downstream.into_iter().collect());
            }
        }

        // No cycle found; fall back to the smallest FQN
        Ok(outstanding.first().cloned().into_iter().collect())
    }

    /// Resolve one dependency view of a top-level package
    ///
    /// `Run` seeds with the package itself; the other types seed with the
    /// package's declared list of that type, excluding the package.
    pub fn install_deps(&self, top_level: &str, dep_type: DependencyType) -> Result<Resolution> {
        let fqn = self.contents.find_fqn(top_level)?;
        let record = self.contents.get(&fqn)?;
        debug!("Resolving {} dependencies of {}", dep_type, fqn);

        match dep_type {
            DependencyType::Run => self.resolve([fqn.as_str()]),
            DependencyType::Build => self.resolve(&record.depends.build),
            DependencyType::Test => self.resolve(&record.depends.test),
            DependencyType::HostBuild => self.resolve(&record.depends.host_build),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::spec::SpecMeta;

    fn add(contents: &mut DatabaseContents, name: &str, run: &[&str], generated: Option<&[&str]>) {
        let mut record = PackageRecord {
            meta: SpecMeta {
                name: name.to_string(),
                version: "1".to_string(),
                ..SpecMeta::default()
            },
            ..PackageRecord::default()
        };
        record.depends.run = run.iter().map(|s| s.to_string()).collect();
        if let Some(generated) = generated {
            record.generated_valid = true;
            record.generated_depends = generated.iter().map(|s| s.to_string()).collect();
        }
        contents.packages.insert(record.fqn(), record);
    }

    fn database() -> DatabaseContents {
        let mut contents = DatabaseContents::default();
        add(&mut contents, "app", &["libfoo", "libbar"], Some(&[]));
        add(&mut contents, "libfoo", &["libc"], Some(&[]));
        add(&mut contents, "libbar", &["libfoo"], Some(&["libc"]));
        add(&mut contents, "libc", &[], Some(&[]));
        add(&mut contents, "self", &["self"], Some(&[]));
        contents.rebuild_provider_index();
        contents
    }

    #[test]
    fn test_closure_in_dependency_order() {
        let contents = database();
        let resolution = Resolver::new(&contents, true).resolve(["app"]).unwrap();

        assert!(resolution.complete);
        assert_eq!(
            resolution.fqns(),
            vec!["libc-1_0", "libfoo-1_0", "libbar-1_0", "app-1_0"]
        );
    }

    #[test]
    fn test_deterministic() {
        let contents = database();
        let resolver = Resolver::new(&contents, true);
        let first = resolver.resolve(["libbar", "app"]).unwrap();
        let second = resolver.resolve(["app", "libbar"]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_self_dependency_does_not_block() {
        let contents = database();
        let resolution = Resolver::new(&contents, true).resolve(["self"]).unwrap();
        assert_eq!(resolution.fqns(), vec!["self-1_0"]);
    }

    #[test]
    fn test_mutual_dependency_terminates() {
        let mut contents = DatabaseContents::default();
        add(&mut contents, "a", &["b"], Some(&[]));
        add(&mut contents, "b", &["a"], Some(&[]));
        add(&mut contents, "top", &["a"], Some(&[]));
        contents.rebuild_provider_index();

        let resolution = Resolver::new(&contents, true).resolve(["top"]).unwrap();
        let fqns = resolution.fqns();
        assert_eq!(fqns.len(), 3);
        assert_eq!(fqns.iter().filter(|f| *f == "a-1_0").count(), 1);
        assert_eq!(fqns.iter().filter(|f| *f == "b-1_0").count(), 1);
        assert_eq!(fqns.last().unwrap(), "top-1_0");
    }

    #[test]
    fn test_cycle_members_precede_dependents() {
        let mut contents = DatabaseContents::default();
        add(&mut contents, "app", &["x"], Some(&[]));
        add(&mut contents, "x", &["y"], Some(&[]));
        add(&mut contents, "y", &["x"], Some(&[]));
        contents.rebuild_provider_index();

        let resolution = Resolver::new(&contents, true).resolve(["app"]).unwrap();
        assert!(resolution.complete);
        assert_eq!(resolution.fqns(), vec!["x-1_0", "y-1_0", "app-1_0"]);
    }

    #[test]
    fn test_cycle_waits_for_its_own_dependencies() {
        let mut contents = DatabaseContents::default();
        add(&mut contents, "a", &["b"], Some(&[]));
        add(&mut contents, "b", &["c", "z"], Some(&[]));
        add(&mut contents, "c", &["b"], Some(&[]));
        add(&mut contents, "z", &["w"], Some(&[]));
        add(&mut contents, "w", &["z"], Some(&[]));
        contents.rebuild_provider_index();

        // Two cycles: {b, c} depends on {w, z}; a sorts first but is on neither
        let resolution = Resolver::new(&contents, true).resolve(["a"]).unwrap();
        assert_eq!(
            resolution.fqns(),
            vec!["w-1_0", "z-1_0", "b-1_0", "c-1_0", "a-1_0"]
        );
    }

    #[test]
    fn test_incomplete_without_generated_data() {
        let mut contents = DatabaseContents::default();
        add(&mut contents, "app", &["lib"], None);
        add(&mut contents, "lib", &[], Some(&[]));
        contents.rebuild_provider_index();

        let resolution = Resolver::new(&contents, true).resolve(["app"]).unwrap();
        assert!(!resolution.complete);
        // Declared dependencies are still followed
        assert_eq!(resolution.fqns(), vec!["lib-1_0", "app-1_0"]);

        let resolution = Resolver::new(&contents, false).resolve(["app"]).unwrap();
        assert!(resolution.complete);
    }

    #[test]
    fn test_generated_depends_followed_only_when_enabled() {
        let contents = database();
        let with = Resolver::new(&contents, true).resolve(["libbar"]).unwrap();
        let without = Resolver::new(&contents, false).resolve(["libbar"]).unwrap();
        assert!(with.fqns().contains(&"libc-1_0".to_string()));
        // libc still comes in through libfoo
        assert!(without.fqns().contains(&"libc-1_0".to_string()));
    }

    #[test]
    fn test_unknown_atom_fails() {
        let mut contents = database();
        add(&mut contents, "broken", &["missing"], Some(&[]));
        contents.rebuild_provider_index();

        let err = Resolver::new(&contents, true).resolve(["broken"]).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
        assert!(Resolver::new(&contents, true).resolve(["nope"]).is_err());
    }

    #[test]
    fn test_install_deps() {
        let mut contents = database();
        let record = contents.packages.get_mut("app-1_0").unwrap();
        record.depends.build = vec!["libbar".to_string()];
        record.depends.test = vec!["libc".to_string()];

        let resolver = Resolver::new(&contents, true);
        let build = resolver.install_deps("app", DependencyType::Build).unwrap();
        assert_eq!(build.fqns(), vec!["libc-1_0", "libfoo-1_0", "libbar-1_0"]);

        let test = resolver.install_deps("app", DependencyType::Test).unwrap();
        assert_eq!(test.fqns(), vec!["libc-1_0"]);

        let host = resolver.install_deps("app", DependencyType::HostBuild).unwrap();
        assert!(host.is_empty());

        let run = resolver.install_deps("app-1_0", DependencyType::Run).unwrap();
        assert_eq!(run.fqns().last().unwrap(), "app-1_0");
    }
}
