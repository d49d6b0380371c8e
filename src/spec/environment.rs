// src/spec/environment.rs

//! Shell environment prelude for stage scripts
//!
//! Every stage script starts with a block of `export` lines describing the
//! package: its metadata, sources, dependencies and custom environment.
//! Output is sorted so the same package always yields the same prelude.

use super::format::Package;
use std::collections::BTreeMap;

/// Quote a value for a bash double-quoted string
///
/// Backslashes and double quotes are escaped; `$` is left alone so values
/// may refer to other variables.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '\\' || c == '"' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn make_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Package {
    /// Build the `export` prelude for this package's stage scripts
    pub fn environment_script(&self) -> String {
        let fqn = self.fqn();
        let meta = &self.meta;

        let mut vars: BTreeMap<&str, String> = BTreeMap::new();
        vars.insert("X10_META_NAME", meta.name.clone());
        vars.insert("X10_META_VERSION", meta.version.clone());
        vars.insert("X10_META_REVISION", meta.revision.to_string());
        vars.insert("X10_META_MAINTAINER", meta.maintainer.clone());
        vars.insert("X10_META_HOMEPAGE", meta.homepage.clone());
        vars.insert("X10_META_LICENSE", meta.license.clone());
        vars.insert("X10_META_DESCRIPTION", meta.description.clone());
        vars.insert(
            "X10_META_UNPACK_DIR",
            meta.unpack_dir.clone().unwrap_or_else(|| meta.name.clone()),
        );
        vars.insert("X10_PACKAGE_FQN", fqn.clone());
        vars.insert("X10_MAKE_JOBS", make_jobs().to_string());
        vars.insert("DESTDIR", format!("/destdir/{}", fqn));

        for (name, value) in &self.environment {
            vars.insert(name.as_str(), value.clone());
        }

        let mut arrays: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        arrays.insert(
            "X10_SOURCES_URLS",
            self.sources.iter().map(|s| s.url.as_str()).collect(),
        );
        arrays.insert(
            "X10_SOURCES_CHECKSUMS",
            self.sources.iter().map(|s| s.checksum.as_str()).collect(),
        );
        arrays.insert(
            "X10_DEPENDS_HOSTBUILDS",
            self.depends.host_build.iter().map(String::as_str).collect(),
        );
        arrays.insert(
            "X10_DEPENDS_BUILDS",
            self.depends.build.iter().map(String::as_str).collect(),
        );
        arrays.insert(
            "X10_DEPENDS_TESTS",
            self.depends.test.iter().map(String::as_str).collect(),
        );
        arrays.insert(
            "X10_DEPENDS_RUNS",
            self.depends.run.iter().map(String::as_str).collect(),
        );
        if let Some(patches) = &self.patches {
            arrays.insert("X10_PATCHES", patches.iter().map(String::as_str).collect());
        }

        let mut lines: Vec<String> = vars
            .iter()
            .map(|(name, value)| format!("export {}={}", name, quote(value)))
            .collect();

        lines.push(format!("export X10_WORKDIR={}", quote(&self.workdir)));

        for (name, values) in &arrays {
            let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
            lines.push(format!("export {}=({})", name, quoted.join(" ")));
        }

        lines.join("\n")
    }

    /// Full script for one stage, or `None` if the package has no such stage
    pub fn stage_script(&self, stage: &str) -> Option<String> {
        let definition = self.stages.get(stage)?;

        let mut chunks = vec![self.environment_script()];
        if definition.use_workdir {
            chunks.push("cd \"$X10_WORKDIR\"".to_string());
        }
        chunks.extend(definition.script_lines().into_iter().map(str::to_string));

        Some(chunks.join("\n"))
    }
}
