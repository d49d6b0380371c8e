// src/spec/format.rs

//! Package spec file format definitions
//!
//! Spec files are YAML documents with an optional list of layer names and a
//! `package` layer. Keys are the lowercased field names without separators
//! (`hostbuild`, `prescript`, `stageorder`, ...), matching the on-disk format
//! of existing spec trees and databases.
//!
//! # Example
//!
//! ```yaml
//! layers: [autotools]
//! package:
//!   meta:
//!     name: zlib
//!     version: "1.3"
//!     revision: 0
//!   depends:
//!     build: [virtual/toolchain]
//!   sources:
//!     - url: https://zlib.net/zlib-1.3.tar.xz
//!       checksum: sha256:8a9ba2898e1d0d774eca6ba5b4627a11e5588ba85c8851336eb38de4683050a7
//! ```

use crate::trigger::TriggerData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Package metadata
///
/// The FQN is always derived from `name`, `version` and `revision`; it is
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecMeta {
    pub name: String,
    pub version: String,
    pub revision: u32,
    pub maintainer: String,
    pub homepage: String,
    pub license: String,
    pub description: String,
    /// Directory the main source unpacks into (defaults to the name)
    #[serde(rename = "unpackdir", skip_serializing_if = "Option::is_none")]
    pub unpack_dir: Option<String>,
}

impl SpecMeta {
    /// Fully-qualified name: `name-version_revision`
    pub fn fqn(&self) -> String {
        format!("{}-{}_{}", self.name, self.version, self.revision)
    }
}

/// The four dependency lists; each entry is an atom (FQN or provided name)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecDepends {
    #[serde(rename = "hostbuild")]
    pub host_build: Vec<String>,
    pub build: Vec<String>,
    pub test: Vec<String>,
    pub run: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecSource {
    pub url: String,
    pub checksum: String,
}

/// One stage as written in a single layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecStage {
    #[serde(rename = "prescript")]
    pub pre_script: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(rename = "postscript")]
    pub post_script: Vec<String>,
    #[serde(rename = "useworkdir", skip_serializing_if = "Option::is_none")]
    pub use_workdir: Option<bool>,
}

/// A (partial) package definition
///
/// Both shared layers and a package's own definition use this shape. Every
/// field is optional so a layer only states what it contributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<SpecMeta>,
    pub depends: SpecDepends,
    pub sources: Vec<SpecSource>,
    pub stages: BTreeMap<String, SpecStage>,
    #[serde(rename = "stageorder", skip_serializing_if = "Option::is_none")]
    pub stage_order: Option<Vec<String>>,
    pub environment: BTreeMap<String, String>,
    pub workdir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patches: Option<Vec<String>>,
    #[serde(rename = "triggerdata")]
    pub trigger_data: TriggerData,
}

/// A spec file: layer references plus the package's own layer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecFile {
    pub layers: Vec<String>,
    pub package: Option<SpecLayer>,
}

/// A fully composed stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub pre_script: Vec<String>,
    pub script: Option<String>,
    pub post_script: Vec<String>,
    pub use_workdir: bool,
}

impl Stage {
    /// Stage body in execution order: pre-script, script, post-script
    pub fn script_lines(&self) -> Vec<&str> {
        let mut lines: Vec<&str> = self.pre_script.iter().map(String::as_str).collect();
        if let Some(script) = &self.script {
            lines.push(script);
        }
        lines.extend(self.post_script.iter().map(String::as_str));
        lines
    }
}

/// A fully composed package spec
///
/// This is never persisted; only its [`PackageRecord`] projection enters the
/// package database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Package {
    pub meta: SpecMeta,
    pub depends: SpecDepends,
    pub sources: Vec<SpecSource>,
    pub stages: BTreeMap<String, Stage>,
    pub stage_order: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub workdir: String,
    pub patches: Option<Vec<String>>,
    pub trigger_data: TriggerData,
}

impl Package {
    pub fn fqn(&self) -> String {
        self.meta.fqn()
    }

    /// Projection stored in the package database, with generated state reset
    pub fn to_record(&self) -> PackageRecord {
        PackageRecord {
            meta: self.meta.clone(),
            depends: self.depends.clone(),
            generated_valid: false,
            generated_depends: Vec::new(),
            generated_provides: Vec::new(),
        }
    }
}

/// A package as stored in the package database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageRecord {
    pub meta: SpecMeta,
    pub depends: SpecDepends,
    /// Whether the generated lists come from a build of this exact FQN
    #[serde(rename = "generatedvalid")]
    pub generated_valid: bool,
    #[serde(rename = "generateddepends")]
    pub generated_depends: Vec<String>,
    #[serde(rename = "generatedprovides")]
    pub generated_provides: Vec<String>,
}

impl PackageRecord {
    pub fn fqn(&self) -> String {
        self.meta.fqn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SPEC: &str = r#"
layers: [autotools]
package:
  meta:
    name: zlib
    version: "1.3"
    revision: 2
    license: Zlib
  depends:
    hostbuild: [host/make]
    build: [virtual/toolchain]
    run: [glibc]
  sources:
    - url: https://zlib.net/zlib-1.3.tar.xz
      checksum: sha256:abc
  stages:
    build:
      prescript: ["echo pre"]
      script: make
      useworkdir: true
  stageorder: [fetch, build, package]
  environment:
    CFLAGS: -O2
  triggerdata:
    command:
      script: ldconfig
"#;

    #[test]
    fn test_fqn() {
        let meta = SpecMeta {
            name: "zlib".to_string(),
            version: "1.3".to_string(),
            revision: 2,
            ..SpecMeta::default()
        };
        assert_eq!(meta.fqn(), "zlib-1.3_2");
        assert_eq!(meta.fqn(), meta.fqn());
    }

    #[test]
    fn test_parse_spec_file() {
        let spec: SpecFile = serde_yaml::from_str(SAMPLE_SPEC).unwrap();
        assert_eq!(spec.layers, vec!["autotools"]);

        let package = spec.package.unwrap();
        let meta = package.meta.unwrap();
        assert_eq!(meta.fqn(), "zlib-1.3_2");
        assert_eq!(meta.license, "Zlib");
        assert_eq!(meta.unpack_dir, None);

        assert_eq!(package.depends.host_build, vec!["host/make"]);
        assert_eq!(package.depends.build, vec!["virtual/toolchain"]);
        assert_eq!(package.depends.run, vec!["glibc"]);
        assert!(package.depends.test.is_empty());

        let build = &package.stages["build"];
        assert_eq!(build.pre_script, vec!["echo pre"]);
        assert_eq!(build.script.as_deref(), Some("make"));
        assert_eq!(build.use_workdir, Some(true));

        assert_eq!(
            package.stage_order,
            Some(vec!["fetch".to_string(), "build".to_string(), "package".to_string()])
        );
        assert_eq!(package.environment["CFLAGS"], "-O2");
        assert!(package.trigger_data.command.is_some());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let bad = "package:\n  meta:\n    name: x\n  bogus: 1\n";
        assert!(serde_yaml::from_str::<SpecFile>(bad).is_err());
    }

    #[test]
    fn test_record_keys() {
        let record = PackageRecord {
            meta: SpecMeta {
                name: "zlib".to_string(),
                version: "1.3".to_string(),
                ..SpecMeta::default()
            },
            generated_valid: true,
            generated_provides: vec!["libz.so.1".to_string()],
            ..PackageRecord::default()
        };

        let yaml = serde_yaml::to_string(&record).unwrap();
        assert!(yaml.contains("generatedvalid: true"));
        assert!(yaml.contains("generatedprovides:"));
        assert!(yaml.contains("hostbuild: []"));
    }

    #[test]
    fn test_stage_script_lines() {
        let stage = Stage {
            pre_script: vec!["a".to_string()],
            script: Some("b".to_string()),
            post_script: vec!["c".to_string(), "d".to_string()],
            use_workdir: false,
        };
        assert_eq!(stage.script_lines(), vec!["a", "b", "c", "d"]);
    }
}
