// src/trigger/mod.rs

//! Post-installation triggers
//!
//! A package can ask for actions to run inside the target root after its
//! files have been copied in. Each trigger kind has its own typed payload
//! under the spec's `triggerdata` map:
//!
//! ```yaml
//! triggerdata:
//!   command:
//!     script: ldconfig
//!   xmlcatalog:
//!     sgmlentries: ["CATALOG /usr/share/sgml/docbook/catalog"]
//!     xmlentries: ["nextCatalog /usr/share/xml/docbook/catalog.xml"]
//! ```
//!
//! Triggers run through the same [`ScriptRunner`] as build stages, so they
//! execute in the target root's container rather than on the host.

use crate::error::{Error, Result};
use crate::runner::ScriptRunner;
use crate::spec::Package;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const SGML_CATALOG: &str = "/usr/share/sgml/catalog";
const XML_CATALOG: &str = "/usr/share/xml/catalog";

/// Typed trigger payloads, keyed by trigger kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandTrigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmlcatalog: Option<XmlCatalogTrigger>,
}

impl TriggerData {
    /// Overlay `other` on top of `self`; kinds present in `other` replace ours
    pub fn overlay(&mut self, other: &TriggerData) {
        if let Some(command) = &other.command {
            self.command = Some(command.clone());
        }
        if let Some(xmlcatalog) = &other.xmlcatalog {
            self.xmlcatalog = Some(xmlcatalog.clone());
        }
    }

    /// Triggers to run, in a fixed order
    pub fn triggers(&self) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        if let Some(command) = &self.command {
            triggers.push(Trigger::Command(command.clone()));
        }
        if let Some(xmlcatalog) = &self.xmlcatalog {
            triggers.push(Trigger::XmlCatalog(xmlcatalog.clone()));
        }
        triggers
    }

    pub fn is_empty(&self) -> bool {
        self.command.is_none() && self.xmlcatalog.is_none()
    }
}

/// Run an arbitrary shell snippet in the target root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandTrigger {
    pub script: String,
}

/// Register SGML/XML catalog entries with `xmlcatmgr`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XmlCatalogTrigger {
    #[serde(rename = "sgmlentries")]
    pub sgml_entries: Vec<String>,
    #[serde(rename = "xmlentries")]
    pub xml_entries: Vec<String>,
}

/// A single trigger invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Command(CommandTrigger),
    XmlCatalog(XmlCatalogTrigger),
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::Command(_) => "command",
            Trigger::XmlCatalog(_) => "xmlcatalog",
        }
    }

    /// Scripts this trigger runs, one runner invocation each
    pub fn scripts(&self) -> Vec<String> {
        match self {
            Trigger::Command(data) => vec![data.script.clone()],
            Trigger::XmlCatalog(data) => {
                let sgml = data
                    .sgml_entries
                    .iter()
                    .map(|entry| format!("/usr/bin/xmlcatmgr -sc {} add {}", SGML_CATALOG, entry));
                let xml = data
                    .xml_entries
                    .iter()
                    .map(|entry| format!("/usr/bin/xmlcatmgr -c {} add {}", XML_CATALOG, entry));
                sgml.chain(xml).collect()
            }
        }
    }
}

/// Runs a package's triggers against a target root
pub struct TriggerExecutor<'a> {
    runner: &'a dyn ScriptRunner,
    root: &'a Path,
}

impl<'a> TriggerExecutor<'a> {
    pub fn new(runner: &'a dyn ScriptRunner, root: &'a Path) -> Self {
        Self { runner, root }
    }

    /// Run every trigger the package declares; the first failure aborts
    pub fn run(&self, package: &Package) -> Result<()> {
        if package.trigger_data.is_empty() {
            debug!("{}: no triggers", package.fqn());
            return Ok(());
        }

        for trigger in package.trigger_data.triggers() {
            info!("Running {} trigger for {}", trigger.name(), package.fqn());

            for script in trigger.scripts() {
                debug!("Trigger script: {}", script);
                self.runner
                    .run_script(self.root, &script, &[])
                    .map_err(|e| Error::TriggerError {
                        name: trigger.name().to_string(),
                        message: e.to_string(),
                    })?;
            }
        }
        Ok(())
    }
}
