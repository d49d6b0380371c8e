// src/cli/mod.rs
//! CLI definitions for x10
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use x10::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "x10")]
#[command(version)]
#[command(about = "Source-based package manager building from layered specs", long_about = None)]
pub struct Cli {
    /// Colon-separated list of TOML configuration files
    #[arg(short, long, global = true, env = "X10_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rescan the package tree into the target root's database
    Index {
        /// Target root (default: from configuration)
        #[arg(long)]
        target_root: Option<PathBuf>,
    },

    /// Build a package and whatever it needs
    Build {
        /// Package name or atom
        package: String,

        /// Directory the build runs against (default: from configuration)
        #[arg(long)]
        target_root: Option<PathBuf>,

        /// Build even if the package is already built
        #[arg(long)]
        force: bool,

        /// Only add dependencies to the root, never remove any
        #[arg(long)]
        no_reset: bool,
    },

    /// Add a package to a root's world set and converge the root
    Install {
        /// Package atom
        package: String,

        /// Target root
        root: PathBuf,
    },

    /// Show what installing a package into a root would do
    InstallPlan {
        /// Package atom
        package: String,

        /// Target root
        root: PathBuf,
    },

    /// Reduce a root to the base package
    Reset {
        /// Target root
        root: PathBuf,
    },

    /// Print the composed spec of a spec file
    Show {
        /// Path to the spec file
        spec: PathBuf,
    },

    /// Print the package database
    ShowDb {
        /// Target root (default: from configuration)
        #[arg(long)]
        target_root: Option<PathBuf>,
    },

    /// List the packages installing an atom would pull in
    ListInstall {
        /// Package atom
        package: String,

        /// Target root (default: from configuration)
        #[arg(long)]
        target_root: Option<PathBuf>,
    },

    /// List the packages building an atom needs
    ListBuild {
        /// Package atom
        package: String,

        /// Target root (default: from configuration)
        #[arg(long)]
        target_root: Option<PathBuf>,
    },

    /// Fetch sources and regenerate checksums for a spec
    Gensum {
        /// Path to the spec file
        spec: PathBuf,

        /// Target root (default: from configuration)
        #[arg(long)]
        target_root: Option<PathBuf>,
    },
}
