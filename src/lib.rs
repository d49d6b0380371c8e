// src/lib.rs

//! x10 source-based package manager
//!
//! Packages are described by layered YAML specs, built stage by stage in a
//! container against an isolated target root, and installed into roots from
//! binary `.tar.xz` archives.
//!
//! # Architecture
//!
//! - `spec`: loading spec files and composing their layers
//! - `db`: the per-root package database, indexing and provider lookup
//! - `resolver`: run-dependency closure as a deterministic fixpoint
//! - `planner`: install/remove plans converging a root onto a desired set
//! - `build`: the stage-by-stage build orchestrator
//! - `runner`, `install`, `trigger`: the collaborators that touch roots
//!
//! Persisted documents are guarded by advisory file locks (`lock`) so that
//! concurrent invocations against the same root stay consistent.

pub mod build;
pub mod config;
pub mod db;
mod error;
pub mod install;
pub mod lock;
pub mod pkgset;
pub mod planner;
pub mod resolver;
pub mod runner;
pub mod spec;
pub mod trigger;
pub mod world;

pub use config::{Config, Context};
pub use error::{Error, Result};
