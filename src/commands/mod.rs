// src/commands/mod.rs
//! Command handlers for the x10 CLI

mod build;
mod gensum;
mod index;
mod install;
mod query;

pub use build::cmd_build;
pub use gensum::cmd_gensum;
pub use index::cmd_index;
pub use install::{cmd_install, cmd_install_plan, cmd_reset};
pub use query::{cmd_list_build, cmd_list_install, cmd_show, cmd_show_db};

use std::path::{Path, PathBuf};
use x10::Context;

/// The root a command works on: the one given, else the configured one
fn target_root(ctx: &Context, given: Option<&Path>) -> PathBuf {
    given
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.target_root().to_path_buf())
}
