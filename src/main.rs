// src/main.rs

mod cli;
mod commands;

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;
use x10::{Config, Context};

/// Log filter: `RUST_LOG` if set, else debug when `X10_DEBUG` is set
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if std::env::var_os("X10_DEBUG").is_some() {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    let ctx = Context::new(config);

    match cli.command {
        Commands::Index { target_root } => commands::cmd_index(&ctx, target_root.as_deref()),

        Commands::Build {
            package,
            target_root,
            force,
            no_reset,
        } => commands::cmd_build(&ctx, &package, target_root.as_deref(), force, no_reset),

        Commands::Install { package, root } => commands::cmd_install(&ctx, &package, &root),

        Commands::InstallPlan { package, root } => {
            commands::cmd_install_plan(&ctx, &package, &root)
        }

        Commands::Reset { root } => commands::cmd_reset(&ctx, &root),

        Commands::Show { spec } => commands::cmd_show(&ctx, &spec),

        Commands::ShowDb { target_root } => commands::cmd_show_db(&ctx, target_root.as_deref()),

        Commands::ListInstall {
            package,
            target_root,
        } => commands::cmd_list_install(&ctx, &package, target_root.as_deref()),

        Commands::ListBuild {
            package,
            target_root,
        } => commands::cmd_list_build(&ctx, &package, target_root.as_deref()),

        Commands::Gensum { spec, target_root } => {
            commands::cmd_gensum(&ctx, &spec, target_root.as_deref())
        }
    }
}
