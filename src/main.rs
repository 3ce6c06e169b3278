// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::MigrateArgs;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays parseable
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let project = cli.project.as_path();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Migrate {
            versions,
            dry_run,
            continue_on_error,
            allow_manual,
            no_backup,
            json,
            yes,
        } => commands::cmd_migrate(
            project,
            config,
            &MigrateArgs {
                to: versions.to,
                from: versions.from,
                dry_run,
                continue_on_error,
                allow_manual,
                no_backup,
                json,
                yes,
            },
        ),
        Commands::Plan { versions } => {
            commands::cmd_plan(project, config, versions.to, versions.from)
        }
        Commands::Check { versions, json } => {
            commands::cmd_check(project, config, versions.to, versions.from, json)
        }
        Commands::Restore { backup, list } => {
            if list {
                commands::cmd_restore_list(project)
            } else {
                commands::cmd_restore(project, config, backup.as_deref())
            }
        }
        Commands::Steps => commands::cmd_steps(project, config),
    }
}
