// src/cli.rs
//! CLI definitions for upstep
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upstep")]
#[command(version)]
#[command(about = "Upgrade a JavaScript project one major version at a time", long_about = None)]
pub struct Cli {
    /// Project directory (must contain package.json)
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Config file (default: <project>/upstep.toml, then the user config)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Source and target versions shared by several commands
#[derive(Args, Debug, Clone)]
pub struct VersionArgs {
    /// Target major version
    #[arg(long)]
    pub to: u64,

    /// Current major version (detected from package.json if omitted)
    #[arg(long)]
    pub from: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upgrade the project to a target version
    Migrate {
        #[command(flatten)]
        versions: VersionArgs,

        /// Analyse and transform without writing the manifest or installing
        #[arg(long)]
        dry_run: bool,

        /// Keep going after a failed step
        #[arg(long)]
        continue_on_error: bool,

        /// Install even when conflicts need manual work
        #[arg(long)]
        allow_manual: bool,

        /// Do not back up the project first
        #[arg(long)]
        no_backup: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        /// Never prompt; use the default answer to every question
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the steps an upgrade would run
    Plan {
        #[command(flatten)]
        versions: VersionArgs,
    },

    /// Analyse peer conflicts of the first step without changing anything
    Check {
        #[command(flatten)]
        versions: VersionArgs,

        /// Print the resolution plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore a backup taken by an earlier run
    Restore {
        /// Backup directory or id (default: newest; see `upstep restore --list`)
        backup: Option<PathBuf>,

        /// List available backups
        #[arg(long)]
        list: bool,
    },

    /// List the known upgrade steps
    Steps,
}
