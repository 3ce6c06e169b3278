// src/commands/restore.rs
//! Restore command - put a pre-upgrade backup back in place

use super::Workspace;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use upstep::backup::{backups_dir, list_backups};
use upstep::{DefaultDecisions, Orchestrator, SilentProgress};

/// Restore one backup; defaults to the newest when none is named
pub fn cmd_restore(project: &Path, config: Option<&Path>, backup: Option<&Path>) -> Result<()> {
    let workspace = Workspace::open(project, config)?;

    let backup = match backup {
        Some(path) if path.is_absolute() || path.exists() => path.to_path_buf(),
        Some(name) => backups_dir(&workspace.ctx.root).join(name),
        None => {
            let newest = list_backups(&workspace.ctx.root)?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("No backups found for {}", project.display()))?;
            backups_dir(&workspace.ctx.root).join(newest.id)
        }
    };
    info!("Restoring backup {}", backup.display());

    let progress = SilentProgress::new();
    let orchestrator = Orchestrator::new(
        &workspace.ctx,
        &workspace.graph,
        workspace.collaborators(&DefaultDecisions),
        &progress,
    );
    orchestrator
        .restore(&backup)
        .with_context(|| format!("Failed to restore {}", backup.display()))?;

    println!("Restored {}", backup.display());
    println!("Run your package manager's install to rebuild node_modules.");
    Ok(())
}

/// List backups, newest first
pub fn cmd_restore_list(project: &Path) -> Result<()> {
    let backups = list_backups(project)?;
    if backups.is_empty() {
        println!("No backups.");
        return Ok(());
    }

    println!("Backups ({}):", backups.len());
    println!("{}", "=".repeat(40));
    for backup in &backups {
        println!(
            "  {}  {}  {} files",
            backup.id,
            backup.created_at.format("%Y-%m-%d %H:%M:%S"),
            backup.files.len()
        );
    }
    Ok(())
}
