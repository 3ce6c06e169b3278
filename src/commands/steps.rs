// src/commands/steps.rs
//! Steps command - list the upgrade table

use super::Workspace;
use anyhow::Result;
use std::path::Path;

pub fn cmd_steps(project: &Path, config: Option<&Path>) -> Result<()> {
    let workspace = Workspace::open(project, config)?;

    println!("Upgrade steps for {} ({}):", workspace.ctx.framework(), workspace.graph.len());
    for step in workspace.graph.steps() {
        println!(
            "  {:<10} {} dependencies, {} breaking changes",
            step.label(),
            step.dependencies.len(),
            step.breaking_changes.len()
        );
    }
    Ok(())
}
