// src/commands/plan.rs
//! Plan command - show the chain an upgrade would run

use super::Workspace;
use anyhow::Result;
use std::path::Path;
use tracing::info;
use upstep::{DefaultDecisions, MigrationOptions, Orchestrator, SilentProgress};

pub fn cmd_plan(project: &Path, config: Option<&Path>, to: u64, from: Option<u64>) -> Result<()> {
    info!("Planning upgrade of {} to {}", project.display(), to);

    let workspace = Workspace::open(project, config)?;
    let progress = SilentProgress::new();
    let orchestrator = Orchestrator::new(
        &workspace.ctx,
        &workspace.graph,
        workspace.collaborators(&DefaultDecisions),
        &progress,
    );

    let mut options = MigrationOptions::from_config(to, &workspace.ctx.config);
    options.from = from;
    let current = orchestrator.current_version(&options)?;

    if current == to {
        println!("Already at {} {}.", workspace.ctx.framework(), to);
        return Ok(());
    }
    if to < current {
        return Err(anyhow::anyhow!(
            "Target {} is behind the current version {}; downgrades are not supported",
            to,
            current
        ));
    }

    let chain = workspace.graph.build_chain(current, to)?;
    println!("Upgrade plan: {} {} -> {}", workspace.ctx.framework(), current, to);
    println!("{}", "=".repeat(40));
    for (index, step) in chain.iter().enumerate() {
        println!("\n{}. {}", index + 1, step.label());
        for dep in &step.dependencies {
            let kind = if dep.dev { " (dev)" } else { "" };
            println!("   {} {}{}", dep.name, dep.range, kind);
        }
        for task in &step.pre_tasks {
            println!("   pre:  {} ({})", task.name, task.command);
        }
        for task in &step.post_tasks {
            println!("   post: {} ({})", task.name, task.command);
        }
        for change in &step.breaking_changes {
            let fix = if change.auto_fixable { "auto" } else { "manual" };
            println!("   [{}] {} ({})", change.impact, change.title, fix);
        }
    }

    Ok(())
}
