// src/commands/check.rs
//! Check command - analyse peer conflicts of the next step
//!
//! Nothing is written: the manifest, the lock files and node_modules are
//! left as they are.

use super::Workspace;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use upstep::{
    ConflictResolver, DefaultDecisions, MigrationOptions, Orchestrator, SilentProgress,
};

pub fn cmd_check(
    project: &Path,
    config: Option<&Path>,
    to: u64,
    from: Option<u64>,
    json: bool,
) -> Result<()> {
    info!("Checking conflicts of {} towards {}", project.display(), to);

    let workspace = Workspace::open(project, config)?;
    let progress = SilentProgress::new();
    let collaborators = workspace.collaborators(&DefaultDecisions);
    let orchestrator = Orchestrator::new(&workspace.ctx, &workspace.graph, collaborators, &progress);

    let mut options = MigrationOptions::from_config(to, &workspace.ctx.config);
    options.from = from;
    let current = orchestrator.current_version(&options)?;
    if current >= to {
        println!("Nothing to check: the project is on {}.", current);
        return Ok(());
    }

    let chain = workspace.graph.build_chain(current, to)?;
    let Some(step) = chain.first() else {
        return Ok(());
    };

    let resolver = ConflictResolver::new(&workspace.ctx, collaborators.registry);
    let plan = resolver.analyze(&step.dependencies, collaborators.manifest)?;

    if json {
        let json = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
        println!("{}", json);
        return Ok(());
    }

    println!("Conflict check: {}", step.label());
    println!("{}", "=".repeat(40));
    if plan.conflicts.is_empty() {
        println!("No peer conflicts.");
    }
    for conflict in &plan.conflicts {
        println!("  {}", conflict);
    }
    for (name, version) in &plan.dependency_updates {
        println!("  update   {}@{}", name, version);
    }
    for (name, version) in &plan.overrides {
        println!("  override {}@{}", name, version);
    }
    for skipped in &plan.skipped {
        println!("  skipped  {}: {}", skipped.package, skipped.reason);
    }
    println!(
        "\nAuto-resolvable: {}",
        if plan.can_auto_resolve { "yes" } else { "no" }
    );
    for step in &plan.manual_steps {
        println!("  manual: {}", step);
    }

    Ok(())
}
