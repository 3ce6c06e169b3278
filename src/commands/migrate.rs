// src/commands/migrate.rs
//! Migrate command - run the upgrade chain and report

use super::Workspace;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use upstep::{
    BarProgress, DecisionProvider, DefaultDecisions, Issue, LogProgress, MigrationOptions,
    MigrationResult, Orchestrator, ProgressTracker, Severity, TerminalDecisions,
};

/// Flags of `upstep migrate`
#[derive(Debug, Clone, Default)]
pub struct MigrateArgs {
    pub to: u64,
    pub from: Option<u64>,
    pub dry_run: bool,
    pub continue_on_error: bool,
    pub allow_manual: bool,
    pub no_backup: bool,
    pub json: bool,
    pub yes: bool,
}

pub fn cmd_migrate(project: &Path, config: Option<&Path>, args: &MigrateArgs) -> Result<()> {
    info!("Migrating {} to {}", project.display(), args.to);

    let workspace = Workspace::open(project, config)?;

    let mut options = MigrationOptions::from_config(args.to, &workspace.ctx.config);
    options.from = args.from;
    options.dry_run = args.dry_run;
    options.skip_backup = args.no_backup;
    options.continue_on_error |= args.continue_on_error;
    options.allow_manual_override |= args.allow_manual;

    let decisions: Box<dyn DecisionProvider> = if args.yes {
        Box::new(DefaultDecisions)
    } else {
        Box::new(TerminalDecisions)
    };
    // JSON goes to stdout, so progress only reaches the stderr log
    let progress: Box<dyn ProgressTracker> = if args.json {
        Box::new(LogProgress::new("migrate"))
    } else {
        Box::new(BarProgress::new())
    };

    let orchestrator = Orchestrator::new(
        &workspace.ctx,
        &workspace.graph,
        workspace.collaborators(decisions.as_ref()),
        progress.as_ref(),
    );
    let result = orchestrator.run(&options)?;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print_report(&result);
    }

    if !result.success {
        return Err(anyhow::anyhow!("Upgrade to {} did not complete", result.to));
    }
    Ok(())
}

fn print_report(result: &MigrationResult) {
    let from = result
        .from
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!(
        "Upgrade {} -> {}{}",
        from,
        result.to,
        if result.dry_run { " (dry run)" } else { "" }
    );
    println!("{}", "=".repeat(40));
    println!("Run:         {}", result.run_id);
    if let Some(path) = &result.backup_path {
        println!("Backup:      {}", path.display());
    }

    let summary = &result.summary;
    if summary.total_steps > 0 {
        println!(
            "Steps:       {} completed, {} failed, {} not attempted (of {})",
            summary.completed, summary.failed, summary.not_attempted, summary.total_steps
        );
        println!("Updated:     {} dependencies", summary.dependencies_updated);
        println!("Modified:    {} files", summary.files_modified);
        println!("Auto-fixed:  {}", summary.auto_fixed);
    }
    let errors = result.all_issues().filter(|i| i.is_error()).count();
    let warnings = result
        .all_issues()
        .filter(|i| i.severity == Severity::Warning)
        .count();
    println!("Issues:      {} error(s), {} warning(s)", errors, warnings);

    for issue in &result.issues {
        print_issue(issue);
    }

    for step in &result.steps {
        let status = if step.success { "ok" } else { "FAILED" };
        println!(
            "\nStep {}: {} [{}] ({} ms)",
            step.step_number,
            step.spec.label(),
            status,
            step.duration_ms
        );
        if let Some(error) = &step.error {
            println!("  Error: {}", error);
        }
        for update in &step.dependency_outcome.updated {
            println!("  updated {}", update);
        }
        for (name, version) in &step.dependency_outcome.overrides {
            println!("  override {}@{}", name, version);
        }
        for conflict in &step.dependency_outcome.conflicts {
            println!("  conflict {}", conflict);
        }
        for issue in &step.issues {
            print_issue(issue);
        }
    }

    if !summary.manual_steps_required.is_empty() {
        println!("\nManual steps ({}):", summary.manual_steps_required.len());
        for manual in &summary.manual_steps_required {
            println!("  [{}] {}: {}", manual.target_version, manual.title, manual.description);
        }
    }

    println!();
    if result.success {
        println!("Upgrade complete.");
    } else if let Some(step) = result.failed_step() {
        println!("Upgrade stopped at step {} ({}).", step.step_number, step.spec.label());
    } else {
        println!("Upgrade did not run.");
    }
}

fn print_issue(issue: &Issue) {
    let marker = match issue.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    };
    let fixed = if issue.auto_fixable { " (auto-fixed)" } else { "" };
    println!("  {}: {}{}", marker, issue.title, fixed);
    if !issue.description.is_empty() {
        println!("    {}", issue.description);
    }
}
