// src/orchestrator/mod.rs

//! Run orchestration
//!
//! The orchestrator turns "upgrade to N" into a chain of steps, snapshots the
//! project, runs the steps strictly in order and aggregates a
//! [`MigrationResult`]. It never restores a backup on its own: partial
//! success may be worth keeping, so rollback is left to the operator
//! ([`Orchestrator::restore`]).

mod result;

pub use result::{ManualStep, MigrationResult, MigrationSummary};

use crate::config::Config;
use crate::context::ProjectContext;
use crate::decision::{Question, QuestionKind};
use crate::error::{Error, Result};
use crate::executor::{Collaborators, StepExecutor, StepOptions, StepResult};
use crate::graph::VersionGraph;
use crate::issue::{Issue, IssueCategory};
use crate::progress::ProgressTracker;
use chrono::Utc;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    pub target: u64,
    /// Current version; detected from the manifest when unset
    pub from: Option<u64>,
    pub dry_run: bool,
    pub continue_on_error: bool,
    pub allow_manual_override: bool,
    pub skip_backup: bool,
    /// Checked between steps only
    pub run_timeout: Option<Duration>,
}

impl MigrationOptions {
    /// Options for `target` with run defaults taken from config
    pub fn from_config(target: u64, config: &Config) -> Self {
        Self {
            target,
            continue_on_error: config.continue_on_error,
            allow_manual_override: config.allow_manual_override,
            run_timeout: config.run_timeout(),
            ..Self::default()
        }
    }
}

pub struct Orchestrator<'a> {
    ctx: &'a ProjectContext,
    graph: &'a VersionGraph,
    collaborators: Collaborators<'a>,
    progress: &'a dyn ProgressTracker,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        ctx: &'a ProjectContext,
        graph: &'a VersionGraph,
        collaborators: Collaborators<'a>,
        progress: &'a dyn ProgressTracker,
    ) -> Self {
        Self {
            ctx,
            graph,
            collaborators,
            progress,
        }
    }

    /// Major version the project is on now
    ///
    /// Taken from `options.from`, else from the lowest version admitted by
    /// the framework's declared range.
    pub fn current_version(&self, options: &MigrationOptions) -> Result<u64> {
        if let Some(from) = options.from {
            return Ok(from);
        }

        let framework = self.ctx.framework();
        let deps = self.collaborators.manifest.read_dependencies()?;
        let declared = deps.declared(framework).ok_or_else(|| {
            Error::ManifestError(format!("{} is not declared in the manifest", framework))
        })?;
        deps.declared_range(framework)
            .and_then(|r| r.min_version())
            .map(|v| v.major)
            .ok_or_else(|| {
                Error::ManifestError(format!(
                    "Cannot derive a version of {} from '{}'",
                    framework, declared.range
                ))
            })
    }

    /// Run the upgrade
    ///
    /// Problems that prevent the run (unknown version, no path, downgrade)
    /// are reported as issues on an unsuccessful result, not as `Err`.
    pub fn run(&self, options: &MigrationOptions) -> Result<MigrationResult> {
        let mut result = MigrationResult::new(Uuid::new_v4().to_string(), options.target, options.dry_run);
        info!(
            "Run {}: upgrading {} to {}{}",
            result.run_id,
            self.ctx.framework(),
            options.target,
            if options.dry_run { " (dry run)" } else { "" }
        );

        self.run_inner(options, &mut result);

        result.success = result.success && !result.steps.is_empty();
        result.finished_at = Utc::now();
        if result.success {
            self.progress.finish_with_message("Upgrade complete");
        } else {
            self.progress.finish_with_error("Upgrade did not complete");
        }
        Ok(result)
    }

    fn run_inner(&self, options: &MigrationOptions, result: &mut MigrationResult) {
        let current = match self.current_version(options) {
            Ok(v) => v,
            Err(e) => {
                result.issues.push(Issue::error(
                    IssueCategory::Version,
                    "unknown-current-version",
                    "Cannot determine current version",
                    e.to_string(),
                ));
                return;
            }
        };
        result.from = Some(current);
        let target = options.target;

        if target == current {
            result.issues.push(Issue::info(
                IssueCategory::Version,
                "already-at-target",
                "already at target version",
                format!("The project is already on {} {}", self.ctx.framework(), target),
            ));
            return;
        }
        if target < current {
            result.issues.push(Issue::error(
                IssueCategory::Version,
                "downgrade-unsupported",
                "Downgrades are not supported",
                format!("Target {} is behind the current version {}", target, current),
            ));
            return;
        }

        let chain = match self.graph.build_chain(current, target) {
            Ok(chain) => chain,
            Err(e) => {
                error!("{}", e);
                result.issues.push(Issue::error(
                    IssueCategory::Version,
                    "no-upgrade-path",
                    "No upgrade path",
                    e.to_string(),
                ));
                return;
            }
        };

        if !self.backup(options, result) {
            return;
        }

        let executor = StepExecutor::new(self.ctx, self.collaborators);
        let step_options = StepOptions {
            dry_run: options.dry_run,
            allow_manual_override: options.allow_manual_override,
        };
        self.progress.set_length(chain.len() as u64);
        let started = Instant::now();
        let mut timed_out = false;

        for (index, spec) in chain.iter().enumerate() {
            let step_number = index + 1;
            if let Some(limit) = options.run_timeout
                && started.elapsed() >= limit
            {
                warn!("Run timeout reached before step {}", step_number);
                result.issues.push(Issue::error(
                    IssueCategory::Run,
                    "run-timeout",
                    "Run timed out",
                    format!(
                        "Stopped after {} of {} step(s): the run exceeded {} seconds",
                        index,
                        chain.len(),
                        limit.as_secs()
                    ),
                ));
                timed_out = true;
                break;
            }

            self.progress.set_message(&format!(
                "Step {}/{}: {}",
                step_number,
                chain.len(),
                spec.label()
            ));
            let step = executor.execute(step_number, spec, &step_options);
            self.progress.increment(1);

            let failed = !step.success;
            if failed {
                self.report_failure(&step, result);
            }
            result.steps.push(step);

            if failed && step_number < chain.len() {
                let question = Question::new(
                    QuestionKind::ContinueAfterFailure,
                    format!("Step {} failed. Continue with the remaining steps?", step_number),
                    options.continue_on_error,
                );
                if !self.collaborators.decisions.decide(&question) {
                    info!(
                        "Stopping after step {}; {} step(s) not attempted",
                        step_number,
                        chain.len() - step_number
                    );
                    break;
                }
            }
        }

        result.summary = MigrationSummary::from_steps(&result.steps, chain.len());
        result.success = !timed_out
            && result.steps.len() == chain.len()
            && result.steps.iter().all(|s| s.success);
    }

    /// Snapshot the project; returns false when the run should stop
    fn backup(&self, options: &MigrationOptions, result: &mut MigrationResult) -> bool {
        if options.dry_run {
            return true;
        }
        if options.skip_backup {
            result.issues.push(Issue::warning(
                IssueCategory::Backup,
                "backup-skipped",
                "Backup skipped",
                "No backup was taken; rollback will not be possible",
            ));
            return true;
        }

        match self.collaborators.manifest.backup() {
            Ok(path) => {
                info!("Backup stored at {}", path.display());
                result.backup_path = Some(path);
                true
            }
            Err(e) => {
                warn!("Backup failed: {}", e);
                result.issues.push(Issue::warning(
                    IssueCategory::Backup,
                    "backup-failed",
                    "Backup failed; rollback unavailable",
                    format!("{}. The run continues without rollback capability.", e),
                ));
                let question = Question::new(
                    QuestionKind::ContinueWithoutBackup,
                    "Backup failed. Continue without a backup?",
                    true,
                );
                let proceed = self.collaborators.decisions.decide(&question);
                if !proceed {
                    result.issues.push(Issue::error(
                        IssueCategory::Run,
                        "aborted-without-backup",
                        "Run aborted",
                        "Stopped before any step because no backup could be taken",
                    ));
                }
                proceed
            }
        }
    }

    fn report_failure(&self, step: &StepResult, result: &mut MigrationResult) {
        let reason = step.error.as_deref().unwrap_or("unknown error");
        let backup = result
            .backup_path
            .as_ref()
            .map(|p| format!("Restore with: upstep restore {}", p.display()))
            .unwrap_or_else(|| "No backup is available.".to_string());
        error!("Step {} ({}) failed: {}", step.step_number, step.spec.label(), reason);

        result.issues.push(
            Issue::error(
                IssueCategory::Run,
                "step-failed",
                format!("Step {} ({}) failed", step.step_number, step.spec.label()),
                format!("{}. {}", reason, backup),
            )
            .with_step(step.step_number),
        );
    }

    /// Restore a backup taken by an earlier run
    pub fn restore(&self, backup: &Path) -> Result<()> {
        info!("Restoring {}", backup.display());
        self.collaborators.manifest.restore(backup)
    }
}
