// src/executor/mod.rs

//! Step execution
//!
//! Runs one [`StepSpec`] through its phases:
//!
//! ```text
//! Pending -> PreTasks -> DependencyResolution -> Install -> Transform -> PostTasks -> Done
//!                                                                         (Failed from any)
//! ```
//!
//! Only three things fail a step: unresolved manual conflicts, an install
//! that still fails after its one clean retry, and a manifest that cannot be
//! read or written. Everything else becomes an issue on the step result.
//!
//! The executor keeps no state between calls, so running a failed step again
//! once its cause is fixed simply produces a new result for the same step
//! number.

mod result;

pub use result::{DependencyOutcome, StepPhase, StepResult, TransformOutcome, RETRY_MARKER};

use crate::context::ProjectContext;
use crate::decision::{DecisionProvider, Question, QuestionKind};
use crate::error::{Error, Result};
use crate::graph::{Impact, StepSpec, Task};
use crate::installer::Installer;
use crate::issue::{Issue, IssueCategory};
use crate::manifest::{DependencySet, ManifestEdit, ManifestEditor};
use crate::registry::RegistryClient;
use crate::resolver::{plan_edits, ConflictResolver, ResolutionPlan};
use crate::tasks::{TaskPhase, TaskRunner};
use crate::transform::TransformationEngine;
use crate::version::VersionRange;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything outside this crate a step talks to
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub registry: &'a dyn RegistryClient,
    pub manifest: &'a dyn ManifestEditor,
    pub installer: &'a dyn Installer,
    pub transforms: &'a dyn TransformationEngine,
    pub decisions: &'a dyn DecisionProvider,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StepOptions {
    /// Analyse and transform without writing the manifest or installing
    pub dry_run: bool,
    /// Install even when some conflicts need manual work
    pub allow_manual_override: bool,
}

pub struct StepExecutor<'a> {
    ctx: &'a ProjectContext,
    collaborators: Collaborators<'a>,
}

impl<'a> StepExecutor<'a> {
    pub fn new(ctx: &'a ProjectContext, collaborators: Collaborators<'a>) -> Self {
        Self { ctx, collaborators }
    }

    /// Execute one step; never panics on collaborator failure
    pub fn execute(&self, step_number: usize, spec: &StepSpec, options: &StepOptions) -> StepResult {
        let started = Instant::now();
        let mut result = StepResult::new(step_number, spec);
        info!("Step {}: {}{}", step_number, spec.label(), if options.dry_run { " (dry run)" } else { "" });

        match self.run_phases(spec, options, &mut result) {
            Ok(()) => result.complete(),
            Err(e) => {
                warn!("Step {} ({}) failed: {}", step_number, spec.label(), e);
                result.fail(&e);
            }
        }

        surface_breaking_changes(spec, &mut result);

        for issue in &mut result.issues {
            issue.step_number.get_or_insert(step_number);
        }
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    fn run_phases(&self, spec: &StepSpec, options: &StepOptions, result: &mut StepResult) -> Result<()> {
        let runner = TaskRunner::new(self.ctx);

        result.enter(StepPhase::PreTasks);
        self.run_tasks(&runner, &spec.pre_tasks, spec, TaskPhase::Pre, options, result);

        result.enter(StepPhase::DependencyResolution);
        let resolver = ConflictResolver::new(self.ctx, self.collaborators.registry);
        let plan = resolver.analyze(&spec.dependencies, self.collaborators.manifest)?;
        result.issues.extend(plan.skipped_issues());
        result.dependency_outcome.conflicts = plan.conflicts.clone();
        result.dependency_outcome.skipped = plan.skipped.clone();
        self.check_manual_conflicts(&plan, options, result)?;

        result.enter(StepPhase::Install);
        self.install(&resolver, &plan, spec, options, &runner, result)?;

        result.enter(StepPhase::Transform);
        self.transform(spec, options, result);

        result.enter(StepPhase::PostTasks);
        self.run_tasks(&runner, &spec.post_tasks, spec, TaskPhase::Post, options, result);

        Ok(())
    }

    fn run_tasks(
        &self,
        runner: &TaskRunner<'_>,
        tasks: &[Task],
        spec: &StepSpec,
        phase: TaskPhase,
        options: &StepOptions,
        result: &mut StepResult,
    ) {
        if options.dry_run {
            if !tasks.is_empty() {
                debug!("Dry run: skipping {} {} task(s)", tasks.len(), phase);
            }
            return;
        }

        for task in tasks {
            if let Err(e) = runner.run(task, spec, phase) {
                warn!("{}", e);
                result.issues.push(Issue::warning(
                    IssueCategory::Task,
                    format!("{}-task-{}", phase, task.name),
                    format!("Task '{}' failed", task.name),
                    e.to_string(),
                ));
            }
        }
    }

    fn check_manual_conflicts(
        &self,
        plan: &ResolutionPlan,
        options: &StepOptions,
        result: &mut StepResult,
    ) -> Result<()> {
        if plan.can_auto_resolve {
            return Ok(());
        }

        let packages: Vec<&str> = plan.manual_conflicts().map(|c| c.package.as_str()).collect();
        let question = Question::new(
            QuestionKind::ProceedWithManualConflicts,
            format!(
                "Conflicts on {} need manual work. Install anyway?",
                packages.join(", ")
            ),
            options.allow_manual_override,
        );
        let proceed = self.collaborators.decisions.decide(&question);
        result.issues.extend(plan.manual_issues(proceed));

        if proceed {
            warn!("Continuing past {} manual conflict(s)", packages.len());
            return Ok(());
        }
        Err(Error::ConflictUnresolved(plan.manual_steps.join("; ")))
    }

    fn install(
        &self,
        resolver: &ConflictResolver<'_>,
        plan: &ResolutionPlan,
        spec: &StepSpec,
        options: &StepOptions,
        runner: &TaskRunner<'_>,
        result: &mut StepResult,
    ) -> Result<()> {
        let manifest = self.collaborators.manifest;
        let deps = manifest.read_dependencies()?;
        let edits: Vec<ManifestEdit> = spec
            .dependencies
            .iter()
            .map(|req| {
                let dev = deps.declared(&req.name).map(|d| d.dev).unwrap_or(req.dev);
                ManifestEdit::new(req.name.clone(), req.range.to_string(), dev)
            })
            .collect();

        let outcome = &mut result.dependency_outcome;
        outcome.overrides = plan.overrides.clone();

        if options.dry_run {
            outcome.updated = edits
                .iter()
                .chain(plan_edits(plan, &deps).iter())
                .map(ManifestEdit::describe)
                .collect();
            info!("Dry run: {} manifest change(s) planned, nothing written", outcome.updated.len());
            return Ok(());
        }

        manifest.write_dependencies(&edits)?;
        outcome.updated = edits.iter().map(ManifestEdit::describe).collect();
        for applied in resolver.apply_plan(plan, manifest)? {
            if !applied.starts_with("override ") && !outcome.updated.contains(&applied) {
                outcome.updated.push(applied);
            }
        }

        let installer = self.collaborators.installer;
        match installer.install() {
            Ok(()) => {}
            Err(e) if e.is_resolution() => {
                warn!("Install failed with a resolution error, purging and retrying once: {}", e);
                installer
                    .purge()
                    .map_err(|pe| Error::InstallFailure(format!("{} (purge failed: {})", e, pe)))?;
                outcome.retried = true;
                outcome.updated.push(RETRY_MARKER.to_string());
                installer
                    .install()
                    .map_err(|e| Error::InstallFailure(format!("{} after clean retry", e)))?;
                info!("Install succeeded after clean retry");
            }
            Err(e) => return Err(Error::InstallFailure(e.to_string())),
        }

        self.verify_installed(spec, plan, &deps, result);

        for command in &spec.update_commands {
            if let Err(e) = runner.run_command(command, spec, TaskPhase::Post) {
                warn!("{}", e);
                result.issues.push(Issue::warning(
                    IssueCategory::Dependency,
                    "update-command",
                    format!("Update command '{}' failed", command),
                    e.to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Check every required package is installed at an acceptable version
    fn verify_installed(
        &self,
        spec: &StepSpec,
        plan: &ResolutionPlan,
        deps: &DependencySet,
        result: &mut StepResult,
    ) {
        let mut expected: BTreeMap<String, VersionRange> = spec
            .dependencies
            .iter()
            .map(|req| (req.name.clone(), req.range.clone()))
            .collect();
        for edit in plan_edits(plan, deps) {
            if let Ok(range) = VersionRange::parse(&edit.range) {
                expected.insert(edit.name, range);
            }
        }
        for (name, version) in &plan.overrides {
            expected.insert(name.clone(), VersionRange::exact(version));
        }

        for (name, range) in expected {
            match self.collaborators.manifest.installed_version(&name) {
                Some(version) if range.satisfies(&version) => {
                    debug!("Verified {}@{} satisfies {}", name, version, range);
                }
                Some(version) => result.issues.push(Issue::error(
                    IssueCategory::Install,
                    format!("version-mismatch-{}", name),
                    format!("{} installed at wrong version", name),
                    format!("{}@{} is installed but {} is required", name, version, range),
                )),
                None => result.issues.push(Issue::error(
                    IssueCategory::Install,
                    format!("missing-{}", name),
                    format!("{} is not installed", name),
                    format!(
                        "The install reported success but {} ({}) is missing from node_modules",
                        name, range
                    ),
                )),
            }
        }
    }

    fn transform(&self, spec: &StepSpec, options: &StepOptions, result: &mut StepResult) {
        match self
            .collaborators
            .transforms
            .apply_transforms(spec.from, spec.to, options.dry_run)
        {
            Ok(report) => {
                info!(
                    "Transforms changed {} file(s), found {} issue(s)",
                    report.files_changed.len(),
                    report.issues_found.len()
                );
                result.transform_outcome = Some(TransformOutcome {
                    files_changed: report.files_changed,
                    issues_found: report.issues_found.len(),
                });
                result.issues.extend(report.issues_found);
            }
            Err(e) => {
                warn!("Transforms for {} failed: {}", spec.label(), e);
                result.issues.push(Issue::error(
                    IssueCategory::Transform,
                    "transform-failed",
                    format!("Transforms for {} failed", spec.label()),
                    e.to_string(),
                ));
            }
        }
    }
}

/// Report the step's breaking changes
///
/// Changes needing a human are always reported. Auto-fixable ones are
/// reported as fixed only when the transformation engine actually ran.
fn surface_breaking_changes(spec: &StepSpec, result: &mut StepResult) {
    let transformed = result.transform_outcome.is_some();

    for change in &spec.breaking_changes {
        if change.auto_fixable {
            if transformed {
                result.issues.push(
                    Issue::info(
                        IssueCategory::BreakingChange,
                        change.id.clone(),
                        change.title.clone(),
                        change.description.clone(),
                    )
                    .with_auto_fixable(true),
                );
            }
            continue;
        }

        let mut description = change.description.clone();
        if !change.manual_steps.is_empty() {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(&format!("Manual steps: {}", change.manual_steps.join("; ")));
        }

        let issue = match change.impact {
            Impact::High => Issue::error(
                IssueCategory::BreakingChange,
                change.id.clone(),
                change.title.clone(),
                description,
            ),
            Impact::Medium | Impact::Low => Issue::warning(
                IssueCategory::BreakingChange,
                change.id.clone(),
                change.title.clone(),
                description,
            ),
        };
        result.issues.push(issue);
    }
}
