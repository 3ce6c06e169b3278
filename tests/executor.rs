// tests/executor.rs

//! Single-step execution: install retry policy, verification and the
//! non-fatal phases

mod common;

use common::{
    react17_manifest, react_graph, react_registry, test_config, FakeInstaller, FakeTransforms,
    Project, ScriptedDecisions,
};
use upstep::executor::RETRY_MARKER;
use upstep::{
    Collaborators, DefaultDecisions, InstallError, InstallErrorKind, IssueCategory, QuestionKind,
    Severity, StepExecutor, StepOptions, StepPhase, VersionGraph,
};

fn resolution_error() -> InstallError {
    InstallError::new(
        InstallErrorKind::Resolution,
        "npm ERR! code ERESOLVE\nnpm ERR! Could not resolve dependency",
    )
}

#[test]
fn test_second_resolution_failure_is_terminal() {
    let project = Project::new(react17_manifest(&[]));
    let registry = react_registry();
    let manifest = project.editor();
    let installer = FakeInstaller::new(&project, registry.clone())
        .scripted(vec![Err(resolution_error()), Err(resolution_error())]);
    let transforms = FakeTransforms::default();
    let graph = react_graph();

    let executor = StepExecutor::new(
        &project.ctx,
        Collaborators {
            registry: &registry,
            manifest: &manifest,
            installer: &installer,
            transforms: &transforms,
            decisions: &DefaultDecisions,
        },
    );
    let result = executor.execute(1, graph.get(17, 18).unwrap(), &StepOptions::default());

    assert!(!result.success);
    assert_eq!(result.phase(), StepPhase::Failed);
    assert!(result.error.as_deref().unwrap().contains("after clean retry"));
    assert_eq!(installer.installs(), 2);
    assert_eq!(installer.purges(), 1);
    assert!(result.dependency_outcome.retried);
    assert!(result
        .dependency_outcome
        .updated
        .iter()
        .any(|u| u == RETRY_MARKER));
    assert!(transforms.calls().is_empty());
}

#[test]
fn test_network_failure_is_not_retried() {
    let project = Project::new(react17_manifest(&[]));
    let registry = react_registry();
    let manifest = project.editor();
    let installer = FakeInstaller::new(&project, registry.clone()).scripted(vec![Err(
        InstallError::new(InstallErrorKind::Network, "ETIMEDOUT registry.npmjs.org"),
    )]);
    let transforms = FakeTransforms::default();
    let graph = react_graph();

    let executor = StepExecutor::new(
        &project.ctx,
        Collaborators {
            registry: &registry,
            manifest: &manifest,
            installer: &installer,
            transforms: &transforms,
            decisions: &DefaultDecisions,
        },
    );
    let result = executor.execute(1, graph.get(17, 18).unwrap(), &StepOptions::default());

    assert!(!result.success);
    assert_eq!(installer.installs(), 1);
    assert_eq!(installer.purges(), 0);
    assert!(!result.dependency_outcome.retried);
}

#[test]
fn test_rerun_after_failure_reuses_step_number() {
    let project = Project::new(react17_manifest(&[]));
    let registry = react_registry();
    let manifest = project.editor();
    let installer = FakeInstaller::new(&project, registry.clone()).scripted(vec![Err(
        InstallError::new(InstallErrorKind::Disk, "ENOSPC: no space left on device"),
    )]);
    let transforms = FakeTransforms::default();
    let graph = react_graph();
    let spec = graph.get(17, 18).unwrap();

    let executor = StepExecutor::new(
        &project.ctx,
        Collaborators {
            registry: &registry,
            manifest: &manifest,
            installer: &installer,
            transforms: &transforms,
            decisions: &DefaultDecisions,
        },
    );
    let first = executor.execute(3, spec, &StepOptions::default());
    let second = executor.execute(3, spec, &StepOptions::default());

    assert!(!first.success);
    assert!(second.success, "{:?}", second.issues);
    assert_eq!(first.step_number, 3);
    assert_eq!(second.step_number, 3);
    assert_eq!(
        second.phases,
        vec![
            StepPhase::Pending,
            StepPhase::PreTasks,
            StepPhase::DependencyResolution,
            StepPhase::Install,
            StepPhase::Transform,
            StepPhase::PostTasks,
            StepPhase::Done,
        ]
    );
}

#[test]
fn test_failed_task_is_a_warning() {
    let project = Project::new(react17_manifest(&[]));
    let registry = react_registry();
    let manifest = project.editor();
    let installer = FakeInstaller::new(&project, registry.clone());
    let transforms = FakeTransforms::default();
    let graph = VersionGraph::from_toml_str(
        r#"
[[step]]
from = 17
to = 18

[[step.dependencies]]
name = "react"
range = "^18.2.0"

[[step.pre_tasks]]
name = "lint"
command = "exit 3"

[[step.post_tasks]]
name = "marker"
command = "touch post-ran"
"#,
    )
    .unwrap();

    let executor = StepExecutor::new(
        &project.ctx,
        Collaborators {
            registry: &registry,
            manifest: &manifest,
            installer: &installer,
            transforms: &transforms,
            decisions: &DefaultDecisions,
        },
    );
    let result = executor.execute(1, graph.get(17, 18).unwrap(), &StepOptions::default());

    assert!(result.success);
    let task = result
        .issues
        .iter()
        .find(|i| i.category == IssueCategory::Task)
        .unwrap();
    assert_eq!(task.severity, Severity::Warning);
    assert!(task.title.contains("lint"));
    assert!(project.root().join("post-ran").exists());
}

#[test]
fn test_verification_reports_wrong_installed_version() {
    let project = Project::new(react17_manifest(&[]));
    let registry = react_registry();
    let manifest = project.editor();
    // The package manager "succeeds" but leaves react 17 in place
    let installer = FakeInstaller::new(&project, registry.clone()).pinned("react", "17.0.2");
    let transforms = FakeTransforms::default();
    let graph = react_graph();

    let executor = StepExecutor::new(
        &project.ctx,
        Collaborators {
            registry: &registry,
            manifest: &manifest,
            installer: &installer,
            transforms: &transforms,
            decisions: &DefaultDecisions,
        },
    );
    let result = executor.execute(1, graph.get(17, 18).unwrap(), &StepOptions::default());

    assert!(result.success);
    let mismatch = result
        .issues
        .iter()
        .find(|i| i.category == IssueCategory::Install)
        .unwrap();
    assert_eq!(mismatch.severity, Severity::Error);
    assert_eq!(mismatch.id, "version-mismatch-react");
}

#[test]
fn test_transform_failure_is_an_issue() {
    let project = Project::new(react17_manifest(&[]));
    let registry = react_registry();
    let manifest = project.editor();
    let installer = FakeInstaller::new(&project, registry.clone());
    let transforms = FakeTransforms::failing();
    let graph = react_graph();

    let executor = StepExecutor::new(
        &project.ctx,
        Collaborators {
            registry: &registry,
            manifest: &manifest,
            installer: &installer,
            transforms: &transforms,
            decisions: &DefaultDecisions,
        },
    );
    let result = executor.execute(1, graph.get(17, 18).unwrap(), &StepOptions::default());

    assert!(result.success);
    assert!(result.transform_outcome.is_none());
    assert!(result
        .issues
        .iter()
        .any(|i| i.category == IssueCategory::Transform && i.severity == Severity::Error));
    // Auto-fixable changes are not claimed as fixed when no transform ran
    assert!(!result.issues.iter().any(|i| i.auto_fixable));
    assert!(result.issues.iter().any(|i| i.id == "automatic-batching"));
}

#[test]
fn test_manual_conflict_can_be_overridden() {
    let mut config = test_config();
    config.allow_overrides = false;
    let project = Project::with_config(
        react17_manifest(&[("legacy-widget", "^1.0.0")]),
        config,
    );
    let registry = react_registry();
    let manifest = project.editor();
    let installer = FakeInstaller::new(&project, registry.clone());
    let transforms = FakeTransforms::default();
    let decisions =
        ScriptedDecisions::default().answer(QuestionKind::ProceedWithManualConflicts, true);
    let graph = react_graph();

    let executor = StepExecutor::new(
        &project.ctx,
        Collaborators {
            registry: &registry,
            manifest: &manifest,
            installer: &installer,
            transforms: &transforms,
            decisions: &decisions,
        },
    );
    let result = executor.execute(1, graph.get(17, 18).unwrap(), &StepOptions::default());

    assert!(result.success);
    assert_eq!(installer.installs(), 1);
    let conflict = result
        .issues
        .iter()
        .find(|i| i.category == IssueCategory::Conflict)
        .unwrap();
    assert_eq!(conflict.severity, Severity::Warning);
    assert_eq!(decisions.asked(), vec![QuestionKind::ProceedWithManualConflicts]);
}

#[test]
fn test_transform_issues_and_breaking_changes_are_reported() {
    let project = Project::new(react17_manifest(&[]));
    let registry = react_registry();
    let manifest = project.editor();
    let installer = FakeInstaller::new(&project, registry.clone());
    let transforms = FakeTransforms::changing(&["src/App.jsx"]).reporting(upstep::Issue::warning(
        IssueCategory::Transform,
        "string-refs",
        "String refs",
        "src/App.jsx uses a string ref",
    ));
    let graph = react_graph();

    let executor = StepExecutor::new(
        &project.ctx,
        Collaborators {
            registry: &registry,
            manifest: &manifest,
            installer: &installer,
            transforms: &transforms,
            decisions: &DefaultDecisions,
        },
    );
    let result = executor.execute(2, graph.get(17, 18).unwrap(), &StepOptions::default());

    let outcome = result.transform_outcome.as_ref().unwrap();
    assert_eq!(outcome.issues_found, 1);
    assert_eq!(result.files_changed(), 1);

    let fixed = result.issues.iter().find(|i| i.id == "create-root").unwrap();
    assert!(fixed.auto_fixable);
    assert_eq!(fixed.severity, Severity::Info);

    let manual = result.issues.iter().find(|i| i.id == "automatic-batching").unwrap();
    assert!(!manual.auto_fixable);
    assert!(manual.description.contains("flushSync"));
    assert!(result.issues.iter().all(|i| i.step_number == Some(2)));
}
