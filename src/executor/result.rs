// src/executor/result.rs

//! Step results

use crate::error::Error;
use crate::graph::StepSpec;
use crate::issue::Issue;
use crate::resolver::{ConflictRecord, SkippedLookup};
use semver::Version;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use strum_macros::Display;

/// Entry added to `DependencyOutcome::updated` when an install needed a clean retry
pub const RETRY_MARKER: &str = "clean-install-retry";

/// Step state machine
///
/// `Pending -> PreTasks -> DependencyResolution -> Install -> Transform ->
/// PostTasks -> Done`, with `Failed` reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StepPhase {
    Pending,
    PreTasks,
    DependencyResolution,
    Install,
    Transform,
    PostTasks,
    Done,
    Failed,
}

impl StepPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyOutcome {
    /// Manifest changes made (`name@range`), plus the retry marker if any
    pub updated: Vec<String>,
    pub overrides: BTreeMap<String, Version>,
    pub conflicts: Vec<ConflictRecord>,
    pub retried: bool,
    pub skipped: Vec<SkippedLookup>,
}

impl DependencyOutcome {
    /// Number of dependency changes, not counting the retry marker
    pub fn update_count(&self) -> usize {
        self.updated.iter().filter(|u| *u != RETRY_MARKER).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutcome {
    pub files_changed: Vec<PathBuf>,
    pub issues_found: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_number: usize,
    pub spec: StepSpec,
    pub dependency_outcome: DependencyOutcome,
    /// Present when the transformation engine produced a report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_outcome: Option<TransformOutcome>,
    pub issues: Vec<Issue>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Phases visited, in order
    pub phases: Vec<StepPhase>,
}

impl StepResult {
    pub fn new(step_number: usize, spec: &StepSpec) -> Self {
        Self {
            step_number,
            spec: spec.clone(),
            dependency_outcome: DependencyOutcome::default(),
            transform_outcome: None,
            issues: Vec::new(),
            success: false,
            error: None,
            duration_ms: 0,
            phases: vec![StepPhase::Pending],
        }
    }

    pub fn enter(&mut self, phase: StepPhase) {
        self.phases.push(phase);
    }

    pub fn phase(&self) -> StepPhase {
        self.phases.last().copied().unwrap_or(StepPhase::Pending)
    }

    pub fn complete(&mut self) {
        self.enter(StepPhase::Done);
        self.success = true;
    }

    pub fn fail(&mut self, error: &Error) {
        self.enter(StepPhase::Failed);
        self.success = false;
        self.error = Some(error.to_string());
    }

    pub fn files_changed(&self) -> usize {
        self.transform_outcome
            .as_ref()
            .map(|t| t.files_changed.len())
            .unwrap_or(0)
    }

    /// Target version of the step
    pub fn target_version(&self) -> u64 {
        self.spec.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> StepSpec {
        StepSpec {
            from: 17,
            to: 18,
            dependencies: Vec::new(),
            breaking_changes: Vec::new(),
            pre_tasks: Vec::new(),
            post_tasks: Vec::new(),
            update_commands: Vec::new(),
        }
    }

    #[test]
    fn test_phase_tracking() {
        let mut result = StepResult::new(1, &spec());
        assert_eq!(result.phase(), StepPhase::Pending);
        result.enter(StepPhase::PreTasks);
        result.fail(&Error::InstallFailure("ERESOLVE".to_string()));

        assert_eq!(result.phase(), StepPhase::Failed);
        assert!(result.phase().is_terminal());
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("ERESOLVE"));
    }

    #[test]
    fn test_update_count_skips_retry_marker() {
        let outcome = DependencyOutcome {
            updated: vec!["react@^18.3.1".to_string(), RETRY_MARKER.to_string()],
            ..Default::default()
        };
        assert_eq!(outcome.update_count(), 1);
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut result = StepResult::new(2, &spec());
        result.complete();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stepNumber"], 2);
        assert_eq!(json["phases"][1], "done");
        assert!(json.get("error").is_none());
    }
}
