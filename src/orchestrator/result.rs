// src/orchestrator/result.rs

//! Run report
//!
//! [`MigrationResult`] is the only output of a run. The CLI renders it or
//! prints it as JSON.

use crate::executor::StepResult;
use crate::issue::Issue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// A non-auto-fixable issue left for the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualStep {
    pub target_version: u64,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub total_steps: usize,
    pub completed: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub dependencies_updated: usize,
    pub files_modified: usize,
    pub auto_fixed: usize,
    pub manual_steps_required: Vec<ManualStep>,
}

impl MigrationSummary {
    /// Aggregate executed steps of a chain of `total_steps`
    pub fn from_steps(steps: &[StepResult], total_steps: usize) -> Self {
        let mut summary = Self {
            total_steps,
            not_attempted: total_steps.saturating_sub(steps.len()),
            ..Self::default()
        };

        for step in steps {
            if step.success {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
            summary.dependencies_updated += step.dependency_outcome.update_count();
            summary.files_modified += step.files_changed();

            for issue in &step.issues {
                if issue.auto_fixable {
                    summary.auto_fixed += 1;
                } else {
                    summary.manual_steps_required.push(ManualStep {
                        target_version: step.target_version(),
                        title: issue.title.clone(),
                        description: issue.description.clone(),
                    });
                }
            }
        }

        summary
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub run_id: String,
    /// Unknown when the current version could not be determined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    pub to: u64,
    pub steps: Vec<StepResult>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// Run-level issues; step issues stay on their steps
    pub issues: Vec<Issue>,
    pub summary: MigrationSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl MigrationResult {
    pub fn new(run_id: String, to: u64, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            from: None,
            to,
            steps: Vec::new(),
            success: false,
            backup_path: None,
            issues: Vec::new(),
            summary: MigrationSummary::default(),
            started_at: now,
            finished_at: now,
            dry_run,
        }
    }

    /// First step that failed
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success)
    }

    /// Run-level issues followed by every step's issues
    pub fn all_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .chain(self.steps.iter().flat_map(|s| s.issues.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RETRY_MARKER;
    use crate::graph::StepSpec;
    use crate::issue::IssueCategory;
    use std::path::PathBuf;

    fn step(to: u64, success: bool) -> StepResult {
        let spec = StepSpec {
            from: to - 1,
            to,
            dependencies: Vec::new(),
            breaking_changes: Vec::new(),
            pre_tasks: Vec::new(),
            post_tasks: Vec::new(),
            update_commands: Vec::new(),
        };
        let mut result = StepResult::new(1, &spec);
        result.success = success;
        result
    }

    #[test]
    fn test_summary_counts() {
        let mut first = step(18, true);
        first.dependency_outcome.updated =
            vec!["react@^18.3.1".to_string(), RETRY_MARKER.to_string()];
        first.transform_outcome = Some(crate::executor::TransformOutcome {
            files_changed: vec![PathBuf::from("src/index.jsx")],
            issues_found: 0,
        });
        first.issues.push(
            Issue::info(IssueCategory::BreakingChange, "new-root-api", "createRoot", "")
                .with_auto_fixable(true),
        );
        first.issues.push(Issue::warning(
            IssueCategory::BreakingChange,
            "automatic-batching",
            "Automatic batching",
            "Check flushSync usage",
        ));

        let second = step(19, false);
        let summary = MigrationSummary::from_steps(&[first, second], 3);

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.not_attempted, 1);
        assert_eq!(summary.dependencies_updated, 1);
        assert_eq!(summary.files_modified, 1);
        assert_eq!(summary.auto_fixed, 1);
        assert_eq!(summary.manual_steps_required.len(), 1);
        assert_eq!(summary.manual_steps_required[0].target_version, 18);
    }

    #[test]
    fn test_info_issue_needing_a_human_is_a_manual_step() {
        let mut only = step(18, true);
        only.issues.push(Issue::info(
            IssueCategory::Transform,
            "review-legacy-context",
            "Legacy context API",
            "src/Theme.jsx still uses contextTypes",
        ));

        let summary = MigrationSummary::from_steps(&[only], 1);
        assert_eq!(summary.auto_fixed, 0);
        assert_eq!(summary.manual_steps_required.len(), 1);
        assert_eq!(summary.manual_steps_required[0].title, "Legacy context API");
    }

    #[test]
    fn test_result_serializes() {
        let result = MigrationResult::new("run-1".to_string(), 19, true);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["runId"], "run-1");
        assert_eq!(json["dryRun"], true);
        assert!(json.get("backupPath").is_none());
    }
}
