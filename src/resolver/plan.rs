// src/resolver/plan.rs

//! Resolution plan
//!
//! The plan is derived from a complete set of conflict records; it is never
//! built from partial lookup data.

use super::conflict::{ConflictRecord, SkippedLookup, Strategy};
use crate::issue::{Issue, IssueCategory};
use semver::Version;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionPlan {
    pub conflicts: Vec<ConflictRecord>,
    /// Declared ranges to move (upgrades and downgrades)
    pub dependency_updates: BTreeMap<String, Version>,
    /// Versions to force through the override block
    pub overrides: BTreeMap<String, Version>,
    pub can_auto_resolve: bool,
    /// Reasoning of every manual conflict
    pub manual_steps: Vec<String>,
    pub skipped: Vec<SkippedLookup>,
}

impl ResolutionPlan {
    /// Build a plan from analysed conflicts
    pub fn from_conflicts(conflicts: Vec<ConflictRecord>, skipped: Vec<SkippedLookup>) -> Self {
        let mut dependency_updates = BTreeMap::new();
        let mut overrides = BTreeMap::new();
        let mut manual_steps = Vec::new();

        for conflict in &conflicts {
            match (conflict.strategy, &conflict.recommended_version) {
                (Strategy::Upgrade | Strategy::Downgrade, Some(version)) => {
                    dependency_updates.insert(conflict.package.clone(), version.clone());
                }
                (Strategy::Override, Some(version)) => {
                    overrides.insert(conflict.package.clone(), version.clone());
                }
                _ => manual_steps.push(conflict.reasoning.clone()),
            }
        }

        Self {
            can_auto_resolve: manual_steps.is_empty(),
            conflicts,
            dependency_updates,
            overrides,
            manual_steps,
            skipped,
        }
    }

    /// Nothing to change
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn manual_conflicts(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.conflicts.iter().filter(|c| c.is_manual())
    }

    /// One warning per skipped registry lookup
    pub fn skipped_issues(&self) -> Vec<Issue> {
        self.skipped
            .iter()
            .map(|s| {
                Issue::warning(
                    IssueCategory::Registry,
                    format!("registry-lookup-{}", s.package),
                    format!("Could not look up {}", s.package),
                    format!(
                        "Conflict analysis skipped {}: {}. Conflicts involving it may go unreported.",
                        s.package, s.reason
                    ),
                )
            })
            .collect()
    }

    /// One issue per conflict needing manual work
    pub fn manual_issues(&self, continuing: bool) -> Vec<Issue> {
        self.manual_conflicts()
            .map(|c| {
                let title = format!("Unresolvable peer conflict on {}", c.package);
                let id = format!("conflict-{}", c.package);
                if continuing {
                    Issue::warning(IssueCategory::Conflict, id, title, c.reasoning.clone())
                } else {
                    Issue::error(IssueCategory::Conflict, id, title, c.reasoning.clone())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionRange;

    fn record(package: &str, strategy: Strategy, version: Option<&str>) -> ConflictRecord {
        ConflictRecord {
            package: package.to_string(),
            required_by: vec!["react-dom".to_string()],
            installed_version: None,
            declared_range: None,
            primary_ranges: vec![VersionRange::parse("^19.0.0").unwrap()],
            competing: Vec::new(),
            strategy,
            recommended_version: version.map(|v| Version::parse(v).unwrap()),
            reasoning: format!("{} needs attention", package),
        }
    }

    #[test]
    fn test_plan_buckets_strategies() {
        let plan = ResolutionPlan::from_conflicts(
            vec![
                record("react", Strategy::Upgrade, Some("19.0.0")),
                record("scheduler", Strategy::Downgrade, Some("0.23.0")),
                record("react-is", Strategy::Override, Some("19.0.0")),
            ],
            Vec::new(),
        );

        assert!(plan.can_auto_resolve);
        assert_eq!(plan.dependency_updates.len(), 2);
        assert_eq!(plan.overrides.len(), 1);
        assert!(plan.manual_steps.is_empty());
    }

    #[test]
    fn test_manual_conflict_blocks_auto_resolve() {
        let plan = ResolutionPlan::from_conflicts(
            vec![record("react", Strategy::Manual, None)],
            vec![SkippedLookup {
                package: "left-pad".to_string(),
                reason: "registry unavailable".to_string(),
            }],
        );

        assert!(!plan.can_auto_resolve);
        assert_eq!(plan.manual_steps, vec!["react needs attention".to_string()]);
        assert!(plan.manual_issues(false)[0].is_error());
        assert!(!plan.manual_issues(true)[0].is_error());
        assert_eq!(plan.skipped_issues().len(), 1);
    }
}
