// src/issue.rs

//! Issues surfaced to the operator during a run
//!
//! Anything that does not halt forward progress ends up here: task failures,
//! skipped registry lookups, unverified installs, breaking changes that need a
//! human, and so on.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// How serious an issue is
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Which part of the run produced the issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum IssueCategory {
    Version,
    Conflict,
    Registry,
    Dependency,
    Install,
    Transform,
    Task,
    BreakingChange,
    Backup,
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub severity: Severity,
    pub category: IssueCategory,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub auto_fixable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<usize>,
}

impl Issue {
    pub fn new(
        severity: Severity,
        category: IssueCategory,
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            category,
            title: title.into(),
            description: description.into(),
            auto_fixable: false,
            step_number: None,
        }
    }

    pub fn error(
        category: IssueCategory,
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Error, category, id, title, description)
    }

    pub fn warning(
        category: IssueCategory,
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, category, id, title, description)
    }

    pub fn info(
        category: IssueCategory,
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Info, category, id, title, description)
    }

    /// Attach the step this issue belongs to
    pub fn with_step(mut self, step_number: usize) -> Self {
        self.step_number = Some(step_number);
        self
    }

    pub fn with_auto_fixable(mut self, auto_fixable: bool) -> Self {
        self.auto_fixable = auto_fixable;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
