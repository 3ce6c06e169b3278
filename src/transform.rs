// src/transform.rs

//! Source transformation adapters
//!
//! Codemods themselves live outside this crate. A step only needs to know
//! which files an engine touched and which issues it found.
//!
//! [`CommandTransforms`] runs a configured command template and expects a
//! JSON report on stdout:
//!
//! ```json
//! {
//!   "filesChanged": ["src/App.jsx"],
//!   "issues": [
//!     { "id": "legacy-context", "severity": "warning", "category": "transform",
//!       "title": "Legacy context", "description": "src/Old.jsx uses contextTypes" }
//!   ]
//! }
//! ```

use crate::context::ProjectContext;
use crate::error::{Error, Result};
use crate::issue::Issue;
use crate::process::run_with_timeout;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What an engine did for one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformReport {
    #[serde(default)]
    pub files_changed: Vec<PathBuf>,
    #[serde(default, alias = "issues")]
    pub issues_found: Vec<Issue>,
}

/// Applies source-level changes for a version step
pub trait TransformationEngine: Send + Sync {
    fn apply_transforms(&self, from: u64, to: u64, dry_run: bool) -> Result<TransformReport>;
}

/// Engine used when no codemods are configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransforms;

impl TransformationEngine for NullTransforms {
    fn apply_transforms(&self, from: u64, to: u64, _dry_run: bool) -> Result<TransformReport> {
        debug!("No transform engine configured for {} -> {}", from, to);
        Ok(TransformReport::default())
    }
}

/// Runs an external codemod command
///
/// `{from}`, `{to}` and `{dry_run}` in the template are substituted before the
/// command line is handed to `sh -c`.
pub struct CommandTransforms {
    template: String,
    root: PathBuf,
    timeout: Duration,
}

impl CommandTransforms {
    pub fn new(template: impl Into<String>, ctx: &ProjectContext) -> Self {
        Self {
            template: template.into(),
            root: ctx.root.clone(),
            timeout: ctx.config.task_timeout(),
        }
    }

    /// Command line for one invocation
    pub fn command_line(&self, from: u64, to: u64, dry_run: bool) -> String {
        self.template
            .replace("{from}", &from.to_string())
            .replace("{to}", &to.to_string())
            .replace("{dry_run}", if dry_run { "--dry-run" } else { "" })
            .trim()
            .to_string()
    }
}

impl TransformationEngine for CommandTransforms {
    fn apply_transforms(&self, from: u64, to: u64, dry_run: bool) -> Result<TransformReport> {
        let command = self.command_line(from, to, dry_run);
        info!("Running transforms for {} -> {}: {}", from, to, command);

        let args = vec!["-c".to_string(), command.clone()];
        let output = run_with_timeout(&PathBuf::from("sh"), &args, &self.root, &[], self.timeout)?;

        for line in output.stderr.lines() {
            warn!("[transform] {}", line);
        }
        if output.timed_out() {
            return Err(Error::TransformError(format!(
                "'{}' timed out after {} seconds",
                command,
                self.timeout.as_secs()
            )));
        }
        if !output.success() {
            return Err(Error::TransformError(format!(
                "'{}' failed with exit code {}",
                command,
                output.code()
            )));
        }

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(TransformReport::default());
        }
        serde_json::from_str(stdout)
            .map_err(|e| Error::TransformError(format!("invalid report from '{}': {}", command, e)))
    }
}
