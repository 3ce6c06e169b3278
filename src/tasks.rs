// src/tasks.rs

//! Pre- and post-step shell tasks
//!
//! Tasks are advisory (formatting, type checks, cache warms). They run through
//! `sh -c` in the project root with the step's versions in the environment:
//!
//! - `UPSTEP_FROM` / `UPSTEP_TO`: step versions
//! - `UPSTEP_PHASE`: `pre` or `post`
//!
//! A failing task is reported as [`Error::TaskFailure`]; the caller turns it
//! into a warning and carries on.

use crate::context::ProjectContext;
use crate::error::{Error, Result};
use crate::graph::{StepSpec, Task};
use crate::process::run_with_timeout;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum_macros::Display;
use tracing::{info, warn};

/// When a task runs relative to the step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TaskPhase {
    Pre,
    Post,
}

pub struct TaskRunner<'a> {
    ctx: &'a ProjectContext,
    timeout: Duration,
}

impl<'a> TaskRunner<'a> {
    pub fn new(ctx: &'a ProjectContext) -> Self {
        Self {
            ctx,
            timeout: ctx.config.task_timeout(),
        }
    }

    /// Run one task; output is logged line by line
    pub fn run(&self, task: &Task, step: &StepSpec, phase: TaskPhase) -> Result<()> {
        let command = self.ctx.expand_command(&task.command);
        let timeout = task
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.timeout);

        info!("Running {} task '{}': {}", phase, task.name, command);
        self.run_shell(&command, step, phase, timeout)
            .map_err(|e| match e {
                Error::TaskFailure(reason) => {
                    Error::TaskFailure(format!("{} task '{}' {}", phase, task.name, reason))
                }
                other => Error::TaskFailure(format!("{} task '{}': {}", phase, task.name, other)),
            })
    }

    /// Run an arbitrary command line (used for step update commands)
    pub fn run_command(&self, command: &str, step: &StepSpec, phase: TaskPhase) -> Result<()> {
        let command = self.ctx.expand_command(command);
        info!("Running update command: {}", command);
        self.run_shell(&command, step, phase, self.timeout)
            .map_err(|e| match e {
                Error::TaskFailure(reason) => {
                    Error::TaskFailure(format!("'{}' {}", command, reason))
                }
                other => Error::TaskFailure(format!("'{}': {}", command, other)),
            })
    }

    fn run_shell(&self, command: &str, step: &StepSpec, phase: TaskPhase, timeout: Duration) -> Result<()> {
        let shell = PathBuf::from("sh");
        let args = vec!["-c".to_string(), command.to_string()];
        let envs = [
            ("UPSTEP_FROM", step.from.to_string()),
            ("UPSTEP_TO", step.to.to_string()),
            ("UPSTEP_PHASE", phase.to_string()),
        ];

        let output = run_with_timeout(&shell, &args, self.root(), &envs, timeout)?;
        for line in output.stdout.lines() {
            info!("[{}] {}", phase, line);
        }
        for line in output.stderr.lines() {
            warn!("[{}] {}", phase, line);
        }

        if output.timed_out() {
            return Err(Error::TaskFailure(format!(
                "timed out after {} seconds",
                timeout.as_secs()
            )));
        }
        if !output.success() {
            return Err(Error::TaskFailure(format!(
                "failed with exit code {}",
                output.code()
            )));
        }
        Ok(())
    }

    fn root(&self) -> &Path {
        &self.ctx.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::PackageManager;
    use std::fs;

    fn ctx() -> (tempfile::TempDir, ProjectContext) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let config = Config {
            package_manager: Some(PackageManager::Pnpm),
            ..Config::default()
        };
        let ctx = ProjectContext::new(dir.path(), config).unwrap();
        (dir, ctx)
    }

    fn step() -> StepSpec {
        StepSpec {
            from: 18,
            to: 19,
            dependencies: Vec::new(),
            breaking_changes: Vec::new(),
            pre_tasks: Vec::new(),
            post_tasks: Vec::new(),
            update_commands: Vec::new(),
        }
    }

    fn task(command: &str) -> Task {
        Task {
            name: "probe".to_string(),
            command: command.to_string(),
            timeout_secs: None,
        }
    }

    #[test]
    fn test_task_sees_step_environment() {
        let (dir, ctx) = ctx();
        let runner = TaskRunner::new(&ctx);
        runner
            .run(
                &task("echo $UPSTEP_FROM $UPSTEP_TO $UPSTEP_PHASE {pm} > env.txt"),
                &step(),
                TaskPhase::Post,
            )
            .unwrap();

        let written = fs::read_to_string(dir.path().join("env.txt")).unwrap();
        assert_eq!(written.trim(), "18 19 post pnpm");
    }

    #[test]
    fn test_failing_task_is_task_failure() {
        let (_dir, ctx) = ctx();
        let runner = TaskRunner::new(&ctx);
        let err = runner.run(&task("exit 2"), &step(), TaskPhase::Pre).unwrap_err();
        match err {
            Error::TaskFailure(msg) => {
                assert!(msg.contains("probe"));
                assert!(msg.contains("exit code 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_task_timeout() {
        let (_dir, ctx) = ctx();
        let runner = TaskRunner::new(&ctx);
        let mut slow = task("exec sleep 5");
        slow.timeout_secs = Some(0);
        let err = runner.run(&slow, &step(), TaskPhase::Pre).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
