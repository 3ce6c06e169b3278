// src/process.rs

//! Subprocess execution with a timeout
//!
//! Shared by the installer, tasks and the command transform adapter. Stdin is
//! always nulled so a child can never block waiting for a terminal, and
//! stdout/stderr are drained on background threads so a chatty child cannot
//! fill its pipe and stall before the timeout fires.
//!
//! On unix the child leads its own process group. A timeout kills the whole
//! group, so `sh -c` wrappers and package-manager workers go down with it.

use crate::error::{Error, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use wait_timeout::ChildExt;

/// Captured result of a finished (or killed) child
#[derive(Debug)]
pub struct ProcessOutput {
    /// `None` when the child was killed on timeout
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }

    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }

    /// Exit code, `-1` when killed or terminated by a signal
    pub fn code(&self) -> i32 {
        self.status.and_then(|s| s.code()).unwrap_or(-1)
    }

    /// stdout and stderr joined, for error classification
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// How long output readers may keep running after a kill
const DRAIN_GRACE: Duration = Duration::from_secs(1);

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Join a reader, giving up once `deadline` passes
///
/// A descendant that escaped the kill can hold the pipe open forever; its
/// reader thread is left detached and the output is dropped.
fn collect(handle: thread::JoinHandle<String>, deadline: Option<Instant>) -> String {
    if let Some(deadline) = deadline {
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                return String::new();
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
    handle.join().unwrap_or_default()
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = i32::try_from(child.id()).map(Pid::from_raw);
    if let Ok(group) = group
        && killpg(group, Signal::SIGKILL).is_ok()
    {
        return;
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

/// Run `program` with `args` in `cwd`, killing it after `timeout`
pub fn run_with_timeout(
    program: &Path,
    args: &[String],
    cwd: &Path,
    envs: &[(&str, String)],
    timeout: Duration,
) -> Result<ProcessOutput> {
    debug!("Running {} {:?} in {}", program.display(), args, cwd.display());

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        command.env(key, value);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command.spawn().map_err(|e| {
        Error::IoError(format!("Failed to spawn {}: {}", program.display(), e))
    })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let (status, deadline) = match child.wait_timeout(timeout)? {
        Some(status) => (Some(status), None),
        None => {
            debug!("{} timed out after {:?}, killing", program.display(), timeout);
            kill_tree(&mut child);
            let _ = child.wait();
            (None, Some(Instant::now() + DRAIN_GRACE))
        }
    };

    Ok(ProcessOutput {
        status,
        stdout: collect(stdout, deadline),
        stderr: collect(stderr, deadline),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> (PathBuf, Vec<String>) {
        (PathBuf::from("sh"), vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_captures_output_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let (program, args) = sh("echo out; echo err >&2; exit 3");
        let output = run_with_timeout(&program, &args, dir.path(), &[], Duration::from_secs(10)).unwrap();

        assert!(!output.success());
        assert_eq!(output.code(), 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let (program, args) = sh("echo $UPSTEP_PHASE > phase.txt");
        let output = run_with_timeout(
            &program,
            &args,
            dir.path(),
            &[("UPSTEP_PHASE", "pre".to_string())],
            Duration::from_secs(10),
        )
        .unwrap();

        assert!(output.success());
        let written = std::fs::read_to_string(dir.path().join("phase.txt")).unwrap();
        assert_eq!(written.trim(), "pre");
    }

    #[test]
    fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let (program, args) = sh("exec sleep 5");
        let output = run_with_timeout(&program, &args, dir.path(), &[], Duration::from_millis(200)).unwrap();
        assert!(output.timed_out());
        assert_eq!(output.code(), -1);
    }

    #[test]
    fn test_timeout_reaches_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        // The shell forks `sleep`, which inherits the output pipes
        let (program, args) = sh("sleep 4; true");
        let started = Instant::now();
        let output = run_with_timeout(&program, &args, dir.path(), &[], Duration::from_millis(200)).unwrap();

        assert!(output.timed_out());
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
    }
}
