// src/installer.rs

//! Package installation
//!
//! The installer runs the package manager's install command for the project.
//! Failures are classified so the step executor can tell an unsatisfiable
//! dependency graph (worth one clean retry) from network or disk trouble
//! (not worth retrying).
//!
//! Only one install may run per project at a time: [`InstallLock`] holds an
//! exclusive lock on `<root>/.upstep/install.lock` for the duration.

use crate::context::{PackageManager, ProjectContext, STATE_DIR};
use crate::error::{Error, Result};
use crate::process::{run_with_timeout, ProcessOutput};
use regex::Regex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Class of an install failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InstallErrorKind {
    /// The dependency graph could not be satisfied (ERESOLVE and friends)
    Resolution,
    Network,
    Disk,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct InstallError {
    pub kind: InstallErrorKind,
    pub message: String,
}

impl InstallError {
    pub fn new(kind: InstallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether a purge-and-retry may help
    pub fn is_resolution(&self) -> bool {
        self.kind == InstallErrorKind::Resolution
    }
}

/// Installs the project's dependencies
pub trait Installer: Send + Sync {
    fn install(&self) -> std::result::Result<(), InstallError>;

    /// Remove installed packages and lock state before a retry
    fn purge(&self) -> Result<()>;
}

static RESOLUTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ERESOLVE|ERR_PNPM_PEER_DEP_ISSUES|conflicting peer dependency|unable to resolve dependency tree|could not resolve dependency|incorrect peer dependency")
        .unwrap()
});

static NETWORK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ETIMEDOUT|ECONNRESET|ECONNREFUSED|ENOTFOUND|EAI_AGAIN|ERR_SOCKET_TIMEOUT|network timeout")
        .unwrap()
});

static DISK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ENOSPC|EACCES|EPERM|EROFS|EMFILE").unwrap());

/// Classify a failed install from its output
pub fn classify_failure(output: &str) -> InstallErrorKind {
    // Resolution wins: npm often prints network noise alongside ERESOLVE
    if RESOLUTION_PATTERN.is_match(output) {
        InstallErrorKind::Resolution
    } else if NETWORK_PATTERN.is_match(output) {
        InstallErrorKind::Network
    } else if DISK_PATTERN.is_match(output) {
        InstallErrorKind::Disk
    } else {
        InstallErrorKind::Other
    }
}

/// Last few lines of output, for error messages
fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Exclusive per-project install lock, released on drop
pub struct InstallLock {
    _file: File,
    path: PathBuf,
}

impl InstallLock {
    pub fn acquire(root: &Path) -> Result<Self> {
        use fs2::FileExt;

        let dir = root.join(STATE_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join("install.lock");
        let file = File::create(&path)?;

        // Tries: 0ms, 100ms, 200ms, 400ms, 800ms
        const MAX_RETRIES: u32 = 5;
        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES - 1 {
                        std::thread::sleep(Duration::from_millis(100 * (1 << attempt)));
                    }
                }
            }
        }

        if let Some(e) = last_error {
            return Err(Error::IoError(format!(
                "Failed to acquire install lock {} after {} retries. \
                 Another install may be running in this project. Error: {}",
                path.display(),
                MAX_RETRIES,
                e
            )));
        }

        debug!("Acquired install lock {}", path.display());
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Runs the detected package manager's install command
pub struct CommandInstaller {
    root: PathBuf,
    package_manager: PackageManager,
    timeout: Duration,
}

impl CommandInstaller {
    pub fn new(ctx: &ProjectContext) -> Self {
        Self {
            root: ctx.root.clone(),
            package_manager: ctx.package_manager,
            timeout: ctx.config.install_timeout(),
        }
    }

    fn run(&self) -> std::result::Result<ProcessOutput, InstallError> {
        let binary = which::which(self.package_manager.binary()).map_err(|e| {
            InstallError::new(
                InstallErrorKind::Other,
                format!("{} not found on PATH: {}", self.package_manager.binary(), e),
            )
        })?;
        let args: Vec<String> = self
            .package_manager
            .install_args()
            .iter()
            .map(|a| a.to_string())
            .collect();

        run_with_timeout(&binary, &args, &self.root, &[], self.timeout)
            .map_err(|e| InstallError::new(InstallErrorKind::Other, e.to_string()))
    }
}

impl Installer for CommandInstaller {
    fn install(&self) -> std::result::Result<(), InstallError> {
        let _lock = InstallLock::acquire(&self.root)
            .map_err(|e| InstallError::new(InstallErrorKind::Other, e.to_string()))?;

        info!("Running {} install in {}", self.package_manager, self.root.display());
        let output = self.run()?;

        if output.timed_out() {
            return Err(InstallError::new(
                InstallErrorKind::Network,
                format!("install timed out after {} seconds", self.timeout.as_secs()),
            ));
        }
        if output.success() {
            info!("{} install completed", self.package_manager);
            return Ok(());
        }

        let combined = output.combined();
        let kind = classify_failure(&combined);
        warn!(
            "{} install failed with exit code {} ({})",
            self.package_manager,
            output.code(),
            kind
        );
        Err(InstallError::new(
            kind,
            format!("exit code {}: {}", output.code(), tail(&combined, 5)),
        ))
    }

    fn purge(&self) -> Result<()> {
        let node_modules = self.root.join("node_modules");
        if node_modules.exists() {
            fs::remove_dir_all(&node_modules)?;
            debug!("Removed {}", node_modules.display());
        }
        for lock_file in self.package_manager.lock_files() {
            let path = self.root.join(lock_file);
            if path.is_file() {
                fs::remove_file(&path)?;
                debug!("Removed {}", path.display());
            }
        }
        info!("Purged installed packages and lock state");
        Ok(())
    }
}
