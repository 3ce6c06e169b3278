// src/config.rs

//! Run configuration
//!
//! Configuration is optional. It is looked up in this order:
//!
//! 1. an explicit path (`--config`)
//! 2. `<project>/upstep.toml`
//! 3. `<config dir>/upstep/config.toml`
//! 4. built-in defaults
//!
//! # Example upstep.toml
//!
//! ```toml
//! framework = "react"
//! package_manager = "pnpm"
//! registry_concurrency = 8
//! allow_overrides = true
//! transform_command = "npx codemod react/{to} --json {dry_run}"
//! ```

use crate::context::PackageManager;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Name of the per-project config file
pub const PROJECT_CONFIG_FILE: &str = "upstep.toml";

/// Default npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package whose declared version defines the project's current version
    pub framework: String,
    /// Skip lock-file detection and use this package manager
    pub package_manager: Option<PackageManager>,
    pub registry_url: String,
    /// Offline registry snapshot (JSON) used instead of `registry_url`
    pub registry_file: Option<PathBuf>,
    pub registry_timeout_secs: u64,
    /// Worker limit for concurrent registry lookups within one step
    pub registry_concurrency: usize,
    pub install_timeout_secs: u64,
    pub task_timeout_secs: u64,
    /// Permit manifest-level overrides as a conflict strategy
    pub allow_overrides: bool,
    pub continue_on_error: bool,
    pub allow_manual_override: bool,
    /// Directory and file names left out of backups
    pub backup_exclude: Vec<String>,
    /// External codemod command; `{from}`, `{to}` and `{dry_run}` are substituted
    pub transform_command: Option<String>,
    /// Custom step table replacing the built-in one
    pub graph_file: Option<PathBuf>,
    /// Checked between steps only
    pub run_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            framework: "react".to_string(),
            package_manager: None,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            registry_file: None,
            registry_timeout_secs: 30,
            registry_concurrency: 4,
            install_timeout_secs: 600,
            task_timeout_secs: 120,
            allow_overrides: true,
            continue_on_error: false,
            allow_manual_override: false,
            backup_exclude: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                ".upstep".to_string(),
            ],
            transform_command: None,
            graph_file: None,
            run_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find the config that applies to a project
    pub fn discover(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let project_file = project_root.join(PROJECT_CONFIG_FILE);
        if project_file.is_file() {
            return Self::load(&project_file);
        }

        if let Some(user_file) = dirs::config_dir().map(|d| d.join("upstep").join("config.toml"))
            && user_file.is_file()
        {
            return Self::load(&user_file);
        }

        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.framework.trim().is_empty() {
            return Err(Error::ConfigError("framework must not be empty".to_string()));
        }
        if self.registry_concurrency == 0 {
            return Err(Error::ConfigError(
                "registry_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}
