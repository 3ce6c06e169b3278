// src/context.rs

//! Project context shared by every component of a run
//!
//! The context is built once per invocation and handed to each component
//! explicitly; nothing reads the detected package manager from ambient state.

use crate::config::Config;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};
use tracing::debug;

/// Directory under the project root holding upstep state (locks, backups)
pub const STATE_DIR: &str = ".upstep";

/// Name of the dependency manifest
pub const MANIFEST_FILE: &str = "package.json";

/// Where a package manager keeps manifest-level version overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideLocation {
    /// Top-level `overrides` (npm, bun)
    Overrides,
    /// Top-level `resolutions` (yarn)
    Resolutions,
    /// `pnpm.overrides`
    PnpmOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManager {
    /// Executable name
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
            Self::Bun => "bun",
        }
    }

    /// Lock files this package manager writes
    pub fn lock_files(&self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["package-lock.json", "npm-shrinkwrap.json"],
            Self::Yarn => &["yarn.lock"],
            Self::Pnpm => &["pnpm-lock.yaml"],
            Self::Bun => &["bun.lockb", "bun.lock"],
        }
    }

    pub fn install_args(&self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["install", "--no-audit", "--no-fund"],
            Self::Yarn | Self::Pnpm | Self::Bun => &["install"],
        }
    }

    pub fn override_location(&self) -> OverrideLocation {
        match self {
            Self::Npm | Self::Bun => OverrideLocation::Overrides,
            Self::Yarn => OverrideLocation::Resolutions,
            Self::Pnpm => OverrideLocation::PnpmOverrides,
        }
    }

    /// Detect the package manager used by a project
    ///
    /// Lock files win over the `packageManager` field; npm is the fallback.
    pub fn detect(root: &Path) -> Self {
        for pm in [Self::Pnpm, Self::Yarn, Self::Bun, Self::Npm] {
            if pm.lock_files().iter().any(|f| root.join(f).is_file()) {
                debug!("Detected {} from lock file", pm);
                return pm;
            }
        }

        if let Some(pm) = Self::from_manifest_field(root) {
            debug!("Detected {} from packageManager field", pm);
            return pm;
        }

        Self::Npm
    }

    fn from_manifest_field(root: &Path) -> Option<Self> {
        let content = fs::read_to_string(root.join(MANIFEST_FILE)).ok()?;
        let manifest: serde_json::Value = serde_json::from_str(&content).ok()?;
        let field = manifest.get("packageManager")?.as_str()?;
        let name = field.split('@').next()?;
        name.parse().ok()
    }
}

/// Everything a component needs to know about the project being upgraded
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub package_manager: PackageManager,
    pub config: Config,
}

impl ProjectContext {
    /// Build the context for a project directory
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let root = root.into();
        if !root.join(MANIFEST_FILE).is_file() {
            return Err(Error::ManifestError(format!(
                "No {} found in {}",
                MANIFEST_FILE,
                root.display()
            )));
        }

        let package_manager = config
            .package_manager
            .unwrap_or_else(|| PackageManager::detect(&root));

        Ok(Self {
            root,
            package_manager,
            config,
        })
    }

    /// Package whose declared version defines the current version
    pub fn framework(&self) -> &str {
        &self.config.framework
    }

    /// Whether conflicts may be resolved with manifest overrides
    pub fn supports_overrides(&self) -> bool {
        self.config.allow_overrides
    }

    /// Substitute `{pm}` in a command template
    pub fn expand_command(&self, template: &str) -> String {
        template.replace("{pm}", self.package_manager.binary())
    }
}
