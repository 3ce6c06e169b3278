// src/registry/snapshot.rs

//! In-memory registry
//!
//! Serves versions and peer requirements from a fixed snapshot. Used for
//! offline runs (`registry_file`) and by tests.
//!
//! # Snapshot format
//!
//! ```json
//! {
//!   "react-dom": {
//!     "19.0.0": { "peerDependencies": { "react": "^19.0.0" } },
//!     "18.3.1": { "peerDependencies": { "react": "^18.3.1" } }
//!   },
//!   "flaky-package": null
//! }
//! ```
//!
//! A package mapped to `null` is listed as unavailable: every lookup for it
//! fails the way an unreachable registry would.

use super::{sort_newest_first, PeerRequirementSet, RegistryClient};
use crate::error::{Error, Result};
use semver::Version;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    packages: HashMap<String, BTreeMap<Version, PeerRequirementSet>>,
    unavailable: HashSet<String>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a published version with its peer requirements
    pub fn publish(&mut self, name: &str, version: Version, peers: PeerRequirementSet) -> &mut Self {
        self.packages
            .entry(name.to_string())
            .or_default()
            .insert(version, peers);
        self
    }

    /// Make every lookup for `name` fail
    pub fn mark_unavailable(&mut self, name: &str) -> &mut Self {
        self.unavailable.insert(name.to_string());
        self
    }

    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read registry snapshot {}: {}", path.display(), e))
        })?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let packages = value
            .as_object()
            .ok_or_else(|| Error::ConfigError("registry snapshot must be an object".to_string()))?;

        let mut registry = Self::new();
        for (name, versions) in packages {
            let versions = match versions {
                serde_json::Value::Null => {
                    registry.mark_unavailable(name);
                    continue;
                }
                serde_json::Value::Object(versions) => versions,
                _ => {
                    return Err(Error::ConfigError(format!(
                        "registry snapshot entry for {} must be an object or null",
                        name
                    )));
                }
            };

            for (raw_version, doc) in versions {
                let version = Version::parse(raw_version).map_err(|e| {
                    Error::ConfigError(format!("Invalid version {} of {}: {}", raw_version, name, e))
                })?;
                let peers = PeerRequirementSet::from_version_document(name, doc)?;
                registry.publish(name, version, peers);
            }
        }
        Ok(registry)
    }

    fn package(&self, name: &str) -> Result<&BTreeMap<Version, PeerRequirementSet>> {
        if self.unavailable.contains(name) {
            return Err(Error::registry(name, "registry unavailable"));
        }
        self.packages
            .get(name)
            .ok_or_else(|| Error::registry(name, "package not found"))
    }
}

impl RegistryClient for StaticRegistry {
    fn versions(&self, name: &str) -> Result<Vec<Version>> {
        let package = self.package(name)?;
        Ok(sort_newest_first(package.keys().cloned().collect()))
    }

    fn peer_requirements(&self, name: &str, version: &Version) -> Result<PeerRequirementSet> {
        self.package(name)?
            .get(version)
            .cloned()
            .ok_or_else(|| Error::registry(name, format!("version {} not published", version)))
    }
}
