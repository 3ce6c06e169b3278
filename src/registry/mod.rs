// src/registry/mod.rs

//! Package registry access
//!
//! The registry is an external service: every call may fail or be slow.
//! Callers treat a failed lookup as missing information for that one package,
//! never as a reason to abort the whole analysis.

mod npm;
mod snapshot;

pub use npm::NpmRegistry;
pub use snapshot::StaticRegistry;

use crate::error::{Error, Result};
use crate::version::VersionRange;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};

/// Read-only view of a package registry
pub trait RegistryClient: Send + Sync {
    /// Published versions of a package, newest first
    fn versions(&self, name: &str) -> Result<Vec<Version>>;

    /// Peer requirements declared by one published version
    fn peer_requirements(&self, name: &str, version: &Version) -> Result<PeerRequirementSet>;
}

/// Validated peer requirements of one package version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerRequirementSet {
    entries: BTreeMap<String, VersionRange>,
    /// Peers flagged optional in `peerDependenciesMeta`
    optional: BTreeSet<String>,
}

impl PeerRequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, range: VersionRange) {
        self.entries.insert(name.into(), range);
    }

    pub fn mark_optional(&mut self, name: impl Into<String>) {
        self.optional.insert(name.into());
    }

    /// Optional peers only constrain a package the project actually has
    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&VersionRange> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VersionRange)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Extract peer requirements from a registry version document
    ///
    /// A missing or null `peerDependencies` field means no peers. Anything
    /// else that is not an object of parseable range strings is rejected as a
    /// registry failure for `package`.
    pub fn from_version_document(package: &str, document: &serde_json::Value) -> Result<Self> {
        let mut set = Self::new();
        let peers = match document.get("peerDependencies") {
            None | Some(serde_json::Value::Null) => return Ok(set),
            Some(serde_json::Value::Object(peers)) => peers,
            Some(other) => {
                return Err(Error::registry(
                    package,
                    format!("peerDependencies is not an object: {}", other),
                ));
            }
        };

        for (name, value) in peers {
            let raw = value.as_str().ok_or_else(|| {
                Error::registry(package, format!("peer range for {} is not a string", name))
            })?;
            let range = VersionRange::parse(raw).map_err(|e| {
                Error::registry(package, format!("peer range for {}: {}", name, e))
            })?;
            set.insert(name.clone(), range);
        }

        if let Some(meta) = document.get("peerDependenciesMeta").and_then(|m| m.as_object()) {
            for (name, flags) in meta {
                if set.entries.contains_key(name)
                    && flags.get("optional").and_then(|o| o.as_bool()) == Some(true)
                {
                    set.mark_optional(name.clone());
                }
            }
        }

        Ok(set)
    }
}

impl FromIterator<(String, VersionRange)> for PeerRequirementSet {
    fn from_iter<I: IntoIterator<Item = (String, VersionRange)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            optional: BTreeSet::new(),
        }
    }
}

/// Sort versions newest first and drop duplicates
pub(crate) fn sort_newest_first(mut versions: Vec<Version>) -> Vec<Version> {
    versions.sort_by(|a, b| b.cmp(a));
    versions.dedup();
    versions
}
