// src/resolver/conflict.rs

//! Conflict records
//!
//! A conflict is a package whose declared version fails what the step's new
//! packages ask for while some other dependency of the project still wants an
//! incompatible range.

use crate::version::VersionRange;
use semver::Version;
use serde::Serialize;
use strum_macros::Display;

/// How a conflict gets resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    /// Move the declared range up to a version everyone accepts
    Upgrade,
    /// Move the declared range down to a version everyone accepts
    Downgrade,
    /// Force a version with the manifest's override block
    Override,
    /// Needs a human
    Manual,
}

/// A range another dependency of the project puts on the conflicting package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompetingRequirement {
    pub owner: String,
    pub range: VersionRange,
    /// Whether the range overlaps every primary range
    pub satisfied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub package: String,
    /// Step packages whose peer requirements introduced the primary ranges
    pub required_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_range: Option<VersionRange>,
    pub primary_ranges: Vec<VersionRange>,
    pub competing: Vec<CompetingRequirement>,
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_version: Option<Version>,
    pub reasoning: String,
}

impl ConflictRecord {
    /// Owners whose ranges do not fit the primary ranges
    pub fn unsatisfied_owners(&self) -> Vec<&str> {
        self.competing
            .iter()
            .filter(|c| !c.satisfied)
            .map(|c| c.owner.as_str())
            .collect()
    }

    pub fn is_manual(&self) -> bool {
        self.strategy == Strategy::Manual
    }
}

impl std::fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.package, self.strategy)?;
        if let Some(version) = &self.recommended_version {
            write!(f, " -> {}", version)?;
        }
        write!(f, ": {}", self.reasoning)
    }
}

/// A registry lookup that failed; analysis went on without it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLookup {
    pub package: String,
    pub reason: String,
}
