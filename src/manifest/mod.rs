// src/manifest/mod.rs

//! Dependency manifest access
//!
//! The resolver and executor only ever see the project's manifest through
//! [`ManifestEditor`]: declared ranges, overrides, installed versions, and the
//! backup/restore pair used for manual rollback.

mod package_json;

pub use package_json::PackageJsonManifest;

use crate::error::Result;
use crate::version::VersionRange;
use semver::Version;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Declared dependencies, split by section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencySet {
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
}

/// One declared dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declared<'a> {
    pub range: &'a str,
    pub dev: bool,
}

impl DependencySet {
    /// Look up a declared dependency; regular dependencies shadow dev ones
    pub fn declared(&self, name: &str) -> Option<Declared<'_>> {
        if let Some(range) = self.dependencies.get(name) {
            return Some(Declared { range, dev: false });
        }
        self.dev_dependencies
            .get(name)
            .map(|range| Declared { range, dev: true })
    }

    /// Parsed declared range; non-registry specifiers yield `None`
    pub fn declared_range(&self, name: &str) -> Option<VersionRange> {
        self.declared(name)
            .and_then(|d| VersionRange::parse(d.range).ok())
    }

    /// Every declared package name, regular dependencies first
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.dependencies.keys().chain(
            self.dev_dependencies
                .keys()
                .filter(|name| !self.dependencies.contains_key(*name)),
        )
    }

    pub fn len(&self) -> usize {
        self.names().count()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.dev_dependencies.is_empty()
    }
}

/// Set `name` to `range` in the given section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEdit {
    pub name: String,
    pub range: String,
    pub dev: bool,
}

impl ManifestEdit {
    pub fn new(name: impl Into<String>, range: impl Into<String>, dev: bool) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
            dev,
        }
    }

    /// `name@range`, as shown in reports
    pub fn describe(&self) -> String {
        format!("{}@{}", self.name, self.range)
    }
}

/// Read and edit the project's dependency manifest
pub trait ManifestEditor: Send + Sync {
    fn read_dependencies(&self) -> Result<DependencySet>;

    fn write_dependencies(&self, edits: &[ManifestEdit]) -> Result<()>;

    /// Current override/resolution block
    fn overrides(&self) -> Result<BTreeMap<String, String>>;

    fn add_overrides(&self, overrides: &BTreeMap<String, Version>) -> Result<()>;

    /// Version actually installed on disk, if any
    fn installed_version(&self, name: &str) -> Option<Version>;

    /// Snapshot the project; returns the backup location
    fn backup(&self) -> Result<PathBuf>;

    /// Restore a snapshot taken by [`ManifestEditor::backup`]
    fn restore(&self, backup: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> DependencySet {
        let mut set = DependencySet::default();
        set.dependencies.insert("react".into(), "^18.2.0".into());
        set.dependencies.insert("local-lib".into(), "file:../lib".into());
        set.dev_dependencies.insert("@types/react".into(), "^18.0.0".into());
        set.dev_dependencies.insert("react".into(), "^18.0.0".into());
        set
    }

    #[test]
    fn test_declared_prefers_regular_section() {
        let set = set();
        let react = set.declared("react").unwrap();
        assert_eq!(react.range, "^18.2.0");
        assert!(!react.dev);
        assert!(set.declared("@types/react").unwrap().dev);
        assert!(set.declared("vue").is_none());
    }

    #[test]
    fn test_declared_range_skips_non_registry() {
        let set = set();
        assert!(set.declared_range("react").is_some());
        assert!(set.declared_range("local-lib").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let set = set();
        let names: Vec<_> = set.names().cloned().collect();
        assert_eq!(names, vec!["local-lib", "react", "@types/react"]);
        assert_eq!(set.len(), 3);
    }
}
