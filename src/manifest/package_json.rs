// src/manifest/package_json.rs

//! `package.json` implementation of [`ManifestEditor`]
//!
//! Key order and unrelated fields are preserved on write. Overrides go where
//! the detected package manager reads them: `overrides` (npm, bun),
//! `resolutions` (yarn) or `pnpm.overrides`.

use super::{DependencySet, ManifestEdit, ManifestEditor};
use crate::backup;
use crate::context::{OverrideLocation, ProjectContext, MANIFEST_FILE};
use crate::error::{Error, Result};
use semver::Version;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct PackageJsonManifest {
    root: PathBuf,
    override_location: OverrideLocation,
    backup_exclude: Vec<String>,
}

impl PackageJsonManifest {
    pub fn new(ctx: &ProjectContext) -> Self {
        Self {
            root: ctx.root.clone(),
            override_location: ctx.package_manager.override_location(),
            backup_exclude: ctx.config.backup_exclude.clone(),
        }
    }

    fn path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    fn load(&self) -> Result<Map<String, Value>> {
        let path = self.path();
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::ManifestError(format!("Failed to read {}: {}", path.display(), e)))?;
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::ManifestError(format!(
                "{} is not a JSON object",
                path.display()
            ))),
        }
    }

    fn save(&self, manifest: Map<String, Value>) -> Result<()> {
        let mut content = serde_json::to_string_pretty(&Value::Object(manifest))?;
        content.push('\n');
        fs::write(self.path(), content)?;
        Ok(())
    }

    fn section(manifest: &Map<String, Value>, key: &str) -> Result<BTreeMap<String, String>> {
        let Some(value) = manifest.get(key) else {
            return Ok(BTreeMap::new());
        };
        let object = value
            .as_object()
            .ok_or_else(|| Error::ManifestError(format!("{} is not an object", key)))?;

        object
            .iter()
            .map(|(name, range)| {
                range
                    .as_str()
                    .map(|r| (name.clone(), r.to_string()))
                    .ok_or_else(|| {
                        Error::ManifestError(format!("{}.{} is not a string", key, name))
                    })
            })
            .collect()
    }

    /// Mutable object at `path`, created if missing
    fn object_at<'a>(
        manifest: &'a mut Map<String, Value>,
        path: &[&str],
    ) -> Result<&'a mut Map<String, Value>> {
        let mut current = manifest;
        for key in path {
            let entry = current
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = entry
                .as_object_mut()
                .ok_or_else(|| Error::ManifestError(format!("{} is not an object", key)))?;
        }
        Ok(current)
    }

    fn override_path(&self) -> &'static [&'static str] {
        match self.override_location {
            OverrideLocation::Overrides => &["overrides"],
            OverrideLocation::Resolutions => &["resolutions"],
            OverrideLocation::PnpmOverrides => &["pnpm", "overrides"],
        }
    }
}

impl ManifestEditor for PackageJsonManifest {
    fn read_dependencies(&self) -> Result<DependencySet> {
        let manifest = self.load()?;
        Ok(DependencySet {
            dependencies: Self::section(&manifest, "dependencies")?,
            dev_dependencies: Self::section(&manifest, "devDependencies")?,
        })
    }

    fn write_dependencies(&self, edits: &[ManifestEdit]) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }

        let mut manifest = self.load()?;
        for edit in edits {
            let key = if edit.dev { "devDependencies" } else { "dependencies" };
            let section = Self::object_at(&mut manifest, &[key])?;
            section.insert(edit.name.clone(), Value::String(edit.range.clone()));
            debug!("Set {} {} in {}", edit.name, edit.range, key);
        }
        self.save(manifest)?;

        info!("Updated {} dependency entr(ies) in {}", edits.len(), MANIFEST_FILE);
        Ok(())
    }

    fn overrides(&self) -> Result<BTreeMap<String, String>> {
        let manifest = self.load()?;
        let mut current = Some(&manifest);
        let path = self.override_path();
        let (last, parents) = path.split_last().unwrap_or((&"overrides", &[]));
        for key in parents {
            current = current.and_then(|m| m.get(*key)).and_then(Value::as_object);
        }

        // Nested npm override objects are not version pins; skip them
        Ok(current
            .and_then(|m| m.get(*last))
            .and_then(Value::as_object)
            .map(|o| {
                o.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn add_overrides(&self, overrides: &BTreeMap<String, Version>) -> Result<()> {
        if overrides.is_empty() {
            return Ok(());
        }

        let mut manifest = self.load()?;
        let block = Self::object_at(&mut manifest, self.override_path())?;
        for (name, version) in overrides {
            block.insert(name.clone(), Value::String(version.to_string()));
        }
        self.save(manifest)?;

        info!(
            "Added {} override(s) to {}",
            overrides.len(),
            self.override_path().join(".")
        );
        Ok(())
    }

    fn installed_version(&self, name: &str) -> Option<Version> {
        let path = self.root.join("node_modules").join(name).join(MANIFEST_FILE);
        let content = fs::read_to_string(path).ok()?;
        let manifest: Value = serde_json::from_str(&content).ok()?;
        Version::parse(manifest.get("version")?.as_str()?).ok()
    }

    fn backup(&self) -> Result<PathBuf> {
        backup::create_backup(&self.root, &self.backup_exclude)
    }

    fn restore(&self, backup_dir: &Path) -> Result<()> {
        backup::restore_backup(backup_dir, &self.root)?;
        Ok(())
    }
}
