// src/backup.rs

//! Project snapshots for manual rollback
//!
//! A backup copies the project tree (minus excluded directories such as
//! `node_modules`) into `<root>/.upstep/backups/<timestamp>-<id>/files` and
//! records a SHA-256 of every file in `index.json`.
//!
//! Restoring is always operator-triggered. It verifies every backed-up file
//! against its recorded hash before touching the project, then copies the
//! files back. Files created after the backup are left in place.

use crate::context::STATE_DIR;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

const INDEX_FILE: &str = "index.json";
const FILES_DIR: &str = "files";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Path relative to the project root
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupIndex {
    /// Directory name under [`backups_dir`]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub root: PathBuf,
    pub files: Vec<BackupEntry>,
}

/// Directory all backups of a project live under
pub fn backups_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join("backups")
}

fn sha256_file(path: &Path) -> Result<String> {
    let content = fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&content)))
}

fn is_excluded(relative: &Path, exclude: &[String]) -> bool {
    relative
        .components()
        .any(|c| exclude.iter().any(|e| c.as_os_str() == e.as_str()))
}

/// Snapshot the project tree; returns the backup directory
pub fn create_backup(root: &Path, exclude: &[String]) -> Result<PathBuf> {
    let created_at = Utc::now();
    let uuid = Uuid::new_v4().simple().to_string();
    let id = format!("{}-{}", created_at.format("%Y%m%dT%H%M%SZ"), &uuid[..8]);
    let backup_dir = backups_dir(root).join(&id);
    let files_dir = backup_dir.join(FILES_DIR);

    let fail = |what: &str, e: &dyn std::fmt::Display| {
        Error::BackupFailure(format!("{}: {}", what, e))
    };

    fs::create_dir_all(&files_dir).map_err(|e| fail("cannot create backup directory", &e))?;

    let mut entries = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
        entry
            .path()
            .strip_prefix(root)
            .map(|rel| !is_excluded(rel, exclude))
            .unwrap_or(true)
    });

    for entry in walker {
        let entry = entry.map_err(|e| fail("cannot walk project", &e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| fail("path outside project", &e))?
            .to_path_buf();
        let dest = files_dir.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| fail("cannot create backup directory", &e))?;
        }

        let size = fs::copy(entry.path(), &dest)
            .map_err(|e| fail(&format!("cannot copy {}", relative.display()), &e))?;
        let sha256 = sha256_file(&dest)?;
        debug!("Backed up {} ({} bytes)", relative.display(), size);

        entries.push(BackupEntry {
            path: relative,
            sha256,
            size,
        });
    }

    let index = BackupIndex {
        id,
        created_at,
        root: root.to_path_buf(),
        files: entries,
    };
    let index_json = serde_json::to_string_pretty(&index)?;
    fs::write(backup_dir.join(INDEX_FILE), index_json)
        .map_err(|e| fail("cannot write backup index", &e))?;

    info!(
        "Backed up {} file(s) to {}",
        index.files.len(),
        backup_dir.display()
    );
    Ok(backup_dir)
}

/// Read the index of a backup directory
pub fn read_index(backup_dir: &Path) -> Result<BackupIndex> {
    let content = fs::read_to_string(backup_dir.join(INDEX_FILE)).map_err(|e| {
        Error::BackupFailure(format!("{} is not a backup: {}", backup_dir.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Copy a backup back over the project; returns the number of files restored
pub fn restore_backup(backup_dir: &Path, root: &Path) -> Result<usize> {
    let index = read_index(backup_dir)?;
    let files_dir = backup_dir.join(FILES_DIR);

    // Verify everything before writing anything
    for entry in &index.files {
        let stored = files_dir.join(&entry.path);
        let actual = sha256_file(&stored).map_err(|e| {
            Error::BackupFailure(format!("missing {} in backup: {}", entry.path.display(), e))
        })?;
        if actual != entry.sha256 {
            return Err(Error::BackupFailure(format!(
                "checksum mismatch for {} in backup",
                entry.path.display()
            )));
        }
    }

    for entry in &index.files {
        let dest = root.join(&entry.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(files_dir.join(&entry.path), &dest)?;
    }

    info!(
        "Restored {} file(s) from {}",
        index.files.len(),
        backup_dir.display()
    );
    Ok(index.files.len())
}

/// Backups of a project, newest first
pub fn list_backups(root: &Path) -> Result<Vec<BackupIndex>> {
    let dir = backups_dir(root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if let Ok(index) = read_index(&path) {
            backups.push(index);
        }
    }
    backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(backups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_exclude() -> Vec<String> {
        vec!["node_modules".to_string(), ".upstep".to_string()]
    }

    fn project() -> tempfile::TempDir {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("package.json"), r#"{"name":"app"}"#).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/index.js"), "render(<App />)").unwrap();
        fs::create_dir_all(root.join("node_modules/react")).unwrap();
        fs::write(root.join("node_modules/react/package.json"), "{}").unwrap();
        temp_dir
    }

    #[test]
    fn test_backup_skips_excluded_dirs() {
        let dir = project();
        let backup = create_backup(dir.path(), &default_exclude()).unwrap();
        let index = read_index(&backup).unwrap();

        let paths: Vec<_> = index.files.iter().map(|f| f.path.clone()).collect();
        assert!(paths.contains(&PathBuf::from("package.json")));
        assert!(paths.contains(&PathBuf::from("src/index.js")));
        assert!(!paths.iter().any(|p| p.starts_with("node_modules")));
    }

    #[test]
    fn test_restore_brings_back_contents() {
        let dir = project();
        let backup = create_backup(dir.path(), &default_exclude()).unwrap();

        fs::write(dir.path().join("src/index.js"), "createRoot(el).render(<App />)").unwrap();
        fs::remove_file(dir.path().join("package.json")).unwrap();

        let restored = restore_backup(&backup, dir.path()).unwrap();
        assert_eq!(restored, 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("src/index.js")).unwrap(),
            "render(<App />)"
        );
        assert!(dir.path().join("package.json").is_file());
    }

    #[test]
    fn test_restore_rejects_tampered_backup() {
        let dir = project();
        let backup = create_backup(dir.path(), &default_exclude()).unwrap();
        fs::write(backup.join(FILES_DIR).join("package.json"), "tampered").unwrap();

        assert!(matches!(
            restore_backup(&backup, dir.path()),
            Err(Error::BackupFailure(_))
        ));
    }

    #[test]
    fn test_list_backups() {
        let dir = project();
        assert!(list_backups(dir.path()).unwrap().is_empty());
        create_backup(dir.path(), &default_exclude()).unwrap();
        assert_eq!(list_backups(dir.path()).unwrap().len(), 1);
    }
}
