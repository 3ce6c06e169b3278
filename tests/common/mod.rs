// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! A scratch project on disk, a registry snapshot and scripted stand-ins for
//! the package manager, the codemod engine and the operator.

#![allow(dead_code)]

use semver::Version;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use upstep::{
    Config, DecisionProvider, Error, InstallError, Installer, Issue, ManifestEditor,
    PackageJsonManifest, PackageManager, ProjectContext, Question, QuestionKind, RegistryClient,
    StaticRegistry, TransformReport, TransformationEngine, VersionGraph, VersionRange,
};
use upstep::manifest::{DependencySet, ManifestEdit};

/// Config used by every scratch project: npm, no user config lookup
pub fn test_config() -> Config {
    Config {
        package_manager: Some(PackageManager::Npm),
        ..Config::default()
    }
}

/// Project declaring react 17 with one third-party component library
pub fn react17_manifest(extra: &[(&str, &str)]) -> Value {
    let mut deps = serde_json::Map::new();
    deps.insert("react".into(), json!("^17.0.2"));
    deps.insert("react-dom".into(), json!("^17.0.2"));
    for (name, range) in extra {
        deps.insert(name.to_string(), json!(range));
    }
    json!({
        "name": "demo-app",
        "version": "1.0.0",
        "dependencies": deps,
    })
}

/// A project directory with a package.json; removed on drop
pub struct Project {
    pub dir: TempDir,
    pub ctx: ProjectContext,
}

impl Project {
    pub fn new(manifest: Value) -> Self {
        Self::with_config(manifest, test_config())
    }

    pub fn with_config(manifest: Value, config: Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/App.jsx"), "export default function App() {}\n").unwrap();

        let ctx = ProjectContext::new(dir.path(), config).unwrap();
        Self { dir, ctx }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest(&self) -> Value {
        let content = fs::read_to_string(self.root().join("package.json")).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    pub fn editor(&self) -> PackageJsonManifest {
        PackageJsonManifest::new(&self.ctx)
    }
}

/// Registry snapshot of a small React ecosystem
///
/// - `legacy-widget` only accepts React 16/17
/// - `modern-widget` accepts anything from 16.8 on
pub fn react_registry() -> StaticRegistry {
    StaticRegistry::from_json(&json!({
        "react": {
            "17.0.2": {},
            "18.2.0": {},
            "18.3.1": {},
            "19.0.0": {}
        },
        "react-dom": {
            "17.0.2": { "peerDependencies": { "react": "^17.0.2" } },
            "18.2.0": { "peerDependencies": { "react": "^18.2.0" } },
            "18.3.1": { "peerDependencies": { "react": "^18.3.1" } },
            "19.0.0": { "peerDependencies": { "react": "^19.0.0" } }
        },
        "legacy-widget": {
            "1.0.0": { "peerDependencies": { "react": "^16.8.0 || ^17.0.0" } }
        },
        "modern-widget": {
            "2.0.0": { "peerDependencies": { "react": ">=16.8.0" } }
        }
    }))
    .unwrap()
}

/// Two steps, 17 -> 18 -> 19, without tasks
pub fn react_graph() -> VersionGraph {
    VersionGraph::from_toml_str(
        r#"
[[step]]
from = 17
to = 18

[[step.dependencies]]
name = "react"
range = "^18.2.0"

[[step.dependencies]]
name = "react-dom"
range = "^18.2.0"

[[step.breaking_changes]]
id = "create-root"
title = "ReactDOM.render replaced by createRoot"
impact = "medium"
auto_fixable = true

[[step.breaking_changes]]
id = "automatic-batching"
title = "Automatic batching"
impact = "low"
manual_steps = ["Wrap updates that must render synchronously in flushSync"]

[[step]]
from = 18
to = 19

[[step.dependencies]]
name = "react"
range = "^19.0.0"

[[step.dependencies]]
name = "react-dom"
range = "^19.0.0"
"#,
    )
    .unwrap()
}

/// Package manager stand-in
///
/// Pops a scripted outcome per install (success once the script runs dry).
/// A successful install lays out node_modules the way a real one would:
/// overrides win, otherwise the newest registry version satisfying the
/// declared range.
pub struct FakeInstaller {
    root: PathBuf,
    registry: StaticRegistry,
    script: Mutex<VecDeque<Result<(), InstallError>>>,
    pinned: BTreeMap<String, String>,
    installs: AtomicUsize,
    purges: AtomicUsize,
}

impl FakeInstaller {
    pub fn new(project: &Project, registry: StaticRegistry) -> Self {
        Self {
            root: project.root().to_path_buf(),
            registry,
            script: Mutex::new(VecDeque::new()),
            pinned: BTreeMap::new(),
            installs: AtomicUsize::new(0),
            purges: AtomicUsize::new(0),
        }
    }

    /// Queue outcomes for the next installs
    pub fn scripted(self, outcomes: Vec<Result<(), InstallError>>) -> Self {
        *self.script.lock().unwrap() = outcomes.into();
        self
    }

    /// Always lay out `name` at `version`, whatever the manifest says
    pub fn pinned(mut self, name: &str, version: &str) -> Self {
        self.pinned.insert(name.to_string(), version.to_string());
        self
    }

    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    fn lay_out(&self) {
        let content = fs::read_to_string(self.root.join("package.json")).unwrap();
        let manifest: Value = serde_json::from_str(&content).unwrap();

        let overrides = manifest.get("overrides").and_then(Value::as_object);
        let mut wanted = BTreeMap::new();
        for section in ["dependencies", "devDependencies"] {
            let Some(deps) = manifest.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (name, range) in deps {
                wanted.insert(name.clone(), range.as_str().unwrap_or("").to_string());
            }
        }

        for (name, range) in wanted {
            let version = if let Some(pinned) = self.pinned.get(&name) {
                Some(Version::parse(pinned).unwrap())
            } else if let Some(forced) = overrides.and_then(|o| o.get(&name)).and_then(Value::as_str) {
                Some(Version::parse(forced).unwrap())
            } else {
                let Ok(range) = VersionRange::parse(&range) else {
                    continue;
                };
                self.registry
                    .versions(&name)
                    .ok()
                    .and_then(|versions| versions.into_iter().find(|v| range.satisfies(v)))
            };

            if let Some(version) = version {
                let dir = self.root.join("node_modules").join(&name);
                fs::create_dir_all(&dir).unwrap();
                fs::write(
                    dir.join("package.json"),
                    json!({ "name": name, "version": version.to_string() }).to_string(),
                )
                .unwrap();
            }
        }
    }
}

impl Installer for FakeInstaller {
    fn install(&self) -> Result<(), InstallError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.lay_out();
        }
        outcome
    }

    fn purge(&self) -> upstep::Result<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        let node_modules = self.root.join("node_modules");
        if node_modules.exists() {
            fs::remove_dir_all(node_modules)?;
        }
        Ok(())
    }
}

/// Codemod stand-in recording every call
#[derive(Default)]
pub struct FakeTransforms {
    calls: Mutex<Vec<(u64, u64, bool)>>,
    files: Vec<PathBuf>,
    issues: Vec<Issue>,
    fail: bool,
}

impl FakeTransforms {
    pub fn changing(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(PathBuf::from).collect(),
            ..Self::default()
        }
    }

    pub fn reporting(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(u64, u64, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TransformationEngine for FakeTransforms {
    fn apply_transforms(&self, from: u64, to: u64, dry_run: bool) -> upstep::Result<TransformReport> {
        self.calls.lock().unwrap().push((from, to, dry_run));
        if self.fail {
            return Err(Error::TransformError("codemod crashed".to_string()));
        }
        Ok(TransformReport {
            files_changed: self.files.clone(),
            issues_found: self.issues.clone(),
        })
    }
}

/// Operator stand-in: fixed answers per question kind, defaults otherwise
#[derive(Default)]
pub struct ScriptedDecisions {
    answers: Vec<(QuestionKind, bool)>,
    asked: Mutex<Vec<QuestionKind>>,
}

impl ScriptedDecisions {
    pub fn answer(mut self, kind: QuestionKind, answer: bool) -> Self {
        self.answers.push((kind, answer));
        self
    }

    pub fn asked(&self) -> Vec<QuestionKind> {
        self.asked.lock().unwrap().clone()
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn decide(&self, question: &Question) -> bool {
        self.asked.lock().unwrap().push(question.kind);
        self.answers
            .iter()
            .find(|(kind, _)| *kind == question.kind)
            .map(|(_, answer)| *answer)
            .unwrap_or(question.default)
    }
}

/// Manifest editor whose backups always fail
pub struct FailingBackupManifest {
    pub inner: PackageJsonManifest,
}

impl ManifestEditor for FailingBackupManifest {
    fn read_dependencies(&self) -> upstep::Result<DependencySet> {
        self.inner.read_dependencies()
    }

    fn write_dependencies(&self, edits: &[ManifestEdit]) -> upstep::Result<()> {
        self.inner.write_dependencies(edits)
    }

    fn overrides(&self) -> upstep::Result<BTreeMap<String, String>> {
        self.inner.overrides()
    }

    fn add_overrides(&self, overrides: &BTreeMap<String, Version>) -> upstep::Result<()> {
        self.inner.add_overrides(overrides)
    }

    fn installed_version(&self, name: &str) -> Option<Version> {
        self.inner.installed_version(name)
    }

    fn backup(&self) -> upstep::Result<PathBuf> {
        Err(Error::BackupFailure("no space left on device".to_string()))
    }

    fn restore(&self, backup: &Path) -> upstep::Result<()> {
        self.inner.restore(backup)
    }
}
