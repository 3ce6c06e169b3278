// src/lib.rs

//! upstep: version-stepped project upgrades
//!
//! Upgrades a JavaScript project through a chain of major versions, one
//! step at a time, resolving peer dependency conflicts on the way.
//!
//! # Architecture
//!
//! - Version graph: static table of adjacent steps, each with dependency
//!   requirements, breaking changes and pre/post tasks
//! - Conflict resolver: peer requirement analysis against the registry,
//!   with upgrade, downgrade, override or manual strategies
//! - Step executor: per-step state machine (tasks, resolution, install with
//!   one clean retry, transforms)
//! - Orchestrator: backup, sequential steps, aggregated report
//!
//! Every external system (registry, manifest, package manager, codemods,
//! the operator) sits behind a trait and is handed in explicitly.

pub mod backup;
pub mod config;
pub mod context;
pub mod decision;
mod error;
pub mod executor;
pub mod graph;
pub mod installer;
pub mod issue;
pub mod manifest;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod tasks;
pub mod transform;
pub mod version;

pub use config::Config;
pub use context::{PackageManager, ProjectContext};
pub use decision::{
    DecisionProvider, DefaultDecisions, FixedAnswer, Question, QuestionKind, TerminalDecisions,
};
pub use error::{Error, Result};
pub use executor::{Collaborators, StepExecutor, StepOptions, StepPhase, StepResult};
pub use graph::{StepSpec, VersionGraph};
pub use installer::{CommandInstaller, InstallError, InstallErrorKind, Installer};
pub use issue::{Issue, IssueCategory, Severity};
pub use manifest::{ManifestEditor, PackageJsonManifest};
pub use orchestrator::{MigrationOptions, MigrationResult, MigrationSummary, Orchestrator};
pub use progress::{
    BarProgress, LogProgress, ProgressTracker, SilentProgress,
};
pub use registry::{NpmRegistry, PeerRequirementSet, RegistryClient, StaticRegistry};
pub use resolver::{ConflictResolver, ResolutionPlan, Strategy};
pub use transform::{CommandTransforms, NullTransforms, TransformReport, TransformationEngine};
pub use version::VersionRange;
