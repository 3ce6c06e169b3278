// src/graph/mod.rs

//! Version graph: the static table of upgrade steps
//!
//! Each step connects two adjacent major versions and declares what the step
//! installs, which breaking changes it carries and which tasks run around it.
//! Steps are loaded once (from the built-in table or a TOML file) and never
//! mutated afterwards.
//!
//! # Step table format
//!
//! ```toml
//! [[step]]
//! from = 18
//! to = 19
//! update_commands = ["{pm} dedupe"]
//!
//! [[step.dependencies]]
//! name = "react"
//! range = "^19.0.0"
//!
//! [[step.breaking_changes]]
//! id = "string-refs"
//! title = "String refs removed"
//! impact = "high"
//! auto_fixable = false
//! manual_steps = ["Replace string refs with callback refs or useRef"]
//!
//! [[step.post_tasks]]
//! name = "lint"
//! command = "{pm} run lint --if-present"
//! ```

use crate::error::{Error, Result};
use crate::version::VersionRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use strum_macros::Display;
use tracing::debug;

const BUILTIN_TABLE: &str = include_str!("builtin.toml");

/// A dependency a step wants installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRequirement {
    pub name: String,
    pub range: VersionRange,
    #[serde(default)]
    pub dev: bool,
}

/// Impact of a breaking change on user code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChange {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub impact: Impact,
    #[serde(default)]
    pub auto_fixable: bool,
    #[serde(default)]
    pub manual_steps: Vec<String>,
}

/// A shell task run before or after a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub command: String,
    /// Overrides the configured task timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// One upgrade step between adjacent versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub from: u64,
    pub to: u64,
    #[serde(default)]
    pub dependencies: Vec<DependencyRequirement>,
    #[serde(default)]
    pub breaking_changes: Vec<BreakingChange>,
    #[serde(default)]
    pub pre_tasks: Vec<Task>,
    #[serde(default)]
    pub post_tasks: Vec<Task>,
    #[serde(default)]
    pub update_commands: Vec<String>,
}

impl StepSpec {
    /// Label used in logs and reports (`17 -> 18`)
    pub fn label(&self) -> String {
        format!("{} -> {}", self.from, self.to)
    }
}

#[derive(Debug, Deserialize)]
struct StepTable {
    #[serde(default, rename = "step")]
    steps: Vec<StepSpec>,
}

/// Table of steps keyed by `(from, to)`
#[derive(Debug, Clone, Default)]
pub struct VersionGraph {
    steps: BTreeMap<(u64, u64), StepSpec>,
}

impl VersionGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in React step table
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_TABLE)
    }

    /// Load a step table from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read step table {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a step table from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: StepTable = toml::from_str(content)?;
        Self::from_steps(table.steps)
    }

    /// Build a graph from a list of steps
    pub fn from_steps(steps: Vec<StepSpec>) -> Result<Self> {
        let mut graph = Self::new();
        for step in steps {
            graph.insert(step)?;
        }
        Ok(graph)
    }

    /// Add a step; only adjacent, previously unseen pairs are accepted
    pub fn insert(&mut self, step: StepSpec) -> Result<()> {
        if step.to != step.from + 1 {
            return Err(Error::InvalidChain(format!(
                "Step {} does not connect adjacent versions",
                step.label()
            )));
        }
        let key = (step.from, step.to);
        if self.steps.contains_key(&key) {
            return Err(Error::InvalidChain(format!(
                "Step {} is defined more than once",
                step.label()
            )));
        }
        self.steps.insert(key, step);
        Ok(())
    }

    pub fn get(&self, from: u64, to: u64) -> Option<&StepSpec> {
        self.steps.get(&(from, to))
    }

    /// Build the ordered chain of steps from `from` to `to`
    ///
    /// Fails with `NoPathError` on the first missing adjacency; no partial
    /// chain is ever returned.
    pub fn build_chain(&self, from: u64, to: u64) -> Result<Vec<&StepSpec>> {
        if from == to {
            return Err(Error::InvalidChain(format!("Already at version {}", to)));
        }
        if from > to {
            return Err(Error::InvalidChain(format!(
                "Cannot downgrade from {} to {}",
                from, to
            )));
        }

        let mut chain = Vec::with_capacity((to - from) as usize);
        for v in (from + 1)..=to {
            let step = self
                .get(v - 1, v)
                .ok_or(Error::NoPathError { from: v - 1, to: v })?;
            chain.push(step);
        }

        debug!("Built chain {} -> {} with {} step(s)", from, to, chain.len());
        Ok(chain)
    }

    /// Versions reachable from `from` by following the graph forward
    pub fn targets(&self, from: u64) -> Vec<u64> {
        let mut targets = Vec::new();
        let mut current = from;
        while self.get(current, current + 1).is_some() {
            current += 1;
            targets.push(current);
        }
        targets
    }

    /// All steps in ascending order
    pub fn steps(&self) -> impl Iterator<Item = &StepSpec> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
