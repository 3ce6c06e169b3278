// src/commands/mod.rs
//! Command handlers for the upstep CLI

mod check;
mod migrate;
mod plan;
mod restore;
mod steps;

pub use check::cmd_check;
pub use migrate::{cmd_migrate, MigrateArgs};
pub use plan::cmd_plan;
pub use restore::{cmd_restore, cmd_restore_list};
pub use steps::cmd_steps;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;
use upstep::{
    Collaborators, CommandInstaller, CommandTransforms, Config, DecisionProvider, NpmRegistry,
    NullTransforms, PackageJsonManifest, ProjectContext, RegistryClient, StaticRegistry,
    TransformationEngine, VersionGraph,
};

/// Context plus the real collaborators, built once per invocation
pub struct Workspace {
    pub ctx: ProjectContext,
    pub graph: VersionGraph,
    registry: Box<dyn RegistryClient>,
    manifest: PackageJsonManifest,
    installer: CommandInstaller,
    transforms: Box<dyn TransformationEngine>,
}

impl Workspace {
    pub fn open(project: &Path, config: Option<&Path>) -> Result<Self> {
        let config = Config::discover(project, config).context("Failed to load configuration")?;
        let ctx = ProjectContext::new(project, config)?;
        debug!(
            "Project {} uses {}",
            ctx.root.display(),
            ctx.package_manager
        );

        let graph = match &ctx.config.graph_file {
            Some(path) => VersionGraph::load(&ctx.root.join(path))
                .with_context(|| format!("Failed to load step table {}", path.display()))?,
            None => VersionGraph::builtin()?,
        };

        let registry: Box<dyn RegistryClient> = match &ctx.config.registry_file {
            Some(path) => Box::new(
                StaticRegistry::load(&ctx.root.join(path))
                    .with_context(|| format!("Failed to load registry snapshot {}", path.display()))?,
            ),
            None => Box::new(NpmRegistry::new(
                &ctx.config.registry_url,
                ctx.config.registry_timeout(),
            )?),
        };

        let transforms: Box<dyn TransformationEngine> = match &ctx.config.transform_command {
            Some(template) => Box::new(CommandTransforms::new(template.clone(), &ctx)),
            None => Box::new(NullTransforms),
        };

        Ok(Self {
            manifest: PackageJsonManifest::new(&ctx),
            installer: CommandInstaller::new(&ctx),
            graph,
            registry,
            transforms,
            ctx,
        })
    }

    pub fn collaborators<'a>(&'a self, decisions: &'a dyn DecisionProvider) -> Collaborators<'a> {
        Collaborators {
            registry: self.registry.as_ref(),
            manifest: &self.manifest,
            installer: &self.installer,
            transforms: self.transforms.as_ref(),
            decisions,
        }
    }
}
