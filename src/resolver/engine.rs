// src/resolver/engine.rs

//! Peer-conflict analysis for one step
//!
//! Analysis runs in three lookup rounds on a bounded worker pool, each joined
//! before the next starts:
//!
//! 1. resolve every step requirement to its newest matching version and read
//!    that version's peer requirements (the primary ranges)
//! 2. read the peer requirements of every other declared dependency (the
//!    competing ranges)
//! 3. list published versions of each conflicting package
//!
//! Strategies are chosen only once all three rounds have completed. A failed
//! lookup drops that one package from the analysis and is reported as a
//! [`SkippedLookup`].

use super::conflict::{CompetingRequirement, ConflictRecord, SkippedLookup, Strategy};
use super::plan::ResolutionPlan;
use crate::context::ProjectContext;
use crate::error::{Error, Result};
use crate::graph::DependencyRequirement;
use crate::manifest::{DependencySet, ManifestEdit, ManifestEditor};
use crate::registry::{PeerRequirementSet, RegistryClient};
use crate::version::VersionRange;
use rayon::prelude::*;
use semver::Version;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// A step requirement resolved against the registry
struct ResolvedPackage {
    name: String,
    peers: PeerRequirementSet,
}

/// A conflict before its strategy is known
struct Candidate {
    package: String,
    required_by: Vec<String>,
    installed_version: Option<Version>,
    declared_range: Option<VersionRange>,
    declared_version: Version,
    primary_ranges: Vec<VersionRange>,
    competing: Vec<CompetingRequirement>,
}

type Lookup<T> = std::result::Result<T, SkippedLookup>;

fn skipped(package: &str, error: Error) -> SkippedLookup {
    let reason = match error {
        Error::RegistryLookup { reason, .. } => reason,
        other => other.to_string(),
    };
    warn!("Skipping {} in conflict analysis: {}", package, reason);
    SkippedLookup {
        package: package.to_string(),
        reason,
    }
}

/// Whether an existing override pin already satisfies every range
fn override_satisfies(pinned: &str, ranges: &[VersionRange]) -> bool {
    let version = Version::parse(pinned.trim_start_matches('='))
        .ok()
        .or_else(|| VersionRange::parse(pinned).ok().and_then(|r| r.min_version()));
    version.is_some_and(|v| ranges.iter().all(|r| r.satisfies(&v)))
}

fn describe_requirements(requirers: &[String], ranges: &[VersionRange]) -> String {
    requirers
        .iter()
        .zip(ranges)
        .map(|(name, range)| format!("{} ({})", name, range))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct ConflictResolver<'a> {
    ctx: &'a ProjectContext,
    registry: &'a dyn RegistryClient,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(ctx: &'a ProjectContext, registry: &'a dyn RegistryClient) -> Self {
        Self { ctx, registry }
    }

    /// Analyse the conflicts a step's requirements would cause
    pub fn analyze(
        &self,
        requirements: &[DependencyRequirement],
        manifest: &dyn ManifestEditor,
    ) -> Result<ResolutionPlan> {
        let deps = manifest.read_dependencies()?;
        let existing_overrides = manifest.overrides()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.ctx.config.registry_concurrency)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create lookup pool: {}", e)))?;

        let mut skipped_lookups = Vec::new();

        let targets: Vec<Lookup<ResolvedPackage>> = pool.install(|| {
            requirements
                .par_iter()
                .map(|req| self.resolve_target(req))
                .collect()
        });
        let targets: Vec<ResolvedPackage> = targets
            .into_iter()
            .filter_map(|t| t.map_err(|s| skipped_lookups.push(s)).ok())
            .collect();

        // Primary ranges per peer package, grouped across requesters
        let mut primary: BTreeMap<String, Vec<(String, VersionRange)>> = BTreeMap::new();
        for target in &targets {
            for (peer, range) in target.peers.iter() {
                if deps.declared(peer).is_none() && target.peers.is_optional(peer) {
                    debug!("Optional peer {} of {} is not declared", peer, target.name);
                    continue;
                }
                primary
                    .entry(peer.clone())
                    .or_default()
                    .push((target.name.clone(), range.clone()));
            }
        }
        if primary.is_empty() {
            debug!("No peer requirements to check");
            return Ok(ResolutionPlan::from_conflicts(Vec::new(), skipped_lookups));
        }

        let target_names: HashSet<&str> = requirements.iter().map(|r| r.name.as_str()).collect();
        let owner_names: Vec<&String> = deps
            .names()
            .filter(|name| !target_names.contains(name.as_str()))
            .collect();
        let owners: Vec<Lookup<Option<ResolvedPackage>>> = pool.install(|| {
            owner_names
                .par_iter()
                .map(|name| self.resolve_owner(name, &deps, manifest))
                .collect()
        });
        let owners: Vec<ResolvedPackage> = owners
            .into_iter()
            .filter_map(|o| o.map_err(|s| skipped_lookups.push(s)).ok().flatten())
            .collect();

        let candidates: Vec<Candidate> = primary
            .into_iter()
            .filter_map(|(package, requesters)| {
                self.detect(package, requesters, &deps, &existing_overrides, &owners, manifest)
            })
            .collect();

        let versions: Vec<Result<Vec<Version>>> = pool.install(|| {
            candidates
                .par_iter()
                .map(|c| self.registry.versions(&c.package))
                .collect()
        });

        let mut conflicts = Vec::new();
        for (candidate, versions) in candidates.into_iter().zip(versions) {
            match versions {
                Ok(versions) => conflicts.push(Self::choose_strategy(
                    candidate,
                    &versions,
                    self.ctx.supports_overrides(),
                )),
                Err(e) => skipped_lookups.push(skipped(&candidate.package, e)),
            }
        }

        for conflict in &conflicts {
            info!("Conflict: {}", conflict);
        }
        Ok(ResolutionPlan::from_conflicts(conflicts, skipped_lookups))
    }

    fn resolve_target(&self, req: &DependencyRequirement) -> Lookup<ResolvedPackage> {
        let versions = self
            .registry
            .versions(&req.name)
            .map_err(|e| skipped(&req.name, e))?;
        let version = versions
            .into_iter()
            .find(|v| req.range.satisfies(v))
            .ok_or_else(|| SkippedLookup {
                package: req.name.clone(),
                reason: format!("no published version satisfies {}", req.range),
            })?;
        let peers = self
            .registry
            .peer_requirements(&req.name, &version)
            .map_err(|e| skipped(&req.name, e))?;

        debug!("{} resolves to {} ({} peer(s))", req.name, version, peers.len());
        Ok(ResolvedPackage {
            name: req.name.clone(),
            peers,
        })
    }

    /// Peers of a dependency the step leaves alone; `None` for non-registry specs
    fn resolve_owner(
        &self,
        name: &str,
        deps: &DependencySet,
        manifest: &dyn ManifestEditor,
    ) -> Lookup<Option<ResolvedPackage>> {
        let Some(range) = deps.declared_range(name) else {
            return Ok(None);
        };

        let version = match manifest.installed_version(name) {
            Some(installed) => installed,
            None => {
                let versions = self.registry.versions(name).map_err(|e| skipped(name, e))?;
                match versions.into_iter().find(|v| range.satisfies(v)) {
                    Some(v) => v,
                    None => return Ok(None),
                }
            }
        };

        let peers = self
            .registry
            .peer_requirements(name, &version)
            .map_err(|e| skipped(name, e))?;
        Ok(Some(ResolvedPackage {
            name: name.to_string(),
            peers,
        }))
    }

    fn detect(
        &self,
        package: String,
        requesters: Vec<(String, VersionRange)>,
        deps: &DependencySet,
        existing_overrides: &BTreeMap<String, String>,
        owners: &[ResolvedPackage],
        manifest: &dyn ManifestEditor,
    ) -> Option<Candidate> {
        let Some(declared) = deps.declared(&package) else {
            debug!("{} is not declared; nothing to reconcile", package);
            return None;
        };
        let declared_range = VersionRange::parse(declared.range).ok();
        let declared_version = declared_range.as_ref().and_then(|r| r.min_version())?;

        let (required_by, primary_ranges): (Vec<String>, Vec<VersionRange>) =
            requesters.into_iter().unzip();
        if primary_ranges.iter().all(|r| r.satisfies(&declared_version)) {
            return None;
        }

        if let Some(pinned) = existing_overrides.get(&package)
            && override_satisfies(pinned, &primary_ranges)
        {
            debug!("{} is already pinned to {} by an override", package, pinned);
            return None;
        }

        let mut competing: Vec<CompetingRequirement> = owners
            .iter()
            .filter(|o| o.name != package)
            .filter_map(|o| {
                o.peers.get(&package).map(|range| CompetingRequirement {
                    owner: o.name.clone(),
                    range: range.clone(),
                    satisfied: primary_ranges.iter().all(|p| p.intersects(range)),
                })
            })
            .collect();

        // Targets requesting the same peer compete with one another
        if required_by.len() > 1 {
            competing.extend(required_by.iter().zip(&primary_ranges).map(|(owner, range)| {
                CompetingRequirement {
                    owner: owner.clone(),
                    range: range.clone(),
                    satisfied: primary_ranges.iter().all(|p| p.intersects(range)),
                }
            }));
        }

        // Only a failing direct check plus an incompatible owner is a conflict
        if competing.iter().all(|c| c.satisfied) {
            return None;
        }

        Some(Candidate {
            installed_version: manifest.installed_version(&package),
            package,
            required_by,
            declared_range,
            declared_version,
            primary_ranges,
            competing,
        })
    }

    fn choose_strategy(
        candidate: Candidate,
        versions: &[Version],
        supports_overrides: bool,
    ) -> ConflictRecord {
        let Candidate {
            package,
            required_by,
            installed_version,
            declared_range,
            declared_version,
            primary_ranges,
            competing,
        } = candidate;

        let requirements = describe_requirements(&required_by, &primary_ranges);
        let owners: Vec<&str> = competing
            .iter()
            .filter(|c| !c.satisfied)
            .map(|c| c.owner.as_str())
            .collect();
        let owner_requirements = competing
            .iter()
            .filter(|c| !c.satisfied)
            .map(|c| format!("{} ({})", c.owner, c.range))
            .collect::<Vec<_>>()
            .join(", ");

        let intersection = versions.iter().find(|v| {
            primary_ranges.iter().all(|r| r.satisfies(v))
                && competing.iter().all(|c| c.range.satisfies(v))
        });

        let (strategy, recommended_version, reasoning) = if let Some(version) = intersection {
            let baseline = installed_version.as_ref().unwrap_or(&declared_version);
            let strategy = if version < baseline {
                Strategy::Downgrade
            } else {
                Strategy::Upgrade
            };
            let reasoning = format!(
                "{}@{} satisfies {} and {}",
                package, version, requirements, owner_requirements
            );
            (strategy, Some(version.clone()), reasoning)
        } else if supports_overrides
            && let Some(version) = versions
                .iter()
                .find(|v| primary_ranges.iter().all(|r| r.satisfies(v)))
        {
            let reasoning = format!(
                "No version of {} satisfies both {} and {}; overriding to {}",
                package, requirements, owner_requirements, version
            );
            (Strategy::Override, Some(version.clone()), reasoning)
        } else {
            let reasoning = format!(
                "No version of {} satisfies both {} and {}; upgrade or remove {} before continuing",
                package,
                requirements,
                owner_requirements,
                owners.join(", ")
            );
            (Strategy::Manual, None, reasoning)
        };

        ConflictRecord {
            package,
            required_by,
            installed_version,
            declared_range,
            primary_ranges,
            competing,
            strategy,
            recommended_version,
            reasoning,
        }
    }

    /// Write a plan's updates and overrides to the manifest
    ///
    /// Returns a description of every change made. Applying the same plan
    /// twice leaves the manifest unchanged the second time.
    pub fn apply_plan(&self, plan: &ResolutionPlan, manifest: &dyn ManifestEditor) -> Result<Vec<String>> {
        let deps = manifest.read_dependencies()?;
        let edits = plan_edits(plan, &deps);
        manifest.write_dependencies(&edits)?;
        manifest.add_overrides(&plan.overrides)?;

        let mut applied: Vec<String> = edits.iter().map(ManifestEdit::describe).collect();
        applied.extend(
            plan.overrides
                .iter()
                .map(|(name, version)| format!("override {}@{}", name, version)),
        );
        Ok(applied)
    }
}

/// Manifest edits for a plan's upgrades (caret) and downgrades (exact)
pub fn plan_edits(plan: &ResolutionPlan, deps: &DependencySet) -> Vec<ManifestEdit> {
    plan.conflicts
        .iter()
        .filter_map(|c| {
            let version = plan.dependency_updates.get(&c.package)?;
            let range = match c.strategy {
                Strategy::Upgrade => VersionRange::caret(version),
                Strategy::Downgrade => VersionRange::exact(version),
                _ => return None,
            };
            let dev = deps.declared(&c.package).is_some_and(|d| d.dev);
            Some(ManifestEdit::new(c.package.clone(), range.to_string(), dev))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn r(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    fn candidate(competing: &str, installed: Option<&str>) -> Candidate {
        Candidate {
            package: "react".to_string(),
            required_by: vec!["react-dom".to_string()],
            installed_version: installed.map(v),
            declared_range: Some(r("^17.0.2")),
            declared_version: v("17.0.2"),
            primary_ranges: vec![r(">=17.0.0")],
            competing: vec![CompetingRequirement {
                owner: "legacy-ui".to_string(),
                range: r(competing),
                satisfied: false,
            }],
        }
    }

    fn versions() -> Vec<Version> {
        vec![v("19.0.0"), v("18.3.1"), v("18.2.0"), v("17.0.2"), v("16.14.0")]
    }

    #[test]
    fn test_intersection_picks_newest_common_version() {
        let record = ConflictResolver::choose_strategy(candidate("^18.0.0", None), &versions(), true);
        assert_eq!(record.strategy, Strategy::Upgrade);
        assert_eq!(record.recommended_version, Some(v("18.3.1")));
    }

    #[test]
    fn test_downgrade_below_installed() {
        let record =
            ConflictResolver::choose_strategy(candidate("^18.0.0", Some("19.0.0")), &versions(), true);
        assert_eq!(record.strategy, Strategy::Downgrade);
        assert_eq!(record.recommended_version, Some(v("18.3.1")));
    }

    #[test]
    fn test_override_when_no_intersection() {
        let record = ConflictResolver::choose_strategy(candidate("^15.0.0", None), &versions(), true);
        assert_eq!(record.strategy, Strategy::Override);
        assert_eq!(record.recommended_version, Some(v("19.0.0")));
    }

    #[test]
    fn test_manual_names_owners() {
        let record = ConflictResolver::choose_strategy(candidate("^15.0.0", None), &versions(), false);
        assert_eq!(record.strategy, Strategy::Manual);
        assert!(record.recommended_version.is_none());
        assert!(record.reasoning.contains("legacy-ui"));
    }

    #[test]
    fn test_override_satisfies() {
        let ranges = vec![r("^19.0.0")];
        assert!(override_satisfies("19.0.0", &ranges));
        assert!(override_satisfies("^19.0.1", &ranges));
        assert!(!override_satisfies("18.3.1", &ranges));
        assert!(!override_satisfies("github:facebook/react", &ranges));
    }
}
