// src/resolver/mod.rs

//! Peer dependency conflict resolution
//!
//! For each step the resolver works out which packages the step's new
//! versions will fight over, picks a strategy for each (upgrade, downgrade,
//! override or manual) and applies the result to the manifest.

mod conflict;
mod engine;
mod plan;

pub use conflict::{CompetingRequirement, ConflictRecord, SkippedLookup, Strategy};
pub use engine::{plan_edits, ConflictResolver};
pub use plan::ResolutionPlan;
