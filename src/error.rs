// src/error.rs

//! Error taxonomy for upgrade runs
//!
//! Only `NoPathError`, an unresolved `ConflictUnresolved` and a post-retry
//! `InstallFailure` stop forward progress. Every other variant is turned into
//! an [`Issue`](crate::issue::Issue) by the component that observes it.

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// No step is defined between two adjacent versions
    #[error("No upgrade path: no step defined from {from} to {to}")]
    NoPathError { from: u64, to: u64 },

    /// Chain bounds are equal or inverted
    #[error("Invalid upgrade chain: {0}")]
    InvalidChain(String),

    #[error("Unresolved dependency conflicts: {0}")]
    ConflictUnresolved(String),

    #[error("Install failed: {0}")]
    InstallFailure(String),

    #[error("Task failed: {0}")]
    TaskFailure(String),

    #[error("Backup failed: {0}")]
    BackupFailure(String),

    #[error("Registry lookup failed for {package}: {reason}")]
    RegistryLookup { package: String, reason: String },

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("Invalid version range: {0}")]
    RangeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transform failed: {0}")]
    TransformError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl Error {
    /// Shorthand for a registry failure on one package
    pub fn registry(package: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::RegistryLookup {
            package: package.into(),
            reason: reason.into(),
        }
    }
}
