// src/registry/npm.rs

//! npm registry client
//!
//! Fetches the abbreviated package document (`GET /<name>`) once per package
//! and run, then answers version and peer queries from that cached document.

use super::{sort_newest_first, PeerRequirementSet, RegistryClient};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use semver::Version;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum attempts for transient failures (timeouts, 5xx, 429)
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 500;

/// Abbreviated metadata still carries peerDependencies and is much smaller
const ACCEPT: &str = "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8";

type Document = Arc<serde_json::Value>;

/// Blocking client for an npm-compatible registry
pub struct NpmRegistry {
    client: Client,
    base_url: String,
    max_retries: u32,
    documents: Mutex<HashMap<String, Document>>,
}

impl NpmRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("upstep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: MAX_RETRIES,
            documents: Mutex::new(HashMap::new()),
        })
    }

    /// URL of a package document; scoped names keep their `@` but escape `/`
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.replace('/', "%2f"))
    }

    fn document(&self, name: &str) -> Result<Document> {
        if let Some(doc) = self.cached(name) {
            return Ok(doc);
        }

        let doc = Arc::new(self.fetch(name)?);
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), doc.clone());
        Ok(doc)
    }

    fn cached(&self, name: &str) -> Option<Document> {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    fn fetch(&self, name: &str) -> Result<serde_json::Value> {
        let url = self.package_url(name);
        debug!("Fetching registry document {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.client.get(&url).header("Accept", ACCEPT).send();

            let retry_reason = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().map_err(|e| {
                            Error::registry(name, format!("invalid JSON document: {e}"))
                        });
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(Error::registry(name, "package not found"));
                    }
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        return Err(Error::registry(name, format!("HTTP {}", status)));
                    }
                    format!("HTTP {}", status)
                }
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(Error::registry(
                    name,
                    format!("{} after {} attempts", retry_reason, attempt),
                ));
            }
            warn!(
                "Registry lookup for {} failed ({}), retrying...",
                name, retry_reason
            );
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
        }
    }
}

impl RegistryClient for NpmRegistry {
    fn versions(&self, name: &str) -> Result<Vec<Version>> {
        let doc = self.document(name)?;
        let versions = doc
            .get("versions")
            .and_then(|v| v.as_object())
            .ok_or_else(|| Error::registry(name, "document has no versions object"))?;

        // Unparseable historical versions are skipped, not fatal
        let parsed = versions
            .keys()
            .filter_map(|v| Version::parse(v).ok())
            .collect();
        Ok(sort_newest_first(parsed))
    }

    fn peer_requirements(&self, name: &str, version: &Version) -> Result<PeerRequirementSet> {
        let doc = self.document(name)?;
        let version_doc = doc
            .get("versions")
            .and_then(|v| v.get(version.to_string()))
            .ok_or_else(|| Error::registry(name, format!("version {} not published", version)))?;
        PeerRequirementSet::from_version_document(name, version_doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_url_escapes_scope() {
        let registry = NpmRegistry::new("https://registry.npmjs.org/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            registry.package_url("@types/react"),
            "https://registry.npmjs.org/@types%2freact"
        );
        assert_eq!(registry.package_url("react"), "https://registry.npmjs.org/react");
    }

    #[test]
    fn test_cached_document_answers_queries() {
        let registry = NpmRegistry::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let doc = serde_json::json!({
            "name": "react-dom",
            "versions": {
                "18.3.1": { "peerDependencies": { "react": "^18.3.1" } },
                "19.0.0": { "peerDependencies": { "react": "^19.0.0" } },
                "not-a-version": {}
            }
        });
        registry
            .documents
            .lock()
            .unwrap()
            .insert("react-dom".to_string(), Arc::new(doc));

        let versions = registry.versions("react-dom").unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].to_string(), "19.0.0");

        let peers = registry
            .peer_requirements("react-dom", &Version::parse("18.3.1").unwrap())
            .unwrap();
        assert_eq!(peers.get("react").unwrap().to_string(), "^18.3.1");

        assert!(registry
            .peer_requirements("react-dom", &Version::parse("1.0.0").unwrap())
            .is_err());
    }
}
