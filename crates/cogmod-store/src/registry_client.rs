//! Registry client — the public index mapping module names to sources.
//!
//! Cache-first: once the cache file exists it is returned unconditionally,
//! with no TTL or freshness check. Deleting the cache file (or passing
//! `use_cache = false`) is the only invalidation. Fetch failures degrade to
//! an empty index carrying an error marker — registry availability is
//! advisory, never required for installed modules to run.

use crate::manifest::write_atomic;
use cogmod_core::{registry_cache_path, Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    #[serde(default)]
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryIndex {
    #[serde(default)]
    pub modules: BTreeMap<String, RegistryEntry>,
    /// Set when the index could not be fetched or parsed; an empty index
    /// with an error means "no modules available", not a hard failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegistryIndex {
    fn degraded(message: impl Into<String>) -> Self {
        Self {
            modules: BTreeMap::new(),
            error: Some(message.into()),
        }
    }
}

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub name: String,
    pub description: String,
    pub source: String,
    pub version: String,
}

pub struct RegistryClient {
    client: Client,
    index_url: String,
    cache_path: PathBuf,
}

impl RegistryClient {
    pub fn new(index_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            index_url: index_url.into(),
            cache_path: registry_cache_path(),
        }
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Fetch the index: cache copy if present and `use_cache`, otherwise the
    /// network with a short timeout. Never returns an Err — failures degrade.
    pub async fn fetch(&self, use_cache: bool) -> RegistryIndex {
        if use_cache {
            if let Ok(text) = std::fs::read_to_string(&self.cache_path) {
                match serde_json::from_str::<RegistryIndex>(&text) {
                    Ok(index) => {
                        debug!("registry index from cache ({})", self.cache_path.display());
                        return index;
                    }
                    Err(e) => warn!("ignoring corrupt registry cache: {e}"),
                }
            }
        }

        let body = match self.fetch_remote().await {
            Ok(body) => body,
            Err(e) => {
                warn!("registry fetch failed: {e}");
                return RegistryIndex::degraded(e.to_string());
            }
        };

        let index = match serde_json::from_str::<RegistryIndex>(&body) {
            Ok(index) => index,
            Err(e) => {
                warn!("registry index did not parse: {e}");
                return RegistryIndex::degraded(format!("invalid registry index: {e}"));
            }
        };

        // Best-effort cache write; a read-only home dir must not break fetch.
        if let Err(e) = write_atomic(&self.cache_path, body.as_bytes()) {
            warn!("could not write registry cache: {e}");
        }

        index
    }

    async fn fetch_remote(&self) -> Result<String> {
        debug!("fetching registry index from {}", self.index_url);
        let response = self
            .client
            .get(&self.index_url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::acquisition(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::acquisition(format!(
                "registry returned {status} for {}",
                self.index_url
            )));
        }
        response
            .text()
            .await
            .map_err(|e| Error::acquisition(e.to_string()))
    }

    /// Case-insensitive substring search over names and descriptions, in
    /// index order.
    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        let index = self.fetch(true).await;
        let needle = query.to_lowercase();
        index
            .modules
            .into_iter()
            .filter(|(name, entry)| {
                name.to_lowercase().contains(&needle)
                    || entry.description.to_lowercase().contains(&needle)
            })
            .map(|(name, entry)| SearchHit {
                name,
                description: entry.description,
                source: entry.source,
                version: entry.version,
            })
            .collect()
    }

    /// Resolve a bare module name to its registry entry. NotFound when the
    /// index has no such module; the fetch error, when present, is folded
    /// into the message so callers can see why the index was empty.
    pub async fn resolve(&self, name: &str) -> Result<RegistryEntry> {
        let index = self.fetch(true).await;
        match index.modules.get(name) {
            Some(entry) => Ok(entry.clone()),
            None => match index.error {
                Some(e) => Err(Error::not_found(format!(
                    "registry entry '{name}' (registry unavailable: {e})"
                ))),
                None => Err(Error::not_found(format!("registry entry '{name}'"))),
            },
        }
    }
}
