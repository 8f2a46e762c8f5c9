//! Versioned precache manifest and cache-generation naming.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CacheError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheManifest {
    /// Deployed version tag, embedded in every cache name.
    pub version: String,
    /// Cache-name prefix.
    pub prefix: String,
    /// Origin the app is served from; only same-origin requests are cached.
    pub origin: String,
    /// Page opened when a notification is clicked and no window is open.
    pub start_url: String,
    /// Served for HTML requests when cache and network both miss.
    pub offline_page: String,
    /// Paths fetched and stored at install time.
    pub assets: Vec<String>,
    /// Hosts never intercepted (remote backend, CDNs). A leading `.`
    /// matches any subdomain.
    pub passthrough_hosts: Vec<String>,
    /// Per-asset fetch budget during install.
    pub install_timeout_ms: u64,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            prefix: "questlog".to_string(),
            origin: "http://localhost:8080".to_string(),
            start_url: "/".to_string(),
            offline_page: "/offline.html".to_string(),
            assets: [
                "/",
                "/index.html",
                "/offline.html",
                "/manifest.json",
                "/css/styles.css",
                "/js/app.js",
                "/js/dataService.js",
                "/js/migration.js",
                "/icons/icon-192.png",
                "/icons/icon-512.png",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            passthrough_hosts: vec![
                ".firebaseio.com".to_string(),
                ".googleapis.com".to_string(),
                "www.gstatic.com".to_string(),
                "cdnjs.cloudflare.com".to_string(),
            ],
            install_timeout_ms: 15_000,
        }
    }
}

impl CacheManifest {
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-{}", self.prefix, self.version)
    }

    pub fn runtime_cache_name(&self) -> String {
        format!("{}-dynamic-{}", self.prefix, self.version)
    }

    /// Whether `name` belongs to the current generation.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_cache_name() || name == self.runtime_cache_name()
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_millis(self.install_timeout_ms)
    }

    pub fn origin_url(&self) -> Result<Url, CacheError> {
        Url::parse(&self.origin).map_err(|_| CacheError::InvalidUrl(self.origin.clone()))
    }

    /// Absolute URL for a manifest path.
    pub fn resolve(&self, path: &str) -> Result<Url, CacheError> {
        self.origin_url()?
            .join(path)
            .map_err(|_| CacheError::InvalidUrl(path.to_string()))
    }

    pub fn is_passthrough_host(&self, host: &str) -> bool {
        self.passthrough_hosts.iter().any(|h| match h.strip_prefix('.') {
            Some(domain) => host == domain || host.ends_with(h.as_str()),
            None => host == h,
        })
    }
}
