//! Per-version worker settings resolved from [`AppConfig`].

use std::collections::HashSet;

use faro_core::{AppConfig, Error};
use url::Url;

use crate::classify::ClassifyRules;
use crate::fetch::canonicalize_http;

/// Everything a worker version needs, with every URL already resolved.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Bucket owned by this version, e.g. `faro-formoso-v1`.
    pub cache_name: String,
    pub origin: Url,
    pub offline_url: Url,
    /// Precache manifest in install order, without duplicates.
    pub manifest: Vec<Url>,
    pub rules: ClassifyRules,
    pub skip_waiting_on_install: bool,
}

impl WorkerSettings {
    /// Resolve a configuration into settings for one worker version.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin, the offline page or any manifest entry
    /// is not a valid http(s) URL, or if the manifest file cannot be read.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let offline_url = canonicalize_http(&origin, &config.offline_url)?;

        let mut seen = HashSet::new();
        let mut manifest = Vec::new();
        for entry in config.manifest()? {
            let url = canonicalize_http(&origin, &entry)?;
            if seen.insert(url.clone()) {
                manifest.push(url);
            }
        }

        Ok(Self {
            cache_name: config.cache_name(),
            origin,
            offline_url,
            manifest,
            rules: ClassifyRules::from_config(config),
            skip_waiting_on_install: config.skip_waiting_on_install,
        })
    }

    /// Resolve page-supplied URLs (from `CACHE_URLS`) against the origin.
    pub fn resolve_urls(&self, urls: &[String]) -> Result<Vec<Url>, Error> {
        urls.iter()
            .map(|u| canonicalize_http(&self.origin, u).map_err(Error::from))
            .collect()
    }
}
