//! Request classification.
//!
//! Every intercepted request maps to exactly one [`ResourceClass`]. Rules are
//! checked in a fixed priority order, so a CDN-hosted `.js` file is a static
//! asset, not a CDN resource.

use std::fmt;

use faro_core::{AppConfig, Request};
use serde::Serialize;

/// Resource class of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Navigation,
    StaticAsset,
    MapTile,
    ExternalCdn,
    ExternalApi,
    Default,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceClass::Navigation => "navigation",
            ResourceClass::StaticAsset => "static_asset",
            ResourceClass::MapTile => "map_tile",
            ResourceClass::ExternalCdn => "external_cdn",
            ResourceClass::ExternalApi => "external_api",
            ResourceClass::Default => "default",
        };
        f.write_str(s)
    }
}

/// A set of host patterns.
///
/// `example.org` matches that host exactly. `.example.org` matches the host
/// itself and every subdomain.
#[derive(Debug, Clone, Default)]
pub struct HostSet {
    exact: Vec<String>,
    suffixes: Vec<String>,
}

impl HostSet {
    pub fn from_patterns(patterns: &[String]) -> Self {
        let mut set = Self::default();
        for pattern in patterns {
            let pattern = pattern.trim().to_ascii_lowercase();
            if pattern.is_empty() {
                continue;
            }
            if pattern.starts_with('.') {
                set.suffixes.push(pattern);
            } else {
                set.exact.push(pattern);
            }
        }
        set
    }

    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.exact.iter().any(|h| *h == host)
            || self
                .suffixes
                .iter()
                .any(|s| host.ends_with(s.as_str()) || host == s[1..])
    }
}

/// Classification rules, built once per worker version.
#[derive(Debug, Clone, Default)]
pub struct ClassifyRules {
    static_extensions: Vec<String>,
    static_prefixes: Vec<String>,
    tile_hosts: HostSet,
    cdn_hosts: HostSet,
    api_hosts: HostSet,
}

impl ClassifyRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            static_extensions: config.static_extensions.clone(),
            static_prefixes: config.static_prefixes.clone(),
            tile_hosts: HostSet::from_patterns(&config.tile_hosts),
            cdn_hosts: HostSet::from_patterns(&config.cdn_hosts),
            api_hosts: HostSet::from_patterns(&config.api_hosts),
        }
    }

    fn is_static_path(&self, path: &str) -> bool {
        self.static_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
            || self.static_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Classify an HTTP(S) request. Highest-priority match wins.
    pub fn classify(&self, request: &Request) -> ResourceClass {
        if request.wants_html() {
            return ResourceClass::Navigation;
        }

        if self.is_static_path(request.url.path()) {
            return ResourceClass::StaticAsset;
        }

        let host = request.url.host_str().unwrap_or_default();
        if self.tile_hosts.matches(host) {
            ResourceClass::MapTile
        } else if self.cdn_hosts.matches(host) {
            ResourceClass::ExternalCdn
        } else if self.api_hosts.matches(host) {
            ResourceClass::ExternalApi
        } else {
            ResourceClass::Default
        }
    }
}
