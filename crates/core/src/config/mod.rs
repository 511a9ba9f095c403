//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FARO_SW_*)
//! 2. TOML config file (if FARO_SW_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The precache manifest and the host rules live here rather than in the
//! worker, so the asset list can change without touching the manager.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FARO_SW_*)
/// 2. TOML config file (if FARO_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache storage database.
    ///
    /// Set via FARO_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the worker is registered for. Relative manifest URLs resolve
    /// against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Bucket name prefix.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag embedded in the bucket name. Bump it to ship a new worker.
    ///
    /// Set via FARO_SW_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Page served to navigations that are both offline and uncached.
    #[serde(default = "default_offline_url")]
    pub offline_url: String,

    /// URLs fetched and stored at install time.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Optional JSON file holding an array of extra manifest URLs.
    #[serde(default)]
    pub manifest_file: Option<PathBuf>,

    /// Path suffixes treated as static assets.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Path prefixes treated as static assets.
    #[serde(default = "default_static_prefixes")]
    pub static_prefixes: Vec<String>,

    /// Map tile hosts. A leading `.` makes the entry a suffix rule.
    #[serde(default = "default_tile_hosts")]
    pub tile_hosts: Vec<String>,

    /// Third-party CDN hosts.
    #[serde(default = "default_cdn_hosts")]
    pub cdn_hosts: Vec<String>,

    /// Live-data API hosts that must never be cached.
    #[serde(default = "default_api_hosts")]
    pub api_hosts: Vec<String>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via FARO_SW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Ask to skip the waiting phase as soon as install succeeds.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Seconds between update checks. 0 disables polling.
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./faro-sw-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:5173".into()
}

fn default_cache_prefix() -> String {
    "faro-formoso".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_offline_url() -> String {
    "/offline.html".into()
}

fn default_precache() -> Vec<String> {
    [
        // app shell
        "/",
        "/index.html",
        "/offline.html",
        "/css/style.css",
        "/css/accessibility.css",
        "/js/main.js",
        "/js/accessibility.js",
        "/js/favorites.js",
        "/js/search.js",
        "/js/dados-api.js",
        // pages
        "/transportes.html",
        "/saude.html",
        "/ambiente.html",
        "/lazer.html",
        "/restaurantes.html",
        "/hoteis.html",
        "/oque-fazer-hoje.html",
        "/mapa.html",
        "/problemas-frequentes.html",
        "/viver-em-faro.html",
        "/mobilidade.html",
        "/historia-faro.html",
        "/favoritos.html",
        // page scripts
        "/js/mapa.js",
        "/js/hoteis.js",
        "/js/restaurantes.js",
        "/js/mobilidade.js",
        // data
        "/data/hoteis.json",
        "/data/restaurantes.json",
        "/data/municipio-faro.json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_static_extensions() -> Vec<String> {
    vec![".css".into(), ".js".into(), ".json".into()]
}

fn default_static_prefixes() -> Vec<String> {
    vec!["/css/".into(), "/js/".into(), "/data/".into()]
}

fn default_tile_hosts() -> Vec<String> {
    vec!["a.tile.openstreetmap.org".into(), "b.tile.openstreetmap.org".into(), "c.tile.openstreetmap.org".into()]
}

fn default_cdn_hosts() -> Vec<String> {
    vec!["unpkg.com".into(), "cdnjs.cloudflare.com".into()]
}

fn default_api_hosts() -> Vec<String> {
    vec!["overpass-api.de".into()]
}

fn default_user_agent() -> String {
    "faro-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_update_interval_secs() -> u64 {
    900
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            offline_url: default_offline_url(),
            precache: default_precache(),
            manifest_file: None,
            static_extensions: default_static_extensions(),
            static_prefixes: default_static_prefixes(),
            tile_hosts: default_tile_hosts(),
            cdn_hosts: default_cdn_hosts(),
            api_hosts: default_api_hosts(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            skip_waiting_on_install: true,
            update_interval_secs: default_update_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Update polling interval, `None` when polling is disabled.
    pub fn update_interval(&self) -> Option<Duration> {
        (self.update_interval_secs > 0).then(|| Duration::from_secs(self.update_interval_secs))
    }

    /// Name of the bucket this version writes into.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FARO_SW_`
    /// 2. TOML file from `FARO_SW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FARO_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FARO_SW_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The full manifest: `precache` followed by the entries of
    /// `manifest_file`, deduplicated in order. The offline page is appended
    /// when neither source lists it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadFailed` if the manifest file cannot be read
    /// or is not a JSON array of strings.
    pub fn manifest(&self) -> Result<Vec<String>, ConfigError> {
        let mut urls = self.precache.clone();

        if let Some(path) = &self.manifest_file {
            urls.extend(read_manifest_file(path)?);
        }

        let mut seen = std::collections::HashSet::new();
        urls.retain(|u| seen.insert(u.clone()));

        if !urls.iter().any(|u| u == &self.offline_url) {
            tracing::warn!(offline_url = %self.offline_url, "offline page missing from manifest; adding it");
            urls.push(self.offline_url.clone());
        }

        Ok(urls)
    }
}

fn read_manifest_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::LoadFailed(format!("manifest file {}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::LoadFailed(format!("manifest file {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./faro-sw-cache.sqlite"));
        assert_eq!(config.cache_name(), "faro-formoso-v1");
        assert_eq!(config.offline_url, "/offline.html");
        assert_eq!(config.user_agent, "faro-sw/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.precache.len(), 30);
        assert!(config.skip_waiting_on_install);
        assert!(config.manifest_file.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_update_interval() {
        let config = AppConfig::default();
        assert_eq!(config.update_interval(), Some(Duration::from_secs(900)));

        let config = AppConfig { update_interval_secs: 0, ..Default::default() };
        assert_eq!(config.update_interval(), None);
    }

    #[test]
    fn test_manifest_adds_offline_page() {
        let config = AppConfig { precache: vec!["/index.html".into()], ..Default::default() };
        let manifest = config.manifest().unwrap();
        assert_eq!(manifest, vec!["/index.html".to_string(), "/offline.html".to_string()]);
    }

    #[test]
    fn test_manifest_dedupes() {
        let config = AppConfig {
            precache: vec!["/index.html".into(), "/offline.html".into(), "/index.html".into()],
            ..Default::default()
        };
        assert_eq!(config.manifest().unwrap().len(), 2);
    }

    #[test]
    fn test_manifest_file_is_appended() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("manifest.json", r#"["/extra.json", "/index.html"]"#)?;
            let config = AppConfig {
                precache: vec!["/index.html".into(), "/offline.html".into()],
                manifest_file: Some(PathBuf::from("manifest.json")),
                ..Default::default()
            };
            let manifest = config.manifest().unwrap();
            assert_eq!(manifest, vec!["/index.html", "/offline.html", "/extra.json"]);
            Ok(())
        });
    }

    #[test]
    fn test_manifest_file_invalid() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("manifest.json", r#"{"urls": []}"#)?;
            let config = AppConfig { manifest_file: Some(PathBuf::from("manifest.json")), ..Default::default() };
            assert!(matches!(config.manifest(), Err(ConfigError::LoadFailed(_))));
            Ok(())
        });
    }

    #[test]
    fn test_load_layers_env_over_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("faro.toml", "cache_version = \"v2\"\noffline_url = \"/sem-rede.html\"")?;
            jail.set_env("FARO_SW_CONFIG_FILE", "faro.toml");
            jail.set_env("FARO_SW_CACHE_VERSION", "v3");

            let config = AppConfig::load().unwrap();
            assert_eq!(config.cache_name(), "faro-formoso-v3");
            assert_eq!(config.offline_url, "/sem-rede.html");
            Ok(())
        });
    }
}
