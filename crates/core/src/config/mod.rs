//! Worker configuration with layered loading.
//!
//! Configuration is loaded once at startup using figment and then shared
//! immutably. Sources, highest precedence first:
//!
//! 1. Environment variables (SHIELD_SW_*)
//! 2. TOML config file (if SHIELD_SW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

pub mod routes;
mod validation;

pub use routes::{RouteMatch, RouteRule, RouteTable, Strategy};
pub use validation::ConfigError;

/// Critical assets fetched and stored during setup.
pub const DEFAULT_MANIFEST: &[&str] =
    &["/motorista", "/termos", "/static/style.css", "/static/manifest.json", "/static/logo.png"];

/// Worker configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Version tag; also the name of this version's cache store.
    ///
    /// Set via SHIELD_SW_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// The application's own origin. Requests to any other origin pass through.
    ///
    /// Set via SHIELD_SW_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Asset paths stored during setup, in order.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Route classification table.
    #[serde(default)]
    pub routes: RouteTable,

    /// Answer a network-first double miss with the offline response instead
    /// of propagating the network error.
    ///
    /// Set via SHIELD_SW_API_OFFLINE_FALLBACK environment variable.
    #[serde(default = "default_true")]
    pub api_offline_fallback: bool,

    /// Path to the SQLite cache database.
    ///
    /// Set via SHIELD_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body bytes accepted from the network.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_version() -> String {
    "driver-shield-360-v1".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./driver-shield-cache.sqlite")
}

fn default_user_agent() -> String {
    "driver-shield-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            manifest: default_manifest(),
            routes: RouteTable::default(),
            api_offline_fallback: true,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl WorkerConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL with a host".into() }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHIELD_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHIELD_SW_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.version, "driver-shield-360-v1");
        assert_eq!(config.origin, "http://127.0.0.1:5000");
        assert_eq!(config.manifest.len(), 5);
        assert_eq!(config.manifest[0], "/motorista");
        assert!(config.api_offline_fallback);
        assert_eq!(config.db_path, PathBuf::from("./driver-shield-cache.sqlite"));
        assert_eq!(config.user_agent, "driver-shield-sw/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.routes, RouteTable::default());
    }

    #[test]
    fn test_timeout_duration() {
        let config = WorkerConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_origin_url() {
        let config = WorkerConfig::default();
        let origin = config.origin_url().unwrap();
        assert_eq!(origin.port(), Some(5000));

        let bad = WorkerConfig { origin: "ftp://example.com".into(), ..Default::default() };
        assert!(matches!(bad.origin_url(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_from_env_and_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "worker.toml",
                r#"
                version = "driver-shield-360-v2"
                manifest = ["/static/style.css"]

                [routes]
                default = "passthrough"

                [[routes.rules]]
                strategy = "cache_first"
                match = { prefix = "/static/" }
                "#,
            )?;
            jail.set_env("SHIELD_SW_CONFIG_FILE", "worker.toml");
            jail.set_env("SHIELD_SW_API_OFFLINE_FALLBACK", "false");
            jail.set_env("SHIELD_SW_VERSION", "driver-shield-360-v3");

            let config = WorkerConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.version, "driver-shield-360-v3");
            assert_eq!(config.manifest, vec!["/static/style.css".to_string()]);
            assert_eq!(config.routes, RouteTable::static_only());
            assert!(!config.api_offline_fallback);
            Ok(())
        });
    }
}
