//! Configuration file loading.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. an explicit path (e.g. `--config <path>`)
//! 2. `~/.hermod/config.toml`
//!
//! ```toml
//! [transport]
//! base_url = "https://backoffice.example.com/api"
//! timeout_secs = 30
//!
//! [cache]
//! gc_time_secs = 300
//!
//! [retry]
//! max_retries = 3
//!
//! [domains.invoices]
//! stale_time_secs = 10
//! ```
//!
//! The bearer token may live in the file or in `HERMOD_TOKEN`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::domains::Domain;
use crate::{CacheConfig, HermodError, Result, RetryPolicy};

/// Environment variable consulted when the file has no bearer token.
pub const TOKEN_ENV_VAR: &str = "HERMOD_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
    /// Per-domain overrides, keyed by domain name (e.g. `invoices`).
    #[serde(default)]
    pub domains: BTreeMap<String, DomainConfig>,
}

/// Backend connection.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Base URL every resource path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            bearer_token: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Cache-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Freshness for writes without explicit options, in milliseconds (default: 0).
    #[serde(default)]
    pub default_stale_time_ms: u64,
    /// Idle window before eviction, in seconds (default: 300).
    #[serde(default = "default_gc_time")]
    pub gc_time_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_stale_time_ms: 0,
            gc_time_secs: default_gc_time(),
        }
    }
}

fn default_gc_time() -> u64 {
    300
}

/// Retry policy for reads.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

/// Overrides for one domain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainConfig {
    #[serde(default)]
    pub stale_time_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HermodError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            HermodError::Configuration(msg) => {
                HermodError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| {
            HermodError::Configuration(format!("Failed to parse config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HermodError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hermod").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        Err(HermodError::Configuration(
            "No config file found. Create ~/.hermod/config.toml or pass --config".to_string(),
        ))
    }

    fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.transport.base_url).is_err() {
            return Err(HermodError::Configuration(format!(
                "invalid base_url: {}",
                self.transport.base_url
            )));
        }
        for name in self.domains.keys() {
            Domain::from_str(name)?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.transport.timeout_secs)
    }

    /// Bearer token from the file, falling back to `HERMOD_TOKEN`.
    pub fn bearer_token(&self) -> Option<String> {
        self.transport
            .bearer_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .max_retries(self.retry.max_retries)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .default_stale_time(Duration::from_millis(self.cache.default_stale_time_ms))
            .gc_time(Duration::from_secs(self.cache.gc_time_secs))
            .retry(self.retry_policy())
    }

    /// Overrides for `domain`, matched by key root or REST path name.
    pub fn domain(&self, domain: Domain) -> Option<&DomainConfig> {
        self.domains
            .iter()
            .find(|(name, _)| Domain::from_str(name).is_ok_and(|d| d == domain))
            .map(|(_, config)| config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.transport.timeout_secs, 30);
        assert_eq!(config.cache.gc_time_secs, 300);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.cache_config(), CacheConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml_str(
            r#"
            [transport]
            base_url = "https://backoffice.example.com/api"
            timeout_secs = 10
            bearer_token = "secret"

            [cache]
            default_stale_time_ms = 500
            gc_time_secs = 60

            [retry]
            max_retries = 1
            initial_delay_ms = 200

            [domains.invoices]
            stale_time_secs = 5

            [domains.customer-types]
            max_retries = 0
        "#,
        )
        .unwrap();

        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.bearer_token().as_deref(), Some("secret"));
        let cache = config.cache_config();
        assert_eq!(cache.default_stale_time, Duration::from_millis(500));
        assert_eq!(cache.gc_time, Duration::from_secs(60));
        assert_eq!(cache.retry.max_retries, 1);
        assert_eq!(cache.retry.initial_delay, Duration::from_millis(200));
        assert_eq!(
            config.domain(Domain::Invoices).unwrap().stale_time_secs,
            Some(5)
        );
        assert_eq!(
            config.domain(Domain::CustomerTypes).unwrap().max_retries,
            Some(0)
        );
        assert!(config.domain(Domain::ManpowerServices).is_none());
    }

    #[test]
    fn unknown_domain_is_rejected() {
        let err = Config::from_toml_str("[domains.hotels]\nstale_time_secs = 1").unwrap_err();
        assert!(matches!(err, HermodError::Configuration(_)));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = Config::from_toml_str("[transport]\nbase_url = \"not a url\"").unwrap_err();
        assert!(err.to_string().contains("invalid base_url"));
    }

    #[test]
    fn load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transport]\nbase_url = \"http://127.0.0.1:9999\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.transport.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
