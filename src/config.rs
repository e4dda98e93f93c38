//! Configuration management for RateGuard.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RateguardError, Result};
use crate::ratelimit::LimiterConfig;

/// Prefix of environment variables overriding file configuration.
pub const ENV_PREFIX: &str = "RATEGUARD";

/// Main configuration for the RateGuard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateguardConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Audit log configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// API key allow-list
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Service name reported in logs
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Address the HTTP server binds to
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Prefix of the rate limited API routes
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            http_addr: default_http_addr(),
            api_prefix: default_api_prefix(),
        }
    }
}

fn default_app_name() -> String {
    "RateGuard API".to_string()
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

/// What the pipeline does when the counter store is unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Reject the request as service unavailable
    #[default]
    FailClosed,
    /// Let the request through without a remaining-quota value
    FailOpen,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests allowed per identity within one window
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests allowed per origin, defaults to `limit`
    #[serde(default)]
    pub origin_limit: Option<u64>,

    /// Origin window length in seconds, defaults to `window_secs`
    #[serde(default)]
    pub origin_window_secs: Option<u64>,

    /// Upper bound on one counter store round trip in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Behaviour when the counter store cannot be reached
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_secs: default_window_secs(),
            origin_limit: None,
            origin_window_secs: None,
            store_timeout_ms: default_store_timeout_ms(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_limit() -> u64 {
    60
}

fn default_window_secs() -> u64 {
    60
}

fn default_store_timeout_ms() -> u64 {
    1000
}

impl RateLimitingConfig {
    /// Validated limiter configuration for the identity dimension.
    pub fn identity_limiter_config(&self) -> Result<LimiterConfig> {
        LimiterConfig::per_secs(self.limit, self.window_secs)
    }

    /// Validated limiter configuration for the origin dimension.
    pub fn origin_limiter_config(&self) -> Result<LimiterConfig> {
        LimiterConfig::per_secs(
            self.origin_limit.unwrap_or(self.limit),
            self.origin_window_secs.unwrap_or(self.window_secs),
        )
    }

    /// Store round trip timeout.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Counter store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store
    Memory,
    /// Redis shared by every instance
    #[default]
    Redis,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend holds window entries
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix applied to every Redis key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_key_prefix() -> String {
    crate::store::DEFAULT_KEY_PREFIX.to_string()
}

/// Audit log configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines file receiving audit records; kept in memory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// API key allow-list configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Comma separated API keys
    #[serde(default = "default_api_keys")]
    pub api_keys: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: default_api_keys(),
        }
    }
}

fn default_api_keys() -> String {
    "local-dev-key".to_string()
}

impl AuthConfig {
    /// Allow-listed keys with whitespace trimmed and empty entries dropped.
    pub fn parsed_api_keys(&self) -> HashSet<String> {
        self.api_keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl RateguardConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RateguardError::Config(e.to_string()))
    }

    /// Load configuration from an optional file, then apply environment overrides.
    ///
    /// Variables take the form `RATEGUARD__<SECTION>__<FIELD>`, for example
    /// `RATEGUARD__RATE_LIMITING__LIMIT=100`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: RateguardConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject configurations that cannot build a limiter or a router.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.identity_limiter_config()?;
        self.rate_limiting.origin_limiter_config()?;
        if !self.server.api_prefix.starts_with('/') {
            return Err(RateguardError::Config(format!(
                "server.api_prefix must start with '/': {}",
                self.server.api_prefix
            )));
        }
        if self.auth.parsed_api_keys().is_empty() {
            return Err(RateguardError::Config(
                "at least one API key must be configured".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateguardConfig::default();

        assert_eq!(config.server.app_name, "RateGuard API");
        assert_eq!(config.server.api_prefix, "/api/v1");
        assert_eq!(config.rate_limiting.limit, 60);
        assert_eq!(config.rate_limiting.window_secs, 60);
        assert_eq!(config.rate_limiting.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(config.store.key_prefix, "rl:");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_api_keys() {
        let auth = AuthConfig {
            api_keys: "alpha, beta, ,gamma".to_string(),
        };
        let expected: HashSet<String> = ["alpha", "beta", "gamma"]
            .into_iter()
            .map(str::to_string)
            .collect();

        assert_eq!(auth.parsed_api_keys(), expected);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
rate_limiting:
  limit: 5
  window_secs: 10
  origin_limit: 50
  failure_policy: fail_open
store:
  backend: memory
auth:
  api_keys: "key-a,key-b"
"#;
        let config = RateguardConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.rate_limiting.failure_policy, FailurePolicy::FailOpen);

        let identity = config.rate_limiting.identity_limiter_config().unwrap();
        assert_eq!(identity.limit(), 5);
        assert_eq!(identity.window(), Duration::from_secs(10));

        let origin = config.rate_limiting.origin_limiter_config().unwrap();
        assert_eq!(origin.limit(), 50);
        assert_eq!(origin.window(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_limit_fails_validation() {
        let mut config = RateguardConfig::default();
        config.rate_limiting.limit = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, RateguardError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_empty_allow_list_fails_validation() {
        let mut config = RateguardConfig::default();
        config.auth.api_keys = " , ".to_string();

        assert!(matches!(config.validate(), Err(RateguardError::Config(_))));
    }

    #[test]
    fn test_relative_api_prefix_fails_validation() {
        let mut config = RateguardConfig::default();
        config.server.api_prefix = "api/v1".to_string();

        assert!(matches!(config.validate(), Err(RateguardError::Config(_))));

        config.server.api_prefix = "/".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_example_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("rateguard.example.yaml");
        let config = RateguardConfig::load(Some(&path)).unwrap();

        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.audit.path, Some(PathBuf::from("./request_logs.jsonl")));
        assert!(config.auth.parsed_api_keys().contains("local-dev-key"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = RateguardConfig::from_yaml("rate_limiting: [").unwrap_err();
        assert!(matches!(err, RateguardError::Config(_)));
    }
}
