//! Configuration for the policy enforcement point.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use argus_telemetry::LogConfig;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, DEFAULT_CACHE_SIZE_MB};
use crate::error::{PepError, PepResult};
use crate::pipeline::RetryPolicy;

/// Default PDP call timeout in milliseconds.
pub const DEFAULT_PDP_TIMEOUT_MS: u64 = 15_000;

const AUTHZ_PATH: &str = "/v2/authz";
const BULK_PATH: &str = "/v2/authz/bulk";
const ROLES_PATH: &str = "/v2/authz/roles";
const TOKEN_PATH: &str = "/identity/token";
const KEYS_PATH: &str = "/identity/keys";

/// IAM deployment the PEP talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    /// Public staging.
    Staging,
    /// Public production.
    #[default]
    Production,
    /// Private-network staging.
    PrivateStaging,
    /// Private-network production.
    PrivateProduction,
    /// Explicit endpoint URLs.
    Custom,
}

impl Environment {
    /// Host of a well-known environment. `None` for `Custom`.
    pub const fn host(self) -> Option<&'static str> {
        match self {
            Self::Staging => Some("https://iam.test.cloud.ibm.com"),
            Self::Production => Some("https://iam.cloud.ibm.com"),
            Self::PrivateStaging => Some("https://private.iam.test.cloud.ibm.com"),
            Self::PrivateProduction => Some("https://private.iam.cloud.ibm.com"),
            Self::Custom => None,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Staging => "Staging",
            Self::Production => "Production",
            Self::PrivateStaging => "PrivateStaging",
            Self::PrivateProduction => "PrivateProduction",
            Self::Custom => "Custom",
        };
        f.write_str(name)
    }
}

impl FromStr for Environment {
    type Err = PepError;

    fn from_str(s: &str) -> PepResult<Self> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            "privatestaging" => Ok(Self::PrivateStaging),
            "privateproduction" => Ok(Self::PrivateProduction),
            "custom" => Ok(Self::Custom),
            _ => Err(PepError::invalid_input(format!("unknown environment: {s}"))),
        }
    }
}

/// Log verbosity of the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Everything, including cache hits and misses.
    Debug,
    /// Configuration and token refreshes.
    #[default]
    Info,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// The `tracing` level name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = PepError;

    fn from_str(s: &str) -> PepResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "error" => Ok(Self::Error),
            _ => Err(PepError::invalid_input(format!("unknown log level: {s}"))),
        }
    }
}

/// Endpoint URLs for the `Custom` environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointsConfig {
    /// Authorization endpoint. The bulk endpoint is `<authz_url>/bulk`.
    #[serde(default)]
    pub authz_url: Option<String>,
    /// Roles endpoint.
    #[serde(default)]
    pub roles_url: Option<String>,
    /// Token endpoint.
    #[serde(default)]
    pub token_url: Option<String>,
    /// Signing keys endpoint.
    #[serde(default)]
    pub keys_url: Option<String>,
}

/// Resolved endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Single-authz endpoint.
    pub authz: String,
    /// Bulk-authz endpoint.
    pub bulk: String,
    /// Roles endpoint.
    pub roles: String,
    /// Token endpoint.
    pub token: String,
    /// Signing keys endpoint.
    pub keys: String,
}

/// Decision cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Turn the decision cache off entirely.
    #[serde(default)]
    pub disable: bool,
    /// Never store deny decisions.
    #[serde(default)]
    pub disable_denied: bool,
    /// Serve expired entries when the PDP fails transiently.
    #[serde(default)]
    pub enable_expired: bool,
    /// Let stale-on-error serve expired denies as well as permits.
    #[serde(default = "default_true")]
    pub expired_for_denies: bool,
    /// Memory budget in megabytes. Values below 1 are raised to 1.
    #[serde(default = "default_cache_size_mb")]
    pub size_mb: usize,
    /// TTL for permits in milliseconds. Overrides the PDP's max age.
    #[serde(default)]
    pub default_ttl_ms: Option<u64>,
    /// TTL for denies in milliseconds.
    #[serde(default)]
    pub default_denied_ttl_ms: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            disable: false,
            disable_denied: false,
            enable_expired: false,
            expired_for_denies: true,
            size_mb: DEFAULT_CACHE_SIZE_MB,
            default_ttl_ms: None,
            default_denied_ttl_ms: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_cache_size_mb() -> usize {
    DEFAULT_CACHE_SIZE_MB
}

const fn default_pdp_timeout_ms() -> u64 {
    DEFAULT_PDP_TIMEOUT_MS
}

/// Complete PEP configuration.
///
/// # Example
///
/// ```
/// use argus_pep::{Environment, PepConfig};
/// use std::time::Duration;
///
/// let config = PepConfig::new(Environment::Staging, "my-api-key")
///     .with_authz_retry(true)
///     .with_cache_default_ttl(Duration::from_secs(60));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.endpoints().unwrap().authz, "https://iam.test.cloud.ibm.com/v2/authz");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PepConfig {
    /// IAM deployment.
    #[serde(default)]
    pub environment: Environment,
    /// API key exchanged for the service token.
    #[serde(default)]
    pub api_key: String,
    /// Client id for token requests.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret for token requests.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Scope requested for the service token.
    #[serde(default)]
    pub token_scope: Option<String>,
    /// Retry transient PDP failures.
    #[serde(default)]
    pub authz_retry: bool,
    /// PDP call timeout in milliseconds.
    #[serde(default = "default_pdp_timeout_ms")]
    pub pdp_timeout_ms: u64,
    /// Library log level.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Install a global `tracing` subscriber on `configure`.
    #[serde(default)]
    pub install_logger: bool,
    /// Endpoint URLs for the `Custom` environment.
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Decision cache settings.
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for PepConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            api_key: String::new(),
            client_id: None,
            client_secret: None,
            token_scope: None,
            authz_retry: false,
            pdp_timeout_ms: DEFAULT_PDP_TIMEOUT_MS,
            log_level: LogLevel::default(),
            install_logger: false,
            endpoints: EndpointsConfig::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl fmt::Debug for PepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PepConfig")
            .field("environment", &self.environment)
            .field("api_key", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("token_scope", &self.token_scope)
            .field("authz_retry", &self.authz_retry)
            .field("pdp_timeout_ms", &self.pdp_timeout_ms)
            .field("log_level", &self.log_level)
            .field("install_logger", &self.install_logger)
            .field("endpoints", &self.endpoints)
            .field("cache", &self.cache)
            .finish()
    }
}

impl PepConfig {
    /// Create a configuration for an environment and API key.
    pub fn new(environment: Environment, api_key: impl Into<String>) -> Self {
        Self {
            environment,
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Set client credentials for token requests.
    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set the token scope.
    pub fn with_token_scope(mut self, scope: impl Into<String>) -> Self {
        self.token_scope = Some(scope.into());
        self
    }

    /// Enable or disable PDP retries.
    pub fn with_authz_retry(mut self, retry: bool) -> Self {
        self.authz_retry = retry;
        self
    }

    /// Set the PDP call timeout.
    pub fn with_pdp_timeout(mut self, timeout: Duration) -> Self {
        self.pdp_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Install a global subscriber on `configure`.
    pub fn with_install_logger(mut self, install: bool) -> Self {
        self.install_logger = install;
        self
    }

    /// Set explicit endpoints (used with [`Environment::Custom`]).
    pub fn with_endpoints(
        mut self,
        authz_url: impl Into<String>,
        roles_url: impl Into<String>,
        token_url: impl Into<String>,
        keys_url: impl Into<String>,
    ) -> Self {
        self.endpoints = EndpointsConfig {
            authz_url: Some(authz_url.into()),
            roles_url: Some(roles_url.into()),
            token_url: Some(token_url.into()),
            keys_url: Some(keys_url.into()),
        };
        self
    }

    /// Set the cache size in megabytes.
    pub fn with_decision_cache_size(mut self, size_mb: usize) -> Self {
        self.cache.size_mb = size_mb;
        self
    }

    /// Turn the decision cache off.
    pub fn with_disable_cache(mut self, disable: bool) -> Self {
        self.cache.disable = disable;
        self
    }

    /// Never store deny decisions.
    pub fn with_disable_denied_cache(mut self, disable: bool) -> Self {
        self.cache.disable_denied = disable;
        self
    }

    /// Serve expired entries when the PDP fails transiently.
    pub fn with_enable_expired_cache(mut self, enable: bool) -> Self {
        self.cache.enable_expired = enable;
        self
    }

    /// Let stale-on-error serve expired denies.
    pub fn with_expired_cache_for_denies(mut self, enable: bool) -> Self {
        self.cache.expired_for_denies = enable;
        self
    }

    /// Set the permit TTL.
    pub fn with_cache_default_ttl(mut self, ttl: Duration) -> Self {
        self.cache.default_ttl_ms = Some(duration_ms(ttl));
        self
    }

    /// Set the deny TTL.
    pub fn with_cache_default_denied_ttl(mut self, ttl: Duration) -> Self {
        self.cache.default_denied_ttl_ms = Some(duration_ms(ttl));
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PepResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(PepError::Config("api_key is required".to_string()));
        }

        if self.client_id.is_some() != self.client_secret.is_some() {
            return Err(PepError::Config(
                "client_id and client_secret must be set together".to_string(),
            ));
        }

        if self.pdp_timeout_ms == 0 {
            return Err(PepError::Config("pdp_timeout_ms must be positive".to_string()));
        }

        self.endpoints().map(|_| ())
    }

    /// Resolve endpoint URLs for the configured environment.
    pub fn endpoints(&self) -> PepResult<Endpoints> {
        if let Some(host) = self.environment.host() {
            return Ok(Endpoints {
                authz: format!("{host}{AUTHZ_PATH}"),
                bulk: format!("{host}{BULK_PATH}"),
                roles: format!("{host}{ROLES_PATH}"),
                token: format!("{host}{TOKEN_PATH}"),
                keys: format!("{host}{KEYS_PATH}"),
            });
        }

        let authz = required_url("authz_url", self.endpoints.authz_url.as_deref())?;
        let authz = authz.trim_end_matches('/').to_string();
        Ok(Endpoints {
            bulk: format!("{authz}/bulk"),
            authz,
            roles: required_url("roles_url", self.endpoints.roles_url.as_deref())?,
            token: required_url("token_url", self.endpoints.token_url.as_deref())?,
            keys: required_url("keys_url", self.endpoints.keys_url.as_deref())?,
        })
    }

    /// PDP call timeout.
    pub fn pdp_timeout(&self) -> Duration {
        Duration::from_millis(self.pdp_timeout_ms)
    }

    /// Retry policy implied by `authz_retry`.
    pub fn retry_policy(&self) -> RetryPolicy {
        if self.authz_retry {
            RetryPolicy::default()
        } else {
            RetryPolicy::disabled()
        }
    }

    /// Decision cache configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: !self.cache.disable,
            size_mb: self.cache.size_mb.max(1),
            cache_denies: !self.cache.disable_denied,
            serve_expired: self.cache.enable_expired,
            serve_expired_denies: self.cache.expired_for_denies,
            permit_ttl: self.cache.default_ttl_ms.map(ttl_from_ms),
            deny_ttl: self.cache.default_denied_ttl_ms.map(ttl_from_ms),
        }
    }

    /// Logging configuration for `argus-telemetry`.
    pub fn log_config(&self) -> LogConfig {
        LogConfig::default().with_level(format!("argus_pep={}", self.log_level.as_str()))
    }
}

fn required_url(name: &str, value: Option<&str>) -> PepResult<String> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PepError::Config(format!("{name} is required for the Custom environment")))?;

    let parsed = url::Url::parse(value)
        .map_err(|e| PepError::Config(format!("{name} is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PepError::Config(format!("{name} must be an http(s) URL")));
    }

    Ok(value.to_string())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A zero TTL in files and env vars means "expire immediately".
fn ttl_from_ms(ms: u64) -> Duration {
    if ms == 0 {
        Duration::from_nanos(1)
    } else {
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PepConfig::default();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.pdp_timeout(), Duration::from_secs(15));
        assert!(!config.authz_retry);
        assert!(config.cache.expired_for_denies);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PepConfig::new(Environment::Staging, "key")
            .with_authz_retry(true)
            .with_enable_expired_cache(true)
            .with_disable_denied_cache(true)
            .with_decision_cache_size(0)
            .with_cache_default_ttl(Duration::from_millis(40));

        assert!(config.validate().is_ok());
        let cache = config.cache_config();
        assert!(cache.serve_expired);
        assert!(!cache.cache_denies);
        assert_eq!(cache.size_mb, 1);
        assert_eq!(cache.permit_ttl, Some(Duration::from_millis(40)));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_environment_hosts() {
        let endpoints = PepConfig::new(Environment::PrivateProduction, "k")
            .endpoints()
            .unwrap();
        assert_eq!(endpoints.authz, "https://private.iam.cloud.ibm.com/v2/authz");
        assert_eq!(endpoints.bulk, "https://private.iam.cloud.ibm.com/v2/authz/bulk");
        assert_eq!(endpoints.token, "https://private.iam.cloud.ibm.com/identity/token");
    }

    #[test]
    fn test_custom_environment_requires_all_urls() {
        let config = PepConfig::new(Environment::Custom, "k");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("authz_url"));

        let config = config.with_endpoints(
            "http://localhost:8080/v2/authz/",
            "http://localhost:8080/v2/authz/roles",
            "http://localhost:8080/identity/token",
            "http://localhost:8080/identity/keys",
        );
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.bulk, "http://localhost:8080/v2/authz/bulk");

        let mut bad = config.clone();
        bad.endpoints.keys_url = Some("ftp://x".to_string());
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_client_credentials_pairing() {
        let mut config = PepConfig::new(Environment::Staging, "k");
        config.client_id = Some("id".to_string());
        assert!(config.validate().is_err());
        assert!(config.with_client("id", "secret").validate().is_ok());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("private_staging".parse::<Environment>().unwrap(), Environment::PrivateStaging);
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert!(matches!(
            "moon".parse::<Environment>(),
            Err(PepError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let mut config = PepConfig::new(Environment::Staging, "k");
        config.cache.default_ttl_ms = Some(0);
        assert_eq!(config.cache_config().permit_ttl, Some(Duration::from_nanos(1)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = PepConfig::new(Environment::Staging, "super-secret").with_client("id", "hidden");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("hidden"));
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
            environment = "Staging"
            api_key = "k"
            authz_retry = true
            log_level = "Debug"

            [cache]
            enable_expired = true
            default_ttl_ms = 40
        "#;
        let config: PepConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.cache.default_ttl_ms, Some(40));
        assert_eq!(config.pdp_timeout_ms, DEFAULT_PDP_TIMEOUT_MS);

        assert!(toml::from_str::<PepConfig>("unknown = 1").is_err());
    }
}
