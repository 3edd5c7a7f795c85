//! Layered configuration loading.
//!
//! [`ConfigLoader`] builds a [`PepConfig`] from defaults, a TOML or JSON
//! file, a `.env` file and prefixed environment variables, in that order.

use std::env;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::PepConfig;
use crate::error::{PepError, PepResult};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "ARGUS";

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use argus_pep::ConfigLoader;
///
/// # fn main() -> Result<(), argus_pep::PepError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("argus.toml")?
///     .with_dotenv()
///     .with_env_prefix("ARGUS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: PepConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader reading `.env` and `ARGUS__*` variables over defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new().with_dotenv().with_env_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Reset to default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = PepConfig::default();
        self
    }

    /// Load a configuration file. The format follows the extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> PepResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PepError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            PepError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        self.config = Self::parse_file(&content, path)?;
        debug!(path = %path.display(), "configuration file loaded");
        Ok(self)
    }

    /// Load a configuration file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> PepResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `toml` or `json` format.
    pub fn with_string(mut self, content: &str, format: &str) -> PepResult<Self> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => parse_toml(content)?,
            "json" => parse_json(content)?,
            _ => {
                return Err(PepError::Config(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Set the environment variable prefix.
    ///
    /// Variables use the form `PREFIX__KEY` or `PREFIX__SECTION__KEY`, e.g.
    /// `ARGUS__API_KEY` or `ARGUS__CACHE__DEFAULT_TTL_MS`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), ".env loaded");
        }
        self
    }

    /// Apply environment overrides and validate.
    pub fn load(self) -> PepResult<PepConfig> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides without validating.
    pub fn load_unvalidated(mut self) -> PepResult<PepConfig> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            self.apply_env_overrides(&prefix, vars)?;
        }
        Ok(self.config)
    }

    fn parse_file(content: &str, path: &Path) -> PepResult<PepConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => parse_toml(content),
            Some("json") => parse_json(content),
            _ => Err(PepError::Config(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides<I>(&mut self, prefix: &str, vars: I) -> PepResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> PepResult<()> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["ENVIRONMENT"] => config.environment = value.parse().map_err(|_| env_error(key, "unknown environment"))?,
            ["API_KEY"] => config.api_key = value.to_string(),
            ["CLIENT_ID"] => config.client_id = non_empty(value),
            ["CLIENT_SECRET"] => config.client_secret = non_empty(value),
            ["TOKEN_SCOPE"] => config.token_scope = non_empty(value),
            ["AUTHZ_RETRY"] => config.authz_retry = bool_var(key, value)?,
            ["PDP_TIMEOUT_MS"] => config.pdp_timeout_ms = int_var(key, value)?,
            ["LOG_LEVEL"] => config.log_level = value.parse().map_err(|_| env_error(key, "expected debug, info or error"))?,
            ["INSTALL_LOGGER"] => config.install_logger = bool_var(key, value)?,

            ["ENDPOINTS", "AUTHZ_URL"] => config.endpoints.authz_url = non_empty(value),
            ["ENDPOINTS", "ROLES_URL"] => config.endpoints.roles_url = non_empty(value),
            ["ENDPOINTS", "TOKEN_URL"] => config.endpoints.token_url = non_empty(value),
            ["ENDPOINTS", "KEYS_URL"] => config.endpoints.keys_url = non_empty(value),

            ["CACHE", "DISABLE"] => config.cache.disable = bool_var(key, value)?,
            ["CACHE", "DISABLE_DENIED"] => config.cache.disable_denied = bool_var(key, value)?,
            ["CACHE", "ENABLE_EXPIRED"] => config.cache.enable_expired = bool_var(key, value)?,
            ["CACHE", "EXPIRED_FOR_DENIES"] => config.cache.expired_for_denies = bool_var(key, value)?,
            ["CACHE", "SIZE_MB"] => config.cache.size_mb = int_var(key, value)?,
            ["CACHE", "DEFAULT_TTL_MS"] => config.cache.default_ttl_ms = optional_int_var(key, value)?,
            ["CACHE", "DEFAULT_DENIED_TTL_MS"] => {
                config.cache.default_denied_ttl_ms = optional_int_var(key, value)?;
            }

            _ => debug!(key, "ignoring unknown configuration variable"),
        }

        Ok(())
    }
}

/// Parse a TOML configuration document.
pub fn parse_toml(content: &str) -> PepResult<PepConfig> {
    toml::from_str(content).map_err(|e| PepError::Config(format!("invalid TOML configuration: {e}")))
}

/// Parse a JSON configuration document.
pub fn parse_json(content: &str) -> PepResult<PepConfig> {
    serde_json::from_str(content)
        .map_err(|e| PepError::Config(format!("invalid JSON configuration: {e}")))
}

fn env_error(key: &str, reason: &str) -> PepError {
    PepError::Config(format!("environment variable {key}: {reason}"))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn bool_var(key: &str, value: &str) -> PepResult<bool> {
    parse_bool(value).ok_or_else(|| env_error(key, "expected boolean"))
}

fn int_var<T: std::str::FromStr>(key: &str, value: &str) -> PepResult<T> {
    value.trim().parse().map_err(|_| env_error(key, "expected integer"))
}

fn optional_int_var(key: &str, value: &str) -> PepResult<Option<u64>> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        int_var(key, value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, LogLevel};
    use std::io::Write;
    use std::time::Duration;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_fail_validation_without_api_key() {
        let result = ConfigLoader::new().load();
        assert!(matches!(result, Err(PepError::Config(_))));
        assert!(ConfigLoader::new().load_unvalidated().is_ok());
    }

    #[test]
    fn test_with_string_toml() {
        let toml = r#"
            environment = "Staging"
            api_key = "key"
            authz_retry = true

            [cache]
            size_mb = 64
            default_ttl_ms = 5000
        "#;

        let config = ConfigLoader::new().with_string(toml, "toml").unwrap().load().unwrap();
        assert_eq!(config.environment, Environment::Staging);
        assert!(config.authz_retry);
        assert_eq!(config.cache.size_mb, 64);
        assert_eq!(config.cache.default_ttl_ms, Some(5000));
    }

    #[test]
    fn test_with_string_json() {
        let json = r#"{"environment": "Production", "api_key": "key", "log_level": "Debug"}"#;
        let config = ConfigLoader::new().with_string(json, "json").unwrap().load().unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_with_string_rejects_unknown_format() {
        let result = ConfigLoader::new().with_string("", "yaml");
        assert!(matches!(result, Err(PepError::Config(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ConfigLoader::new().with_string("api_key = \"k\"\nbogus = 1", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "api_key = \"from-file\"").unwrap();
        writeln!(file, "pdp_timeout_ms = 2500").unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.api_key, "from-file");
        assert_eq!(config.pdp_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_missing_file() {
        assert!(ConfigLoader::new().with_file("/nonexistent/argus.toml").is_err());
        assert!(ConfigLoader::new().with_optional_file("/nonexistent/argus.toml").is_ok());
    }

    #[test]
    fn test_file_with_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(ConfigLoader::new().with_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_overrides(
                "ARGUS",
                vars(&[
                    ("ARGUS__API_KEY", "env-key"),
                    ("ARGUS__ENVIRONMENT", "private_staging"),
                    ("ARGUS__AUTHZ_RETRY", "yes"),
                    ("ARGUS__CACHE__DEFAULT_TTL_MS", "1000"),
                    ("ARGUS__CACHE__DISABLE_DENIED", "true"),
                    ("ARGUS__ENDPOINTS__AUTHZ_URL", "http://localhost/v2/authz"),
                    ("ARGUS__SOMETHING_ELSE", "ignored"),
                ]),
            )
            .unwrap();

        let config = loader.config;
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.environment, Environment::PrivateStaging);
        assert!(config.authz_retry);
        assert_eq!(config.cache.default_ttl_ms, Some(1000));
        assert!(config.cache.disable_denied);
        assert_eq!(
            config.endpoints.authz_url.as_deref(),
            Some("http://localhost/v2/authz")
        );
    }

    #[test]
    fn test_env_override_parse_errors() {
        let mut loader = ConfigLoader::new();
        let err = loader
            .apply_env_overrides("ARGUS", vars(&[("ARGUS__CACHE__SIZE_MB", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("ARGUS__CACHE__SIZE_MB"));

        let err = loader
            .apply_env_overrides("ARGUS", vars(&[("ARGUS__AUTHZ_RETRY", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn test_env_clears_optional_ttl() {
        let mut loader = ConfigLoader::new()
            .with_string("api_key = \"k\"\n[cache]\ndefault_ttl_ms = 10", "toml")
            .unwrap();
        loader
            .apply_env_overrides("ARGUS", vars(&[("ARGUS__CACHE__DEFAULT_TTL_MS", "none")]))
            .unwrap();
        assert_eq!(loader.config.cache.default_ttl_ms, None);
    }
}
