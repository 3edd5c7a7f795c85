//! Structured logging for the policy enforcement point.
//!
//! The PEP library itself only emits `tracing` events. Host applications that
//! do not install their own subscriber can call [`init_logging`] to get JSON,
//! pretty or compact output filtered by level.
//!
//! # Example
//!
//! ```rust,ignore
//! use argus_telemetry::logging::{init_logging, LogConfig, LogFormat};
//!
//! init_logging(&LogConfig::default().with_format(LogFormat::Pretty))?;
//! tracing::info!(action = "cos.object.get", cached = true, "authorization decided");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Directives appended to every filter so HTTP client internals stay quiet.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether a subscriber is installed at all.
    pub enabled: bool,
    /// Filter directive, e.g. `info` or `argus_pep=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Let `RUST_LOG` override `level` when it is set.
    pub respect_rust_log: bool,
    /// Include source file and line.
    pub file_line_info: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            respect_rust_log: true,
            file_line_info: false,
        }
    }
}

impl LogConfig {
    /// Human-readable debug output for local development.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            file_line_info: true,
            ..Self::default()
        }
    }

    /// Use the given filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Use the given output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// The filter directive actually applied.
    pub fn directive(&self) -> String {
        let base = if self.respect_rust_log {
            std::env::var(EnvFilter::DEFAULT_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| self.level.clone())
        } else {
            self.level.clone()
        };
        format!("{base},{QUIET_DEPENDENCIES}")
    }
}

/// Install the global logging subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` for an invalid filter and
/// `TelemetryError::AlreadyInitialized` if a global subscriber exists.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.directive())?;
    let layer = fmt::layer()
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(true);

    let layer = match config.format {
        LogFormat::Json => layer.json().with_filter(filter).boxed(),
        LogFormat::Pretty => layer.pretty().with_filter(filter).boxed(),
        LogFormat::Compact => layer.compact().with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

/// Parse a filter directive.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the directive is invalid.
pub fn create_env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| TelemetryError::LoggingInit(format!("invalid filter {directive:?}: {e}")))
}
