//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur during telemetry operations.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize metrics.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A global subscriber or recorder was already installed.
    #[error("Telemetry already initialized: {0}")]
    AlreadyInitialized(String),

    /// Failed to parse address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl TelemetryError {
    /// Check if the error only reports an existing global installation.
    pub const fn is_already_initialized(&self) -> bool {
        matches!(self, Self::AlreadyInitialized(_))
    }
}
