//! Observability for the Argus policy enforcement point.
//!
//! - **Logging**: structured JSON or pretty output via `tracing-subscriber`
//! - **Metrics**: Prometheus counters via the `metrics` facade
//!
//! Both are optional for host applications. The PEP records its counters
//! through [`metrics`] regardless; when no recorder is installed the facade
//! discards them.
//!
//! # Example
//!
//! ```rust,ignore
//! use argus_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig};
//!
//! init_logging(&LogConfig::default())?;
//! init_metrics(&MetricsConfig {
//!     enabled: true,
//!     addr: Some("0.0.0.0:9090".to_string()),
//! })?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, render_metrics, CacheOutcome, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
