//! Prometheus metrics for the policy enforcement point.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `argus_pep_requests_total` | Counter | - | Authorization requests serviced |
//! | `argus_pep_pdp_requests_total` | Counter | `kind` | Requests forwarded to the PDP |
//! | `argus_pep_failed_requests_total` | Counter | - | Requests that ended in an error |
//! | `argus_pep_pdp_responses_total` | Counter | `status` | PDP responses by HTTP status |
//! | `argus_pep_cache_lookups_total` | Counter | `result` | Cache lookups by outcome |
//! | `argus_pep_pdp_duration_seconds` | Histogram | `kind` | PDP round-trip latency |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address to expose metrics on (e.g., "0.0.0.0:9090").
    /// `None` installs the recorder without an HTTP listener.
    pub addr: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: None,
        }
    }
}

/// Outcome label for a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A fresh entry answered the request.
    Hit,
    /// No entry answered the request.
    Miss,
    /// An expired entry was served because the PDP failed.
    Stale,
}

impl CacheOutcome {
    /// Label value for this outcome.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Stale => "stale",
        }
    }
}

/// Initializes the Prometheus recorder.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let mut builder = PrometheusBuilder::new();
    if let Some(addr) = &config.addr {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
        builder = builder.with_http_listener(addr);
    }

    let handle = builder
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "argus_pep_requests_total",
        "Total number of authorization requests serviced"
    );
    describe_counter!(
        "argus_pep_pdp_requests_total",
        "Total number of requests forwarded to the PDP"
    );
    describe_counter!(
        "argus_pep_failed_requests_total",
        "Total number of authorization requests that failed"
    );
    describe_counter!(
        "argus_pep_pdp_responses_total",
        "PDP responses by HTTP status code"
    );
    describe_counter!(
        "argus_pep_cache_lookups_total",
        "Decision cache lookups by outcome"
    );
    describe_histogram!(
        "argus_pep_pdp_duration_seconds",
        "PDP round-trip latency in seconds"
    );
}

/// Records serviced authorization requests.
pub fn record_requests_serviced(count: u64) {
    counter!("argus_pep_requests_total").increment(count);
}

/// Records requests forwarded to the PDP.
///
/// `kind` is the PDP flavor ("authz" or "bulk").
pub fn record_pdp_requests(kind: &str, count: u64) {
    counter!("argus_pep_pdp_requests_total", "kind" => kind.to_string()).increment(count);
}

/// Records failed authorization requests.
pub fn record_failed_requests(count: u64) {
    counter!("argus_pep_failed_requests_total").increment(count);
}

/// Records a PDP response status and its latency.
pub fn record_pdp_response(kind: &str, status_code: u16, duration: Duration) {
    counter!(
        "argus_pep_pdp_responses_total",
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "argus_pep_pdp_duration_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a cache lookup outcome.
pub fn record_cache_lookup(outcome: CacheOutcome) {
    counter!("argus_pep_cache_lookups_total", "result" => outcome.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(config.addr.is_none());
    }

    #[test]
    fn test_disabled_is_noop() {
        let config = MetricsConfig {
            enabled: false,
            addr: Some("not-an-address".to_string()),
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            enabled: true,
            addr: Some("not-an-address".to_string()),
        };
        let err = init_metrics(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidAddress(_)));
    }

    #[test]
    fn test_record_functions_dont_panic() {
        // No recorder installed: the metrics facade drops these silently
        record_requests_serviced(3);
        record_pdp_requests("bulk", 2);
        record_failed_requests(1);
        record_pdp_response("authz", 200, Duration::from_millis(12));
        record_cache_lookup(CacheOutcome::Stale);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(CacheOutcome::Hit.as_str(), "hit");
        assert_eq!(CacheOutcome::Miss.as_str(), "miss");
        assert_eq!(CacheOutcome::Stale.as_str(), "stale");
    }
}
