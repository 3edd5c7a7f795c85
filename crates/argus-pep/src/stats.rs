//! Request statistics.
//!
//! Counters are kept locally so hosts can read them without a metrics
//! recorder, and every increment is mirrored to the `metrics` facade.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use argus_telemetry::metrics;
use dashmap::DashMap;
use serde::Serialize;

/// Status code recorded for PDP calls that produced no HTTP response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Live statistics counters.
#[derive(Debug, Default)]
pub struct Statistics {
    requests_serviced: AtomicU64,
    pdp_requests: AtomicU64,
    failed_requests: AtomicU64,
    status_counts: DashMap<u16, AtomicU64>,
}

/// Point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    /// Authorization requests answered, from cache or PDP.
    pub requests_serviced: u64,
    /// Requests forwarded to the PDP.
    pub pdp_requests: u64,
    /// Requests that ended in an error.
    pub failed_requests: u64,
    /// PDP responses per HTTP status; `0` counts transport failures.
    pub status_counts: BTreeMap<u16, u64>,
}

impl Statistics {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count answered requests.
    pub fn record_serviced(&self, count: u64) {
        self.requests_serviced.fetch_add(count, Ordering::Relaxed);
        metrics::record_requests_serviced(count);
    }

    /// Count requests forwarded to the PDP.
    pub fn record_pdp_requests(&self, kind: &str, count: u64) {
        self.pdp_requests.fetch_add(count, Ordering::Relaxed);
        metrics::record_pdp_requests(kind, count);
    }

    /// Count failed requests.
    pub fn record_failed(&self, count: u64) {
        self.failed_requests.fetch_add(count, Ordering::Relaxed);
        metrics::record_failed_requests(count);
    }

    /// Count one PDP response.
    pub fn record_status(&self, kind: &str, status: u16, elapsed: Duration) {
        self.status_counts
            .entry(status)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        metrics::record_pdp_response(kind, status, elapsed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            requests_serviced: self.requests_serviced.load(Ordering::Relaxed),
            pdp_requests: self.pdp_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            status_counts: self
                .status_counts
                .iter()
                .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
                .collect(),
        }
    }
}
