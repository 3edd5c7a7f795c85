//! PDP call pipeline.
//!
//! Serializes requests for one of the two PDP flavors, sends them with a
//! bearer token and a transaction id, retries transient failures and parses
//! the per-request decisions plus the updated cache key pattern.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::Endpoints;
use crate::decision::PdpDecision;
use crate::error::{PepError, PepResult};
use crate::pattern::CacheKeyPattern;
use crate::request::Request;
use crate::stats::{Statistics, TRANSPORT_FAILURE_STATUS};
use crate::token_manager::TokenProvider;
use crate::transport::{HttpDoer, HttpRequest, HttpResponse};
use crate::wire::{AuthzResponseWire, BulkRequestWire, BulkResponseWire, ParsedResponse};

/// Header correlating a PDP call across systems.
pub const TRANSACTION_ID_HEADER: &str = "Transaction-Id";

/// Longest `Retry-After` honored before a retry.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Retry behavior for transient PDP failures.
///
/// Each schedule entry is the pause between two consecutive attempts, not an
/// offset from the first failure: the default waits 1s before the second
/// attempt and 2s more before the third. A `Retry-After` from a 429 replaces
/// the scheduled pause, capped at [`MAX_RETRY_AFTER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, including the first.
    pub max_attempts: u32,
    /// Delay before each retry, by retry index. The last delay repeats.
    pub schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            schedule: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(6),
            ],
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            schedule: Vec::new(),
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let index = usize::try_from(retry).unwrap_or(usize::MAX);
        self.schedule
            .get(index)
            .or_else(|| self.schedule.last())
            .copied()
            .unwrap_or_default()
    }
}

/// The two PDP flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdpCall {
    /// `/v2/authz`: body is a JSON array of requests.
    Authz,
    /// `/v2/authz/bulk`: body is `{"requests": [...]}`.
    Bulk,
}

impl PdpCall {
    /// Short name used in logs and metrics.
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Authz => "authz",
            Self::Bulk => "bulk",
        }
    }

    /// Endpoint for this flavor.
    pub fn url(self, endpoints: &Endpoints) -> &str {
        match self {
            Self::Authz => &endpoints.authz,
            Self::Bulk => &endpoints.bulk,
        }
    }

    /// Serialize the request body.
    pub fn body(self, requests: &[Request]) -> PepResult<Bytes> {
        let encoded = match self {
            Self::Authz => serde_json::to_vec(requests),
            Self::Bulk => serde_json::to_vec(&BulkRequestWire { requests }),
        };
        encoded
            .map(Bytes::from)
            .map_err(|e| PepError::internal(format!("failed to encode PDP request: {e}")))
    }

    /// Parse a successful response.
    pub fn parse(self, response: &HttpResponse) -> PepResult<ParsedResponse> {
        match self {
            Self::Authz => response.body_json::<AuthzResponseWire>().map(AuthzResponseWire::into_parsed),
            Self::Bulk => response.body_json::<BulkResponseWire>().map(BulkResponseWire::into_parsed),
        }
    }
}

/// Decisions returned by a successful PDP call.
#[derive(Debug, Clone)]
pub struct PdpOutcome {
    /// Per-request outcome, in request order.
    pub decisions: Vec<PepResult<PdpDecision>>,
    /// Updated cache key pattern.
    pub pattern: Option<CacheKeyPattern>,
    /// Retries that preceded the successful attempt.
    pub retry_count: u32,
}

/// A PDP call that failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdpFailure {
    /// The last error.
    pub error: PepError,
    /// Retries attempted before giving up.
    pub retry_count: u32,
}

impl PdpFailure {
    fn new(error: PepError, retry_count: u32) -> Self {
        Self { error, retry_count }
    }
}

/// Client for the PDP endpoints.
#[derive(Debug)]
pub struct PdpClient {
    doer: Arc<dyn HttpDoer>,
    tokens: Arc<dyn TokenProvider>,
    endpoints: Endpoints,
    timeout: Duration,
    retry: RetryPolicy,
    stats: Arc<Statistics>,
}

impl PdpClient {
    /// Create a client.
    pub fn new(
        doer: Arc<dyn HttpDoer>,
        tokens: Arc<dyn TokenProvider>,
        endpoints: Endpoints,
        timeout: Duration,
        retry: RetryPolicy,
        stats: Arc<Statistics>,
    ) -> Self {
        Self {
            doer,
            tokens,
            endpoints,
            timeout,
            retry,
            stats,
        }
    }

    /// Retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Send `requests` to the PDP and return one outcome per request.
    #[instrument(skip(self, requests), fields(kind = call.kind(), requests = requests.len()))]
    pub async fn call(&self, call: PdpCall, requests: &[Request]) -> Result<PdpOutcome, PdpFailure> {
        let body = call.body(requests).map_err(|e| PdpFailure::new(e, 0))?;
        self.stats.record_pdp_requests(call.kind(), requests.len() as u64);

        let max_attempts = self.retry.max_attempts.max(1);
        let mut retries = 0u32;

        loop {
            let (error, retry_after) = match self.attempt(call, body.clone()).await {
                Ok(response) if response.is_success() => {
                    return self
                        .finish(call, &response, requests.len(), retries)
                        .map_err(|e| PdpFailure::new(e, retries));
                }
                Ok(response) => {
                    let retry_after = if response.status == StatusCode::TOO_MANY_REQUESTS {
                        response.header("retry-after").and_then(parse_retry_after)
                    } else {
                        None
                    };
                    let error = PepError::api(response.status.as_u16(), response.body_string());
                    (error, retry_after)
                }
                Err(error) => (error, None),
            };

            if !error.is_transient() || retries + 1 >= max_attempts {
                debug!(error = %error, retries, "PDP call failed");
                return Err(PdpFailure::new(error, retries));
            }

            let delay = retry_after
                .map(|d| d.min(MAX_RETRY_AFTER))
                .unwrap_or_else(|| self.retry.delay(retries));
            warn!(
                error = %error,
                retry = retries + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying PDP call"
            );
            tokio::time::sleep(delay).await;
            retries += 1;
        }
    }

    async fn attempt(&self, call: PdpCall, body: Bytes) -> PepResult<HttpResponse> {
        let token = self.tokens.token().await?;
        let transaction_id = Uuid::now_v7().to_string();

        let request = HttpRequest::post(call.url(&self.endpoints))
            .with_header("Authorization", &format!("Bearer {token}"))?
            .with_header("Content-Type", "application/json")?
            .with_header("Accept", "application/json")?
            .with_header(TRANSACTION_ID_HEADER, &transaction_id)?
            .with_body(body);

        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.doer.execute(request)).await;
        let elapsed = started.elapsed();

        match result {
            Ok(Ok(response)) => {
                self.stats
                    .record_status(call.kind(), response.status.as_u16(), elapsed);
                debug!(
                    status = response.status.as_u16(),
                    transaction_id = %transaction_id,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "PDP responded"
                );
                Ok(response)
            }
            Ok(Err(error)) => {
                self.stats
                    .record_status(call.kind(), TRANSPORT_FAILURE_STATUS, elapsed);
                Err(error)
            }
            Err(_) => {
                self.stats
                    .record_status(call.kind(), TRANSPORT_FAILURE_STATUS, elapsed);
                Err(PepError::transport(format!(
                    "PDP call timed out after {}ms (transaction {transaction_id})",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    fn finish(
        &self,
        call: PdpCall,
        response: &HttpResponse,
        expected: usize,
        retry_count: u32,
    ) -> PepResult<PdpOutcome> {
        let parsed = call.parse(response)?;
        if parsed.decisions.len() != expected {
            return Err(PepError::internal(format!(
                "PDP returned {} decisions for {expected} requests",
                parsed.decisions.len()
            )));
        }

        Ok(PdpOutcome {
            decisions: parsed.decisions,
            pattern: parsed.pattern,
            retry_count,
        })
    }
}

/// Parse `Retry-After` as delay seconds or an HTTP date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
