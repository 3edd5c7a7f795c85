//! Authorization orchestrator.
//!
//! For every request the [`Authorizer`] fingerprints it against the current
//! cache key pattern, checks the decision cache and only calls the PDP for
//! requests without a fresh answer. Successful PDP decisions are installed
//! under every key the obligation covers. When the PDP fails transiently an
//! expired entry may be served instead, if the configuration allows it.

use std::sync::Arc;

use argus_telemetry::metrics::record_cache_lookup;
use argus_telemetry::CacheOutcome;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheLookup, CacheStats, CachedDecision, DecisionCache};
use crate::config::PepConfig;
use crate::decision::{Decision, PdpDecision};
use crate::error::{PepError, PepResult};
use crate::fingerprint::Fingerprinter;
use crate::pattern::{CacheKeyPattern, PatternStore};
use crate::pipeline::{PdpCall, PdpClient, PdpOutcome};
use crate::request::Request;
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::synthesizer::KeySynthesizer;
use crate::token_manager::{ApiKeyTokenManager, TokenProvider};
use crate::transport::{HttpDoer, ReqwestDoer};

/// A request waiting for the PDP, with the expired entry that may stand in
/// for it.
struct Pending {
    index: usize,
    stale: Option<Arc<CacheEntry>>,
}

/// Policy enforcement point.
///
/// Owns the pattern store, the decision cache, the PDP client and the
/// statistics of one configuration.
#[derive(Debug)]
pub struct Authorizer {
    pdp: PdpClient,
    patterns: PatternStore,
    cache: DecisionCache,
    stats: Arc<Statistics>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl Authorizer {
    /// Start building an authorizer for `config`.
    pub fn builder(config: PepConfig) -> AuthorizerBuilder {
        AuthorizerBuilder::new(config)
    }

    /// Create an authorizer with the default HTTP client and token manager.
    pub fn with_config(config: PepConfig) -> PepResult<Self> {
        Self::builder(config).build()
    }

    /// Authorize a single request.
    ///
    /// Concurrent misses for the same exact key share one PDP call; the
    /// callers that waited look the cache up again once it completes. Each
    /// call counts as exactly one cache hit or miss.
    pub async fn authorize(&self, request: &Request) -> PepResult<Decision> {
        let pattern = self.patterns.snapshot();
        let fingerprint = Fingerprinter::new(&pattern);
        let keys = fingerprint.lookup_keys(request);

        let lookup = self.cache.peek_first(&keys, Instant::now());
        if let CacheLookup::Fresh(entry) = &lookup {
            self.cache.record(&lookup);
            self.stats.record_serviced(1);
            return Ok(cached_decision(entry));
        }

        // Nothing will be cached for this subject, so there is nothing to share.
        if keys.is_empty() {
            return self.resolve_one(request).await;
        }

        let primary = fingerprint.primary_key(request);
        let gate = Arc::clone(self.in_flight.entry(primary.clone()).or_default().value());

        let result = {
            let _leader = gate.lock().await;
            self.resolve_one(request).await
        };

        // Only the map's own reference left means nobody is queued.
        drop(gate);
        self.in_flight
            .remove_if(&primary, |_, gate| Arc::strong_count(gate) == 1);
        result
    }

    /// Authorize several requests through the single-authz endpoint.
    ///
    /// Results are returned in request order. A failure of the whole PDP
    /// call is reported at every index that needed the PDP.
    pub async fn authorize_many(&self, requests: &[Request]) -> Vec<PepResult<Decision>> {
        self.resolve(PdpCall::Authz, requests).await
    }

    /// Authorize several requests through the bulk endpoint.
    pub async fn authorize_bulk(&self, requests: &[Request]) -> Vec<PepResult<Decision>> {
        self.resolve(PdpCall::Bulk, requests).await
    }

    /// Drop the cached decision `request` resolves to, with all its aliases.
    pub fn invalidate(&self, request: &Request) -> bool {
        let pattern = self.patterns.snapshot();
        let removed = self
            .cache
            .invalidate(&Fingerprinter::new(&pattern).primary_key(request));
        debug!(action = %request.action, removed, "cache invalidation");
        removed
    }

    /// Clear the decision cache. The cache key pattern is kept.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Get request statistics.
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    /// The cache key pattern currently in effect.
    pub fn cache_key_pattern(&self) -> Arc<CacheKeyPattern> {
        self.patterns.snapshot()
    }

    async fn resolve_one(&self, request: &Request) -> PepResult<Decision> {
        self.resolve(PdpCall::Authz, std::slice::from_ref(request))
            .await
            .pop()
            .unwrap_or_else(|| Err(PepError::internal("no decision for request")))
    }

    async fn resolve(&self, call: PdpCall, requests: &[Request]) -> Vec<PepResult<Decision>> {
        if requests.is_empty() {
            return Vec::new();
        }

        let now = Instant::now();
        let pattern = self.patterns.snapshot();
        let fingerprint = Fingerprinter::new(&pattern);

        let mut results: Vec<Option<PepResult<Decision>>> = Vec::with_capacity(requests.len());
        let mut pending = Vec::new();
        for (index, request) in requests.iter().enumerate() {
            match self.cache.lookup_first(&fingerprint.lookup_keys(request), now) {
                CacheLookup::Fresh(entry) => results.push(Some(Ok(cached_decision(&entry)))),
                CacheLookup::Expired(entry) => {
                    results.push(None);
                    pending.push(Pending {
                        index,
                        stale: Some(entry),
                    });
                }
                CacheLookup::Miss => {
                    results.push(None);
                    pending.push(Pending { index, stale: None });
                }
            }
        }

        if !pending.is_empty() {
            let batch: Vec<Request> = pending.iter().map(|p| requests[p.index].clone()).collect();
            debug!(
                kind = call.kind(),
                cached = requests.len() - batch.len(),
                forwarded = batch.len(),
                "cache misses forwarded to PDP"
            );

            match self.pdp.call(call, &batch).await {
                Ok(outcome) => self.apply_outcome(outcome, &batch, &pending, &mut results),
                Err(failure) => {
                    for p in &pending {
                        results[p.index] = Some(self.fallback(
                            failure.error.clone(),
                            failure.retry_count,
                            p.stale.as_deref(),
                        ));
                    }
                }
            }
        }

        let results: Vec<PepResult<Decision>> = results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(PepError::internal("request left unresolved"))))
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        self.stats.record_serviced(requests.len() as u64);
        if failed > 0 {
            self.stats.record_failed(failed as u64);
        }
        results
    }

    fn apply_outcome(
        &self,
        outcome: PdpOutcome,
        batch: &[Request],
        pending: &[Pending],
        results: &mut [Option<PepResult<Decision>>],
    ) {
        if let Some(pattern) = outcome.pattern {
            self.patterns.replace(pattern);
        }
        let pattern = self.patterns.snapshot();
        let synthesizer = KeySynthesizer::new(&pattern);
        let now = Instant::now();
        let retry_count = outcome.retry_count;

        for ((p, request), decision) in pending.iter().zip(batch).zip(outcome.decisions) {
            let result = match decision {
                Ok(decision) => {
                    self.store(&synthesizer, request, &decision, now);
                    Ok(Decision::from_pdp(&decision, retry_count))
                }
                Err(error) => self.fallback(error, retry_count, p.stale.as_deref()),
            };
            results[p.index] = Some(result);
        }
    }

    fn store(&self, synthesizer: &KeySynthesizer<'_>, request: &Request, decision: &PdpDecision, now: Instant) {
        let config = self.cache.config();
        if !config.should_cache(decision) {
            return;
        }

        let keys = if decision.permitted {
            synthesizer.permit_keys(request, decision.obligation.as_ref())
        } else {
            synthesizer.deny_keys(request)
        };
        let ttl = config.ttl_for(decision);
        self.cache.insert(keys, CachedDecision::new(decision, now, ttl));
    }

    fn fallback(&self, error: PepError, retry_count: u32, stale: Option<&CacheEntry>) -> PepResult<Decision> {
        match stale {
            Some(entry) if error.is_transient() => {
                let cached = entry.decision();
                record_cache_lookup(CacheOutcome::Stale);
                warn!(
                    error = %error,
                    permitted = cached.permitted,
                    retry_count,
                    "PDP unavailable, serving expired decision"
                );
                Ok(Decision {
                    retry_count,
                    ..Decision::from_cache(cached.permitted, cached.reason, true)
                })
            }
            _ => Err(error),
        }
    }
}

fn cached_decision(entry: &CacheEntry) -> Decision {
    let cached = entry.decision();
    Decision::from_cache(cached.permitted, cached.reason, false)
}

/// Builder for [`Authorizer`].
///
/// The HTTP client and the token provider can be injected; by default a
/// pooled `reqwest` client and an API key token manager are used.
#[derive(Debug)]
pub struct AuthorizerBuilder {
    config: PepConfig,
    doer: Option<Arc<dyn HttpDoer>>,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl AuthorizerBuilder {
    /// Create a builder for `config`.
    pub fn new(config: PepConfig) -> Self {
        Self {
            config,
            doer: None,
            tokens: None,
        }
    }

    /// The configuration being built.
    pub fn config(&self) -> &PepConfig {
        &self.config
    }

    /// Use `doer` for PDP and token calls.
    #[must_use]
    pub fn with_http_doer(mut self, doer: Arc<dyn HttpDoer>) -> Self {
        self.doer = Some(doer);
        self
    }

    /// Use `tokens` for PDP bearer tokens.
    #[must_use]
    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Validate the configuration and build the authorizer.
    pub fn build(self) -> PepResult<Authorizer> {
        let config = self.config;
        config.validate()?;
        let endpoints = config.endpoints()?;
        let timeout = config.pdp_timeout();

        let doer: Arc<dyn HttpDoer> = match self.doer {
            Some(doer) => doer,
            None => Arc::new(ReqwestDoer::new(timeout)?),
        };

        let tokens: Arc<dyn TokenProvider> = match self.tokens {
            Some(tokens) => tokens,
            None => {
                let mut manager =
                    ApiKeyTokenManager::new(Arc::clone(&doer), endpoints.token.clone(), config.api_key.clone());
                if let (Some(id), Some(secret)) = (&config.client_id, &config.client_secret) {
                    manager = manager.with_client(id.clone(), secret.clone());
                }
                if let Some(scope) = &config.token_scope {
                    manager = manager.with_scope(scope.clone());
                }
                Arc::new(manager)
            }
        };

        let stats = Arc::new(Statistics::new());
        let cache_config = config.cache_config();
        let retry = config.retry_policy();

        info!(
            environment = %config.environment,
            authz = %endpoints.authz,
            cache_enabled = cache_config.enabled,
            cache_size_mb = cache_config.size_mb,
            retry_attempts = retry.max_attempts,
            "authorizer configured"
        );

        Ok(Authorizer {
            pdp: PdpClient::new(doer, tokens, endpoints, timeout, retry, Arc::clone(&stats)),
            patterns: PatternStore::new(),
            cache: DecisionCache::new(cache_config),
            stats,
            in_flight: DashMap::new(),
        })
    }
}
