//! Decision caching for authorization.
//!
//! One PDP decision is stored as a single record reachable through many key
//! aliases. Removing a record, by eviction or invalidation, removes every
//! alias together.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use argus_telemetry::metrics::{record_cache_lookup, CacheOutcome};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::decision::{DenyReason, PdpDecision};

/// TTL for permits when neither the user nor the PDP sets one.
pub const DEFAULT_PERMIT_TTL: Duration = Duration::from_secs(600);
/// TTL for denies when the user sets none.
pub const DEFAULT_DENY_TTL: Duration = Duration::from_secs(120);
/// Default cache budget in megabytes.
pub const DEFAULT_CACHE_SIZE_MB: usize = 32;

const BYTES_PER_MB: usize = 1024 * 1024;
const EVICTION_TARGET_PERCENT: usize = 90;
const ENTRY_OVERHEAD_BYTES: usize = 160;

/// Configuration for the decision cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether the cache is used at all.
    pub enabled: bool,
    /// Memory budget in megabytes (at least 1).
    pub size_mb: usize,
    /// Whether deny decisions are stored.
    pub cache_denies: bool,
    /// Whether expired entries may be served when the PDP fails.
    pub serve_expired: bool,
    /// Whether expired denies may be served when the PDP fails.
    pub serve_expired_denies: bool,
    /// User TTL for permits. Takes precedence over the PDP.
    pub permit_ttl: Option<Duration>,
    /// User TTL for denies.
    pub deny_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size_mb: DEFAULT_CACHE_SIZE_MB,
            cache_denies: true,
            serve_expired: false,
            serve_expired_denies: true,
            permit_ttl: None,
            deny_ttl: None,
        }
    }
}

impl CacheConfig {
    /// Disable caching.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Memory budget in bytes.
    pub fn max_bytes(&self) -> usize {
        self.size_mb.max(1).saturating_mul(BYTES_PER_MB)
    }

    /// TTL for a decision: user TTL, then the obligation's max age, then the
    /// built-in default.
    pub fn ttl_for(&self, decision: &PdpDecision) -> Duration {
        if decision.permitted {
            self.permit_ttl
                .or_else(|| {
                    decision
                        .obligation
                        .as_ref()
                        .and_then(|o| o.max_cache_age)
                        .filter(|age| !age.is_zero())
                })
                .unwrap_or(DEFAULT_PERMIT_TTL)
        } else {
            self.deny_ttl.unwrap_or(DEFAULT_DENY_TTL)
        }
    }

    /// Check if a decision should be cached.
    pub fn should_cache(&self, decision: &PdpDecision) -> bool {
        self.enabled && (decision.permitted || self.cache_denies)
    }
}

/// A decision as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDecision {
    /// Whether the request is permitted.
    pub permitted: bool,
    /// Deny reason.
    pub reason: DenyReason,
    /// When the PDP produced the decision.
    pub created_at: Instant,
    /// How long the decision stays fresh.
    pub ttl: Duration,
    /// Obligation actions of a permit.
    pub actions: BTreeSet<String>,
}

impl CachedDecision {
    /// Build a cached decision from a PDP decision.
    pub fn new(decision: &PdpDecision, created_at: Instant, ttl: Duration) -> Self {
        Self {
            permitted: decision.permitted,
            reason: decision.reason,
            created_at,
            ttl,
            actions: decision
                .obligation
                .as_ref()
                .map(|o| o.actions.clone())
                .unwrap_or_default(),
        }
    }

    /// Check if the decision is past its TTL at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

/// A cache record shared by all of its key aliases.
#[derive(Debug)]
pub struct CacheEntry {
    id: u64,
    keys: Vec<String>,
    decision: CachedDecision,
    bytes: usize,
    live_aliases: AtomicUsize,
    last_access: AtomicU64,
}

impl CacheEntry {
    /// The stored decision.
    pub fn decision(&self) -> &CachedDecision {
        &self.decision
    }

    /// Keys this record was installed under.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// A fresh entry.
    Fresh(Arc<CacheEntry>),
    /// An entry past its TTL that may be served if the PDP fails.
    Expired(Arc<CacheEntry>),
    /// Nothing usable.
    Miss,
}

#[cfg(test)]
impl CacheLookup {
    pub(crate) const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub(crate) const fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of records.
    pub entries: usize,
    /// Number of key aliases.
    pub aliases: usize,
    /// Approximate memory held, in bytes.
    pub bytes: usize,
    /// Number of lookups answered fresh.
    pub hits: u64,
    /// Number of lookups without a fresh answer.
    pub misses: u64,
    /// Number of records evicted for space.
    pub evictions: u64,
}

/// Decision cache for authorization.
#[derive(Debug)]
pub struct DecisionCache {
    /// Cache configuration.
    config: CacheConfig,
    /// Key alias to record.
    aliases: DashMap<String, Arc<CacheEntry>>,
    /// Record id to record.
    records: DashMap<u64, Arc<CacheEntry>>,
    /// Approximate bytes held.
    bytes: AtomicUsize,
    next_id: AtomicU64,
    /// Logical clock for LRU ordering.
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    eviction_lock: Mutex<()>,
}

impl DecisionCache {
    /// Create a new decision cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            aliases: DashMap::new(),
            records: DashMap::new(),
            bytes: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            eviction_lock: Mutex::new(()),
        }
    }

    /// Cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a single key.
    pub fn lookup(&self, key: &str, now: Instant) -> CacheLookup {
        if !self.config.enabled {
            return CacheLookup::Miss;
        }

        let Some(entry) = self.aliases.get(key).map(|e| Arc::clone(e.value())) else {
            return CacheLookup::Miss;
        };
        entry
            .last_access
            .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);

        if !entry.decision.is_expired(now) {
            CacheLookup::Fresh(entry)
        } else if self.may_serve_expired(&entry.decision) {
            CacheLookup::Expired(entry)
        } else {
            CacheLookup::Miss
        }
    }

    /// Look keys up in order. The first fresh entry wins; otherwise the first
    /// expired candidate is returned. Counts one hit or one miss.
    pub fn lookup_first<S: AsRef<str>>(&self, keys: &[S], now: Instant) -> CacheLookup {
        let lookup = self.peek_first(keys, now);
        self.record(&lookup);
        lookup
    }

    /// Same as [`lookup_first`](Self::lookup_first) without touching the
    /// hit and miss counters.
    ///
    /// Callers that look a request up more than once count only the lookup that
    /// decides it, through [`record`](Self::record).
    pub fn peek_first<S: AsRef<str>>(&self, keys: &[S], now: Instant) -> CacheLookup {
        let mut expired = None;
        for key in keys {
            match self.lookup(key.as_ref(), now) {
                hit @ CacheLookup::Fresh(_) => {
                    debug!(key = key.as_ref(), "decision cache hit");
                    return hit;
                }
                stale @ CacheLookup::Expired(_) if expired.is_none() => expired = Some(stale),
                _ => {}
            }
        }
        expired.unwrap_or(CacheLookup::Miss)
    }

    /// Count a lookup outcome: a fresh entry is a hit, anything else a miss.
    pub fn record(&self, lookup: &CacheLookup) {
        if matches!(lookup, CacheLookup::Fresh(_)) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            record_cache_lookup(CacheOutcome::Hit);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            record_cache_lookup(CacheOutcome::Miss);
        }
    }

    /// Install one record under every key.
    ///
    /// An alias that pointed at another record is moved to the new one; a
    /// record left without aliases is dropped.
    pub fn insert(&self, mut keys: Vec<String>, decision: CachedDecision) {
        if !self.config.enabled || keys.is_empty() {
            return;
        }
        if !decision.permitted && !self.config.cache_denies {
            return;
        }

        crate::keys::dedup_in_order(&mut keys);
        let bytes = ENTRY_OVERHEAD_BYTES
            + keys.iter().map(|k| k.len() * 2).sum::<usize>()
            + decision.actions.iter().map(String::len).sum::<usize>();

        let entry = Arc::new(CacheEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            live_aliases: AtomicUsize::new(keys.len()),
            last_access: AtomicU64::new(self.clock.fetch_add(1, Ordering::Relaxed)),
            keys,
            decision,
            bytes,
        });

        // Account before publishing, so a concurrent removal never
        // subtracts bytes that were not yet added.
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.records.insert(entry.id, Arc::clone(&entry));

        for key in &entry.keys {
            if let Some(previous) = self.aliases.insert(key.clone(), Arc::clone(&entry)) {
                self.detach(&previous);
            }
        }

        debug!(
            keys = entry.keys.len(),
            permitted = entry.decision.permitted,
            ttl = ?entry.decision.ttl,
            "decision cached"
        );

        let now = entry.decision.created_at;
        self.evict_if_needed(now);
    }

    /// Remove the record `key` points at, with all of its aliases.
    ///
    /// Returns `true` if a record was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        let Some(entry) = self.aliases.get(key).map(|e| Arc::clone(e.value())) else {
            return false;
        };
        self.remove_record(&entry)
    }

    /// Clear all cached entries.
    ///
    /// Records are removed one by one with their bytes, so an insert racing
    /// the clear stays accounted for.
    pub fn clear(&self) {
        let entries: Vec<Arc<CacheEntry>> =
            self.records.iter().map(|r| Arc::clone(r.value())).collect();
        for entry in &entries {
            self.remove_record(entry);
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.records.len(),
            aliases: self.aliases.len(),
            bytes: self.bytes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn may_serve_expired(&self, decision: &CachedDecision) -> bool {
        self.config.serve_expired && (decision.permitted || self.config.serve_expired_denies)
    }

    fn detach(&self, previous: &Arc<CacheEntry>) {
        if previous.live_aliases.fetch_sub(1, Ordering::AcqRel) == 1
            && self.records.remove(&previous.id).is_some()
        {
            self.release_bytes(previous.bytes);
        }
    }

    fn release_bytes(&self, bytes: usize) {
        // Saturates: the budget check must never see a wrapped counter.
        let _ = self
            .bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |held| {
                Some(held.saturating_sub(bytes))
            });
    }

    fn remove_record(&self, entry: &Arc<CacheEntry>) -> bool {
        if self.records.remove(&entry.id).is_none() {
            return false;
        }
        self.release_bytes(entry.bytes);
        for key in &entry.keys {
            self.aliases.remove_if(key, |_, current| current.id == entry.id);
        }
        true
    }

    fn evict_if_needed(&self, now: Instant) {
        let max = self.config.max_bytes();
        if self.bytes.load(Ordering::Relaxed) <= max {
            return;
        }
        // Another insert is already evicting.
        let Some(_guard) = self.eviction_lock.try_lock() else {
            return;
        };

        let target = max / 100 * EVICTION_TARGET_PERCENT;
        let mut candidates: Vec<Arc<CacheEntry>> =
            self.records.iter().map(|r| Arc::clone(r.value())).collect();

        let (expired, mut live): (Vec<_>, Vec<_>) = candidates.drain(..).partition(|entry| {
            entry.decision.is_expired(now) && !self.may_serve_expired(&entry.decision)
        });

        let mut evicted = 0u64;
        for entry in &expired {
            if self.remove_record(entry) {
                evicted += 1;
            }
        }

        live.sort_by_key(|entry| entry.last_access.load(Ordering::Relaxed));
        for entry in &live {
            if self.bytes.load(Ordering::Relaxed) <= target {
                break;
            }
            if self.remove_record(entry) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(evicted, bytes = self.bytes.load(Ordering::Relaxed), "decision cache evicted records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Obligation;

    fn permit(now: Instant, ttl: Duration) -> CachedDecision {
        CachedDecision::new(&PdpDecision::permit(None), now, ttl)
    }

    fn deny(now: Instant, ttl: Duration) -> CachedDecision {
        CachedDecision::new(&PdpDecision::deny(DenyReason::Iam), now, ttl)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_cache_hit_miss() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();

        assert!(cache.lookup("a", now).is_miss());

        cache.insert(keys(&["a", "b"]), permit(now, Duration::from_secs(60)));
        assert!(cache.lookup("a", now).is_fresh());
        assert!(cache.lookup("b", now).is_fresh());
        assert!(cache.lookup("c", now).is_miss());
    }

    #[test]
    fn test_cache_stats() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();

        cache.lookup_first(&["a"], now); // miss
        cache.insert(keys(&["a", "b", "c"]), permit(now, Duration::from_secs(60)));
        cache.lookup_first(&["x", "a"], now); // hit
        cache.lookup_first(&["b"], now); // hit

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.aliases, 3);
        assert!(stats.bytes > 0);
    }

    #[test]
    fn test_expired_is_miss_without_stale() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();
        cache.insert(keys(&["a"]), permit(now, Duration::from_millis(40)));

        assert!(cache.lookup("a", now + Duration::from_millis(40)).is_miss());
    }

    #[test]
    fn test_expired_is_returned_with_stale() {
        let cache = DecisionCache::new(CacheConfig {
            serve_expired: true,
            ..CacheConfig::default()
        });
        let now = Instant::now();
        cache.insert(keys(&["a"]), permit(now, Duration::from_millis(40)));

        let later = now + Duration::from_millis(41);
        assert!(matches!(cache.lookup("a", later), CacheLookup::Expired(_)));
        assert!(matches!(cache.lookup_first(&["a"], later), CacheLookup::Expired(_)));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_stale_denies_can_be_refused() {
        let cache = DecisionCache::new(CacheConfig {
            serve_expired: true,
            serve_expired_denies: false,
            ..CacheConfig::default()
        });
        let now = Instant::now();
        cache.insert(keys(&["d"]), deny(now, Duration::from_millis(1)));

        assert!(cache.lookup("d", now + Duration::from_secs(1)).is_miss());
    }

    #[test]
    fn test_first_fresh_wins_over_earlier_expired() {
        let cache = DecisionCache::new(CacheConfig {
            serve_expired: true,
            ..CacheConfig::default()
        });
        let now = Instant::now();
        cache.insert(keys(&["old"]), deny(now, Duration::from_millis(1)));
        cache.insert(keys(&["new"]), permit(now, Duration::from_secs(60)));

        let later = now + Duration::from_millis(5);
        let CacheLookup::Fresh(entry) = cache.lookup_first(&["old", "new"], later) else {
            panic!("expected a fresh hit");
        };
        assert!(entry.decision().permitted);
    }

    #[test]
    fn test_nanosecond_ttl_never_fresh() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();
        cache.insert(keys(&["a"]), permit(now, Duration::from_nanos(1)));
        assert!(!cache.lookup("a", now + Duration::from_nanos(1)).is_fresh());
    }

    #[test]
    fn test_cache_disabled() {
        let cache = DecisionCache::new(CacheConfig::disabled());
        let now = Instant::now();
        cache.insert(keys(&["a"]), permit(now, Duration::from_secs(60)));
        assert!(cache.lookup("a", now).is_miss());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_deny_cache_disabled() {
        let cache = DecisionCache::new(CacheConfig {
            cache_denies: false,
            ..CacheConfig::default()
        });
        let now = Instant::now();
        cache.insert(keys(&["d"]), deny(now, Duration::from_secs(60)));
        assert!(cache.lookup("d", now).is_miss());
    }

    #[test]
    fn test_invalidate_removes_all_aliases() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();
        cache.insert(keys(&["a", "b", "c"]), permit(now, Duration::from_secs(60)));

        assert!(cache.invalidate("b"));
        assert!(cache.lookup("a", now).is_miss());
        assert!(cache.lookup("c", now).is_miss());
        assert_eq!(cache.stats().aliases, 0);
        assert_eq!(cache.stats().bytes, 0);
        assert!(!cache.invalidate("b"));
    }

    #[test]
    fn test_overwritten_aliases_release_old_record() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();
        cache.insert(keys(&["a", "b"]), permit(now, Duration::from_secs(60)));
        cache.insert(keys(&["a"]), deny(now, Duration::from_secs(60)));
        assert_eq!(cache.stats().entries, 2);

        cache.insert(keys(&["b"]), deny(now, Duration::from_secs(60)));
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.stats().aliases, 2);

        // Invalidating the alias "a" must not touch "b".
        assert!(cache.invalidate("a"));
        assert!(cache.lookup("b", now).is_fresh());
    }

    #[test]
    fn test_peek_first_does_not_count() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();

        assert!(cache.peek_first(&["a"], now).is_miss());
        cache.insert(keys(&["a"]), permit(now, Duration::from_secs(60)));
        let lookup = cache.peek_first(&["a"], now);
        assert!(lookup.is_fresh());
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 0);

        cache.record(&lookup);
        cache.record(&CacheLookup::Miss);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_release_bytes_saturates() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();
        cache.insert(keys(&["a"]), permit(now, Duration::from_secs(60)));

        cache.release_bytes(usize::MAX);
        assert_eq!(cache.stats().bytes, 0);
    }

    #[test]
    fn test_clear_racing_inserts_keeps_bytes_consistent() {
        let cache = Arc::new(DecisionCache::new(CacheConfig::default()));
        let now = Instant::now();

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("{t}-{}", i % 7);
                        cache.insert(vec![key], permit(now, Duration::from_secs(60)));
                    }
                })
            })
            .collect();
        let clearer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    cache.clear();
                }
            })
        };
        for handle in writers {
            handle.join().unwrap();
        }
        clearer.join().unwrap();

        let held: usize = cache.records.iter().map(|r| r.value().bytes).sum();
        assert_eq!(cache.stats().bytes, held);
        assert!(held <= cache.config().max_bytes());

        // Overwriting survivors must not underflow the counter.
        for t in 0..4 {
            for i in 0..7 {
                cache.insert(vec![format!("{t}-{i}")], permit(now, Duration::from_secs(60)));
            }
        }
        let held: usize = cache.records.iter().map(|r| r.value().bytes).sum();
        assert_eq!(cache.stats().bytes, held);

        cache.clear();
        assert_eq!(cache.stats().bytes, 0);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_cache_clear() {
        let cache = DecisionCache::new(CacheConfig::default());
        let now = Instant::now();
        cache.insert(keys(&["a"]), permit(now, Duration::from_secs(60)));

        cache.clear();
        assert!(cache.lookup("a", now).is_miss());
        assert_eq!(cache.stats().bytes, 0);
    }

    #[test]
    fn test_lru_eviction_keeps_recently_used() {
        let cache = DecisionCache::new(CacheConfig {
            size_mb: 1,
            ..CacheConfig::default()
        });
        let now = Instant::now();
        let big = |i: usize| format!("{i}-{}", "x".repeat(50_000));

        for i in 0..10 {
            cache.insert(vec![big(i)], permit(now, Duration::from_secs(60)));
        }
        assert_eq!(cache.stats().evictions, 0);

        assert!(cache.lookup(&big(0), now).is_fresh());
        cache.insert(vec![big(10)], permit(now, Duration::from_secs(60)));

        let stats = cache.stats();
        assert!(stats.evictions >= 1);
        assert!(stats.bytes <= BYTES_PER_MB);
        assert!(cache.lookup(&big(0), now).is_fresh());
        assert!(cache.lookup(&big(1), now).is_miss());
        assert!(cache.lookup(&big(10), now).is_fresh());
    }

    #[test]
    fn test_expired_evicted_before_live() {
        let cache = DecisionCache::new(CacheConfig {
            size_mb: 1,
            ..CacheConfig::default()
        });
        let now = Instant::now();
        let big = |i: usize| format!("{i}-{}", "y".repeat(50_000));

        cache.insert(vec![big(0)], permit(now, Duration::from_millis(1)));
        for i in 1..10 {
            cache.insert(vec![big(i)], permit(now, Duration::from_secs(60)));
        }
        // Refresh the expired record so it is not the LRU candidate.
        cache.lookup(&big(0), now);

        let later = now + Duration::from_millis(10);
        cache.insert(vec![big(10)], permit(later, Duration::from_secs(60)));

        // The expired record goes first even though it was used recently,
        // then LRU takes over until the budget target is met.
        assert!(cache.lookup(&big(0), later).is_miss());
        assert!(cache.lookup(&big(2), later).is_fresh());
        assert!(cache.lookup(&big(10), later).is_fresh());
        assert_eq!(cache.stats().entries, 9);
    }

    #[test]
    fn test_size_floor_is_one_megabyte() {
        let config = CacheConfig {
            size_mb: 0,
            ..CacheConfig::default()
        };
        assert_eq!(config.max_bytes(), BYTES_PER_MB);
    }

    #[test]
    fn test_ttl_precedence() {
        let with_age = PdpDecision::permit(Some(
            Obligation::default().with_max_cache_age(Duration::from_secs(30)),
        ));
        let config = CacheConfig::default();
        assert_eq!(config.ttl_for(&with_age), Duration::from_secs(30));
        assert_eq!(config.ttl_for(&PdpDecision::permit(None)), DEFAULT_PERMIT_TTL);
        assert_eq!(
            config.ttl_for(&PdpDecision::deny(DenyReason::Iam)),
            DEFAULT_DENY_TTL
        );

        let config = CacheConfig {
            permit_ttl: Some(Duration::from_millis(40)),
            deny_ttl: Some(Duration::from_millis(10)),
            ..CacheConfig::default()
        };
        assert_eq!(config.ttl_for(&with_age), Duration::from_millis(40));
        assert_eq!(
            config.ttl_for(&PdpDecision::deny(DenyReason::Context)),
            Duration::from_millis(10)
        );
    }
}
