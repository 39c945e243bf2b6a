//! In-memory decision cache.
//!
//! Two independent bounded TTL maps hold recent verdicts: a positive cache of
//! grants and a negative cache of denials (with their reasons). The cache is
//! process-local and best-effort; it is never invalidated by permission
//! mutations in another process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of monotonic time for TTL bookkeeping.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
    /// Recency stamp for LRU eviction; larger is more recent
    last_access: u64,
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    tick: u64,
}

impl<V> Inner<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Thread-safe map with a per-entry TTL and a capacity bound.
///
/// Expired entries are removed lazily when touched. Inserting a new key into
/// a full cache first drops every expired entry, then evicts the least
/// recently used one if the cache is still full.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
            }),
            ttl,
            capacity,
            clock,
        }
    }

    /// Live value for `key`, refreshing its recency.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.last_access = tick;
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    /// Store `value` under `key` for one TTL, replacing any previous entry.
    pub fn insert(&self, key: String, value: V) {
        if self.capacity == 0 {
            return;
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            inner.entries.retain(|_, entry| entry.expires_at > now);
        }
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
            }
        }

        let last_access = inner.next_tick();
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
                last_access,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`; returns how many.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.starts_with(prefix));
        before - inner.entries.len()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Number of entries that have not yet expired.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Verdict found in the decision cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedDecision {
    Granted,
    Denied(String),
}

/// Positive and negative verdict caches keyed by `"<email>:<app_name>"`.
///
/// Writing one sign never clears the opposite-sign entry for the same key.
/// Lookups consult the positive cache first.
#[derive(Debug)]
pub struct DecisionCache {
    positive: TtlCache<()>,
    negative: TtlCache<String>,
}

impl DecisionCache {
    pub fn new(
        capacity: usize,
        positive_ttl: Duration,
        negative_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            positive: TtlCache::new(capacity, positive_ttl, Arc::clone(&clock)),
            negative: TtlCache::new(capacity, negative_ttl, clock),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<CachedDecision> {
        if self.positive.get(key).is_some() {
            return Some(CachedDecision::Granted);
        }
        self.negative.get(key).map(CachedDecision::Denied)
    }

    pub fn store_granted(&self, key: String) {
        self.positive.insert(key, ());
    }

    pub fn store_denied(&self, key: String, reason: String) {
        self.negative.insert(key, reason);
    }

    /// Drop `key` from both caches.
    pub fn remove(&self, key: &str) {
        self.positive.remove(key);
        self.negative.remove(key);
    }

    /// Drop every key starting with `prefix` from both caches.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        self.positive.remove_prefix(prefix) + self.negative.remove_prefix(prefix)
    }

    pub fn clear(&self) {
        self.positive.clear();
        self.negative.clear();
    }

    /// Live entry counts as `(positive, negative)`.
    pub fn sizes(&self) -> (usize, usize) {
        (self.positive.len(), self.negative.len())
    }
}

/// Cache key for a normalized email and an application name.
pub fn cache_key(email: &str, app_name: &str) -> String {
    format!("{email}:{app_name}")
}

/// Hand-driven clock for TTL tests.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
