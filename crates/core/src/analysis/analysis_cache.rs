//! In-memory TTL cache for generated analyses.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

use super::analysis_model::{Analysis, AnalysisKey, AnalysisSubject, AnalysisType};
use crate::events::{DomainEvent, DomainEventSink};
use crate::utils::clock::Clock;

struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Bumped on every invalidation of a key. A writer that read the epoch
    /// before a slow computation can tell whether its result went stale.
    epochs: HashMap<K, u64>,
}

/// Key/value cache with per-entry expiry.
///
/// Expired entries are dropped lazily on read and in bulk by
/// [`sweep_expired`](TtlCache::sweep_expired). Time comes from the injected
/// [`Clock`].
pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                epochs: HashMap::new(),
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Live value for `key`. An expired entry is removed and reported as a
    /// miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.lock();
        match inner.entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.lock()
            .entries
            .insert(key, CacheEntry { value, expires_at });
    }

    pub fn epoch(&self, key: &K) -> u64 {
        self.lock().epochs.get(key).copied().unwrap_or(0)
    }

    /// Stores `value` only if `key` has not been invalidated since `epoch`
    /// was read. Returns whether it was stored.
    pub fn put_if_epoch(&self, key: K, value: V, ttl: Duration, epoch: u64) -> bool {
        let expires_at = self.clock.now() + ttl;
        let mut inner = self.lock();
        if inner.epochs.get(&key).copied().unwrap_or(0) != epoch {
            return false;
        }
        inner.entries.insert(key, CacheEntry { value, expires_at });
        true
    }

    /// Removes `key` and bumps its epoch. Returns whether an entry was
    /// present.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut inner = self.lock();
        *inner.epochs.entry(key.clone()).or_insert(0) += 1;
        inner.entries.remove(key).is_some()
    }

    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| now < entry.expires_at);
        before - inner.entries.len()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type AnalysisCache = TtlCache<AnalysisKey, Analysis>;

impl TtlCache<AnalysisKey, Analysis> {
    /// Drops every analysis type cached for `subject`. Returns how many
    /// entries were removed.
    pub fn invalidate_subject(&self, subject: &AnalysisSubject) -> usize {
        let mut removed = 0;
        for analysis_type in AnalysisType::ALL {
            let key = AnalysisKey {
                subject: subject.clone(),
                analysis_type,
            };
            if self.invalidate(&key) {
                removed += 1;
            }
        }
        removed
    }
}

/// Event sink that drops cached portfolio analyses made stale by a ledger
/// or portfolio mutation.
pub struct AnalysisCacheInvalidator {
    cache: Arc<AnalysisCache>,
}

impl AnalysisCacheInvalidator {
    pub fn new(cache: Arc<AnalysisCache>) -> Self {
        Self { cache }
    }
}

impl DomainEventSink for AnalysisCacheInvalidator {
    fn emit(&self, event: DomainEvent) {
        let Some(portfolio_id) = event.affected_portfolio() else {
            return;
        };
        let removed = self
            .cache
            .invalidate_subject(&AnalysisSubject::portfolio(portfolio_id));
        if removed > 0 {
            info!("Invalidated cached analysis for portfolio {}", portfolio_id);
        } else {
            debug!("No cached analysis to invalidate for portfolio {}", portfolio_id);
        }
    }
}
