use crate::CacheStore;
use async_trait::async_trait;
use dashmap::DashMap;
use sift_core::{Clock, SiftError, SiftResult, SystemClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Eviction bounds for [`InMemoryCacheStore`].
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    /// Hard cap on stored entries, live or expired.
    pub max_entries: usize,
    /// Sweep every expired entry once per this many writes.
    pub sweep_every: u64,
}

struct Entry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }

    /// `None` when the TTL reaches past what `Instant` can represent.
    fn expires_at(&self) -> Option<Instant> {
        self.created_at.checked_add(self.ttl)
    }
}

/// In-process TTL cache.
///
/// Entries live in a sharded [`DashMap`], so operations on different keys
/// only contend when they hash to the same shard. Expired entries are
/// dropped lazily on read, swept every `sweep_every` writes, and can be
/// purged explicitly with [`InMemoryCacheStore::purge_expired`]. When a write
/// pushes the store past `max_entries`, the entry closest to expiry goes.
pub struct InMemoryCacheStore<V> {
    entries: DashMap<String, Entry<V>>,
    settings: CacheSettings,
    writes: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl<V> InMemoryCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a store driven by the given clock.
    pub fn new(settings: CacheSettings, clock: Arc<dyn Clock>) -> SiftResult<Self> {
        if settings.max_entries == 0 {
            return Err(SiftError::Config(
                "cache max_entries must be at least 1".to_string(),
            ));
        }
        if settings.sweep_every == 0 {
            return Err(SiftError::Config(
                "cache sweep_every must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            entries: DashMap::new(),
            settings,
            writes: AtomicU64::new(0),
            clock,
        })
    }

    /// Create a store driven by the wall clock.
    pub fn with_system_clock(settings: CacheSettings) -> SiftResult<Self> {
        Self::new(settings, Arc::new(SystemClock))
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Number of physically stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn enforce_capacity(&self, keep: &str) {
        if self.entries.len() <= self.settings.max_entries {
            return;
        }
        self.purge_expired();

        while self.entries.len() > self.settings.max_entries {
            let victim = self
                .entries
                .iter()
                .filter(|e| e.key() != keep)
                .min_by_key(|e| {
                    let expires_at = e.value().expires_at();
                    // Entries that never expire sort after every finite expiry.
                    (expires_at.is_none(), expires_at)
                })
                .map(|e| e.key().clone());
            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                    debug!(key = %key, "Evicted cache entry at capacity");
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl<V> CacheStore<V> for InMemoryCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> SiftResult<Option<V>> {
        let now = self.clock.now();
        {
            let Some(entry) = self.entries.get(key) else {
                return Ok(None);
            };
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Re-check under the shard lock: a concurrent put may have refreshed it.
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn put(&self, key: &str, value: V, ttl: Duration) -> SiftResult<()> {
        let entry = Entry {
            value,
            created_at: self.clock.now(),
            ttl,
        };
        self.entries.insert(key.to_string(), entry);

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % self.settings.sweep_every == 0 {
            self.purge_expired();
        }
        self.enforce_capacity(key);
        Ok(())
    }
}
