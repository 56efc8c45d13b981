//! In-memory caches for upstream responses
//!
//! All caches are process-lifetime and memory-resident; nothing survives a
//! restart. Each entry carries its fetch instant and a read is served from
//! cache only while `now - fetched_at < TTL`.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::Mutex;

use crate::error::Result;

/// Cache TTL configuration per data type
pub struct CacheTtl;

impl CacheTtl {
    /// POI lookups - viewport panning re-requests often
    pub const POIS: Duration = Duration::from_secs(5 * 60); // 5 min

    /// National statistics - published on a daily cadence at most
    pub const STATISTICS: Duration = Duration::from_secs(24 * 60 * 60); // 24 hr

    /// Administrative boundaries - effectively static
    pub const BOUNDARIES: Duration = Duration::from_secs(7 * 24 * 60 * 60); // 7 days
}

struct Entry<V> {
    fetched_at: Instant,
    value: V,
}

/// Keyed TTL cache with lazy eviction.
///
/// Eviction is a staleness sweep triggered on insert once the entry count
/// crosses `sweep_threshold` - not an LRU, so the live entry count can
/// exceed the threshold while nothing is stale yet.
pub struct TtlMap<K, V> {
    ttl: Duration,
    sweep_threshold: usize,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlMap<K, V> {
    pub fn new(ttl: Duration, sweep_threshold: usize) -> Self {
        Self {
            ttl,
            sweep_threshold,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a value if present and fresh
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().await;
        let entry = entries.get(key)?;
        (entry.fetched_at.elapsed() < self.ttl).then(|| entry.value.clone())
    }

    /// Insert a value, sweeping stale entries once the map has grown past
    /// the threshold
    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            Entry {
                fetched_at: Instant::now(),
                value,
            },
        );

        if entries.len() > self.sweep_threshold {
            let before = entries.len();
            entries.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
            debug!("swept {} stale cache entries", before - entries.len());
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Single-slot TTL cache.
///
/// The lock is held across the refresh so concurrent requests share one
/// in-flight upstream fetch instead of racing.
pub struct TtlCell<T> {
    ttl: Duration,
    slot: Mutex<Option<(Instant, Arc<T>)>>,
}

impl<T> TtlCell<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value if fresh, otherwise run `refresh` and cache
    /// its result. A failed refresh caches nothing; the next call retries.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((fetched_at, value)) = slot.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            return Ok(Arc::clone(value));
        }

        let value = Arc::new(refresh().await?);
        *slot = Some((Instant::now(), Arc::clone(&value)));
        Ok(value)
    }
}
