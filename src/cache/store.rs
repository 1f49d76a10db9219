//! Stale-while-revalidate cache store.
//!
//! Entries are opaque payloads keyed by string. A read classifies the entry
//! by age: fresh entries are returned as-is, stale entries are returned while
//! a single background task refetches them, and missing or expired entries
//! are fetched before the read returns.

use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{CacheConfig, Freshness};
use super::lock;

const METRIC_CACHE_HIT: &str = "startupcoders_cache_hit_total";
const METRIC_CACHE_MISS: &str = "startupcoders_cache_miss_total";
const METRIC_CACHE_REFRESH_FAILED: &str = "startupcoders_cache_refresh_failed_total";
const METRIC_CACHE_SWEPT: &str = "startupcoders_cache_swept_total";

#[derive(Debug, Error)]
pub enum CacheError<E = Infallible> {
    #[error("cache key must not be empty")]
    InvalidKey,
    #[error("cached value under `{key}` was stored with a different type")]
    TypeMismatch { key: String },
    #[error("fetch failed: {0}")]
    Fetch(#[source] E),
}

/// Point-in-time breakdown of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub stale: usize,
    pub expired: usize,
    /// Entries with a background refresh in flight.
    pub refreshing: usize,
}

struct CacheEntry {
    data: Box<dyn Any + Send + Sync>,
    stored_at: Instant,
    /// Windows the entry was written under; used by `has`, sweeps and stats.
    windows: CacheConfig,
    /// Unique per write, so a refresh only lands on the entry that spawned it.
    generation: u64,
    refreshing: bool,
}

impl CacheEntry {
    fn freshness(&self, windows: &CacheConfig, now: Instant) -> Freshness {
        windows.classify(now.saturating_duration_since(self.stored_at))
    }

    fn own_freshness(&self, now: Instant) -> Freshness {
        self.freshness(&self.windows, now)
    }

    fn value<T, E>(&self, key: &str) -> Result<T, CacheError<E>>
    where
        T: Clone + 'static,
    {
        (*self.data)
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| CacheError::TypeMismatch {
                key: key.to_string(),
            })
    }
}

enum Lookup<T> {
    Fresh(T),
    Stale { data: T, refresh: Option<u64> },
    Miss,
}

struct Inner {
    entries: RwLock<HashMap<String, CacheEntry>>,
    defaults: CacheConfig,
    generations: AtomicU64,
}

/// Shared handle to a stale-while-revalidate store.
///
/// Cloning is cheap; every clone sees the same entries.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl Cache {
    pub fn new(defaults: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                defaults,
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Windows used by [`Cache::get`] and [`Cache::set`].
    pub fn defaults(&self) -> CacheConfig {
        self.inner.defaults
    }

    /// Read `key` under the store's default windows.
    pub async fn get<T, F, Fut, E>(&self, key: &str, fetch: F) -> Result<T, CacheError<E>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        self.get_with(key, self.inner.defaults, fetch).await
    }

    /// Read `key` under explicit windows, calling `fetch` as the entry's age
    /// requires.
    ///
    /// Fetch failures on a missing or expired entry are returned and nothing
    /// is cached. A stale entry is returned immediately; its refresh runs on a
    /// spawned task whose failure is only logged, so this must be called from
    /// within a tokio runtime.
    pub async fn get_with<T, F, Fut, E>(
        &self,
        key: &str,
        windows: CacheConfig,
        fetch: F,
    ) -> Result<T, CacheError<E>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        ensure_key(key)?;

        let now = Instant::now();
        let lookup = {
            let mut entries = lock::write(&self.inner.entries, "get");
            match entries.get_mut(key) {
                None => Lookup::Miss,
                Some(entry) => match entry.freshness(&windows, now) {
                    Freshness::Fresh => Lookup::Fresh(entry.value(key)?),
                    Freshness::Stale => {
                        let data = entry.value(key)?;
                        // Claiming the refresh under the same lock keeps it single-flight.
                        let refresh = if entry.refreshing {
                            None
                        } else {
                            entry.refreshing = true;
                            Some(entry.generation)
                        };
                        Lookup::Stale { data, refresh }
                    }
                    Freshness::Expired => Lookup::Miss,
                },
            }
        };

        match lookup {
            Lookup::Fresh(data) => {
                counter!(METRIC_CACHE_HIT, "state" => "fresh").increment(1);
                debug!(key, "Cache hit");
                Ok(data)
            }
            Lookup::Stale { data, refresh } => {
                counter!(METRIC_CACHE_HIT, "state" => "stale").increment(1);
                if let Some(generation) = refresh {
                    debug!(key, generation, "Serving stale entry, revalidating");
                    self.spawn_refresh(key.to_string(), generation, windows, fetch());
                } else {
                    debug!(key, "Serving stale entry, revalidation already in flight");
                }
                Ok(data)
            }
            Lookup::Miss => {
                counter!(METRIC_CACHE_MISS).increment(1);
                debug!(key, "Cache miss, fetching");
                let data = fetch().await.map_err(CacheError::Fetch)?;
                self.insert(key, data.clone(), windows);
                Ok(data)
            }
        }
    }

    /// Store `data` under `key` with the default windows, replacing any entry.
    pub fn set<T>(&self, key: &str, data: T) -> Result<(), CacheError>
    where
        T: Send + Sync + 'static,
    {
        self.set_with(key, data, self.inner.defaults)
    }

    pub fn set_with<T>(&self, key: &str, data: T, windows: CacheConfig) -> Result<(), CacheError>
    where
        T: Send + Sync + 'static,
    {
        ensure_key(key)?;
        self.insert(key, data, windows);
        Ok(())
    }

    /// Remove `key`, reporting whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        lock::write(&self.inner.entries, "delete")
            .remove(key)
            .is_some()
    }

    /// Remove every key starting with `prefix`, returning how many went.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = lock::write(&self.inner.entries, "delete_prefix");
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// True if `key` holds an entry that has not expired under its own
    /// windows. An expired entry found here is evicted.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = lock::write(&self.inner.entries, "has");
        let expired = match entries.get(key) {
            None => return false,
            Some(entry) => entry.own_freshness(now) == Freshness::Expired,
        };
        if expired {
            entries.remove(key);
            debug!(key, "Evicted expired entry on lookup");
        }
        !expired
    }

    /// True if `key` holds an entry still inside its fresh window.
    pub fn is_fresh(&self, key: &str) -> bool {
        let now = Instant::now();
        lock::read(&self.inner.entries, "is_fresh")
            .get(key)
            .is_some_and(|entry| entry.own_freshness(now) == Freshness::Fresh)
    }

    /// Remove every expired entry.
    pub fn cleanup(&self) -> usize {
        let removed = self.retain_by_freshness(|freshness| freshness != Freshness::Expired);
        if removed > 0 {
            counter!(METRIC_CACHE_SWEPT).increment(removed as u64);
            info!(removed, "Swept expired cache entries");
        }
        removed
    }

    /// Remove every entry that is no longer fresh, stale ones included.
    pub fn cleanup_stale(&self) -> usize {
        let removed = self.retain_by_freshness(|freshness| freshness == Freshness::Fresh);
        if removed > 0 {
            counter!(METRIC_CACHE_SWEPT).increment(removed as u64);
            info!(removed, "Swept stale and expired cache entries");
        }
        removed
    }

    pub fn clear(&self) {
        lock::write(&self.inner.entries, "clear").clear();
    }

    pub fn keys(&self) -> Vec<String> {
        lock::read(&self.inner.entries, "keys")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock::read(&self.inner.entries, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = lock::read(&self.inner.entries, "stats");
        let mut stats = CacheStats {
            total: entries.len(),
            ..CacheStats::default()
        };
        for entry in entries.values() {
            match entry.own_freshness(now) {
                Freshness::Fresh => stats.fresh += 1,
                Freshness::Stale => stats.stale += 1,
                Freshness::Expired => stats.expired += 1,
            }
            if entry.refreshing {
                stats.refreshing += 1;
            }
        }
        stats
    }

    fn retain_by_freshness(&self, keep: impl Fn(Freshness) -> bool) -> usize {
        let now = Instant::now();
        let mut entries = lock::write(&self.inner.entries, "sweep");
        let before = entries.len();
        entries.retain(|_, entry| keep(entry.own_freshness(now)));
        before - entries.len()
    }

    fn entry<T>(&self, data: T, windows: CacheConfig) -> CacheEntry
    where
        T: Send + Sync + 'static,
    {
        CacheEntry {
            data: Box::new(data),
            stored_at: Instant::now(),
            windows,
            generation: self.inner.generations.fetch_add(1, Ordering::Relaxed),
            refreshing: false,
        }
    }

    fn insert<T>(&self, key: &str, data: T, windows: CacheConfig)
    where
        T: Send + Sync + 'static,
    {
        let entry = self.entry(data, windows);
        lock::write(&self.inner.entries, "insert").insert(key.to_string(), entry);
    }

    fn spawn_refresh<T, Fut, E>(
        &self,
        key: String,
        generation: u64,
        windows: CacheConfig,
        refresh: Fut,
    ) where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let cache = self.clone();
        tokio::spawn(async move {
            match refresh.await {
                Ok(data) => cache.finish_refresh(&key, generation, windows, data),
                Err(error) => cache.abandon_refresh(&key, generation, &error),
            }
        });
    }

    fn finish_refresh<T>(&self, key: &str, generation: u64, windows: CacheConfig, data: T)
    where
        T: Send + Sync + 'static,
    {
        let mut entries = lock::write(&self.inner.entries, "finish_refresh");
        let current = entries
            .get(key)
            .is_some_and(|entry| entry.generation == generation);
        if current {
            let entry = self.entry(data, windows);
            entries.insert(key.to_string(), entry);
            debug!(key, "Revalidated cache entry");
        } else {
            // Invalidated or overwritten while the fetch ran.
            debug!(key, generation, "Discarded revalidation for superseded entry");
        }
    }

    fn abandon_refresh(&self, key: &str, generation: u64, error: &dyn StdError) {
        warn!(key, error = %error, "Background revalidation failed, keeping stale entry");
        counter!(METRIC_CACHE_REFRESH_FAILED).increment(1);

        let mut entries = lock::write(&self.inner.entries, "abandon_refresh");
        if let Some(entry) = entries
            .get_mut(key)
            .filter(|entry| entry.generation == generation)
        {
            entry.refreshing = false;
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("defaults", &self.inner.defaults)
            .field("entries", &self.len())
            .finish()
    }
}

fn ensure_key<E>(key: &str) -> Result<(), CacheError<E>> {
    if key.trim().is_empty() {
        return Err(CacheError::InvalidKey);
    }
    Ok(())
}
