// In-memory freshness cache and revalidation coordinator.
// Implements stale-while-revalidate: fresh hits return directly, stale hits
// return the old value and kick off at most one background refresh per key,
// and only a cold miss ever surfaces a fetch error to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::error::Result;

/// Observable per-key state: Fresh → Stale → Refreshing → Fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    /// Stale, with a background refresh currently in flight.
    Refreshing,
}

#[derive(Debug, Clone)]
struct MemEntry<T> {
    data: T,
    fetched_at: Instant,
    ttl: Duration,
}

impl<T> MemEntry<T> {
    fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            fetched_at: Instant::now(),
            ttl,
        }
    }

    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() >= self.ttl
    }
}

/// Per-key cached values plus the set of keys with an in-flight refresh.
///
/// Both maps are sharded concurrent maps, so unrelated keys never contend on
/// a common lock; the refresh set's atomic insert-if-absent is the sole
/// synchronization primitive guaranteeing at most one refresh per key.
pub struct SwrCache<T> {
    entries: Arc<DashMap<String, MemEntry<T>>>,
    refreshing: Arc<DashMap<String, ()>>,
    refresh_timeout: Duration,
}

impl<T> SwrCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(refresh_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            refreshing: Arc::new(DashMap::new()),
            refresh_timeout,
        }
    }

    /// Read the value for `key`, fetching through `fetch` as needed.
    ///
    /// The loader resolves to the value plus the TTL it should live under,
    /// so an entry warmed from a lower tier keeps its residual life rather
    /// than restarting the clock with a full TTL.
    ///
    /// - miss: awaits `fetch` and stores the result; this is the only path
    ///   that can return an error.
    /// - fresh hit: returns the cached value.
    /// - stale hit: returns the cached value immediately and, unless one is
    ///   already in flight, spawns a detached refresh bounded by the
    ///   configured timeout. A failed refresh leaves the old value in place.
    pub async fn read<F, Fut>(&self, key: &str, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, Duration)>> + Send + 'static,
    {
        if let Some(entry) = self.entries.get(key) {
            let data = entry.data.clone();
            let stale = entry.is_stale();
            drop(entry);

            if stale && self.try_begin_refresh(key) {
                self.spawn_refresh(key.to_string(), fetch());
            }
            return Ok(data);
        }

        debug!(key, "memory cache miss, fetching synchronously");
        let (data, ttl) = fetch().await?;
        self.entries
            .insert(key.to_string(), MemEntry::new(data.clone(), ttl));
        Ok(data)
    }

    /// Current state of a key, `None` when it has never been loaded.
    pub fn freshness(&self, key: &str) -> Option<Freshness> {
        let entry = self.entries.get(key)?;
        if !entry.is_stale() {
            Some(Freshness::Fresh)
        } else if self.refreshing.contains_key(key) {
            Some(Freshness::Refreshing)
        } else {
            Some(Freshness::Stale)
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Atomic membership-check-then-insert on the refresh set. Returns true
    /// when this caller won the slot and must spawn the refresh.
    fn try_begin_refresh(&self, key: &str) -> bool {
        match self.refreshing.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(());
                true
            }
        }
    }

    fn spawn_refresh<Fut>(&self, key: String, fut: Fut)
    where
        Fut: Future<Output = Result<(T, Duration)>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let refreshing = Arc::clone(&self.refreshing);
        let timeout = self.refresh_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(Ok((data, ttl))) => {
                    debug!(key, "background refresh succeeded");
                    entries.insert(key.clone(), MemEntry::new(data, ttl));
                }
                Ok(Err(e)) => {
                    warn!(key, error = %e, "background refresh failed, keeping stale value");
                }
                Err(_) => {
                    warn!(key, ?timeout, "background refresh timed out, keeping stale value");
                }
            }
            // Free the slot on every completion path so a later stale read
            // can try again.
            refreshing.remove(&key);
        });
    }
}
