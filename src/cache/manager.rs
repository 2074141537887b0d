//! Cache Manager Module
//!
//! General-purpose get-or-compute cache. Combines the TTL store with
//! space-bounded eviction, stale-on-error fallback, pattern invalidation,
//! batch fetch and in-flight fetch sharing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::entry::{CacheEntry, Priority};
use crate::cache::eviction;
use crate::cache::pattern::KeyPattern;
use crate::cache::stats::CacheStats;
use crate::cache::ttl_store::{payload_size, Lookup, TtlStore};
use crate::config::Config;
use crate::error::{BoxError, CacheError, Result};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>>>>;

// == Options ==
/// Per-call write options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheOptions {
    /// Entry lifetime; the manager default when unset
    pub ttl: Option<Duration>,
    pub priority: Priority,
    /// Share one fetch between concurrent misses; the manager default when unset
    pub dedupe: Option<bool>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = Some(dedupe);
        self
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    store: TtlStore<Arc<Value>>,
    stats: CacheStats,
}

impl ManagerState {
    fn sync_totals(&mut self) {
        let (len, size) = (self.store.len(), self.store.total_size());
        self.stats.set_totals(len, size);
    }
}

struct Inner {
    state: Mutex<ManagerState>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
    max_size: usize,
    max_entries: usize,
    default_ttl: Duration,
    dedupe_in_flight: bool,
}

impl Inner {
    /// Fresh read; records a hit or a miss.
    fn fresh(&self, key: &str) -> Option<Arc<Value>> {
        let mut state = self.state.lock();
        let lookup = state.store.lookup(key);
        match lookup {
            Lookup::Fresh(value) => {
                state.stats.record_hit();
                debug!(key, "cache hit");
                Some(value)
            }
            Lookup::Stale(_) | Lookup::Missing => {
                state.stats.record_miss();
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Stores `value`, evicting lower-score entries first when a bound would break.
    fn store(&self, key: &str, value: Arc<Value>, options: CacheOptions) -> Result<()> {
        let size = payload_size(key, value.as_ref())?;
        if size > self.max_size {
            return Err(CacheError::EntryTooLarge {
                key: key.to_string(),
                size,
                max_size: self.max_size,
            });
        }

        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let mut state = self.state.lock();

        // An overwritten entry no longer counts against the bounds
        state.store.remove(key);

        let (current_size, current_len) = (state.store.total_size(), state.store.len());
        if eviction::needs_eviction(current_size, current_len, size, self.max_size, self.max_entries)
        {
            let plan = eviction::plan(
                state.store.entries(),
                current_size,
                size,
                self.max_size,
                self.max_entries,
            );
            for victim in &plan.keys {
                state.store.remove(victim);
            }
            state.stats.record_evictions(plan.keys.len());
            debug!(
                key,
                evicted = plan.keys.len(),
                freed = plan.freed,
                "evicted entries before insert"
            );
        }

        state
            .store
            .insert(CacheEntry::new(key, value, ttl, size).with_priority(options.priority));
        state.sync_totals();
        Ok(())
    }

    /// Serves an entry (stale or not) after a failed fetch, or hands back the error.
    fn stale_fallback(&self, key: &str, err: CacheError) -> Result<Arc<Value>> {
        let mut state = self.state.lock();
        state.stats.record_fetch_error();
        let cached = state.store.entry(key).map(|entry| Arc::clone(&entry.data));
        match cached {
            Some(value) => {
                state.stats.record_stale_hit();
                warn!(key, error = %err, "fetch failed, serving stale cache entry");
                Ok(value)
            }
            None => Err(err),
        }
    }
}

/// Runs `fut` and stores its result under `key`.
fn fetch_and_store<T, Fut, E>(
    inner: Arc<Inner>,
    key: String,
    fut: Fut,
    options: CacheOptions,
) -> BoxFuture<'static, Result<Arc<Value>>>
where
    T: Serialize + Send + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    async move {
        let data = fut.await.map_err(|err| CacheError::fetch(key.as_str(), err))?;
        let value = serde_json::to_value(&data)
            .map(Arc::new)
            .map_err(|err| CacheError::serialization(key.as_str(), err))?;
        inner.store(&key, Arc::clone(&value), options)?;
        Ok(value)
    }
    .boxed()
}

fn decode<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|err| CacheError::serialization(key, err))
}

// == Cache Manager ==
/// Shared get-or-compute cache.
///
/// Cloning is cheap; clones share the same entries and statistics.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager bounded by `max_size` bytes and `max_entries` entries.
    pub fn new(max_size: usize, max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ManagerState::default()),
                in_flight: Mutex::new(HashMap::new()),
                max_size,
                max_entries: max_entries.max(1),
                default_ttl,
                dedupe_in_flight: true,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_size, config.max_entries, config.default_ttl())
            .with_in_flight_dedup(config.dedupe_in_flight)
    }

    /// Sets the default for sharing in-flight fetches. Call before cloning.
    #[must_use]
    pub fn with_in_flight_dedup(mut self, enabled: bool) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.dedupe_in_flight = enabled,
            None => warn!("in-flight dedup setting ignored on a shared cache manager"),
        }
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    // == Get ==
    /// Returns the cached value for `key`, or runs `fetch` and caches its result.
    ///
    /// If `fetch` fails and an entry (even an expired one) exists for `key`,
    /// that entry is returned. The fetch error is returned only when there is
    /// nothing cached at all.
    pub async fn get<T, F, Fut, E>(&self, key: &str, fetch: F, options: CacheOptions) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        if let Some(value) = self.inner.fresh(key) {
            return decode(key, &value);
        }
        let value = self.load(key, fetch, options).await?;
        decode(key, &value)
    }

    /// Forces a fetch for `key`, keeping the existing entry if the fetch fails.
    pub async fn refresh<T, F, Fut, E>(
        &self,
        key: &str,
        fetch: F,
        options: CacheOptions,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let value = self.load(key, fetch, options).await?;
        decode(key, &value)
    }

    /// Miss path: fetch (shared or not), store, fall back to stale data on error.
    async fn load<T, F, Fut, E>(&self, key: &str, fetch: F, options: CacheOptions) -> Result<Arc<Value>>
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let dedupe = options.dedupe.unwrap_or(self.inner.dedupe_in_flight);

        let outcome = if dedupe {
            self.shared_fetch(key, fetch, options).await
        } else {
            fetch_and_store(Arc::clone(&self.inner), key.to_string(), fetch(), options).await
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(err @ CacheError::Fetch { .. }) => self.inner.stale_fallback(key, err),
            Err(err) => Err(err),
        }
    }

    /// Joins the in-flight fetch for `key`, starting one if none is running.
    fn shared_fetch<T, F, Fut, E>(&self, key: &str, fetch: F, options: CacheOptions) -> SharedFetch
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        if let Some(existing) = self.inner.in_flight.lock().get(key) {
            debug!(key, "joining in-flight fetch");
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let work = fetch_and_store(Arc::clone(&self.inner), key.to_string(), fetch(), options);
        let candidate = async move {
            let outcome = work.await;
            inner.in_flight.lock().remove(&owned_key);
            outcome
        }
        .boxed()
        .shared();

        // Another caller may have registered a fetch while ours was built
        self.inner
            .in_flight
            .lock()
            .entry(key.to_string())
            .or_insert(candidate)
            .clone()
    }

    // == Direct Access ==
    /// Stores `value` directly, bypassing the fetch path.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, options: CacheOptions) -> Result<()> {
        let value = serde_json::to_value(value)
            .map(Arc::new)
            .map_err(|err| CacheError::serialization(key, err))?;
        self.inner.store(key, value, options)
    }

    /// Returns the value only if a valid entry exists.
    pub fn get_sync<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.inner
            .fresh(key)
            .map(|value| decode(key, &value))
            .transpose()
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.state.lock().store.contains(key)
    }

    /// Removes `key`. Returns true if an entry existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock();
        let removed = state.store.remove(key).is_some();
        state.sync_totals();
        removed
    }

    /// Removes every entry. Returns the number removed.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.state.lock();
        let removed = state.store.clear(None);
        state.sync_totals();
        info!(removed, "cache cleared");
        removed
    }

    // == Invalidate Pattern ==
    /// Removes every key matching `pattern`. Returns the number removed.
    ///
    /// A `&str` matches as a substring, a `regex::Regex` as a regular expression.
    pub fn invalidate_pattern(&self, pattern: impl Into<KeyPattern>) -> usize {
        let pattern = pattern.into();
        let mut state = self.inner.state.lock();
        let removed = state.store.retain(|key, _| !pattern.matches(key));
        state.sync_totals();
        debug!(%pattern, removed, "invalidated keys by pattern");
        removed
    }

    // == Preload ==
    /// Warms `key` if it is not already cached. Errors are logged, never returned.
    ///
    /// The caller drives the load; use [`CacheManager::spawn_preload`] to detach it.
    pub async fn preload<T, F, Fut, E>(&self, key: &str, fetch: F, ttl: Option<Duration>)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        if self.has(key) {
            return;
        }
        let options = CacheOptions {
            ttl,
            ..CacheOptions::default()
        };
        if let Err(err) = self.load(key, fetch, options).await {
            warn!(key, error = %err, "preload failed");
        }
    }

    /// Fire-and-forget [`CacheManager::preload`] on the runtime.
    ///
    /// The returned handle may be dropped; the load still completes.
    pub fn spawn_preload<T, F, Fut, E>(
        &self,
        key: impl Into<String>,
        fetch: F,
        ttl: Option<Duration>,
    ) -> JoinHandle<()>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let cache = self.clone();
        let key = key.into();
        tokio::spawn(async move { cache.preload::<T, _, _, _>(&key, fetch, ttl).await })
    }

    // == Batch ==
    /// Resolves many keys at once.
    ///
    /// Cached keys are served directly; misses are fetched concurrently.
    /// A failed fetch only drops its own key from the result.
    pub async fn get_batch<T, F, Fut, E>(
        &self,
        requests: Vec<(String, F)>,
        options: CacheOptions,
    ) -> HashMap<String, T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let mut results = HashMap::with_capacity(requests.len());
        let mut misses = Vec::new();

        for (key, fetch) in requests {
            match self.inner.fresh(&key) {
                Some(value) => match decode(&key, &value) {
                    Ok(data) => {
                        results.insert(key, data);
                    }
                    Err(err) => warn!(key = %key, error = %err, "cached batch value unreadable"),
                },
                None => misses.push((key, fetch)),
            }
        }

        let fetched = join_all(misses.into_iter().map(|(key, fetch)| async move {
            let outcome = self.load(&key, fetch, options).await;
            (key, outcome)
        }))
        .await;

        for (key, outcome) in fetched {
            match outcome.and_then(|value| decode::<T>(&key, &value)) {
                Ok(data) => {
                    results.insert(key, data);
                }
                Err(err) => warn!(key = %key, error = %err, "batch fetch failed, key omitted"),
            }
        }

        results
    }

    // == Maintenance ==
    /// Removes every expired entry. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.inner.state.lock();
        let removed = state.store.cleanup();
        state.sync_totals();
        removed
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut state = self.inner.state.lock();
        state.sync_totals();
        state.stats.clone()
    }

    /// Hit count of the entry under `key`, if present.
    pub fn hits(&self, key: &str) -> Option<u64> {
        self.inner.state.lock().store.entry(key).map(|entry| entry.hits)
    }

    pub fn keys(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut keys: Vec<String> = state.store.keys().map(str::to_string).collect();
        keys.sort();
        keys
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_size(&self) -> usize {
        self.inner.state.lock().store.total_size()
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    pub fn max_entries(&self) -> usize {
        self.inner.max_entries
    }

    /// Number of fetches currently shared between callers.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("entries", &self.len())
            .field("total_size", &self.total_size())
            .field("max_size", &self.inner.max_size)
            .field("max_entries", &self.inner.max_entries)
            .finish()
    }
}
