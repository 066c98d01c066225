//! Entity Cache: last known representation of each remote entity, keyed by
//! [`EntityKey`], with per-key freshness.
//!
//! Reads of the same key share one entry and at most one in-flight fetch.
//! Fetches run as spawned tasks so a passive read can start one without
//! awaiting it; awaiters attach to the task through a shared future.
//! Internal state lives behind a `std::sync::Mutex` that is never held
//! across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use quire_core::{CacheSettings, QuireError, QuireResult, RemoteError, Timestamp};
use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::freshness::{Freshness, QueryState};
use super::key::EntityKey;
use super::traits::{CacheStats, CachedEntity, EntityFetcher, EntityValue};
use crate::invalidation::InvalidationTarget;

/// Configuration for the entity cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Fresh entries older than this are treated as Stale on access.
    pub stale_after: Option<Duration>,
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-based staleness threshold.
    pub fn with_stale_after(mut self, duration: Duration) -> Self {
        self.stale_after = Some(duration);
        self
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            stale_after: settings.stale_after(),
        }
    }
}

/// How a spawned fetch ended, from the cache's point of view.
#[derive(Debug, Clone)]
enum FetchOutcome {
    /// The result was applied to the entry (or recorded as its failure).
    Settled(QuireResult<EntityValue>),
    /// The entry was invalidated or dropped while the fetch was in flight;
    /// the result was discarded.
    Superseded,
}

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

struct InFlight {
    future: SharedFetch,
    abort: AbortHandle,
}

struct CacheEntry {
    value: Option<EntityValue>,
    freshness: Freshness,
    last_fetched_at: Option<Timestamp>,
    last_error: Option<QuireError>,
    in_flight: Option<InFlight>,
    /// Bumped by every invalidation; a fetch only applies if the generation
    /// it started under is still current.
    generation: u64,
    observers: usize,
    notify: watch::Sender<u64>,
}

impl CacheEntry {
    fn new() -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            value: None,
            freshness: Freshness::Stale,
            last_fetched_at: None,
            last_error: None,
            in_flight: None,
            generation: 0,
            observers: 0,
            notify,
        }
    }

    fn snapshot(&self) -> QueryState<EntityValue> {
        QueryState::new(
            self.value.clone(),
            Some(self.freshness),
            self.last_fetched_at,
            self.last_error.clone(),
        )
    }

    fn expire(&mut self, stale_after: Option<Duration>) {
        let (Some(threshold), Some(fetched_at)) = (stale_after, self.last_fetched_at) else {
            return;
        };
        if self.freshness.is_fresh() {
            let age = (Utc::now() - fetched_at).to_std().unwrap_or(Duration::ZERO);
            if age >= threshold {
                self.freshness = Freshness::Stale;
            }
        }
    }

    fn wants_passive_fetch(&self) -> bool {
        self.freshness.is_stale() && self.in_flight.is_none() && self.last_error.is_none()
    }

    fn bump(&self) {
        self.notify.send_modify(|version| *version += 1);
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<EntityKey, CacheEntry>,
    stats: CacheStats,
}

struct CacheInner {
    fetcher: Arc<dyn EntityFetcher>,
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fetch for `key` and register it as the entry's in-flight
    /// fetch. Must be called with the state lock held (passed in as
    /// `state`). Returns `None` outside a tokio runtime.
    fn start_fetch(
        self: &Arc<Self>,
        state: &mut CacheState,
        key: EntityKey,
    ) -> Option<SharedFetch> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(key = %key, "No async runtime; fetch not started");
                return None;
            }
        };

        state.stats.network_fetches += 1;
        let entry = state.entries.entry(key).or_insert_with(CacheEntry::new);
        let generation = entry.generation;

        let inner = Arc::clone(self);
        let fetcher = Arc::clone(&self.fetcher);
        let task = runtime.spawn(async move {
            tracing::debug!(key = %key, generation, "Fetch started");
            let result = fetcher.fetch(&key).await;
            inner.settle(key, generation, result)
        });
        let abort = task.abort_handle();

        let future = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_cancelled() => FetchOutcome::Superseded,
                Err(err) => FetchOutcome::Settled(Err(RemoteError::call_failed(
                    "fetch",
                    err.to_string(),
                )
                .into())),
            }
        }
        .boxed()
        .shared();

        entry.freshness = Freshness::Fetching;
        entry.last_error = None;
        entry.in_flight = Some(InFlight {
            future: future.clone(),
            abort,
        });
        entry.bump();
        Some(future)
    }

    /// Apply a fetch result to its entry.
    fn settle(
        self: &Arc<Self>,
        key: EntityKey,
        generation: u64,
        result: QuireResult<EntityValue>,
    ) -> FetchOutcome {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(&key) else {
            return FetchOutcome::Superseded;
        };
        entry.in_flight = None;

        if entry.generation != generation {
            tracing::debug!(key = %key, generation, "Fetch superseded by invalidation");
            entry.freshness = Freshness::Stale;
            entry.last_error = None;
            let observed = entry.observers > 0;
            entry.bump();
            if observed {
                self.start_fetch(&mut state, key);
            }
            return FetchOutcome::Superseded;
        }

        match &result {
            Ok(value) => {
                tracing::debug!(key = %key, "Fetch settled");
                entry.value = Some(value.clone());
                entry.freshness = Freshness::Fresh;
                entry.last_fetched_at = Some(Utc::now());
                entry.last_error = None;
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Fetch failed; keeping previous value");
                entry.freshness = Freshness::Stale;
                entry.last_error = Some(err.clone());
            }
        }
        entry.bump();
        FetchOutcome::Settled(result)
    }
}

/// Keyed store of remote entity representations.
///
/// Cloning is cheap and yields a handle to the same cache.
#[derive(Clone)]
pub struct EntityCache {
    inner: Arc<CacheInner>,
}

impl EntityCache {
    pub fn new(fetcher: Arc<dyn EntityFetcher>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                fetcher,
                config,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Return what is cached for `key` and start a background fetch if the
    /// entry is absent or Stale, not already Fetching, and has no recorded
    /// failure.
    pub fn read(&self, key: &EntityKey) -> QueryState<EntityValue> {
        let mut state = self.inner.lock();
        let stale_after = self.inner.config.stale_after;
        let entry = state.entries.entry(*key).or_insert_with(CacheEntry::new);
        entry.expire(stale_after);

        let fresh = entry.freshness.is_fresh();
        let wants_fetch = entry.wants_passive_fetch();
        if fresh {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        if wants_fetch {
            self.inner.start_fetch(&mut state, *key);
        }

        match state.entries.get(key) {
            Some(entry) => entry.snapshot(),
            None => QueryState::new(None, None, None, None),
        }
    }

    /// Typed [`read`](Self::read).
    pub fn read_as<T: CachedEntity>(&self, key: &EntityKey) -> QueryState<T> {
        self.read(key).filter_map(T::from_value)
    }

    /// Resolve to the store's current value for `key`.
    ///
    /// A Fresh entry answers immediately. Otherwise this joins the in-flight
    /// fetch or starts one; a recorded failure is cleared first. If the
    /// fetch is superseded by an invalidation the follow-up fetch is
    /// awaited instead.
    pub async fn fetch(&self, key: &EntityKey) -> QuireResult<EntityValue> {
        loop {
            let pending = {
                let mut state = self.inner.lock();
                let stale_after = self.inner.config.stale_after;
                let entry = state.entries.entry(*key).or_insert_with(CacheEntry::new);
                entry.expire(stale_after);

                if let Some(in_flight) = &entry.in_flight {
                    let future = in_flight.future.clone();
                    state.stats.misses += 1;
                    Some(future)
                } else if let (true, Some(value)) = (entry.freshness.is_fresh(), &entry.value) {
                    let value = value.clone();
                    state.stats.hits += 1;
                    return Ok(value);
                } else {
                    state.stats.misses += 1;
                    self.inner.start_fetch(&mut state, *key)
                }
            };

            let Some(pending) = pending else {
                return Err(RemoteError::call_failed("fetch", "no async runtime").into());
            };
            match pending.await {
                FetchOutcome::Settled(result) => return result,
                FetchOutcome::Superseded => continue,
            }
        }
    }

    /// Typed [`fetch`](Self::fetch).
    pub async fn fetch_as<T: CachedEntity>(&self, key: &EntityKey) -> QuireResult<T> {
        let value = self.fetch(key).await?;
        T::from_value(value).ok_or_else(|| {
            RemoteError::call_failed("fetch", format!("unexpected value shape for {key}")).into()
        })
    }

    /// Store `value` as the Fresh representation of `key`.
    ///
    /// Any fetch in flight for the key started before this write and is
    /// discarded when it settles.
    pub fn write_through(&self, key: &EntityKey, value: EntityValue) {
        let mut state = self.inner.lock();
        let entry = state.entries.entry(*key).or_insert_with(CacheEntry::new);
        entry.value = Some(value);
        entry.last_fetched_at = Some(Utc::now());
        entry.last_error = None;
        if entry.in_flight.is_some() {
            entry.generation += 1;
        } else {
            entry.freshness = Freshness::Fresh;
        }
        entry.bump();
    }

    /// Mark every entry matching `target` Stale and refetch the observed
    /// ones. Returns the keys that were marked.
    pub(crate) fn invalidate(&self, target: &InvalidationTarget) -> Vec<EntityKey> {
        let mut state = self.inner.lock();
        let keys: Vec<EntityKey> = state
            .entries
            .keys()
            .filter(|key| target.matches(key))
            .copied()
            .collect();

        for key in &keys {
            let Some(entry) = state.entries.get_mut(key) else {
                continue;
            };
            entry.generation += 1;
            entry.last_error = None;
            let refetch = if entry.in_flight.is_some() {
                // The in-flight result is discarded on settle, which then
                // starts the follow-up fetch.
                false
            } else {
                entry.freshness = Freshness::Stale;
                entry.observers > 0
            };
            entry.bump();
            state.stats.invalidations += 1;
            if refetch {
                self.inner.start_fetch(&mut state, *key);
            }
        }

        tracing::debug!(target = %target, count = keys.len(), "Invalidated cache entries");
        keys
    }

    /// Register interest in `key`. While the returned observer is alive the
    /// key counts as observed: invalidations refetch it immediately.
    pub fn observe(&self, key: &EntityKey) -> Observer {
        let mut state = self.inner.lock();
        let stale_after = self.inner.config.stale_after;
        let entry = state.entries.entry(*key).or_insert_with(CacheEntry::new);
        entry.expire(stale_after);
        entry.observers += 1;
        let receiver = entry.notify.subscribe();
        if entry.wants_passive_fetch() {
            self.inner.start_fetch(&mut state, *key);
        }
        Observer {
            cache: self.clone(),
            key: *key,
            receiver,
        }
    }

    /// Freshness of `key`, or `None` if the key has never been read.
    pub fn freshness(&self, key: &EntityKey) -> Option<Freshness> {
        let state = self.inner.lock();
        state.entries.get(key).map(|entry| entry.freshness)
    }

    /// Cached value of `key` without starting a fetch.
    pub fn peek(&self, key: &EntityKey) -> Option<EntityValue> {
        let state = self.inner.lock();
        state.entries.get(key).and_then(|entry| entry.value.clone())
    }

    /// Every key currently held.
    pub fn keys(&self) -> Vec<EntityKey> {
        let state = self.inner.lock();
        state.entries.keys().copied().collect()
    }

    /// Drop every entry and abort in-flight fetches.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        for entry in state.entries.values() {
            if let Some(in_flight) = &entry.in_flight {
                in_flight.abort.abort();
            }
        }
        let count = state.entries.len();
        state.entries.clear();
        tracing::debug!(count, "Cleared entity cache");
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    fn release_observer(&self, key: &EntityKey) {
        let mut state = self.inner.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }
}

/// RAII registration of interest in one cache key.
pub struct Observer {
    cache: EntityCache,
    key: EntityKey,
    receiver: watch::Receiver<u64>,
}

impl Observer {
    pub fn key(&self) -> EntityKey {
        self.key
    }

    /// Current state of the observed entry. Like [`EntityCache::read`], this
    /// starts a fetch when the entry needs one.
    pub fn state(&self) -> QueryState<EntityValue> {
        self.cache.read(&self.key)
    }

    /// Typed [`state`](Self::state).
    pub fn state_as<T: CachedEntity>(&self) -> QueryState<T> {
        self.cache.read_as(&self.key)
    }

    /// Wait for the next change to the entry. Returns `false` once the
    /// entry has been dropped from the cache.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until the entry is no longer Fetching and return its state.
    pub async fn settled(&mut self) -> QueryState<EntityValue> {
        loop {
            let state = self.cache.inner.lock();
            let current = state.entries.get(&self.key).map(CacheEntry::snapshot);
            drop(state);
            match current {
                Some(snapshot) if !snapshot.is_fetching() => return snapshot,
                Some(_) => {
                    if !self.changed().await {
                        return QueryState::new(None, None, None, None);
                    }
                }
                None => return QueryState::new(None, None, None, None),
            }
        }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.cache.release_observer(&self.key);
    }
}
