use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{CacheConfig, CacheEntry, QueryOptions, QueryStatus, Subscription};
use crate::keys::CacheKey;
use crate::telemetry;
use crate::{HermodError, Result};

/// Produces the canonical value for a key.
///
/// Fetchers are stored on the entry so invalidation can refetch subscribed
/// keys without the caller being involved.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap an async closure as a [`Fetcher`].
pub fn fetcher<F, Fut>(f: F) -> Fetcher
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

struct Slot {
    state: watch::Sender<CacheEntry>,
    fetcher: Option<Fetcher>,
    options: QueryOptions,
    /// Identifies the fetch this slot is waiting on; bumped by `remove`.
    generation: u64,
    in_flight: bool,
    /// Invalidated while a fetch was running; refetch once it settles.
    invalidated_in_flight: bool,
    idle_since: Option<Instant>,
}

impl Slot {
    fn new(key: CacheKey, options: QueryOptions, generation: u64, now: Instant) -> Self {
        let (state, _) = watch::channel(CacheEntry::new(key));
        Self {
            state,
            fetcher: None,
            options,
            generation,
            in_flight: false,
            invalidated_in_flight: false,
            idle_since: Some(now),
        }
    }

    fn entry(&self) -> CacheEntry {
        self.state.borrow().clone()
    }

    fn subscribers(&self) -> usize {
        self.state.borrow().subscriber_count
    }

    fn update(&self, f: impl FnOnce(&mut CacheEntry)) {
        self.state.send_modify(f);
    }

    fn write_value(&self, value: Value, stale_time: Duration, now: Instant) {
        let in_flight = self.in_flight;
        self.update(|e| {
            e.value = Some(value);
            e.error = None;
            e.status = if in_flight {
                QueryStatus::Loading
            } else {
                QueryStatus::Success
            };
            e.fetched_at = Some(now);
            e.stale_at = Some(now + stale_time);
            e.retry_count = 0;
        });
    }

    fn is_evictable(&self, now: Instant, gc_time: Duration) -> bool {
        !self.in_flight
            && self.subscribers() == 0
            && self
                .idle_since
                .is_some_and(|since| now.duration_since(since) >= gc_time)
    }
}

#[derive(Default)]
struct State {
    slots: HashMap<CacheKey, Slot>,
    /// Generations of in-flight fetches whose entry was removed.
    discarded: HashSet<u64>,
}

struct Shared {
    config: CacheConfig,
    state: Mutex<State>,
    generations: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    fn new_slot(&self, key: &CacheKey, options: QueryOptions, now: Instant) -> Slot {
        Slot::new(key.clone(), options, self.next_generation(), now)
    }

    /// Mark the slot loading and spawn its fetch.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    fn start_fetch(self: &Arc<Self>, key: &CacheKey, slot: &mut Slot) {
        let Some(fetcher) = slot.fetcher.clone() else {
            return;
        };
        slot.in_flight = true;
        slot.invalidated_in_flight = false;
        slot.update(|e| {
            e.status = QueryStatus::Loading;
            e.retry_count = 0;
        });
        metrics::counter!(telemetry::FETCHES_TOTAL, "domain" => domain_label(key)).increment(1);
        debug!(key = %key, generation = slot.generation, "fetch started");
        tokio::spawn(run_fetch(
            Arc::downgrade(self),
            key.clone(),
            slot.generation,
            fetcher,
            slot.options.clone(),
        ));
    }

    /// Mirror the retry counter onto the entry. Returns `false` when the
    /// entry was removed and the fetch should stop.
    fn record_retry(&self, key: &CacheKey, generation: u64, retries: u32) -> bool {
        let mut state = self.lock();
        if state.discarded.remove(&generation) {
            return false;
        }
        if let Some(slot) = state.slots.get(key).filter(|s| s.generation == generation) {
            slot.update(|e| e.retry_count = retries);
        }
        true
    }

    fn settle(
        self: &Arc<Self>,
        key: &CacheKey,
        generation: u64,
        fetcher: Fetcher,
        options: &QueryOptions,
        outcome: Result<Value>,
    ) {
        let now = Instant::now();
        let mut state = self.lock();
        if state.discarded.remove(&generation) {
            debug!(key = %key, "discarding fetch result for removed entry");
            return;
        }

        let slot = match state.slots.entry(key.clone()) {
            std::collections::hash_map::Entry::Occupied(o) => o.into_mut(),
            std::collections::hash_map::Entry::Vacant(v) => {
                // Evicted or cleared mid-flight: write the result back anyway.
                debug!(key = %key, "resurrecting entry for late fetch result");
                let mut slot = Slot::new(key.clone(), options.clone(), self.next_generation(), now);
                slot.fetcher = Some(fetcher);
                v.insert(slot)
            }
        };

        let owns = slot.generation == generation;
        if owns {
            slot.in_flight = false;
        }

        match outcome {
            Ok(value) => {
                slot.write_value(value, options.stale_time, now);
                debug!(key = %key, "fetch succeeded");
            }
            Err(err) => {
                warn!(key = %key, error = %err, "fetch failed");
                let in_flight = slot.in_flight;
                slot.update(|e| {
                    e.error = Some(err);
                    e.status = if in_flight {
                        QueryStatus::Loading
                    } else {
                        QueryStatus::Error
                    };
                });
            }
        }

        if owns && slot.invalidated_in_flight {
            slot.invalidated_in_flight = false;
            slot.update(|e| {
                if e.stale_at.is_some() {
                    e.stale_at = Some(now);
                }
            });
            if slot.subscribers() > 0 && slot.options.enabled {
                self.start_fetch(key, slot);
            }
        }

        if slot.subscribers() == 0 && !slot.in_flight {
            slot.idle_since = Some(now);
            self.schedule_gc(key.clone());
        }
    }

    fn schedule_gc(self: &Arc<Self>, key: CacheKey) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let shared = Arc::downgrade(self);
        let gc_time = self.config.gc_time;
        handle.spawn(async move {
            tokio::time::sleep(gc_time).await;
            if let Some(shared) = shared.upgrade() {
                shared.evict_if_idle(&key);
            }
        });
    }

    fn evict_if_idle(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        let mut state = self.lock();
        let evictable = state
            .slots
            .get(key)
            .is_some_and(|slot| slot.is_evictable(now, self.config.gc_time));
        if evictable {
            state.slots.remove(key);
            metrics::counter!(telemetry::EVICTIONS_TOTAL, "domain" => domain_label(key))
                .increment(1);
            debug!(key = %key, "evicted idle entry");
        }
        evictable
    }
}

async fn run_fetch(
    shared: Weak<Shared>,
    key: CacheKey,
    generation: u64,
    fetcher: Fetcher,
    options: QueryOptions,
) {
    let started = Instant::now();
    let domain = domain_label(&key);
    let mut retries = 0u32;

    let outcome = loop {
        match fetcher().await {
            Ok(value) => break Ok(value),
            Err(err) if options.retry.should_retry(retries, err.is_transient()) => {
                let delay = options.retry.delay_for_attempt(retries);
                retries += 1;
                let Some(live) = shared.upgrade() else {
                    return;
                };
                if !live.record_retry(&key, generation, retries) {
                    debug!(key = %key, "entry removed, abandoning retries");
                    return;
                }
                drop(live);
                metrics::counter!(telemetry::RETRIES_TOTAL, "domain" => domain.clone())
                    .increment(1);
                warn!(
                    key = %key,
                    attempt = retries,
                    max_retries = options.retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying fetch after transient error"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => break Err(err),
        }
    };

    let status = if outcome.is_ok() { "ok" } else { "error" };
    metrics::histogram!(telemetry::FETCH_DURATION_SECONDS, "domain" => domain, "status" => status)
        .record(started.elapsed().as_secs_f64());

    if let Some(shared) = shared.upgrade() {
        shared.settle(&key, generation, fetcher, &options, outcome);
    }
}

fn domain_label(key: &CacheKey) -> String {
    key.domain().unwrap_or("unknown").to_string()
}

/// Process-wide query cache.
///
/// Cloning is cheap and every clone shares the same entries. All reads and
/// writes go through this key-scoped API.
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<Shared>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State::default()),
                generations: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Current state of `key`, scheduling a fetch when it is enabled,
    /// missing or stale, and not already in flight.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context when a fetch is scheduled.
    pub fn get(&self, key: &CacheKey, fetcher: &Fetcher, options: &QueryOptions) -> CacheEntry {
        self.read(key, fetcher, options).0
    }

    /// Like [`get()`](Self::get), then wait for the entry to settle.
    ///
    /// Fresh values return without touching the network. Concurrent callers
    /// for the same key share one fetch.
    pub async fn fetch(
        &self,
        key: &CacheKey,
        fetcher: &Fetcher,
        options: &QueryOptions,
    ) -> Result<Value> {
        let (entry, mut rx) = self.read(key, fetcher, options);
        if !entry.is_fetching() {
            return settled(entry);
        }
        let entry = match rx.wait_for(|e| !e.is_fetching()).await {
            Ok(entry) => entry.clone(),
            Err(_) => return Err(HermodError::NotFound(key.to_string())),
        };
        settled(entry)
    }

    fn read(
        &self,
        key: &CacheKey,
        fetcher: &Fetcher,
        options: &QueryOptions,
    ) -> (CacheEntry, watch::Receiver<CacheEntry>) {
        let now = Instant::now();
        let mut state = self.shared.lock();
        let created = !state.slots.contains_key(key);
        let slot = state
            .slots
            .entry(key.clone())
            .or_insert_with(|| self.shared.new_slot(key, options.clone(), now));
        slot.fetcher = Some(Arc::clone(fetcher));
        slot.options = options.clone();

        let stale = slot.state.borrow().is_stale_at(now);
        if stale {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "domain" => domain_label(key))
                .increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "domain" => domain_label(key))
                .increment(1);
        }

        if options.enabled && stale && !slot.in_flight {
            self.shared.start_fetch(key, slot);
        }
        if created && !slot.in_flight {
            self.shared.schedule_gc(key.clone());
        }
        (slot.entry(), slot.state.subscribe())
    }

    /// Mark every entry equal to or below `prefix` stale.
    ///
    /// Subscribed entries refetch right away; the rest refetch on their
    /// next read. Returns the number of entries marked.
    pub fn invalidate(&self, prefix: &CacheKey) -> usize {
        let now = Instant::now();
        let mut state = self.shared.lock();
        let mut marked = 0;
        for (key, slot) in state.slots.iter_mut() {
            if !key.starts_with(prefix) {
                continue;
            }
            marked += 1;
            slot.update(|e| {
                if e.stale_at.is_some() {
                    e.stale_at = Some(now);
                }
            });
            if slot.in_flight {
                slot.invalidated_in_flight = true;
            } else if slot.subscribers() > 0 && slot.options.enabled {
                self.shared.start_fetch(key, slot);
            }
        }
        if marked > 0 {
            metrics::counter!(telemetry::INVALIDATIONS_TOTAL, "domain" => domain_label(prefix))
                .increment(marked as u64);
            debug!(prefix = %prefix, marked, "invalidated");
        }
        marked
    }

    /// Write a value directly, marking the entry fresh for the entry's own
    /// stale time (or the cache default for a new entry).
    pub fn set_value(&self, key: &CacheKey, value: Value) {
        self.write(key, value, None);
    }

    /// Write a value that stays fresh for `stale_time`.
    pub fn set_value_fresh_for(&self, key: &CacheKey, value: Value, stale_time: Duration) {
        self.write(key, value, Some(stale_time));
    }

    fn write(&self, key: &CacheKey, value: Value, stale_time: Option<Duration>) {
        let now = Instant::now();
        let mut state = self.shared.lock();
        let created = !state.slots.contains_key(key);
        let slot = state
            .slots
            .entry(key.clone())
            .or_insert_with(|| self.shared.new_slot(key, self.shared.config.query_options(), now));
        let stale_time = stale_time.unwrap_or(slot.options.stale_time);
        slot.write_value(value, stale_time, now);
        if created {
            self.shared.schedule_gc(key.clone());
        }
    }

    /// Replace the value of `key` with `patcher(current)`.
    ///
    /// Returning `None` leaves the entry untouched. The patcher runs
    /// without the cache lock held. Returns whether a value was written.
    pub fn update_value<F>(&self, key: &CacheKey, patcher: F) -> bool
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        let current = self.peek(key).and_then(|e| e.value);
        match patcher(current.as_ref()) {
            Some(next) => {
                self.set_value(key, next);
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `key`.
    ///
    /// Subscribed entries are reset to `Idle` instead so subscribers observe
    /// the removal. A fetch in flight for the entry is abandoned and its
    /// result discarded.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let Some(slot) = state.slots.get_mut(key) else {
            return false;
        };
        if slot.in_flight {
            state.discarded.insert(slot.generation);
        }
        if slot.subscribers() > 0 {
            slot.generation = self.shared.next_generation();
            slot.in_flight = false;
            slot.invalidated_in_flight = false;
            slot.update(CacheEntry::reset);
        } else {
            state.slots.remove(key);
        }
        debug!(key = %key, "removed");
        true
    }

    /// Register interest in `key`. Dropping the returned guard unsubscribes.
    ///
    /// Subscribed entries are never evicted and refetch immediately when
    /// invalidated.
    pub fn subscribe(&self, key: &CacheKey) -> Subscription {
        let now = Instant::now();
        let mut state = self.shared.lock();
        let slot = state
            .slots
            .entry(key.clone())
            .or_insert_with(|| self.shared.new_slot(key, self.shared.config.query_options(), now));
        slot.idle_since = None;
        slot.update(|e| e.subscriber_count += 1);
        let rx = slot.state.subscribe();
        Subscription::new(self.clone(), key.clone(), rx)
    }

    /// Release one subscription on `key`; reaching zero starts the idle window.
    pub(crate) fn unsubscribe(&self, key: &CacheKey) {
        let now = Instant::now();
        let mut state = self.shared.lock();
        let Some(slot) = state.slots.get_mut(key) else {
            return;
        };
        slot.update(|e| e.subscriber_count = e.subscriber_count.saturating_sub(1));
        if slot.subscribers() == 0 {
            slot.idle_since = Some(now);
            self.shared.schedule_gc(key.clone());
        }
    }

    /// Snapshot of `key` without scheduling anything.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.shared.lock().slots.get(key).map(Slot::entry)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.shared.lock().slots.contains_key(key)
    }

    /// Whether a fetch for `key` is currently in flight.
    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.shared
            .lock()
            .slots
            .get(key)
            .is_some_and(|slot| slot.in_flight)
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self.shared.lock().slots.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.shared.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every entry past its idle window. Returns the number evicted.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.shared.config.gc_time;
        let mut state = self.shared.lock();
        let before = state.slots.len();
        state.slots.retain(|_, slot| !slot.is_evictable(now, gc_time));
        let evicted = before - state.slots.len();
        if evicted > 0 {
            metrics::counter!(telemetry::EVICTIONS_TOTAL, "domain" => "*").increment(evicted as u64);
        }
        evicted
    }

    /// Drop every entry. In-flight fetches still write their results back.
    pub fn clear(&self) {
        self.shared.lock().slots.clear();
    }
}

fn settled(entry: CacheEntry) -> Result<Value> {
    match (entry.status, entry.value, entry.error) {
        (QueryStatus::Error, _, Some(err)) => Err(err),
        (_, Some(value), _) => Ok(value),
        (_, None, Some(err)) => Err(err),
        (_, None, None) => Err(HermodError::NotFound(entry.key.to_string())),
    }
}
