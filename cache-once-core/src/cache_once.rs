use crate::generation::{Generation, Settled};
use crate::slots::{Claim, SlotGuard, SlotTable};
use crate::ttl::{Fixed, FromValue, TtlPolicy};
use crate::{CacheEntry, ExpiringStore, LockMode, MemoryStore};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

#[cfg(feature = "stats")]
use crate::CacheStats;

/// A compute-once cache: concurrent callers asking for the same missing key
/// share a single run of the initializer.
///
/// Every `get_or_create*` call first looks the key up in the store. On a miss
/// the caller either becomes the owner of the key's in-flight generation and
/// runs its initializer, or attaches to the generation another caller already
/// owns and waits for its outcome. The owner stores a successful value with
/// its TTL before waking the waiters, so nobody ever sees a settled
/// generation whose value is missing from the store.
///
/// # Type Parameters
///
/// * `K` - Cache key; identifies both the stored entry and the in-flight slot
/// * `V` - Cached value. Cloned once per waiter and once for the store.
/// * `E` - Initializer error. Shared as `Arc<E>` so every caller of a failed
///   generation receives the very same error.
/// * `S` - Backing [`ExpiringStore`], [`MemoryStore`] by default
///
/// # Call Shapes
///
/// | Method | Initializer | TTL | Returns |
/// |--------|-------------|-----|---------|
/// | [`get_or_create`](Self::get_or_create) | blocking | fixed | `V` |
/// | [`get_or_create_ttl_from`](Self::get_or_create_ttl_from) | blocking | from value | `(V, Duration)` |
/// | [`get_or_create_async`](Self::get_or_create_async) | async | fixed | `V` |
/// | [`get_or_create_async_ttl_from`](Self::get_or_create_async_ttl_from) | async | from value | `(V, Duration)` |
///
/// Blocking and async callers may be mixed on the same cache and the same
/// key; they share generations.
///
/// # Failures
///
/// A failed initializer leaves nothing behind: no entry is stored and the
/// in-flight slot is removed before the error is broadcast, so the next call
/// for the key starts a fresh generation. Retrying is up to the caller.
///
/// # Cancellation
///
/// Dropping a waiting future detaches that caller only. If the owner's future
/// is dropped, or its initializer panics, the generation is abandoned: the
/// slot is removed and the waiters claim the key again, so one of them runs
/// its own initializer.
///
/// # Panics
///
/// A panicking initializer is never treated as an `E` failure. The panic
/// unwinds through the owner only, and its waiters are handed the key as if
/// the owner had been cancelled. Callers whose initializers all panic are
/// therefore not coalesced: each of them ends up running its own initializer.
///
/// # Deadlocks
///
/// An initializer must not call back into the same cache for its own key, or
/// for any key when the cache uses [`LockMode::Global`].
///
/// # Examples
///
/// ```
/// use cache_once_core::{CacheOnce, LockMode};
/// use std::time::Duration;
///
/// let cache: CacheOnce<&str, u64, String> = CacheOnce::in_memory(LockMode::PerKey);
///
/// let value = cache
///     .get_or_create("answer", || Ok(42), Duration::from_secs(60))
///     .unwrap();
/// assert_eq!(value, 42);
///
/// // Served from the store, the initializer is not called
/// let value = cache
///     .get_or_create("answer", || unreachable!(), Duration::from_secs(60))
///     .unwrap();
/// assert_eq!(value, 42);
///
/// // Failures are not cached
/// let err = cache
///     .get_or_create("broken", || Err("offline".to_string()), Duration::from_secs(60))
///     .unwrap_err();
/// assert_eq!(err.as_str(), "offline");
/// assert!(cache.get(&"broken").is_none());
/// ```
pub struct CacheOnce<K, V, E, S = MemoryStore<K, V>> {
    store: S,
    slots: SlotTable<K, V, E>,
    mode: LockMode,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl<K, V, E> CacheOnce<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache backed by a fresh [`MemoryStore`].
    pub fn in_memory(mode: LockMode) -> Self {
        Self::new(MemoryStore::new(), mode)
    }
}

impl<K, V, E> Default for CacheOnce<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::in_memory(LockMode::default())
    }
}

impl<K, V, E, S> CacheOnce<K, V, E, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: ExpiringStore<K, V>,
{
    /// Creates a cache over `store` using the given lock granularity.
    ///
    /// # Examples
    ///
    /// ```
    /// use cache_once_core::{CacheOnce, LockMode, MemoryStore};
    /// use std::sync::Arc;
    ///
    /// // The store can be shared with code that reads it directly
    /// let store: Arc<MemoryStore<u32, String>> = Arc::new(MemoryStore::new());
    /// let cache: CacheOnce<u32, String, std::io::Error, _> =
    ///     CacheOnce::new(Arc::clone(&store), LockMode::Global);
    /// assert_eq!(cache.lock_mode(), LockMode::Global);
    /// ```
    pub fn new(store: S, mode: LockMode) -> Self {
        Self {
            store,
            slots: SlotTable::new(mode),
            mode,
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
        }
    }

    /// Returns the cached value for `key`, running `init` on a miss.
    ///
    /// The produced value lives in the store for `ttl`. A zero `ttl` stores
    /// an entry that is already expired, so the next call initializes again.
    ///
    /// # Errors
    ///
    /// The error of the generation this call took part in, whether this call
    /// ran the initializer or waited on another caller's run.
    pub fn get_or_create<F>(&self, key: K, init: F, ttl: Duration) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.run_blocking(key, init, Fixed(ttl))
            .map(|(value, _)| value)
    }

    /// Like [`get_or_create`](Self::get_or_create), but the TTL is derived
    /// from the produced value.
    ///
    /// `ttl_from` runs once, on the owner, right after a successful
    /// initialization. On a hit the returned duration is the TTL the entry
    /// was stored with.
    ///
    /// # Examples
    ///
    /// ```
    /// use cache_once_core::CacheOnce;
    /// use std::time::Duration;
    ///
    /// #[derive(Clone)]
    /// struct Token {
    ///     secret: &'static str,
    ///     expires_in: Duration,
    /// }
    ///
    /// let cache: CacheOnce<&str, Token, ()> = CacheOnce::default();
    /// let fetch = || {
    ///     Ok(Token {
    ///         secret: "s3cr3t",
    ///         expires_in: Duration::from_secs(300),
    ///     })
    /// };
    ///
    /// let (token, ttl) = cache
    ///     .get_or_create_ttl_from("api", fetch, |t: &Token| t.expires_in)
    ///     .unwrap();
    /// assert_eq!(token.secret, "s3cr3t");
    /// assert_eq!(ttl, Duration::from_secs(300));
    /// ```
    pub fn get_or_create_ttl_from<F, T>(
        &self,
        key: K,
        init: F,
        ttl_from: T,
    ) -> Result<(V, Duration), Arc<E>>
    where
        F: FnOnce() -> Result<V, E>,
        T: FnOnce(&V) -> Duration,
    {
        self.run_blocking(key, init, FromValue(ttl_from))
    }

    /// Async version of [`get_or_create`](Self::get_or_create).
    ///
    /// Callers that wait on another caller's generation are suspended, not
    /// blocked: they never hold a runtime thread while waiting.
    pub async fn get_or_create_async<F, Fut>(
        &self,
        key: K,
        init: F,
        ttl: Duration,
    ) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.run(key, init, Fixed(ttl))
            .await
            .map(|(value, _)| value)
    }

    /// Async version of [`get_or_create_ttl_from`](Self::get_or_create_ttl_from).
    pub async fn get_or_create_async_ttl_from<F, Fut, T>(
        &self,
        key: K,
        init: F,
        ttl_from: T,
    ) -> Result<(V, Duration), Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        T: FnOnce(&V) -> Duration,
    {
        self.run(key, init, FromValue(ttl_from)).await
    }

    /// Returns the live value for `key` without initializing anything.
    pub fn get(&self, key: &K) -> Option<V> {
        self.store.try_get(key).map(|entry| entry.value)
    }

    /// Removes the stored entry for `key`.
    ///
    /// The next call for `key` starts a new generation. A generation already
    /// in flight is not affected and will store its value when it settles.
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.store.remove(key).is_some();
        if removed {
            debug!("cache entry invalidated");
        }
        removed
    }

    /// Returns true while a generation for `key` is in flight.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.slots.get(key).is_some()
    }

    /// Number of keys with a generation in flight.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Number of callers currently waiting on the in-flight generation for
    /// `key`, not counting its owner. A waiter whose future was dropped no
    /// longer counts. Zero if no generation is in flight.
    pub fn waiters(&self, key: &K) -> usize {
        self.slots
            .get(key)
            .map_or(0, |generation| generation.waiters())
    }

    pub fn lock_mode(&self) -> LockMode {
        self.mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the hit/miss and generation counters of this cache.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn lookup(&self, key: &K) -> Option<(V, Duration)> {
        match self.store.try_get(key) {
            Some(entry) => {
                #[cfg(feature = "stats")]
                self.stats.record_hit();
                trace!(ttl = ?entry.ttl, "cache hit");
                Some((entry.value, entry.ttl))
            }
            None => {
                #[cfg(feature = "stats")]
                self.stats.record_miss();
                None
            }
        }
    }

    fn run_blocking<F, P>(&self, key: K, init: F, policy: P) -> Result<(V, Duration), Arc<E>>
    where
        F: FnOnce() -> Result<V, E>,
        P: TtlPolicy<V>,
    {
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }

        let slot = loop {
            match self.slots.claim(&key) {
                Claim::Owner(slot) => break slot,
                Claim::Waiter(attached) => {
                    let generation = attached.generation();
                    self.attached(generation);
                    if let Some(result) = adopt(generation.wait_blocking()) {
                        return result;
                    }
                }
            }
        };

        let _permit = self.slots.gate().map(|gate| gate.acquire_blocking());
        self.started(&slot);
        let result = init();
        self.finish(slot, key, result, policy)
    }

    async fn run<F, Fut, P>(&self, key: K, init: F, policy: P) -> Result<(V, Duration), Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        P: TtlPolicy<V>,
    {
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }

        let slot = loop {
            match self.slots.claim(&key) {
                Claim::Owner(slot) => break slot,
                Claim::Waiter(attached) => {
                    let generation = attached.generation();
                    self.attached(generation);
                    if let Some(result) = adopt(generation.wait().await) {
                        return result;
                    }
                }
            }
        };

        let _permit = match self.slots.gate() {
            Some(gate) => Some(gate.acquire().await),
            None => None,
        };
        self.started(&slot);
        let result = init().await;
        self.finish(slot, key, result, policy)
    }

    fn attached(&self, generation: &Generation<V, E>) {
        #[cfg(feature = "stats")]
        self.stats.record_coalesced();
        trace!(generation = generation.id(), "attached to in-flight generation");
    }

    fn started(&self, slot: &SlotGuard<'_, K, V, E>) {
        #[cfg(feature = "stats")]
        self.stats.record_initialization();
        debug!(generation = slot.id(), mode = %self.mode, "starting generation");
    }

    /// Owner side of settlement: store on success, then release the slot and
    /// broadcast.
    fn finish<P>(
        &self,
        slot: SlotGuard<'_, K, V, E>,
        key: K,
        result: Result<V, E>,
        policy: P,
    ) -> Result<(V, Duration), Arc<E>>
    where
        P: TtlPolicy<V>,
    {
        match result {
            Ok(value) => {
                let ttl = policy.ttl_for(&value);
                self.store.set(key, CacheEntry::new(value.clone(), ttl));
                debug!(generation = slot.id(), ttl = ?ttl, "generation settled with a value");
                slot.settle(Settled::Ready(value.clone(), ttl));
                Ok((value, ttl))
            }
            Err(err) => {
                let err = Arc::new(err);
                #[cfg(feature = "stats")]
                self.stats.record_failure();
                debug!(generation = slot.id(), "generation failed, nothing stored");
                slot.settle(Settled::Failed(Arc::clone(&err)));
                Err(err)
            }
        }
    }
}

/// Turns a settled outcome into this caller's result. `None` means the owner
/// abandoned the generation and the caller has to claim the slot again.
fn adopt<V, E>(outcome: Settled<V, E>) -> Option<Result<(V, Duration), Arc<E>>> {
    match outcome {
        Settled::Ready(value, ttl) => Some(Ok((value, ttl))),
        Settled::Failed(err) => Some(Err(err)),
        Settled::Abandoned => {
            trace!("owner abandoned its generation, claiming again");
            None
        }
    }
}
