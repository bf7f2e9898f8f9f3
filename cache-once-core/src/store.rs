use crate::CacheEntry;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// A key-value store whose entries carry an absolute expiration.
///
/// This is the only thing [`CacheOnce`](crate::CacheOnce) needs from its
/// storage layer. Eviction, memory accounting and garbage collection of
/// expired entries are the store's own business.
///
/// Implementations must be safe for concurrent `try_get`/`set`/`remove`
/// calls and must never return an expired entry from `try_get`.
///
/// # Examples
///
/// ```
/// use cache_once_core::{CacheEntry, ExpiringStore, MemoryStore};
/// use std::time::Duration;
///
/// let store = MemoryStore::new();
/// store.set("answer", CacheEntry::new(42, Duration::from_secs(60)));
///
/// assert_eq!(store.try_get(&"answer").map(|e| e.value), Some(42));
/// assert!(store.remove(&"answer").is_some());
/// assert!(store.try_get(&"answer").is_none());
/// ```
pub trait ExpiringStore<K, V> {
    /// Returns the entry for `key` if present and not expired.
    fn try_get(&self, key: &K) -> Option<CacheEntry<V>>;

    /// Inserts or replaces the entry for `key`.
    fn set(&self, key: K, entry: CacheEntry<V>);

    /// Removes the entry for `key`, returning it if it was present.
    fn remove(&self, key: &K) -> Option<CacheEntry<V>>;
}

impl<K, V, S> ExpiringStore<K, V> for Arc<S>
where
    S: ExpiringStore<K, V> + ?Sized,
{
    fn try_get(&self, key: &K) -> Option<CacheEntry<V>> {
        (**self).try_get(key)
    }

    fn set(&self, key: K, entry: CacheEntry<V>) {
        (**self).set(key, entry)
    }

    fn remove(&self, key: &K) -> Option<CacheEntry<V>> {
        (**self).remove(key)
    }
}

/// In-process [`ExpiringStore`] backed by a [`DashMap`].
///
/// Expired entries are dropped lazily: a `try_get` that finds a dead entry
/// removes it, and [`purge_expired`](Self::purge_expired) sweeps the whole map.
/// There is no size bound.
///
/// # Thread Safety
///
/// DashMap shards its locks, so lookups and writes for different keys rarely
/// contend. Values are cloned out of the map and no shard lock escapes a call.
pub struct MemoryStore<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> MemoryStore<K, V>
where
    K: Hash + Eq,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry and returns how many were dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use cache_once_core::{CacheEntry, ExpiringStore, MemoryStore};
    /// use std::time::Duration;
    ///
    /// let store = MemoryStore::new();
    /// store.set(1, CacheEntry::new("live", Duration::from_secs(60)));
    /// store.set(2, CacheEntry::new("dead", Duration::ZERO));
    ///
    /// assert_eq!(store.purge_expired(), 1);
    /// assert_eq!(store.len(), 1);
    /// ```
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<K, V> Default for MemoryStore<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ExpiringStore<K, V> for MemoryStore<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn try_get(&self, key: &K) -> Option<CacheEntry<V>> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value().clone()),
            Some(_) => {}
            None => return None,
        }

        // The shard read guard is released before removal to avoid a deadlock
        // on the same shard. Re-check under the write lock: a fresh entry may
        // have replaced the dead one in between.
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        None
    }

    fn set(&self, key: K, entry: CacheEntry<V>) {
        self.entries.insert(key, entry);
    }

    fn remove(&self, key: &K) -> Option<CacheEntry<V>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }
}
