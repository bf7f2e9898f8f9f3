use std::time::{Duration, Instant};

/// A value stored by an [`ExpiringStore`](crate::ExpiringStore) together with
/// the TTL it was produced with and its absolute expiration.
///
/// Entries are immutable once written: a later generation replaces the whole
/// entry instead of updating it in place.
///
/// # Type Parameters
///
/// * `V` - The type of the cached value
///
/// # Fields
///
/// * `value` - The cached value
/// * `ttl` - The time-to-live computed when the value was produced
/// * `expires_at` - The `Instant` after which the entry is dead. `None` when
///   `ttl` is too large to be represented as an `Instant`, which means the
///   entry never expires.
///
/// # Examples
///
/// ```
/// use cache_once_core::CacheEntry;
/// use std::time::Duration;
///
/// let entry = CacheEntry::new(42, Duration::from_secs(60));
/// assert_eq!(entry.value, 42);
/// assert_eq!(entry.ttl, Duration::from_secs(60));
/// assert!(!entry.is_expired());
///
/// // A zero TTL is expired as soon as it is written
/// let entry = CacheEntry::new("gone", Duration::ZERO);
/// assert!(entry.is_expired());
/// ```
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub ttl: Duration,
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry that expires `ttl` from now.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to cache
    /// * `ttl` - Time-to-live measured from `Instant::now()`
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            ttl,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    /// Returns true if the entry has expired.
    ///
    /// An entry expires when the current instant reaches `expires_at`, so an
    /// entry written with a zero TTL is expired immediately.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Returns true if the entry is expired at the given instant.
    ///
    /// # Examples
    ///
    /// ```
    /// use cache_once_core::CacheEntry;
    /// use std::time::{Duration, Instant};
    ///
    /// let entry = CacheEntry::new(1, Duration::from_secs(10));
    /// let later = Instant::now() + Duration::from_secs(11);
    /// assert!(entry.is_expired_at(later));
    ///
    /// // Never expires
    /// let entry = CacheEntry::new(1, Duration::MAX);
    /// assert!(!entry.is_expired_at(later));
    /// ```
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Returns how long the entry has left to live.
    ///
    /// # Returns
    ///
    /// * `Some(Duration::ZERO)` if the entry is already expired
    /// * `Some(remaining)` while the entry is live
    /// * `None` if the entry never expires
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }
}
