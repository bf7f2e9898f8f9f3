//! # cache-once core
//!
//! Single-flight initialization over a time-expiring key-value store.
//!
//! [`CacheOnce`] guarantees that, for any key, concurrent callers that miss
//! the store observe at most one run of the initializer, receive the same
//! outcome, and agree on the TTL it was stored with. Blocking initializers
//! and async initializers are both supported and share the same
//! coordination state.
//!
//! ## Features
//!
//! - **Single-flight**: one initializer run per key and generation, all
//!   concurrent callers share its value or its error
//! - **No poisoning**: a failed generation stores nothing and leaves no slot
//!   behind, the next call starts afresh
//! - **Fixed or value-derived TTL**: `get_or_create*` take a `Duration`,
//!   `*_ttl_from` variants take a function of the produced value
//! - **Lock granularity**: per-key coordination, or one global domain that
//!   also serializes initializers for unrelated keys
//! - **Pluggable store**: anything implementing [`ExpiringStore`],
//!   [`MemoryStore`] by default
//! - **Statistics**: hit/miss and generation counters (with `stats` feature)
//!
//! ## Module Organization
//!
//! - [`cache_entry`] - Stored value with its TTL and absolute expiry
//! - [`store`] - The store contract and the DashMap-backed `MemoryStore`
//! - [`lock_mode`] - Per-key vs global coordination
//! - `cache_once` - The coordinator and its four call shapes
//! - `slots`, `generation`, `gate` - In-flight slot table, one-shot
//!   broadcast, and the global initialization gate
//!
//! ## Example
//!
//! ```
//! use cache_once_core::{CacheOnce, LockMode};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let cache: Arc<CacheOnce<&str, String, ()>> = Arc::new(CacheOnce::in_memory(LockMode::PerKey));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let cache = Arc::clone(&cache);
//!         thread::spawn(move || {
//!             cache.get_or_create("config", || Ok("loaded".to_string()), Duration::from_secs(30))
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap().unwrap(), "loaded");
//! }
//! ```
pub mod cache_entry;
pub mod lock_mode;
pub mod store;

mod cache_once;
mod gate;
mod generation;
mod slots;
mod ttl;

#[cfg(feature = "stats")]
mod stats;

pub use cache_entry::CacheEntry;
pub use cache_once::CacheOnce;
pub use lock_mode::{LockMode, ParseLockModeError};
pub use store::{ExpiringStore, MemoryStore};

#[cfg(feature = "stats")]
pub use stats::CacheStats;
