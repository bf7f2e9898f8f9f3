//! # cache-once
//!
//! A small, thread-safe "compute-once" cache for Rust: concurrent callers
//! that miss on the same key share one run of the initializer, its result,
//! and its expiration.
//!
//! ## Features
//!
//! - **Single-flight**: duplicate initializations under contention are
//!   coalesced into one
//! - **Blocking and async**: `get_or_create` for threads,
//!   `get_or_create_async` for tasks; waiters in async code never hold a
//!   thread
//! - **Errors are shared, not cached**: every caller of a failed generation
//!   gets the same `Arc<E>`, and the next call tries again
//! - **TTL from the value**: `*_ttl_from` variants let the value decide how
//!   long it lives (tokens, leases, signed URLs)
//! - **Lock granularity**: `LockMode::PerKey` or `LockMode::Global`
//!
//! ## Quick Start
//!
//! ```rust
//! use cache_once::{CacheOnce, LockMode};
//! use std::time::Duration;
//!
//! let cache: CacheOnce<u64, String, std::io::Error> = CacheOnce::in_memory(LockMode::PerKey);
//!
//! let name = cache
//!     .get_or_create(7, || Ok(format!("user-{}", 7)), Duration::from_secs(60))
//!     .unwrap();
//! assert_eq!(name, "user-7");
//! ```
//!
//! ## Async Initializers
//!
//! ```rust
//! use cache_once::CacheOnce;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: CacheOnce<&str, u32, String> = CacheOnce::default();
//!
//! let value = cache
//!     .get_or_create_async("slow", || async { Ok(5) }, Duration::from_secs(60))
//!     .await
//!     .unwrap();
//! assert_eq!(value, 5);
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Failed initializations are not stored:
//!
//! ```rust
//! use cache_once::CacheOnce;
//! use std::time::Duration;
//!
//! let cache: CacheOnce<&str, u32, String> = CacheOnce::default();
//!
//! let err = cache
//!     .get_or_create("flaky", || Err("timeout".to_string()), Duration::from_secs(60))
//!     .unwrap_err();
//! assert_eq!(*err, "timeout");
//!
//! // The key is not poisoned
//! let value = cache.get_or_create("flaky", || Ok(1), Duration::from_secs(60));
//! assert_eq!(value, Ok(1));
//! ```

pub use cache_once_core::*;
