#![allow(dead_code)]

use cache_once::{CacheOnce, LockMode};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

pub const CALLERS: usize = 20;
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);
pub const MODES: [LockMode; 2] = [LockMode::PerKey, LockMode::Global];

const MAX_ATTEMPTS: usize = 10;
const WAIT_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueWithTtl {
    pub value: i32,
    pub ttl: Duration,
}

/// Counts every initialization it performs.
#[derive(Default)]
pub struct TestService {
    initializations: AtomicUsize,
}

impl TestService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    fn count(&self) -> usize {
        self.initializations.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn init(&self) -> Result<i32, TestError> {
        self.count();
        Ok(42)
    }

    pub fn init_with_ttl(&self) -> Result<ValueWithTtl, TestError> {
        self.count();
        Ok(ValueWithTtl {
            value: 42,
            ttl: Duration::from_secs(3600),
        })
    }

    pub fn failed(&self) -> Result<i32, TestError> {
        self.count();
        Err(TestError::Unavailable)
    }

    /// Fails until its `success_after`-th invocation, then returns 200.
    pub fn unstable(&self, success_after: usize) -> Result<i32, TestError> {
        if self.count() < success_after {
            Err(TestError::Unavailable)
        } else {
            Ok(200)
        }
    }

    /// Retries [`unstable`](Self::unstable) until it succeeds.
    pub fn unstable_with_retry(&self, success_after: usize) -> Result<i32, TestError> {
        let mut last = Err(TestError::Unavailable);
        for _ in 0..MAX_ATTEMPTS {
            last = self.unstable(success_after);
            if last.is_ok() {
                break;
            }
        }
        last
    }

    pub async fn init_async(&self) -> Result<i32, TestError> {
        tokio::task::yield_now().await;
        self.init()
    }

    pub async fn init_with_ttl_async(&self) -> Result<ValueWithTtl, TestError> {
        tokio::task::yield_now().await;
        self.init_with_ttl()
    }

    pub async fn failed_async(&self) -> Result<i32, TestError> {
        tokio::task::yield_now().await;
        self.failed()
    }

    pub async fn unstable_with_retry_async(&self, success_after: usize) -> Result<i32, TestError> {
        let mut last = Err(TestError::Unavailable);
        for _ in 0..MAX_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(1)).await;
            last = self.unstable(success_after);
            if last.is_ok() {
                break;
            }
        }
        last
    }
}

/// Runs `f` on `n` threads released at the same instant and collects the results.
pub fn run_concurrently<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let start = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let f = Arc::clone(&f);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                // Stagger the callers a little so claims interleave differently per run
                thread::sleep(Duration::from_micros(fastrand::u64(0..200)));
                f()
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

/// Blocks until `expected` callers are attached to the key's generation.
pub fn wait_for_waiters<K, V, E>(cache: &CacheOnce<K, V, E>, key: &K, expected: usize)
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    let deadline = Instant::now() + WAIT_DEADLINE;
    while cache.waiters(key) < expected && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
}

pub async fn wait_for_waiters_async<K, V, E>(cache: &CacheOnce<K, V, E>, key: &K, expected: usize)
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    let deadline = Instant::now() + WAIT_DEADLINE;
    while cache.waiters(key) < expected && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub async fn wait_until_in_flight<K, V, E>(cache: &CacheOnce<K, V, E>, key: &K)
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    let deadline = Instant::now() + WAIT_DEADLINE;
    while !cache.is_in_flight(key) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
