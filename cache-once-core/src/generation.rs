use parking_lot::{Condvar, Mutex};
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Outcome of one generation, broadcast to every caller attached to it.
pub(crate) enum Settled<V, E> {
    /// The initializer succeeded; the value was stored with this TTL.
    Ready(V, Duration),
    /// The initializer failed. Every waiter gets the same `Arc`.
    Failed(Arc<E>),
    /// The owner went away without settling (its future was dropped or its
    /// initializer panicked). Waiters go back to claiming the slot.
    Abandoned,
}

impl<V: Clone, E> Clone for Settled<V, E> {
    fn clone(&self) -> Self {
        match self {
            Settled::Ready(value, ttl) => Settled::Ready(value.clone(), *ttl),
            Settled::Failed(err) => Settled::Failed(Arc::clone(err)),
            Settled::Abandoned => Settled::Abandoned,
        }
    }
}

/// One in-flight miss-to-settlement cycle for a key.
///
/// A `Generation` is a one-shot broadcast: its owner settles it once, and
/// any number of waiters observe the outcome. Blocking waiters park on a
/// condition variable, async waiters on a [`Notify`], so both call shapes can
/// share a generation without an async waiter ever holding a thread.
pub(crate) struct Generation<V, E> {
    id: u64,
    waiters: AtomicUsize,
    outcome: Mutex<Option<Settled<V, E>>>,
    settled: Condvar,
    notify: Notify,
}

impl<V: Clone, E> Generation<V, E> {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            waiters: AtomicUsize::new(0),
            outcome: Mutex::new(None),
            settled: Condvar::new(),
            notify: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Registers one more caller waiting on this generation. The caller
    /// counts as a waiter until the returned handle is dropped.
    ///
    /// Called while the slot table lock is held, so a caller is counted
    /// before anyone can observe it as attached.
    pub(crate) fn attach(self: &Arc<Self>) -> Attached<V, E> {
        self.waiters.fetch_add(1, Ordering::AcqRel);
        Attached {
            generation: Arc::clone(self),
        }
    }

    pub(crate) fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    /// Publishes the outcome and wakes every waiter. Only the first call has
    /// an effect.
    pub(crate) fn settle(&self, outcome: Settled<V, E>) {
        {
            let mut slot = self.outcome.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(outcome);
        }
        self.settled.notify_all();
        self.notify.notify_waiters();
    }

    fn outcome(&self) -> Option<Settled<V, E>> {
        self.outcome.lock().clone()
    }

    /// Blocks the current thread until the generation settles.
    pub(crate) fn wait_blocking(&self) -> Settled<V, E> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(settled) = outcome.as_ref() {
                return settled.clone();
            }
            self.settled.wait(&mut outcome);
        }
    }

    /// Suspends the current task until the generation settles.
    ///
    /// Dropping the returned future detaches the caller without touching the
    /// generation.
    pub(crate) async fn wait(&self) -> Settled<V, E> {
        loop {
            let mut notified = pin!(self.notify.notified());
            // Register before checking, otherwise a settle landing between the
            // check and the await would be missed.
            notified.as_mut().enable();
            if let Some(settled) = self.outcome() {
                return settled;
            }
            notified.await;
        }
    }
}

/// A waiter's hold on a generation. Dropping it, whether after the outcome
/// arrived or because the waiting future was cancelled, detaches the caller.
pub(crate) struct Attached<V, E> {
    generation: Arc<Generation<V, E>>,
}

impl<V, E> Attached<V, E> {
    pub(crate) fn generation(&self) -> &Generation<V, E> {
        &self.generation
    }
}

impl<V, E> Drop for Attached<V, E> {
    fn drop(&mut self) {
        self.generation.waiters.fetch_sub(1, Ordering::AcqRel);
    }
}
