use parking_lot::{Condvar, Mutex};
use std::pin::pin;
use tokio::sync::Notify;

/// Cache-wide initialization gate used in [`LockMode::Global`](crate::LockMode).
///
/// Only one permit exists. Blocking owners park on a condition variable and
/// async owners on a [`Notify`], so a cache shared by threads and tasks still
/// runs a single initializer at a time.
pub(crate) struct InitGate {
    busy: Mutex<bool>,
    released: Condvar,
    notify: Notify,
}

/// Holding a permit means holding the gate. Dropping it opens the gate.
pub(crate) struct GatePermit<'a> {
    gate: &'a InitGate,
}

impl InitGate {
    pub(crate) fn new() -> Self {
        Self {
            busy: Mutex::new(false),
            released: Condvar::new(),
            notify: Notify::new(),
        }
    }

    pub(crate) fn try_acquire(&self) -> Option<GatePermit<'_>> {
        let mut busy = self.busy.lock();
        if *busy {
            return None;
        }
        *busy = true;
        Some(GatePermit { gate: self })
    }

    pub(crate) fn acquire_blocking(&self) -> GatePermit<'_> {
        let mut busy = self.busy.lock();
        while *busy {
            self.released.wait(&mut busy);
        }
        *busy = true;
        GatePermit { gate: self }
    }

    pub(crate) async fn acquire(&self) -> GatePermit<'_> {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if let Some(permit) = self.try_acquire() {
                return permit;
            }
            notified.await;
        }
    }

    fn release(&self) {
        *self.busy.lock() = false;
        self.released.notify_one();
        self.notify.notify_waiters();
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_single_permit() {
        let gate = InitGate::new();
        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert!(gate.try_acquire().is_none());
        drop(permit);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_blocking_holders_never_overlap() {
        let gate = Arc::new(InitGate::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            handles.push(thread::spawn(move || {
                let _permit = gate.acquire_blocking();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_async_and_blocking_holders_never_overlap() {
        let gate = Arc::new(InitGate::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let mut tasks = vec![];

        for i in 0..8 {
            let gate = Arc::clone(&gate);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            if i % 2 == 0 {
                tasks.push(tokio::spawn(async move {
                    let _permit = gate.acquire().await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }));
            } else {
                tasks.push(tokio::task::spawn_blocking(move || {
                    let _permit = gate.acquire_blocking();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                }));
            }
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }
}
