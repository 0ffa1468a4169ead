//! A blocking notifier pairing a lock-free data structure with a condition
//! variable, so that the "full" and "empty" cases park instead of spinning.
//!
//! Grounded on the same idea as `LiteNotifier` in the original `ulog`
//! implementation: the fast path (predicate already true) never touches the
//! mutex, and `notify_when_blocking` skips the syscall entirely when nobody
//! is parked.

use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub struct Notifier {
    state: Mutex<()>,
    condvar: Condvar,
    waiters: AtomicIsize,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(()),
            condvar: Condvar::new(),
            waiters: AtomicIsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until `pred` returns true, checking it once up front without
    /// taking the lock.
    pub fn wait<P: FnMut() -> bool>(&self, mut pred: P) {
        if pred() {
            return;
        }
        let mut guard = self.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        while !pred() {
            guard = self.condvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    /// Blocks until `pred` returns true or `timeout` elapses, returning
    /// whichever `pred()` last evaluated to.
    pub fn wait_for<P: FnMut() -> bool>(&self, timeout: Duration, mut pred: P) -> bool {
        if pred() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let satisfied = loop {
            if pred() {
                break true;
            }
            let now = Instant::now();
            if now >= deadline {
                break pred();
            }
            let (next_guard, result) = self
                .condvar
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            guard = next_guard;
            if result.timed_out() {
                break pred();
            }
        };
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        satisfied
    }

    /// Wakes every waiter, but only if there is at least one — avoids the
    /// mutex/syscall on the hot commit/release path when nobody is parked.
    pub fn notify_when_blocking(&self) {
        if self.waiters.load(Ordering::SeqCst) > 0 {
            let _guard = self.lock();
            self.condvar.notify_all();
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
