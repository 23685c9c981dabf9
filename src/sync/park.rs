//! Blocking fallback for waits issued outside of fibers.

use parking_lot::{Condvar, Mutex};

use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::Arc;

const EMPTY: usize = 0;
const PARKED: usize = 1;
const NOTIFIED: usize = 2;

/// One-thread parking spot. A notification delivered before `park` is
/// consumed by it; there is no wakeup to lose.
pub(crate) struct ThreadParker {
    inner: Arc<Inner>,
}

struct Inner {
    state: AtomicUsize,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl ThreadParker {
    pub(crate) fn new() -> ThreadParker {
        ThreadParker {
            inner: Arc::new(Inner {
                state: AtomicUsize::new(EMPTY),
                mutex: Mutex::new(()),
                condvar: Condvar::new(),
            }),
        }
    }

    pub(crate) fn unparker(&self) -> Unparker {
        Unparker {
            inner: self.inner.clone(),
        }
    }

    pub(crate) fn park(&self) {
        // The notification may already be in.
        if self
            .inner
            .state
            .compare_exchange(NOTIFIED, EMPTY, SeqCst, SeqCst)
            .is_ok()
        {
            return;
        }

        let mut guard = self.inner.mutex.lock();
        match self
            .inner
            .state
            .compare_exchange(EMPTY, PARKED, SeqCst, SeqCst)
        {
            Ok(_) => {}
            Err(NOTIFIED) => {
                self.inner.state.store(EMPTY, SeqCst);
                return;
            }
            Err(actual) => panic!("inconsistent park state: {}", actual),
        }

        loop {
            self.inner.condvar.wait(&mut guard);
            if self
                .inner
                .state
                .compare_exchange(NOTIFIED, EMPTY, SeqCst, SeqCst)
                .is_ok()
            {
                return;
            }
            // Spurious wakeup.
        }
    }
}

impl std::fmt::Debug for ThreadParker {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("ThreadParker").finish()
    }
}

/// The waking side of a [`ThreadParker`].
pub(crate) struct Unparker {
    inner: Arc<Inner>,
}

impl Unparker {
    pub(crate) fn unpark(&self) {
        // Must swap, not CAS: the parker may move EMPTY -> PARKED at any
        // moment, and the notification must stick either way.
        match self.inner.state.swap(NOTIFIED, SeqCst) {
            EMPTY | NOTIFIED => return,
            PARKED => {}
            actual => panic!("inconsistent park state: {}", actual),
        }

        // Hold the mutex briefly so the parker cannot miss the notify
        // between publishing PARKED and reaching the wait.
        drop(self.inner.mutex.lock());
        self.inner.condvar.notify_one();
    }
}

impl std::fmt::Debug for Unparker {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Unparker").finish()
    }
}
