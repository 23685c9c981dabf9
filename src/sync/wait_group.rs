//! Wait for a set of operations to finish.

use crate::fiber;
use crate::sync::park::ThreadParker;
use crate::sync::waiter::Waiter;
use crate::sync::SendPtr;

use smallvec::SmallVec;

/// Counts outstanding operations; `wait` parks until the count reaches
/// zero. Waiters are woken exactly once, on the transition to zero, and
/// `wait` on a zero count returns immediately.
pub struct WaitGroup {
    inner: parking_lot::Mutex<Inner>,
}

struct Inner {
    count: usize,
    waiters: SmallVec<[Waiter; 4]>,
}

// ===== impl WaitGroup =====

impl WaitGroup {
    pub fn new() -> WaitGroup {
        WaitGroup::with_count(0)
    }

    /// Start with `count` outstanding operations.
    pub fn with_count(count: usize) -> WaitGroup {
        WaitGroup {
            inner: parking_lot::Mutex::new(Inner {
                count,
                waiters: SmallVec::new(),
            }),
        }
    }

    /// Register `n` more outstanding operations.
    pub fn add(&self, n: usize) {
        self.inner.lock().count += n;
    }

    /// Mark one operation finished; wakes every waiter when the count
    /// reaches zero.
    ///
    /// # Panics
    ///
    /// Panics if called more times than operations were added.
    pub fn done(&self) {
        let woken = {
            let mut inner = self.inner.lock();
            assert!(inner.count > 0, "wait group done() without a matching add()");
            inner.count -= 1;
            if inner.count == 0 {
                std::mem::replace(&mut inner.waiters, SmallVec::new())
            } else {
                SmallVec::new()
            }
        };
        for waiter in woken {
            waiter.wake();
        }
    }

    /// Current count; a snapshot, stale by the time it is read.
    pub fn count(&self) -> usize {
        self.inner.lock().count
    }

    /// Park until the count reaches zero.
    pub fn wait(&self) {
        {
            let inner = self.inner.lock();
            if inner.count == 0 {
                return;
            }

            if !fiber::in_fiber() {
                let mut inner = inner;
                let parker = ThreadParker::new();
                inner.waiters.push(Waiter::Thread(parker.unparker()));
                drop(inner);
                parker.park();
                return;
            }
        }

        let inner_ptr = SendPtr(&self.inner as *const parking_lot::Mutex<Inner>);
        fiber::suspend_with(move |handle| {
            let inner = unsafe { &*inner_ptr.0 };
            let mut inner = inner.lock();
            if inner.count == 0 {
                // The group emptied while we were suspending.
                Some(handle)
            } else {
                inner.waiters.push(Waiter::Fiber(handle));
                None
            }
        });
    }
}

impl Default for WaitGroup {
    fn default() -> WaitGroup {
        WaitGroup::new()
    }
}

impl std::fmt::Debug for WaitGroup {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("WaitGroup")
            .field("count", &self.count())
            .finish()
    }
}
