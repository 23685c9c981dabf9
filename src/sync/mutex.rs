//! Mutual exclusion with FIFO handoff to suspended fibers.

use crate::fiber;
use crate::sync::park::ThreadParker;
use crate::sync::waiter::Waiter;
use crate::sync::SendPtr;

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

/// A mutex whose contended `lock` suspends the calling fiber instead of
/// blocking the worker thread.
///
/// Unlock hands the mutex directly to the longest-waiting fiber (FIFO);
/// ownership never goes through an unlocked window, so late arrivals
/// cannot barge past a parked waiter. Same-fiber reentry is not
/// supported and deadlocks like any ordinary mutex.
pub struct Mutex<T> {
    inner: parking_lot::Mutex<Inner>,
    value: UnsafeCell<T>,
}

struct Inner {
    locked: bool,
    queue: VecDeque<Waiter>,
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

// ===== impl Mutex =====

impl<T> Mutex<T> {
    pub fn new(value: T) -> Mutex<T> {
        Mutex {
            inner: parking_lot::Mutex::new(Inner {
                locked: false,
                queue: VecDeque::new(),
            }),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the mutex, waiting (fiber-suspending or thread-parking)
    /// if it is held.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        {
            let mut inner = self.inner.lock();
            if !inner.locked {
                inner.locked = true;
                return MutexGuard { mutex: self };
            }

            if !fiber::in_fiber() {
                let parker = ThreadParker::new();
                inner.queue.push_back(Waiter::Thread(parker.unparker()));
                drop(inner);
                parker.park();
                // Handoff: the unlocker left `locked` set for us.
                return MutexGuard { mutex: self };
            }
        }

        let inner_ptr = SendPtr(&self.inner as *const parking_lot::Mutex<Inner>);
        fiber::suspend_with(move |handle| {
            let inner = unsafe { &*inner_ptr.0 };
            let mut inner = inner.lock();
            if !inner.locked {
                // Released while we were suspending; take it and transfer
                // straight back.
                inner.locked = true;
                Some(handle)
            } else {
                inner.queue.push_back(Waiter::Fiber(handle));
                None
            }
        });
        // Resumed: either the awaiter took the lock above, or an unlock
        // handed it to us.
        MutexGuard { mutex: self }
    }

    /// Acquire without waiting.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let mut inner = self.inner.lock();
        if inner.locked {
            None
        } else {
            inner.locked = true;
            Some(MutexGuard { mutex: self })
        }
    }

    /// The wrapped value; no locking needed with exclusive access.
    pub fn get_mut(&mut self) -> &mut T {
        unsafe { &mut *self.value.get() }
    }

    fn unlock(&self) {
        let waiter = {
            let mut inner = self.inner.lock();
            debug_assert!(inner.locked, "unlock of an unlocked mutex");
            match inner.queue.pop_front() {
                // Handoff: `locked` stays set, the woken waiter owns it.
                Some(waiter) => Some(waiter),
                None => {
                    inner.locked = false;
                    None
                }
            }
        };
        if let Some(waiter) = waiter {
            waiter.wake();
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mutex<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Mutex")
            .field("locked", &self.inner.lock().locked)
            .finish()
    }
}

/// Holds the mutex; releases (with handoff) on drop.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<'a, T> Deref for MutexGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<'a, T> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<'a, T> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

impl<'a, T: std::fmt::Debug> std::fmt::Debug for MutexGuard<'a, T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&**self, fmt)
    }
}
