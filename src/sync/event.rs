//! Single-shot event.

use crate::fiber;
use crate::sync::waiter::Waiter;
use crate::sync::park::ThreadParker;
use crate::sync::SendPtr;

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering::SeqCst};

/// A single-shot gate: [`fire`](Event::fire) opens it forever, waking
/// every current waiter; any later [`wait`](Event::wait) returns
/// immediately.
///
/// Waiters are parked on a lock-free intrusive stack whose head doubles
/// as the fired flag. `fire` detaches the whole stack in one swap, so by
/// the time a woken waiter runs, nothing reachable from it points back at
/// the event; the event may be dropped the moment `wait` returns.
pub struct Event {
    head: AtomicPtr<Node>,
}

struct Node {
    waiter: Option<Waiter>,
    next: *mut Node,
}

/// Sentinel head: the event has fired.
fn fired() -> *mut Node {
    1 as *mut Node
}

// The stack is only ever pushed through CAS and detached through swap.
unsafe impl Send for Event {}
unsafe impl Sync for Event {}

// ===== impl Event =====

impl Event {
    pub fn new() -> Event {
        Event {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Whether the event has fired.
    pub fn is_fired(&self) -> bool {
        self.head.load(SeqCst) == fired()
    }

    /// Open the gate: wake every parked waiter, admit all future ones.
    /// Firing twice is a no-op.
    pub fn fire(&self) {
        let mut node = self.head.swap(fired(), SeqCst);
        if node == fired() {
            return;
        }
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
            if let Some(waiter) = boxed.waiter {
                waiter.wake();
            }
        }
    }

    /// Park until the event fires. Suspends the current fiber, or parks
    /// the OS thread when called outside of one.
    pub fn wait(&self) {
        if self.is_fired() {
            return;
        }

        if fiber::in_fiber() {
            let head = SendPtr(&self.head as *const AtomicPtr<Node>);
            fiber::suspend_with(move |handle| {
                let head = unsafe { &*head.0 };
                match push(head, Waiter::Fiber(handle)) {
                    // Parked; `fire` will reschedule us.
                    None => None,
                    // Fired while we were suspending: transfer straight
                    // back into the fiber.
                    Some(Waiter::Fiber(handle)) => Some(handle),
                    Some(Waiter::Thread(_)) => unreachable!(),
                }
            });
        } else {
            let parker = ThreadParker::new();
            match push(&self.head, Waiter::Thread(parker.unparker())) {
                None => parker.park(),
                Some(_) => {}
            }
        }
    }
}

/// Push a waiter; hands it back instead if the event has fired.
fn push(head: &AtomicPtr<Node>, waiter: Waiter) -> Option<Waiter> {
    let node = Box::into_raw(Box::new(Node {
        waiter: Some(waiter),
        next: ptr::null_mut(),
    }));
    let mut current = head.load(SeqCst);
    loop {
        if current == fired() {
            let node = unsafe { Box::from_raw(node) };
            return node.waiter;
        }
        unsafe { (*node).next = current };
        match head.compare_exchange(current, node, SeqCst, SeqCst) {
            Ok(_) => return None,
            Err(actual) => current = actual,
        }
    }
}

impl Default for Event {
    fn default() -> Event {
        Event::new()
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        // Dropping with parked waiters strands them; that is a caller
        // bug, but the nodes themselves are still freed.
        let mut node = self.head.swap(fired(), SeqCst);
        if node == fired() {
            return;
        }
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
            if boxed.waiter.is_some() {
                error!("event dropped with a parked waiter");
            }
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Event")
            .field("fired", &self.is_fired())
            .finish()
    }
}
