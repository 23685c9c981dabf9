//! Serial executor wrapper.

use crate::exec::{Executor, ExecutorRef, SchedulerHint, Task};

use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering::SeqCst};
use std::sync::Arc;

/// Guarantees the tasks it receives run one at a time, in submission
/// order, on the wrapped executor — mutual exclusion without an OS lock.
///
/// Submissions go onto a lock-free intrusive stack. The submitter that
/// finds the stack idle schedules a single drain task; the drain keeps
/// taking batches (reversed back into submission order) until it manages
/// to hand the stack back to the idle state.
pub struct Strand {
    inner: Arc<Inner>,
}

struct Inner {
    /// Null when idle, otherwise a LIFO list of pending nodes terminated
    /// by the sealed sentinel. Non-null implies a drain is scheduled or
    /// running.
    head: AtomicPtr<Node>,
    underlying: ExecutorRef,
}

struct Node {
    task: Option<Box<dyn Task>>,
    next: *mut Node,
}

/// Sentinel terminator; never dereferenced.
fn sealed() -> *mut Node {
    1 as *mut Node
}

// ===== impl Strand =====

impl Strand {
    /// Serial view over `underlying`.
    pub fn new(underlying: ExecutorRef) -> Strand {
        Strand {
            inner: Arc::new(Inner {
                head: AtomicPtr::new(ptr::null_mut()),
                underlying,
            }),
        }
    }
}

impl Executor for Strand {
    fn submit(&self, task: Box<dyn Task>, _hint: SchedulerHint) {
        // Order is the whole contract here; hints cannot reorder a serial
        // queue.
        let node = Box::into_raw(Box::new(Node {
            task: Some(task),
            next: ptr::null_mut(),
        }));

        let mut head = self.inner.head.load(SeqCst);
        loop {
            unsafe {
                (*node).next = if head.is_null() { sealed() } else { head };
            }
            match self
                .inner
                .head
                .compare_exchange_weak(head, node, SeqCst, SeqCst)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }

        if head.is_null() {
            // We took the strand from idle; we owe it a drain.
            let inner = self.inner.clone();
            self.inner
                .underlying
                .submit(Box::new(Drain { inner }), SchedulerHint::UpToYou);
        }
    }
}

impl std::fmt::Debug for Strand {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Strand").finish()
    }
}

struct Drain {
    inner: Arc<Inner>,
}

impl Task for Drain {
    fn run(self: Box<Self>) {
        loop {
            let batch = self.inner.head.swap(sealed(), SeqCst);
            if batch == sealed() {
                // Nothing new since the last batch; try to go idle. A
                // racing submit that pushed onto the sealed stack makes
                // the exchange fail and sends us around again.
                match self.inner.head.compare_exchange(
                    sealed(),
                    ptr::null_mut(),
                    SeqCst,
                    SeqCst,
                ) {
                    Ok(_) => return,
                    Err(_) => continue,
                }
            }

            // Reverse the LIFO batch back into submission order.
            let mut prev: *mut Node = ptr::null_mut();
            let mut cur = batch;
            while cur != sealed() {
                let next = unsafe { (*cur).next };
                unsafe { (*cur).next = prev };
                prev = cur;
                cur = next;
            }

            while !prev.is_null() {
                let mut node = unsafe { Box::from_raw(prev) };
                prev = node.next;
                let task = node.task.take().expect("strand node ran twice");
                if panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
                    error!("task panicked on a strand");
                }
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Free whatever was never drained.
        let mut cur = self.head.swap(ptr::null_mut(), SeqCst);
        while !cur.is_null() && cur != sealed() {
            let node = unsafe { Box::from_raw(cur) };
            cur = node.next;
        }
    }
}
