//! Raw symmetric execution-context switch.
//!
//! A [`Coroutine`] owns a protected stack and a saved machine context.
//! `resume()` transfers control into the coroutine (its entry routine the
//! first time, its last suspension point after that) and returns when the
//! coroutine suspends or its routine returns. The routine suspends through
//! the [`SuspendPoint`] handle it receives, which transfers control back to
//! whoever last called `resume()`.
//!
//! There is no scheduling here and no allocation on the switch path. This
//! module is the one deliberately unsafe island of the crate; everything
//! above it speaks only `resume`/`suspend`.

mod stack;

pub use self::stack::{default_stack_size, StackPool};

use context::stack::ProtectedFixedSizeStack;
use context::{Context, Transfer};

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Control returned to the resumer through the transfer data word.
const SUSPENDED: usize = 0;
const COMPLETED: usize = 1;
// Any other value is a `*mut PanicPayload` raised by the routine.

type PanicPayload = Box<dyn Any + Send + 'static>;
type Routine = Box<dyn FnOnce(&SuspendPoint) + Send + 'static>;

/// Coroutine stack allocation failure.
#[derive(Debug, Error)]
pub enum CoroError {
    /// The OS refused to map a stack of the requested size.
    #[error("failed to allocate a {size} byte coroutine stack")]
    Stack {
        /// Requested stack size in bytes.
        size: usize,
    },
}

/// An independent execution context: its own stack plus a saved context,
/// and a slot remembering the context that resumed it.
pub struct Coroutine {
    /// Saved context of the coroutine side. `None` only while the
    /// coroutine is running or after it completed.
    ctx: Option<Context>,
    /// Entry routine, consumed by the first `resume`.
    routine: Option<Routine>,
    /// Stable home for the resumer context; the routine side reaches it
    /// through a raw pointer handed over on the first switch.
    point: Box<SuspendPoint>,
    stack: Option<ProtectedFixedSizeStack>,
    stack_size: usize,
    completed: bool,
}

// A suspended coroutine is just memory: the stack and the saved context
// may move to another thread as long as only one thread operates the
// coroutine at a time, which `resume(&mut self)` already enforces.
unsafe impl Send for Coroutine {}

/// Handle passed to a coroutine routine; its `suspend` transfers control
/// back to the last `resume` caller.
pub struct SuspendPoint {
    caller: Cell<Option<Context>>,
}

/// First-switch message: lives in the resumer's frame for the duration of
/// the switch, read by the entry trampoline before any suspension.
struct StartMessage {
    routine: Option<Routine>,
    point: *const SuspendPoint,
}

extern "C" fn entry(t: Transfer) -> ! {
    let (routine, point) = unsafe {
        let msg = t.data as *mut StartMessage;
        let routine = (*msg)
            .routine
            .take()
            .expect("coroutine entered without a routine");
        (routine, &*(*msg).point)
    };
    point.caller.set(Some(t.context));

    let result = panic::catch_unwind(AssertUnwindSafe(|| routine(point)));

    let status = match result {
        Ok(()) => COMPLETED,
        // Carry the payload out by pointer; the resumer re-raises it.
        Err(payload) => Box::into_raw(Box::new(payload)) as usize,
    };

    let caller = point
        .caller
        .take()
        .expect("coroutine finished without a resumer context");
    unsafe { caller.resume(status) };
    unreachable!("coroutine resumed after completion");
}

// ===== impl Coroutine =====

impl Coroutine {
    /// Create a coroutine over a freshly mapped stack. The routine does
    /// not run until the first `resume`.
    pub fn new<F>(stack_size: usize, routine: F) -> Result<Coroutine, CoroError>
    where
        F: FnOnce(&SuspendPoint) + Send + 'static,
    {
        let stack = stack::take(stack_size)
            .map_err(|_| CoroError::Stack { size: stack_size })?;
        let ctx = unsafe { Context::new(&stack, entry) };

        Ok(Coroutine {
            ctx: Some(ctx),
            routine: Some(Box::new(routine)),
            point: Box::new(SuspendPoint {
                caller: Cell::new(None),
            }),
            stack: Some(stack),
            stack_size,
            completed: false,
        })
    }

    /// Transfer control into the coroutine. Returns when the coroutine
    /// suspends or its routine returns. A panic raised by the routine is
    /// re-raised here, in the resumer.
    ///
    /// # Panics
    ///
    /// Panics if the coroutine already completed.
    pub fn resume(&mut self) {
        assert!(!self.completed, "coroutine resumed after completion");
        let ctx = self
            .ctx
            .take()
            .expect("coroutine is already running");

        let transfer = match self.routine.take() {
            Some(routine) => {
                let mut msg = StartMessage {
                    routine: Some(routine),
                    point: &*self.point,
                };
                unsafe { ctx.resume(&mut msg as *mut StartMessage as usize) }
            }
            None => unsafe { ctx.resume(0) },
        };

        match transfer.data {
            SUSPENDED => {
                self.ctx = Some(transfer.context);
            }
            COMPLETED => {
                self.finish();
            }
            panic_ptr => {
                self.finish();
                let payload =
                    unsafe { Box::from_raw(panic_ptr as *mut PanicPayload) };
                panic::resume_unwind(*payload);
            }
        }
    }

    /// Whether the routine has returned.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Pointer to the suspend point; stable for the coroutine's lifetime.
    ///
    /// Only the code currently running inside the coroutine may go through
    /// it, which is what keeps the aliasing sound.
    pub(crate) fn suspend_point(&self) -> *const SuspendPoint {
        &*self.point
    }

    fn finish(&mut self) {
        self.completed = true;
        if let Some(stack) = self.stack.take() {
            stack::recycle(self.stack_size, stack);
        }
    }
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        // A suspended coroutine has live frames on its stack; dropping it
        // would skip their destructors. That is a bug in the caller, not a
        // runtime condition.
        if !self.completed && self.routine.is_none() && self.ctx.is_some() {
            error!("coroutine dropped while suspended");
            panic!("coroutine dropped while suspended");
        }
        if let Some(stack) = self.stack.take() {
            stack::recycle(self.stack_size, stack);
        }
    }
}

impl std::fmt::Debug for Coroutine {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Coroutine")
            .field("completed", &self.completed)
            .finish()
    }
}

// ===== impl SuspendPoint =====

impl SuspendPoint {
    /// Transfer control back to whoever last called `resume`.
    pub fn suspend(&self) {
        let caller = self
            .caller
            .take()
            .expect("suspend outside of a resumed coroutine");
        let t = unsafe { caller.resume(SUSPENDED) };
        // Back again: remember the fresh resumer context.
        self.caller.set(Some(t.context));
    }
}

impl std::fmt::Debug for SuspendPoint {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("SuspendPoint").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_to_completion() {
        let mut coro = Coroutine::new(default_stack_size(), |_| {}).unwrap();
        assert!(!coro.is_completed());
        coro.resume();
        assert!(coro.is_completed());
    }

    #[test]
    fn ping_pong() {
        let log = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let inner = log.clone();
        let mut coro = Coroutine::new(default_stack_size(), move |point| {
            inner.lock().push("a");
            point.suspend();
            inner.lock().push("c");
            point.suspend();
            inner.lock().push("e");
        })
        .unwrap();

        coro.resume();
        log.lock().push("b");
        coro.resume();
        log.lock().push("d");
        coro.resume();
        assert!(coro.is_completed());
        assert_eq!(*log.lock(), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn panic_surfaces_to_resumer() {
        let mut coro = Coroutine::new(default_stack_size(), |point| {
            point.suspend();
            panic!("boom");
        })
        .unwrap();

        coro.resume();
        let err = std::panic::catch_unwind(AssertUnwindSafe(|| coro.resume()))
            .unwrap_err();
        assert_eq!(*err.downcast_ref::<&str>().unwrap(), "boom");
        assert!(coro.is_completed());
    }

    #[test]
    #[should_panic(expected = "resumed after completion")]
    fn resume_after_completion_panics() {
        let mut coro = Coroutine::new(default_stack_size(), |_| {}).unwrap();
        coro.resume();
        coro.resume();
    }
}
