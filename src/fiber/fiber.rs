use crate::cancel::Source;
use crate::coro::{CoroError, Coroutine};
use crate::exec::{ExecutorRef, SchedulerHint, Task};
use crate::fiber::current::{self, FiberContext};
use crate::fiber::FiberHandle;

use std::cell::Cell;

/// One-shot suspension callback: receives the suspended fiber's handle,
/// records it somewhere, and may hand back a fiber to transfer to
/// directly instead of returning to the run loop.
pub(crate) type Awaiter =
    Box<dyn FnOnce(FiberHandle) -> Option<FiberHandle> + Send + 'static>;

/// A coroutine bound to an executor.
///
/// Always owned by exactly one place: the executor queue (scheduled), the
/// worker running it, or — while suspended — whoever holds its
/// [`FiberHandle`]. The `Box` never moves in memory, which is what lets
/// the code running inside the coroutine reach the awaiter slot through
/// the thread-local context.
pub(crate) struct Fiber {
    coro: Coroutine,
    executor: ExecutorRef,
    awaiter: Cell<Option<Awaiter>>,
    stop: Source,
}

impl Fiber {
    pub(crate) fn new<F>(
        executor: ExecutorRef,
        stack_size: usize,
        routine: F,
    ) -> Result<Box<Fiber>, CoroError>
    where
        F: FnOnce() + Send + 'static,
    {
        let coro = Coroutine::new(stack_size, move |_point| routine())?;
        Ok(Box::new(Fiber {
            coro,
            executor,
            awaiter: Cell::new(None),
            stop: Source::new(),
        }))
    }

    /// Resume the fiber until it suspends or completes. Returns a fiber
    /// to run next on this thread if the awaiter asked for a symmetric
    /// transfer.
    pub(crate) fn step(mut self: Box<Self>) -> Option<Box<Fiber>> {
        {
            let cx = FiberContext {
                awaiter: &self.awaiter,
                point: self.coro.suspend_point(),
                executor: self.executor.clone(),
                token: self.stop.token(),
            };
            let _scope = current::enter(cx);
            // A routine panic is re-raised here, in the resumer, and
            // bubbles to the worker; the scope guard has already cleared
            // the thread-local by then.
            self.coro.resume();
        }

        if self.coro.is_completed() {
            trace!("fiber completed");
            return None;
        }

        let awaiter = self
            .awaiter
            .take()
            .expect("fiber suspended without an awaiter");
        let handle = FiberHandle::new(self);
        awaiter(handle).map(FiberHandle::into_fiber)
    }

    /// Re-enqueue as a runnable task on the owning executor.
    pub(crate) fn schedule(self: Box<Self>, hint: SchedulerHint) {
        let executor = self.executor.clone();
        trace!("fiber scheduled with {:?}", hint);
        executor.submit(Box::new(RunFiber { fiber: self }), hint);
    }
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Fiber").finish()
    }
}

/// The task shape a fiber presents to executors.
pub(crate) struct RunFiber {
    pub(crate) fiber: Box<Fiber>,
}

impl Task for RunFiber {
    fn run(self: Box<Self>) {
        // Chase symmetric transfers until a step returns to the loop.
        let mut next = Some(self.fiber);
        while let Some(fiber) = next.take() {
            next = fiber.step();
        }
    }
}
