use crate::exec::SchedulerHint;
use crate::fiber::fiber::Fiber;

/// Single-use capability over a suspended fiber.
///
/// Consumed exactly once: by [`schedule`](FiberHandle::schedule), which
/// re-enqueues the fiber as a runnable task, or by
/// [`resume_here`](FiberHandle::resume_here), which transfers to it on
/// the current thread. Move semantics make a second use impossible;
/// dropping the handle instead of consuming it strands the fiber and
/// trips the suspended-coroutine check underneath.
pub struct FiberHandle {
    fiber: Box<Fiber>,
}

impl FiberHandle {
    pub(crate) fn new(fiber: Box<Fiber>) -> FiberHandle {
        FiberHandle { fiber }
    }

    /// Re-enqueue the fiber on its executor.
    pub fn schedule(self, hint: SchedulerHint) {
        self.fiber.schedule(hint);
    }

    /// Run the fiber on the current thread, now. Chases any further
    /// symmetric transfers before returning.
    pub fn resume_here(self) {
        let mut next = Some(self.fiber);
        while let Some(fiber) = next.take() {
            next = fiber.step();
        }
    }

    pub(crate) fn into_fiber(self) -> Box<Fiber> {
        self.fiber
    }
}

impl std::fmt::Debug for FiberHandle {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("FiberHandle").finish()
    }
}
