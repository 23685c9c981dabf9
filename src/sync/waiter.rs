use crate::exec::SchedulerHint;
use crate::fiber::FiberHandle;
use crate::sync::park::Unparker;

/// A parked wait() caller: a suspended fiber or a parked thread.
pub(crate) enum Waiter {
    Fiber(FiberHandle),
    Thread(Unparker),
}

impl Waiter {
    pub(crate) fn wake(self) {
        match self {
            Waiter::Fiber(handle) => handle.schedule(SchedulerHint::Next),
            Waiter::Thread(unparker) => unparker.unpark(),
        }
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Waiter::Fiber(_) => fmt.write_str("Waiter::Fiber"),
            Waiter::Thread(_) => fmt.write_str("Waiter::Thread"),
        }
    }
}
