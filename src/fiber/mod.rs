//! Fibers: cooperatively scheduled, stack-bearing units of execution
//! multiplexed over an executor's worker threads.
//!
//! A fiber runs ordinary code until it needs to wait, suspends through
//! [`suspend_with`] (handing its single-use [`FiberHandle`] to an awaiter
//! callback), and is later rescheduled by whatever event the awaiter
//! registered it with. Suspension happens only at these explicit points;
//! there is no preemption.

pub(crate) mod current;
pub(crate) mod fiber;
mod handle;

pub use self::handle::FiberHandle;

use crate::cancel::Token;
use crate::coro::{self, CoroError};
use crate::exec::{ExecutorRef, SchedulerHint};
use crate::fiber::fiber::{Awaiter, Fiber};
use crate::timer;

use std::time::Duration;

/// Configures fibers before spawning them.
#[derive(Debug)]
pub struct Builder {
    stack_size: usize,
}

impl Builder {
    /// Defaults: platform default stack size.
    pub fn new() -> Builder {
        Builder {
            stack_size: coro::default_stack_size(),
        }
    }

    /// Coroutine stack size for the spawned fiber.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.stack_size = size;
        self
    }

    /// Spawn `routine` as a fiber on `executor`.
    pub fn spawn<F>(self, executor: ExecutorRef, routine: F) -> Result<(), CoroError>
    where
        F: FnOnce() + Send + 'static,
    {
        let fiber = Fiber::new(executor, self.stack_size, routine)?;
        trace!("fiber spawned");
        fiber.schedule(SchedulerHint::UpToYou);
        Ok(())
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

/// Spawn `routine` as a fiber on `executor`.
///
/// # Panics
///
/// Panics if a coroutine stack cannot be allocated; use
/// [`Builder::spawn`] to handle that.
pub fn spawn<F>(executor: &ExecutorRef, routine: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = Builder::new().spawn(executor.clone(), routine) {
        panic!("failed to spawn fiber: {}", e);
    }
}

/// Spawn `routine` onto the current fiber's own executor.
///
/// # Panics
///
/// Panics when called outside of a fiber.
pub fn spawn_child<F>(routine: F)
where
    F: FnOnce() + Send + 'static,
{
    let executor = current::executor()
        .expect("spawn_child called outside of a fiber");
    spawn(&executor, routine);
}

/// Whether the caller is running inside a fiber.
pub fn in_fiber() -> bool {
    current::is_set()
}

/// The current fiber's cancellation token; [`Token::never`] off-fiber.
pub fn cancel_token() -> Token {
    current::token().unwrap_or_else(Token::never)
}

/// The current fiber's executor.
///
/// # Panics
///
/// Panics when called outside of a fiber.
pub fn current_executor() -> ExecutorRef {
    current::executor().expect("not running inside a fiber")
}

/// Suspend the current fiber.
///
/// After the switch back to the worker, `awaiter` receives the fiber's
/// handle; it records the handle wherever the wakeup will come from and
/// returns `None`, or returns a handle to transfer to directly.
///
/// # Panics
///
/// Panics when called outside of a fiber.
pub fn suspend_with<F>(awaiter: F)
where
    F: FnOnce(FiberHandle) -> Option<FiberHandle> + Send + 'static,
{
    let (awaiter_slot, point) =
        current::suspend_ptrs().expect("suspend outside of a fiber");
    // Runs on this worker after the switch out, before the fiber can be
    // observed suspended by anyone else.
    unsafe { (*awaiter_slot).set(Some(Box::new(awaiter) as Awaiter)) };
    unsafe { (*point).suspend() };
}

/// Let other work run; the fiber goes to the back of the queue.
pub fn yield_now() {
    if !in_fiber() {
        return std::thread::yield_now();
    }
    suspend_with(|handle| {
        handle.schedule(SchedulerHint::Last);
        None
    });
}

/// Park the fiber for at least `duration`.
///
/// # Panics
///
/// Panics when called outside of a fiber; plain threads have
/// `std::thread::sleep`.
pub fn sleep_for(duration: Duration) {
    assert!(in_fiber(), "sleep_for called outside of a fiber");
    suspend_with(move |handle| {
        timer::register(duration, move || handle.schedule(SchedulerHint::Next));
        None
    });
}
