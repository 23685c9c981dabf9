//! Thread-local "who is running" context.
//!
//! Set on resume, restored on return, exactly around the context switch;
//! everything else reads it through the accessors in [`crate::fiber`].

use crate::cancel::Token;
use crate::coro::SuspendPoint;
use crate::exec::ExecutorRef;
use crate::fiber::fiber::Awaiter;

use std::cell::{Cell, RefCell};

/// Raw pieces of the running fiber, valid only while it is resumed on
/// this thread. Field-granular pointers, so the run loop's exclusive
/// borrow of the coroutine never aliases them.
pub(crate) struct FiberContext {
    pub(crate) awaiter: *const Cell<Option<Awaiter>>,
    pub(crate) point: *const SuspendPoint,
    pub(crate) executor: ExecutorRef,
    pub(crate) token: Token,
}

thread_local! {
    static CURRENT: RefCell<Option<FiberContext>> = RefCell::new(None);
}

/// Install `cx` for the duration of a resume; restores the previous
/// value when the guard drops, panics included.
pub(crate) fn enter(cx: FiberContext) -> EnterGuard {
    let prev = CURRENT.with(|cell| cell.replace(Some(cx)));
    EnterGuard { prev: Some(prev) }
}

pub(crate) struct EnterGuard {
    prev: Option<Option<FiberContext>>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            CURRENT.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }
}

/// Whether the current thread is inside a resumed fiber.
pub(crate) fn is_set() -> bool {
    CURRENT.with(|cell| cell.borrow().is_some())
}

/// The running fiber's executor.
pub(crate) fn executor() -> Option<ExecutorRef> {
    CURRENT.with(|cell| {
        cell.borrow().as_ref().map(|cx| cx.executor.clone())
    })
}

/// The running fiber's cancellation token.
pub(crate) fn token() -> Option<Token> {
    CURRENT.with(|cell| cell.borrow().as_ref().map(|cx| cx.token.clone()))
}

/// The pointers needed to suspend: the awaiter slot and the suspend
/// point. Copied out so no thread-local borrow is held across the
/// switch.
pub(crate) fn suspend_ptrs(
) -> Option<(*const Cell<Option<Awaiter>>, *const SuspendPoint)> {
    CURRENT.with(|cell| {
        cell.borrow().as_ref().map(|cx| (cx.awaiter, cx.point))
    })
}
