//! Eager evaluation: start now, observe later.

use crate::cancel::Token;
use crate::exec::{self, ExecutorRef, SchedulerHint};
use crate::future::{contract, Consumer, ContractFuture, Output, Promise, SwitchContext, Thunk};

/// Start `thunk` on the calling thread; the returned future observes the
/// outcome. Dropping the future (or `request_cancel`) tells the running
/// producer to stop through the contract's producer token.
pub(crate) fn force<F>(thunk: F) -> ContractFuture<F::Value>
where
    F: Thunk,
{
    let (promise, future) = contract();
    thunk.start(PromiseConsumer { promise });
    future
}

/// Like [`force`], but evaluation begins on `executor`.
pub(crate) fn start_on<F>(thunk: F, executor: ExecutorRef) -> ContractFuture<F::Value>
where
    F: Thunk,
{
    let (promise, future) = contract();
    exec::submit_fn(&*executor, SchedulerHint::UpToYou, move || {
        thunk.start(PromiseConsumer { promise });
    });
    future
}

/// Feeds a producer's delivery into a contract promise. Its token is the
/// contract's producer token, so discarding the observing future cancels
/// the producer chain.
struct PromiseConsumer<T: Send + 'static> {
    promise: Promise<T>,
}

impl<T: Send + 'static> Consumer<T> for PromiseConsumer<T> {
    fn consume(self, output: Output<T>) {
        self.promise.set(output.result);
    }

    fn cancel(self, _context: SwitchContext) {
        self.promise.cancel();
    }

    fn cancel_token(&self) -> Token {
        self.promise.cancel_token()
    }
}
