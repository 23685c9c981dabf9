//! Fire and forget.

use crate::cancel::Token;
use crate::exec::{self, ExecutorRef, SchedulerHint};
use crate::future::{Consumer, Output, SwitchContext, Thunk};

use std::marker::PhantomData;

/// Run `thunk` to completion with nobody watching. The pipeline frees
/// itself once delivery happens; a failure is logged and dropped.
pub(crate) fn detach<F>(thunk: F)
where
    F: Thunk,
{
    thunk.start(Sink {
        _marker: PhantomData,
    });
}

/// Like [`detach`], but evaluation begins on `executor`.
pub(crate) fn detach_on<F>(thunk: F, executor: ExecutorRef)
where
    F: Thunk,
{
    exec::submit_fn(&*executor, SchedulerHint::UpToYou, move || detach(thunk));
}

struct Sink<T> {
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + 'static> Consumer<T> for Sink<T> {
    fn consume(self, output: Output<T>) {
        if let Err(error) = output.result {
            debug!("detached pipeline failed: {}", error);
        }
    }

    fn cancel(self, _context: SwitchContext) {
        trace!("detached pipeline cancelled");
    }

    fn cancel_token(&self) -> Token {
        Token::never()
    }
}
