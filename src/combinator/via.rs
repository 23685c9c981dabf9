//! Executor hand-off stage.

use crate::cancel::Token;
use crate::exec::{self, ExecutorRef, SchedulerHint};
use crate::future::{Consumer, Output, SwitchContext, Thunk};

/// Stage resubmitting the completion (or cancellation) to another
/// executor, so the downstream consumer runs there instead of on
/// whichever thread the producer finished on.
pub struct Via<F> {
    inner: F,
    executor: ExecutorRef,
    hint: SchedulerHint,
}

impl<F> Via<F> {
    pub(crate) fn new(inner: F, executor: ExecutorRef, hint: SchedulerHint) -> Via<F> {
        Via {
            inner,
            executor,
            hint,
        }
    }
}

impl<F> Thunk for Via<F>
where
    F: Thunk,
{
    type Value = F::Value;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<F::Value>,
    {
        self.inner.start(ViaConsumer {
            next: consumer,
            executor: self.executor,
            hint: self.hint,
        });
    }
}

struct ViaConsumer<C> {
    next: C,
    executor: ExecutorRef,
    hint: SchedulerHint,
}

impl<T, C> Consumer<T> for ViaConsumer<C>
where
    T: Send + 'static,
    C: Consumer<T>,
{
    fn consume(self, output: Output<T>) {
        let ViaConsumer {
            next,
            executor,
            hint,
        } = self;
        let context = SwitchContext::new(executor.clone(), hint);
        let result = output.result;
        exec::submit_fn(&*executor, hint, move || {
            next.consume(Output { result, context });
        });
    }

    fn cancel(self, _context: SwitchContext) {
        let ViaConsumer {
            next,
            executor,
            hint,
        } = self;
        let context = SwitchContext::new(executor.clone(), hint);
        exec::submit_fn(&*executor, hint, move || next.cancel(context));
    }

    fn cancel_token(&self) -> Token {
        self.next.cancel_token()
    }
}

impl<F> std::fmt::Debug for Via<F> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Via").field("hint", &self.hint).finish()
    }
}
