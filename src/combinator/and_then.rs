//! Flat-map: chain a thunk-producing continuation.

use crate::cancel::Token;
use crate::future::{Consumer, Output, SwitchContext, Thunk};

use std::marker::PhantomData;

/// Stage starting the thunk returned by `f` once the value arrives.
pub struct AndThen<F, M, U> {
    inner: F,
    f: M,
    _marker: PhantomData<fn() -> U>,
}

impl<F, M, U> AndThen<F, M, U> {
    pub(crate) fn new(inner: F, f: M) -> AndThen<F, M, U> {
        AndThen {
            inner,
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, M, U> Thunk for AndThen<F, M, U>
where
    F: Thunk,
    M: FnOnce(F::Value) -> U + Send + 'static,
    U: Thunk,
{
    type Value = U::Value;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<U::Value>,
    {
        self.inner.start(AndThenConsumer {
            next: consumer,
            f: self.f,
            _marker: PhantomData,
        });
    }
}

struct AndThenConsumer<C, M, U> {
    next: C,
    f: M,
    _marker: PhantomData<fn() -> U>,
}

impl<T, U, C, M> Consumer<T> for AndThenConsumer<C, M, U>
where
    T: Send + 'static,
    U: Thunk,
    C: Consumer<U::Value>,
    M: FnOnce(T) -> U + Send + 'static,
{
    fn consume(self, output: Output<T>) {
        let Output { result, context } = output;
        match result {
            // The continuation thunk is started in place; it inherits
            // this consumer's scope through `cancel_token` and decides
            // its own completion context.
            Ok(value) => (self.f)(value).start(self.next),
            Err(error) => self.next.consume(Output {
                result: Err(error),
                context,
            }),
        }
    }

    fn cancel(self, context: SwitchContext) {
        self.next.cancel(context);
    }

    fn cancel_token(&self) -> Token {
        self.next.cancel_token()
    }
}

impl<F, M, U> std::fmt::Debug for AndThen<F, M, U> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("AndThen").finish()
    }
}
