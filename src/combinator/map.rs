//! Value and error transformation stages.

use crate::cancel::Token;
use crate::future::{Consumer, Error, Output, Result, SwitchContext, Thunk};

use std::marker::PhantomData;

/// Stage applying a function to the produced value.
pub struct Map<F, M> {
    inner: F,
    f: M,
}

impl<F, M> Map<F, M> {
    pub(crate) fn new(inner: F, f: M) -> Map<F, M> {
        Map { inner, f }
    }
}

impl<F, M, U> Thunk for Map<F, M>
where
    F: Thunk,
    M: FnOnce(F::Value) -> U + Send + 'static,
    U: Send + 'static,
{
    type Value = U;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<U>,
    {
        self.inner.start(MapConsumer {
            next: consumer,
            f: self.f,
            _marker: PhantomData,
        });
    }
}

struct MapConsumer<C, M, U> {
    next: C,
    f: M,
    _marker: PhantomData<fn() -> U>,
}

impl<T, U, C, M> Consumer<T> for MapConsumer<C, M, U>
where
    T: Send + 'static,
    U: Send + 'static,
    C: Consumer<U>,
    M: FnOnce(T) -> U + Send + 'static,
{
    fn consume(self, output: Output<T>) {
        let Output { result, context } = output;
        let result = result.map(self.f);
        self.next.consume(Output { result, context });
    }

    fn cancel(self, context: SwitchContext) {
        self.next.cancel(context);
    }

    fn cancel_token(&self) -> Token {
        self.next.cancel_token()
    }
}

/// Stage observing (and possibly recovering from) a failure.
pub struct MapErr<F, M> {
    inner: F,
    f: M,
}

impl<F, M> MapErr<F, M> {
    pub(crate) fn new(inner: F, f: M) -> MapErr<F, M> {
        MapErr { inner, f }
    }
}

impl<F, M> Thunk for MapErr<F, M>
where
    F: Thunk,
    M: FnOnce(Error) -> Result<F::Value> + Send + 'static,
{
    type Value = F::Value;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<F::Value>,
    {
        self.inner.start(MapErrConsumer {
            next: consumer,
            f: self.f,
        });
    }
}

struct MapErrConsumer<C, M> {
    next: C,
    f: M,
}

impl<T, C, M> Consumer<T> for MapErrConsumer<C, M>
where
    T: Send + 'static,
    C: Consumer<T>,
    M: FnOnce(Error) -> Result<T> + Send + 'static,
{
    fn consume(self, output: Output<T>) {
        let Output { result, context } = output;
        let result = match result {
            Ok(value) => Ok(value),
            Err(error) => (self.f)(error),
        };
        self.next.consume(Output { result, context });
    }

    fn cancel(self, context: SwitchContext) {
        self.next.cancel(context);
    }

    fn cancel_token(&self) -> Token {
        self.next.cancel_token()
    }
}

impl<F, M> std::fmt::Debug for Map<F, M> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Map").finish()
    }
}

impl<F, M> std::fmt::Debug for MapErr<F, M> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("MapErr").finish()
    }
}
