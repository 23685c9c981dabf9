//! Collapse a thunk of a thunk.

use crate::cancel::Token;
use crate::future::{Consumer, Output, SwitchContext, Thunk};

/// Stage starting the inner thunk once the outer one produces it.
pub struct Flatten<F> {
    inner: F,
}

impl<F> Flatten<F> {
    pub(crate) fn new(inner: F) -> Flatten<F> {
        Flatten { inner }
    }
}

impl<F> Thunk for Flatten<F>
where
    F: Thunk,
    F::Value: Thunk,
{
    type Value = <F::Value as Thunk>::Value;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<Self::Value>,
    {
        self.inner.start(FlattenConsumer { next: consumer });
    }
}

struct FlattenConsumer<C> {
    next: C,
}

impl<T, C> Consumer<T> for FlattenConsumer<C>
where
    T: Thunk,
    C: Consumer<T::Value>,
{
    fn consume(self, output: Output<T>) {
        let Output { result, context } = output;
        match result {
            Ok(inner) => inner.start(self.next),
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

impl<F> std::fmt::Debug for Flatten<F> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Flatten").finish()
    }
}
