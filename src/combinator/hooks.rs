//! Side-effect stages; the outcome passes through unchanged.

use crate::cancel::Token;
use crate::future::{Consumer, Output, SwitchContext, Thunk};

/// Runs its hook on the value of a successful completion.
pub struct OnSuccess<F, M> {
    inner: F,
    f: M,
}

impl<F, M> OnSuccess<F, M> {
    pub(crate) fn new(inner: F, f: M) -> OnSuccess<F, M> {
        OnSuccess { inner, f }
    }
}

impl<F, M> Thunk for OnSuccess<F, M>
where
    F: Thunk,
    M: FnOnce(&F::Value) + Send + 'static,
{
    type Value = F::Value;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<F::Value>,
    {
        self.inner.start(OnSuccessConsumer {
            next: consumer,
            f: self.f,
        });
    }
}

struct OnSuccessConsumer<C, M> {
    next: C,
    f: M,
}

impl<T, C, M> Consumer<T> for OnSuccessConsumer<C, M>
where
    T: Send + 'static,
    C: Consumer<T>,
    M: FnOnce(&T) + Send + 'static,
{
    fn consume(self, output: Output<T>) {
        if let Ok(value) = &output.result {
            (self.f)(value);
        }
        self.next.consume(output);
    }

    fn cancel(self, context: SwitchContext) {
        self.next.cancel(context);
    }

    fn cancel_token(&self) -> Token {
        self.next.cancel_token()
    }
}

/// Runs its hook when the chain is cancelled.
pub struct OnCancel<F, M> {
    inner: F,
    f: M,
}

impl<F, M> OnCancel<F, M> {
    pub(crate) fn new(inner: F, f: M) -> OnCancel<F, M> {
        OnCancel { inner, f }
    }
}

impl<F, M> Thunk for OnCancel<F, M>
where
    F: Thunk,
    M: FnOnce() + Send + 'static,
{
    type Value = F::Value;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<F::Value>,
    {
        self.inner.start(OnCancelConsumer {
            next: consumer,
            f: self.f,
        });
    }
}

struct OnCancelConsumer<C, M> {
    next: C,
    f: M,
}

impl<T, C, M> Consumer<T> for OnCancelConsumer<C, M>
where
    T: Send + 'static,
    C: Consumer<T>,
    M: FnOnce() + Send + 'static,
{
    fn consume(self, output: Output<T>) {
        self.next.consume(output);
    }

    fn cancel(self, context: SwitchContext) {
        (self.f)();
        self.next.cancel(context);
    }

    fn cancel_token(&self) -> Token {
        self.next.cancel_token()
    }
}

/// Runs its hook on every outcome, completion and cancellation alike.
pub struct Anyway<F, M> {
    inner: F,
    f: M,
}

impl<F, M> Anyway<F, M> {
    pub(crate) fn new(inner: F, f: M) -> Anyway<F, M> {
        Anyway { inner, f }
    }
}

impl<F, M> Thunk for Anyway<F, M>
where
    F: Thunk,
    M: FnOnce() + Send + 'static,
{
    type Value = F::Value;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<F::Value>,
    {
        self.inner.start(AnywayConsumer {
            next: consumer,
            f: self.f,
        });
    }
}

struct AnywayConsumer<C, M> {
    next: C,
    f: M,
}

impl<T, C, M> Consumer<T> for AnywayConsumer<C, M>
where
    T: Send + 'static,
    C: Consumer<T>,
    M: FnOnce() + Send + 'static,
{
    fn consume(self, output: Output<T>) {
        (self.f)();
        self.next.consume(output);
    }

    fn cancel(self, context: SwitchContext) {
        (self.f)();
        self.next.cancel(context);
    }

    fn cancel_token(&self) -> Token {
        self.next.cancel_token()
    }
}

impl<F, M> std::fmt::Debug for OnSuccess<F, M> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("OnSuccess").finish()
    }
}

impl<F, M> std::fmt::Debug for OnCancel<F, M> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("OnCancel").finish()
    }
}

impl<F, M> std::fmt::Debug for Anyway<F, M> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Anyway").finish()
    }
}
