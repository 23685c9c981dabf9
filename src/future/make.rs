//! Ready-made producers.
//!
//! Every producer honors the protocol's one cancellation rule: check the
//! consumer's token before doing real work, deliver `cancel` instead of
//! completing if it fired.

use crate::cancel::{Signal, SignalReceiver};
use crate::exec::{self, ExecutorRef, SchedulerHint};
use crate::future::{Consumer, Error, Output, Result, SwitchContext, Thunk};

use parking_lot::Mutex;

use std::marker::PhantomData;
use std::sync::Arc;

/// Completes immediately with `()`.
pub fn just() -> Just {
    Just { _p: () }
}

/// Completes immediately with `value`.
pub fn value<T: Send + 'static>(value: T) -> Value<T> {
    Value { value }
}

/// Completes immediately with `error`.
pub fn failure<T: Send + 'static>(error: Error) -> Failure<T> {
    Failure {
        error,
        _marker: PhantomData,
    }
}

/// Never completes; delivers `cancel` if the consumer's scope is
/// cancelled, and nothing at all otherwise.
pub fn never<T: Send + 'static>() -> Never<T> {
    Never {
        _marker: PhantomData,
    }
}

/// Runs `f` on `executor` and completes with its result.
pub fn submit<T, F>(executor: ExecutorRef, f: F) -> Submit<F>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    Submit { executor, f }
}

/// See [`just`].
#[derive(Debug)]
pub struct Just {
    _p: (),
}

impl Thunk for Just {
    type Value = ();

    fn start<C>(self, consumer: C)
    where
        C: Consumer<()>,
    {
        if consumer.cancel_token().cancel_requested() {
            return consumer.cancel(SwitchContext::inline());
        }
        consumer.consume(Output::new(Ok(())));
    }
}

/// See [`value`].
#[derive(Debug)]
pub struct Value<T> {
    value: T,
}

impl<T: Send + 'static> Thunk for Value<T> {
    type Value = T;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<T>,
    {
        if consumer.cancel_token().cancel_requested() {
            return consumer.cancel(SwitchContext::inline());
        }
        consumer.consume(Output::new(Ok(self.value)));
    }
}

/// See [`failure`].
#[derive(Debug)]
pub struct Failure<T> {
    error: Error,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Thunk for Failure<T> {
    type Value = T;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<T>,
    {
        if consumer.cancel_token().cancel_requested() {
            return consumer.cancel(SwitchContext::inline());
        }
        consumer.consume(Output::new(Err(self.error)));
    }
}

/// See [`never`].
#[derive(Debug)]
pub struct Never<T> {
    _marker: PhantomData<fn() -> T>,
}

struct CancelHolder<T, C> {
    consumer: Mutex<Option<C>>,
    _marker: PhantomData<fn(T)>,
}

impl<T, C> SignalReceiver for CancelHolder<T, C>
where
    T: Send + 'static,
    C: Consumer<T>,
{
    fn forward(&self, signal: Signal) {
        let consumer = self.consumer.lock().take();
        if let Some(consumer) = consumer {
            match signal {
                Signal::Cancel => consumer.cancel(SwitchContext::inline()),
                // The scope will never cancel; nothing will ever be
                // delivered, the consumer simply goes away.
                Signal::Release => drop(consumer),
            }
        }
    }
}

impl<T: Send + 'static> Thunk for Never<T> {
    type Value = T;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<T>,
    {
        let token = consumer.cancel_token();
        if token.cancel_requested() {
            return consumer.cancel(SwitchContext::inline());
        }
        let holder = Arc::new(CancelHolder {
            consumer: Mutex::new(Some(consumer)),
            _marker: PhantomData,
        });
        // The registration lives until the scope resolves; detaching on
        // drop here would unhook it immediately.
        token.attach(holder).forever();
    }
}

/// See [`submit`].
pub struct Submit<F> {
    executor: ExecutorRef,
    f: F,
}

impl<T, F> Thunk for Submit<F>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    type Value = T;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<T>,
    {
        if consumer.cancel_token().cancel_requested() {
            return consumer.cancel(SwitchContext::inline());
        }
        let f = self.f;
        exec::submit_fn(&*self.executor, SchedulerHint::UpToYou, move || {
            // Re-check on the worker: the scope may have given up while
            // we sat in the queue.
            if consumer.cancel_token().cancel_requested() {
                return consumer.cancel(SwitchContext::inline());
            }
            consumer.consume(Output::new(f()));
        });
    }
}

impl<F> std::fmt::Debug for Submit<F> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Submit").finish()
    }
}
