//! Race two thunks producing the same value.

use crate::cancel::{Signal, SignalReceiver, Source, Subscription, Token};
use crate::future::{Consumer, Output, SwitchContext, Thunk};

use parking_lot::Mutex;

use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// Race `a` against `b`: the first completion (value or failure) wins and
/// propagates, the loser is cancelled. A cancelled side merely drops out
/// of the race; the race itself is only cancelled once both sides are.
pub fn first<A, B>(a: A, b: B) -> First<A, B>
where
    A: Thunk,
    B: Thunk<Value = A::Value>,
{
    First { a, b }
}

/// See [`first`].
pub struct First<A, B> {
    a: A,
    b: B,
}

impl<A, B> Thunk for First<A, B>
where
    A: Thunk,
    B: Thunk<Value = A::Value>,
{
    type Value = A::Value;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<A::Value>,
    {
        let token = consumer.cancel_token();
        if token.cancel_requested() {
            return consumer.cancel(SwitchContext::inline());
        }

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                next: Some(consumer),
                dropped_out: 0,
                sub: None,
            }),
            stop_left: Source::new(),
            stop_right: Source::new(),
        });

        if token.cancellable() {
            let sub = token.attach(Arc::new(CancelRace {
                shared: Arc::downgrade(&shared),
                _marker: PhantomData,
            }));
            // Dropped again when the race delivers, detaching the
            // receiver from the downstream scope.
            shared.inner.lock().sub = Some(sub);
        }

        let left_token = shared.stop_left.token();
        let right_token = shared.stop_right.token();
        self.a.start(Side {
            shared: shared.clone(),
            token: left_token,
            is_left: true,
        });
        self.b.start(Side {
            shared,
            token: right_token,
            is_left: false,
        });
    }
}

impl<A, B> std::fmt::Debug for First<A, B> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("First").finish()
    }
}

struct Shared<C> {
    inner: Mutex<Inner<C>>,
    stop_left: Source,
    stop_right: Source,
}

struct Inner<C> {
    next: Option<C>,
    /// Sides that left the race by being cancelled themselves.
    dropped_out: u8,
    sub: Option<Subscription>,
}

impl<C> Inner<C> {
    fn claim(&mut self) -> Option<(C, Option<Subscription>)> {
        let next = self.next.take()?;
        Some((next, self.sub.take()))
    }
}

struct CancelRace<T, C> {
    shared: Weak<Shared<C>>,
    _marker: PhantomData<fn(T)>,
}

impl<T, C> SignalReceiver for CancelRace<T, C>
where
    T: Send + 'static,
    C: Consumer<T>,
{
    fn forward(&self, signal: Signal) {
        if !signal.is_cancel() {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            let claimed = shared.inner.lock().claim();
            if let Some((next, _sub)) = claimed {
                shared.stop_left.cancel();
                shared.stop_right.cancel();
                next.cancel(SwitchContext::inline());
            }
        }
    }
}

struct Side<C> {
    shared: Arc<Shared<C>>,
    token: Token,
    is_left: bool,
}

impl<C> Side<C> {
    fn cancel_other(&self) {
        if self.is_left {
            self.shared.stop_right.cancel();
        } else {
            self.shared.stop_left.cancel();
        }
    }
}

impl<T, C> Consumer<T> for Side<C>
where
    T: Send + 'static,
    C: Consumer<T>,
{
    fn consume(self, output: Output<T>) {
        let claimed = self.shared.inner.lock().claim();
        match claimed {
            Some((next, _sub)) => {
                self.cancel_other();
                next.consume(output);
            }
            // Lost the race; the winner already delivered.
            None => trace!("race loser completed; output dropped"),
        }
    }

    fn cancel(self, context: SwitchContext) {
        let mut inner = self.shared.inner.lock();
        inner.dropped_out += 1;
        // Only when both sides have dropped out is the race itself
        // cancelled; a single cancelled side just waits for the other.
        if inner.dropped_out == 2 {
            if let Some((next, _sub)) = inner.claim() {
                drop(inner);
                next.cancel(context);
            }
        }
    }

    fn cancel_token(&self) -> Token {
        self.token.clone()
    }
}
