//! Join two thunks into a pair.

use crate::cancel::{Signal, SignalReceiver, Source, Subscription, Token};
use crate::future::{Consumer, Output, SwitchContext, Thunk};

use parking_lot::Mutex;

use std::sync::{Arc, Weak};

/// Join `a` and `b`: completes with the pair of both values once both
/// sides have completed. The first failure or cancellation on either
/// side wins, is propagated downstream, and cancels the other side.
pub fn both<A, B>(a: A, b: B) -> Both<A, B>
where
    A: Thunk,
    B: Thunk,
{
    Both { a, b }
}

/// See [`both`].
pub struct Both<A, B> {
    a: A,
    b: B,
}

impl<A, B> Thunk for Both<A, B>
where
    A: Thunk,
    B: Thunk,
{
    type Value = (A::Value, B::Value);

    fn start<C>(self, consumer: C)
    where
        C: Consumer<(A::Value, B::Value)>,
    {
        let token = consumer.cancel_token();
        if token.cancel_requested() {
            return consumer.cancel(SwitchContext::inline());
        }

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                left: None,
                right: None,
                next: Some(consumer),
                sub: None,
            }),
            // One stop scope per side: each side's producer chain hangs
            // its own receiver off its own sender.
            stop_left: Source::new(),
            stop_right: Source::new(),
        });

        if token.cancellable() {
            let sub = token.attach(Arc::new(CancelJoin {
                shared: Arc::downgrade(&shared),
            }));
            // Dropped again when the join delivers, detaching the
            // receiver from the downstream scope.
            shared.inner.lock().sub = Some(sub);
        }

        let left_token = shared.stop_left.token();
        let right_token = shared.stop_right.token();
        self.a.start(LeftSide {
            shared: shared.clone(),
            token: left_token,
        });
        self.b.start(RightSide {
            shared,
            token: right_token,
        });
    }
}

impl<A, B> std::fmt::Debug for Both<A, B> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Both").finish()
    }
}

struct Shared<T, U, C> {
    inner: Mutex<Inner<T, U, C>>,
    stop_left: Source,
    stop_right: Source,
}

struct Inner<T, U, C> {
    left: Option<T>,
    right: Option<U>,
    next: Option<C>,
    sub: Option<Subscription>,
}

impl<T, U, C> Inner<T, U, C> {
    /// Claim the delivery: the consumer plus the registration to drop.
    fn claim(&mut self) -> Option<(C, Option<Subscription>)> {
        let next = self.next.take()?;
        Some((next, self.sub.take()))
    }
}

/// Downstream cancellation: claim the consumer, stop both sides.
struct CancelJoin<T, U, C> {
    shared: Weak<Shared<T, U, C>>,
}

impl<T, U, C> SignalReceiver for CancelJoin<T, U, C>
where
    T: Send + 'static,
    U: Send + 'static,
    C: Consumer<(T, U)>,
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

struct LeftSide<T, U, C> {
    shared: Arc<Shared<T, U, C>>,
    token: Token,
}

impl<T, U, C> Consumer<T> for LeftSide<T, U, C>
where
    T: Send + 'static,
    U: Send + 'static,
    C: Consumer<(T, U)>,
{
    fn consume(self, output: Output<T>) {
        let Output { result, context } = output;
        let mut inner = self.shared.inner.lock();
        match result {
            Ok(value) => match inner.right.take() {
                Some(other) => {
                    if let Some((next, _sub)) = inner.claim() {
                        drop(inner);
                        next.consume(Output {
                            result: Ok((value, other)),
                            context,
                        });
                    }
                }
                None => inner.left = Some(value),
            },
            Err(error) => {
                if let Some((next, _sub)) = inner.claim() {
                    drop(inner);
                    self.shared.stop_right.cancel();
                    next.consume(Output {
                        result: Err(error),
                        context,
                    });
                }
            }
        }
    }

    fn cancel(self, context: SwitchContext) {
        let claimed = self.shared.inner.lock().claim();
        if let Some((next, _sub)) = claimed {
            self.shared.stop_right.cancel();
            next.cancel(context);
        }
    }

    fn cancel_token(&self) -> Token {
        self.token.clone()
    }
}

struct RightSide<T, U, C> {
    shared: Arc<Shared<T, U, C>>,
    token: Token,
}

impl<T, U, C> Consumer<U> for RightSide<T, U, C>
where
    T: Send + 'static,
    U: Send + 'static,
    C: Consumer<(T, U)>,
{
    fn consume(self, output: Output<U>) {
        let Output { result, context } = output;
        let mut inner = self.shared.inner.lock();
        match result {
            Ok(value) => match inner.left.take() {
                Some(other) => {
                    if let Some((next, _sub)) = inner.claim() {
                        drop(inner);
                        next.consume(Output {
                            result: Ok((other, value)),
                            context,
                        });
                    }
                }
                None => inner.right = Some(value),
            },
            Err(error) => {
                if let Some((next, _sub)) = inner.claim() {
                    drop(inner);
                    self.shared.stop_left.cancel();
                    next.consume(Output {
                        result: Err(error),
                        context,
                    });
                }
            }
        }
    }

    fn cancel(self, context: SwitchContext) {
        let claimed = self.shared.inner.lock().claim();
        if let Some((next, _sub)) = claimed {
            self.shared.stop_left.cancel();
            next.cancel(context);
        }
    }

    fn cancel_token(&self) -> Token {
        self.token.clone()
    }
}
