//! Broadcast one result to several consumers.

use crate::cancel::{Signal, SignalReceiver, Source, Subscription, Token};
use crate::combinator::BoxThunk;
use crate::future::{
    Consumer, DynConsumer, Output, Result, SwitchContext, Thunk,
};

use parking_lot::Mutex;
use smallvec::SmallVec;

use std::sync::{Arc, Weak};

/// Split `thunk` into `n` tines. The source is computed once, on the
/// first tine to be started; every tine observes a clone of the one
/// result (failures broadcast too, which is why the error type is
/// reference counted). If every tine is dropped or cancelled before the
/// source completes, the source is cancelled.
///
/// The fan-out state is freed when the last tine lets go of it; this is
/// the one place in the pipeline where reference counting replaces
/// single ownership.
pub fn fork_n<F>(thunk: F, n: usize) -> Vec<Tine<F::Value>>
where
    F: Thunk,
    F::Value: Clone,
{
    assert!(n > 0, "fork needs at least one tine");
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            source: Some(BoxThunk::new(thunk)),
            outcome: None,
            waiting: SmallVec::new(),
            live: n,
        }),
        stop: Source::new(),
    });
    (0..n)
        .map(|_| Tine {
            shared: Some(shared.clone()),
        })
        .collect()
}

/// One consumer-side prong of a fork; itself a thunk.
pub struct Tine<T: Send + 'static> {
    shared: Option<Arc<Shared<T>>>,
}

enum Broadcast<T> {
    Done(Result<T>),
    Cancelled,
}

/// A parked tine consumer. Shared between the waiting list and the
/// tine's cancellation receiver; whoever takes the consumer first
/// delivers. Delivery also drops the subscription, detaching the
/// receiver from the tine's scope.
struct TineSlot<T: Send + 'static> {
    consumer: Option<Box<dyn DynConsumer<T>>>,
    sub: Option<Subscription>,
}

type SlotRef<T> = Arc<Mutex<TineSlot<T>>>;

struct Shared<T: Send + 'static> {
    inner: Mutex<Inner<T>>,
    /// Scope handed to the source producer; cancelled once no tine is
    /// left to observe the result.
    stop: Source,
}

struct Inner<T: Send + 'static> {
    /// The source thunk, taken by the first tine to start.
    source: Option<BoxThunk<T>>,
    outcome: Option<Broadcast<T>>,
    waiting: SmallVec<[SlotRef<T>; 4]>,
    /// Tines that may still observe the result.
    live: usize,
}

// ===== impl Tine =====

impl<T> Thunk for Tine<T>
where
    T: Clone + Send + 'static,
{
    type Value = T;

    fn start<C>(mut self, consumer: C)
    where
        C: Consumer<T>,
    {
        let shared = self.shared.take().expect("tine is already consumed");
        let token = consumer.cancel_token();
        if token.cancel_requested() {
            shared.abandon();
            return consumer.cancel(SwitchContext::inline());
        }

        let slot = Arc::new(Mutex::new(TineSlot {
            consumer: Some(Box::new(consumer) as Box<dyn DynConsumer<T>>),
            sub: None,
        }));
        if token.cancellable() {
            // A cancel firing during this attach takes the consumer out
            // of the slot inline; everything below then sees an empty
            // slot and no-ops.
            let sub = token.attach(Arc::new(TineCancel {
                slot: Arc::downgrade(&slot),
                shared: Arc::downgrade(&shared),
            }));
            slot.lock().sub = Some(sub);
        }

        let mut inner = shared.inner.lock();
        if let Some(outcome) = &inner.outcome {
            let delivery = match outcome {
                Broadcast::Done(result) => Some(result.clone()),
                Broadcast::Cancelled => None,
            };
            drop(inner);
            deliver(&slot, delivery);
            return;
        }

        inner.waiting.push(slot);
        let source = inner.source.take();
        drop(inner);

        if let Some(source) = source {
            let token = shared.stop.token();
            source.start(ForkConsumer { shared, token });
        }
    }
}

impl<T: Send + 'static> Drop for Tine<T> {
    fn drop(&mut self) {
        // Dropped without being started: one fewer observer.
        if let Some(shared) = self.shared.take() {
            shared.abandon();
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Tine<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Tine")
            .field("consumed", &self.shared.is_none())
            .finish()
    }
}

// ===== impl Shared =====

impl<T: Send + 'static> Shared<T> {
    /// A tine gave up before the result arrived.
    fn abandon(&self) {
        let mut inner = self.inner.lock();
        inner.live -= 1;
        let orphaned = inner.live == 0 && inner.outcome.is_none();
        drop(inner);
        if orphaned {
            trace!("fork: every tine gone, cancelling the source");
            self.stop.cancel();
        }
    }
}

fn deliver<T: Send + 'static>(slot: &SlotRef<T>, delivery: Option<Result<T>>) {
    let TineSlot { consumer, sub } = {
        let mut slot = slot.lock();
        TineSlot {
            consumer: slot.consumer.take(),
            sub: slot.sub.take(),
        }
    };
    drop(sub);
    if let Some(consumer) = consumer {
        match delivery {
            Some(result) => consumer.consume_boxed(Output::new(result)),
            None => consumer.cancel_boxed(SwitchContext::inline()),
        }
    }
}

/// Cancellation receiver of one tine's scope.
struct TineCancel<T: Send + 'static> {
    slot: Weak<Mutex<TineSlot<T>>>,
    shared: Weak<Shared<T>>,
}

impl<T: Send + 'static> SignalReceiver for TineCancel<T> {
    fn forward(&self, signal: Signal) {
        if !signal.is_cancel() {
            return;
        }
        let slot = match self.slot.upgrade() {
            Some(slot) => slot,
            None => return,
        };
        let (consumer, sub) = {
            let mut slot = slot.lock();
            (slot.consumer.take(), slot.sub.take())
        };
        drop(sub);
        if let Some(consumer) = consumer {
            if let Some(shared) = self.shared.upgrade() {
                shared.abandon();
            }
            consumer.cancel_boxed(SwitchContext::inline());
        }
    }
}

/// The single consumer attached to the source thunk; broadcasts.
struct ForkConsumer<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    token: Token,
}

impl<T> Consumer<T> for ForkConsumer<T>
where
    T: Clone + Send + 'static,
{
    fn consume(self, output: Output<T>) {
        // The placement context is not broadcast: each tine resumes
        // inline on the producing thread, and stages that care route
        // themselves with `via`.
        let Output { result, .. } = output;
        let waiting = {
            let mut inner = self.shared.inner.lock();
            inner.outcome = Some(Broadcast::Done(result.clone()));
            std::mem::replace(&mut inner.waiting, SmallVec::new())
        };
        for slot in &waiting {
            deliver(slot, Some(result.clone()));
        }
    }

    fn cancel(self, _context: SwitchContext) {
        let waiting = {
            let mut inner = self.shared.inner.lock();
            inner.outcome = Some(Broadcast::Cancelled);
            std::mem::replace(&mut inner.waiting, SmallVec::new())
        };
        for slot in &waiting {
            deliver(slot, None);
        }
    }

    fn cancel_token(&self) -> Token {
        self.token.clone()
    }
}
