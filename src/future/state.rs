//! The single-producer / single-consumer completion cell.
//!
//! `SharedState` mediates the fundamental race of the protocol: the
//! producer may publish a delivery while the consumer concurrently
//! requests cancellation. A compare-and-swap on one atomic decides which
//! transition commits; the loser observes a no-op. This is what makes
//! delivery exactly-once under arbitrary interleaving.
//!
//! Ownership is never shared: the producer owns the delivery cell until
//! it publishes, the consumer cell belongs to the attaching side until
//! the winning transition takes it, and the `Arc` only tracks who still
//! holds an end.

use crate::cancel::{Signal, SignalReceiver, Source, Token};
use crate::future::{DynConsumer, Output, SwitchContext};

use parking_lot::Mutex;

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering::SeqCst};
use std::sync::{Arc, Weak};

/// What the producer hands over.
pub(crate) enum Delivery<T> {
    /// Normal completion (value or failure).
    Output(Output<T>),
    /// The producer itself was cancelled; propagate.
    Cancelled(SwitchContext),
}

const EMPTY: u8 = 0;
/// Producer published, no consumer yet.
const DELIVERY: u8 = 1;
/// Consumer attached, waiting.
const CONSUMER: u8 = 2;
/// Handed over.
const DONE: u8 = 3;
/// Consumer-side cancellation won.
const CANCELLED: u8 = 4;

/// Registration of the consumer's token, kept so a late cancel can still
/// reach the cell and dropped (detached) once delivery happens.
enum SubSlot {
    Pending,
    Stored(crate::cancel::Subscription),
    Consumed,
}

pub(crate) struct SharedState<T: Send + 'static> {
    state: AtomicU8,
    delivery: UnsafeCell<Option<Delivery<T>>>,
    consumer: UnsafeCell<Option<Box<dyn DynConsumer<T>>>>,
    subscription: Mutex<SubSlot>,
    /// Producer-facing scope: resolved with Cancel when the consumer side
    /// gives up, with Release once the producer has published.
    stop: Source,
}

// The two cells are only touched by the role that owns them at the
// current point of the state machine; the atomic transitions order the
// hand-offs.
unsafe impl<T: Send + 'static> Send for SharedState<T> {}
unsafe impl<T: Send + 'static> Sync for SharedState<T> {}

struct CancelOnSignal<T: Send + 'static> {
    state: Weak<SharedState<T>>,
}

impl<T: Send + 'static> SignalReceiver for CancelOnSignal<T> {
    fn forward(&self, signal: Signal) {
        if signal.is_cancel() {
            if let Some(state) = self.state.upgrade() {
                state.request_cancel();
            }
        }
    }
}

// ===== impl SharedState =====

impl<T: Send + 'static> SharedState<T> {
    pub(crate) fn new() -> Arc<SharedState<T>> {
        Arc::new(SharedState {
            state: AtomicU8::new(EMPTY),
            delivery: UnsafeCell::new(None),
            consumer: UnsafeCell::new(None),
            subscription: Mutex::new(SubSlot::Pending),
            stop: Source::new(),
        })
    }

    /// Token the producer watches to learn the consumer side gave up.
    pub(crate) fn producer_token(&self) -> Token {
        self.stop.token()
    }

    /// Producer side: publish. The losing side of a cancellation race
    /// drops the delivery without anyone observing it.
    pub(crate) fn complete(&self, delivery: Delivery<T>) {
        // Safe: the producer owns the delivery cell until the transition
        // below publishes it.
        unsafe { *self.delivery.get() = Some(delivery) };

        match self.state.compare_exchange(EMPTY, DELIVERY, SeqCst, SeqCst) {
            Ok(_) => {
                self.stop.release();
            }
            Err(CONSUMER) => {
                if self
                    .state
                    .compare_exchange(CONSUMER, DONE, SeqCst, SeqCst)
                    .is_ok()
                {
                    self.stop.release();
                    self.consume_subscription();
                    let consumer = self.take_consumer();
                    let delivery = self.take_delivery();
                    dispatch(consumer, delivery);
                } else {
                    // Lost to a concurrent cancel.
                    self.clear_delivery();
                }
            }
            Err(CANCELLED) => {
                self.clear_delivery();
            }
            Err(actual) => panic!("shared state completed twice: {}", actual),
        }
    }

    /// Consumer side: attach. Delivers inline if the producer already
    /// published, otherwise parks the consumer and wires its token so a
    /// later cancel can claim the cell.
    pub(crate) fn attach(self: &Arc<Self>, consumer: Box<dyn DynConsumer<T>>) {
        // The canonical cancellation check point.
        if consumer.token().cancel_requested() {
            self.request_cancel();
            consumer.cancel_boxed(SwitchContext::inline());
            return;
        }

        let token = consumer.token();

        // Safe: the consumer cell belongs to this side until the
        // transition publishes it.
        unsafe { *self.consumer.get() = Some(consumer) };

        match self.state.compare_exchange(EMPTY, CONSUMER, SeqCst, SeqCst) {
            Ok(_) => {
                let receiver = Arc::new(CancelOnSignal {
                    state: Arc::downgrade(self),
                });
                let sub = token.attach(receiver);
                let mut slot = self.subscription.lock();
                match *slot {
                    SubSlot::Pending => *slot = SubSlot::Stored(sub),
                    // Delivery already happened; detach on the spot.
                    SubSlot::Consumed => drop(sub),
                    SubSlot::Stored(_) => {
                        panic!("shared state attached twice")
                    }
                }
            }
            Err(DELIVERY) => {
                match self.state.compare_exchange(DELIVERY, DONE, SeqCst, SeqCst) {
                    Ok(_) => {
                        let consumer = self.take_consumer();
                        let delivery = self.take_delivery();
                        dispatch(consumer, delivery);
                    }
                    Err(actual) => {
                        panic!("inconsistent shared state on attach: {}", actual)
                    }
                }
            }
            Err(actual) => panic!("shared state consumed twice: {}", actual),
        }
    }

    /// Consumer side: request cancellation. Wins only against a producer
    /// that has not published yet; the token underneath the producer is
    /// cancelled either way it can still be observed.
    pub(crate) fn request_cancel(&self) {
        loop {
            match self.state.load(SeqCst) {
                EMPTY => {
                    if self
                        .state
                        .compare_exchange(EMPTY, CANCELLED, SeqCst, SeqCst)
                        .is_ok()
                    {
                        trace!("future: consumer cancelled before production");
                        self.stop.cancel();
                        return;
                    }
                }
                CONSUMER => {
                    if self
                        .state
                        .compare_exchange(CONSUMER, CANCELLED, SeqCst, SeqCst)
                        .is_ok()
                    {
                        trace!("future: waiting consumer cancelled");
                        self.consume_subscription();
                        self.stop.cancel();
                        let consumer = self.take_consumer();
                        consumer.cancel_boxed(SwitchContext::inline());
                        return;
                    }
                }
                // Production won the race (or delivery already happened);
                // cancelling is a no-op now.
                DELIVERY | DONE | CANCELLED => return,
                actual => panic!("inconsistent shared state: {}", actual),
            }
        }
    }

    fn take_consumer(&self) -> Box<dyn DynConsumer<T>> {
        unsafe { (*self.consumer.get()).take() }
            .expect("shared state lost its consumer")
    }

    fn take_delivery(&self) -> Delivery<T> {
        unsafe { (*self.delivery.get()).take() }
            .expect("shared state lost its delivery")
    }

    fn clear_delivery(&self) {
        unsafe { *self.delivery.get() = None };
    }

    fn consume_subscription(&self) {
        let mut slot = self.subscription.lock();
        *slot = SubSlot::Consumed;
    }
}

fn dispatch<T: Send + 'static>(
    consumer: Box<dyn DynConsumer<T>>,
    delivery: Delivery<T>,
) {
    match delivery {
        Delivery::Output(output) => consumer.consume_boxed(output),
        Delivery::Cancelled(context) => consumer.cancel_boxed(context),
    }
}
