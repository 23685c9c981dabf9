//! The delay collaborator.
//!
//! One background thread over a deadline heap. The core consumes exactly
//! two operations — [`register`] a one-shot callback and [`cancel`] it —
//! and everything time-shaped above that is composition: [`after`] is a
//! thunk completing when its delay elapses, [`timeout`] is a race between
//! a thunk and `after`, resolved by the `first` combinator rather than by
//! anything built into the core.

use crate::cancel::{Signal, SignalReceiver, Subscription};
use crate::combinator::{first, ThunkExt};
use crate::future::{Consumer, CoreError, Output, SwitchContext, Thunk};

use lazy_static::lazy_static;
use parking_lot::{Condvar, Mutex};

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

lazy_static! {
    static ref DRIVER: Driver = Driver::start();
}

/// Identifies a registered timer for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey(u64);

/// Run `f` once, roughly `delay` from now.
pub fn register<F>(delay: Duration, f: F) -> TimerKey
where
    F: FnOnce() + Send + 'static,
{
    DRIVER.register(Instant::now() + delay, Box::new(f))
}

/// Prevent a registered timer from firing. Returns whether it was still
/// pending; a timer that already fired (or was already cancelled) is
/// left alone.
pub fn cancel(key: TimerKey) -> bool {
    DRIVER.cancel(key)
}

type TimerFn = Box<dyn FnOnce() + Send + 'static>;

struct Entry {
    deadline: Instant,
    id: u64,
    f: TimerFn,
}

// Min-heap by deadline.
impl Ord for Entry {
    fn cmp(&self, other: &Entry) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Entry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Entry) -> bool {
        self.id == other.id
    }
}

impl Eq for Entry {}

struct Driver {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    condvar: Condvar,
}

struct State {
    heap: BinaryHeap<Entry>,
    pending: HashSet<u64>,
    cancelled: HashSet<u64>,
    next_id: u64,
}

impl Driver {
    fn start() -> Driver {
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                pending: HashSet::new(),
                cancelled: HashSet::new(),
                next_id: 0,
            }),
            condvar: Condvar::new(),
        });

        let run = inner.clone();
        thread::Builder::new()
            .name("fibrx-timer".to_string())
            .spawn(move || run.run())
            .expect("failed to spawn the timer thread");
        debug!("timer driver started");

        Driver { inner }
    }

    fn register(&self, deadline: Instant, f: TimerFn) -> TimerKey {
        let mut state = self.inner.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.pending.insert(id);
        state.heap.push(Entry { deadline, id, f });
        drop(state);
        // The new entry may be the next to fire.
        self.inner.condvar.notify_one();
        TimerKey(id)
    }

    fn cancel(&self, key: TimerKey) -> bool {
        let mut state = self.inner.state.lock();
        if state.pending.remove(&key.0) {
            state.cancelled.insert(key.0);
            true
        } else {
            false
        }
    }
}

impl Inner {
    fn run(&self) {
        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            let deadline = match state.heap.peek() {
                None => {
                    self.condvar.wait(&mut state);
                    continue;
                }
                Some(entry) => entry.deadline,
            };

            if deadline > now {
                let _ = self.condvar.wait_until(&mut state, deadline);
                continue;
            }

            let entry = state.heap.pop().expect("peeked entry disappeared");
            if state.cancelled.remove(&entry.id) {
                continue;
            }
            state.pending.remove(&entry.id);

            drop(state);
            trace!("timer {} fired", entry.id);
            (entry.f)();
            state = self.state.lock();
        }
    }
}

/// A thunk completing with `()` once `duration` has elapsed.
pub fn after(duration: Duration) -> After {
    After { duration }
}

/// See [`after`].
#[derive(Debug)]
pub struct After {
    duration: Duration,
}

/// Pending delivery of one `After`. Shared between the fire callback and
/// the cancellation receiver; whoever takes the consumer first delivers,
/// and delivery drops the subscription, detaching the receiver from the
/// downstream scope.
struct AfterSlot<C> {
    consumer: Option<C>,
    sub: Option<Subscription>,
}

impl<C> AfterSlot<C> {
    fn claim(&mut self) -> Option<(C, Option<Subscription>)> {
        let consumer = self.consumer.take()?;
        Some((consumer, self.sub.take()))
    }
}

struct AfterCancel<C> {
    slot: Weak<Mutex<AfterSlot<C>>>,
    key: TimerKey,
}

impl<C> SignalReceiver for AfterCancel<C>
where
    C: Consumer<()>,
{
    fn forward(&self, signal: Signal) {
        if !signal.is_cancel() {
            return;
        }
        let slot = match self.slot.upgrade() {
            Some(slot) => slot,
            None => return,
        };
        let claimed = slot.lock().claim();
        if let Some((consumer, _sub)) = claimed {
            cancel(self.key);
            consumer.cancel(SwitchContext::inline());
        }
    }
}

impl Thunk for After {
    type Value = ();

    fn start<C>(self, consumer: C)
    where
        C: Consumer<()>,
    {
        let token = consumer.cancel_token();
        if token.cancel_requested() {
            return consumer.cancel(SwitchContext::inline());
        }

        // Arm the slot before registering so an immediate fire finds it.
        let slot = Arc::new(Mutex::new(AfterSlot {
            consumer: Some(consumer),
            sub: None,
        }));
        let fire = slot.clone();
        let key = register(self.duration, move || {
            if let Some((consumer, _sub)) = fire.lock().claim() {
                consumer.consume(Output::new(Ok(())));
            }
        });

        if token.cancellable() {
            let sub = token.attach(Arc::new(AfterCancel {
                slot: Arc::downgrade(&slot),
                key,
            }));
            // The timer may have fired already; storing the sub into a
            // claimed slot would keep the receiver attached forever, so
            // drop it here instead.
            let mut guard = slot.lock();
            if guard.consumer.is_some() {
                guard.sub = Some(sub);
            }
        }
    }
}

/// Race `thunk` against a timer: whichever finishes first wins, the
/// loser is cancelled, and losing to the timer surfaces as
/// [`CoreError::Timeout`] in the value channel.
pub fn timeout<F>(duration: Duration, thunk: F) -> impl Thunk<Value = F::Value>
where
    F: Thunk,
{
    first(
        thunk,
        after(duration).and_then(|_| {
            crate::future::failure::<F::Value>(CoreError::Timeout.into())
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::{Source, Token};

    struct Null(Token);

    impl Consumer<()> for Null {
        fn consume(self, _output: Output<()>) {}

        fn cancel(self, _context: SwitchContext) {}

        fn cancel_token(&self) -> Token {
            self.0.clone()
        }
    }

    // A zero-delay timer can fire between `register` and the
    // subscription being stored. Delivery claims the slot; the store
    // must then be skipped and the receiver must not pin the slot.
    #[test]
    fn fire_before_subscription_store_frees_the_slot() {
        let source = Source::new();
        let token = source.token();

        let slot = Arc::new(Mutex::new(AfterSlot {
            consumer: Some(Null(token.clone())),
            sub: None,
        }));
        let watch = Arc::downgrade(&slot);

        // The fire callback wins the race.
        let (consumer, _sub) = slot.lock().claim().expect("armed slot");
        consumer.consume(Output::new(Ok(())));

        // The attach path runs afterwards, exactly as `start` would.
        let sub = token.attach(Arc::new(AfterCancel {
            slot: Arc::downgrade(&slot),
            key: TimerKey(u64::MAX),
        }));
        {
            let mut guard = slot.lock();
            if guard.consumer.is_some() {
                guard.sub = Some(sub);
            }
        }

        drop(slot);
        assert!(watch.upgrade().is_none(), "claimed slot stayed alive");
        source.cancel();
    }

    #[test]
    fn zero_delay_after_under_a_cancellable_scope() {
        for _ in 0..200 {
            let source = Source::new();
            let (tx, rx) = std::sync::mpsc::channel();
            struct Notify(Token, std::sync::mpsc::Sender<bool>);
            impl Consumer<()> for Notify {
                fn consume(self, _output: Output<()>) {
                    self.1.send(true).unwrap();
                }
                fn cancel(self, _context: SwitchContext) {
                    self.1.send(false).unwrap();
                }
                fn cancel_token(&self) -> Token {
                    self.0.clone()
                }
            }
            after(Duration::ZERO).start(Notify(source.token(), tx));
            rx.recv_timeout(Duration::from_secs(5)).expect("one delivery");
            // A late cancel finds nothing left to claim.
            source.cancel();
            assert!(rx.try_recv().is_err(), "second delivery");
        }
    }
}
