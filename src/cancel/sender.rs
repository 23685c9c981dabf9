use crate::cancel::{Signal, SignalReceiver, Token};

use parking_lot::Mutex;

use std::sync::atomic::{AtomicU8, Ordering::SeqCst};
use std::sync::Arc;

const PENDING: u8 = 0;
const RELEASED: u8 = 1;
const CANCELLED: u8 = 2;

/// Shared half between a [`Source`] and its [`Token`]s.
///
/// Resolution is decided by a single compare-and-swap on `state`; the
/// receiver slot is serialized by a mutex so that `attach`, `detach` and
/// the firing `resolve` agree on a single winner.
pub(crate) struct SenderInner {
    state: AtomicU8,
    receiver: Mutex<Option<Arc<dyn SignalReceiver>>>,
}

impl SenderInner {
    pub(crate) fn new() -> SenderInner {
        SenderInner {
            state: AtomicU8::new(PENDING),
            receiver: Mutex::new(None),
        }
    }

    /// The resolved signal, if any.
    pub(crate) fn signal(&self) -> Option<Signal> {
        match self.state.load(SeqCst) {
            PENDING => None,
            RELEASED => Some(Signal::Release),
            CANCELLED => Some(Signal::Cancel),
            s => panic!("inconsistent sender state: {}", s),
        }
    }

    /// Resolve with `signal`, forwarding to the attached receiver if one
    /// is registered. Returns whether this call won the resolution.
    pub(crate) fn resolve(&self, signal: Signal) -> bool {
        let next = match signal {
            Signal::Release => RELEASED,
            Signal::Cancel => CANCELLED,
        };
        if self
            .state
            .compare_exchange(PENDING, next, SeqCst, SeqCst)
            .is_err()
        {
            return false;
        }

        // The registration is consumed by delivery.
        let receiver = self.receiver.lock().take();
        if let Some(receiver) = receiver {
            trace!("cancel: forwarding {:?}", signal);
            receiver.forward(signal);
        }
        true
    }

    /// Attach a receiver, or forward immediately if already resolved.
    ///
    /// # Panics
    ///
    /// Panics if another receiver is still attached; a sender belongs to
    /// exactly one tree path at a time.
    pub(crate) fn attach(&self, receiver: Arc<dyn SignalReceiver>) {
        let mut slot = self.receiver.lock();
        match self.signal() {
            None => {
                assert!(
                    slot.is_none(),
                    "a signal receiver is already attached to this sender"
                );
                *slot = Some(receiver);
            }
            Some(signal) => {
                drop(slot);
                receiver.forward(signal);
            }
        }
    }

    /// Remove `receiver` if it is still the registered one. Racing with a
    /// concurrent `resolve` is fine; whichever takes the slot first wins
    /// and the other observes a no-op.
    pub(crate) fn detach(&self, receiver: &Arc<dyn SignalReceiver>) {
        let mut slot = self.receiver.lock();
        let registered = match &*slot {
            Some(r) => Arc::ptr_eq(r, receiver),
            None => false,
        };
        if registered {
            *slot = None;
        }
    }
}

/// Owner side of a cancellation scope.
///
/// Hands out [`Token`]s, and resolves exactly once: explicitly through
/// [`cancel`](Source::cancel) or [`release`](Source::release), or with
/// `Release` when dropped.
pub struct Source {
    inner: Arc<SenderInner>,
}

impl Source {
    /// New unresolved source.
    pub fn new() -> Source {
        Source {
            inner: Arc::new(SenderInner::new()),
        }
    }

    /// A token observing this source.
    pub fn token(&self) -> Token {
        Token::from_inner(self.inner.clone())
    }

    /// Request cancellation. Returns whether this call resolved the
    /// source (false if it was already resolved).
    pub fn cancel(&self) -> bool {
        self.inner.resolve(Signal::Cancel)
    }

    /// Resolve without cancelling.
    pub fn release(&self) -> bool {
        self.inner.resolve(Signal::Release)
    }

    pub(crate) fn inner(&self) -> &Arc<SenderInner> {
        &self.inner
    }
}

impl Default for Source {
    fn default() -> Source {
        Source::new()
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        self.inner.resolve(Signal::Release);
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Source")
            .field("signal", &self.inner.signal())
            .finish()
    }
}
