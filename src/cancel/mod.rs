//! Cancellation propagation.
//!
//! A minimal signal protocol shared by every cancellable operation: a
//! [`Source`] owns the resolution of a scope, hands out [`Token`]s, and
//! eventually resolves with exactly one [`Signal`] — `Cancel` when the
//! scope asks the work underneath to stop, `Release` when the scope ends
//! normally and nobody will ever cancel. A [`SignalReceiver`] attached
//! through a token is notified exactly once; the registration is consumed
//! by the delivery, and detaching races safely against a concurrently
//! firing resolution.
//!
//! The same primitive carries both directions of propagation: an outer
//! scope cancelling inner work (top-down), and a completed inner operation
//! releasing an outer registration (bottom-up).

mod sender;
mod token;

pub use self::sender::Source;
pub use self::token::{Subscription, Token};

pub(crate) use self::sender::SenderInner;

/// The one message of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The scope resolved without cancelling; no request will ever come.
    Release,
    /// The scope asks the operation underneath to stop.
    Cancel,
}

impl Signal {
    /// Whether this is a cancellation request.
    pub fn is_cancel(self) -> bool {
        match self {
            Signal::Cancel => true,
            Signal::Release => false,
        }
    }
}

/// Receives the resolution of a sender it was attached to.
///
/// `forward` is called at most once per attachment, by whichever thread
/// resolves the sender.
pub trait SignalReceiver: Send + Sync + 'static {
    /// Deliver the resolved signal.
    fn forward(&self, signal: Signal);
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    use std::sync::Arc;

    struct Count(AtomicUsize, AtomicUsize);

    impl SignalReceiver for Count {
        fn forward(&self, signal: Signal) {
            if signal.is_cancel() {
                self.0.fetch_add(1, SeqCst);
            } else {
                self.1.fetch_add(1, SeqCst);
            }
        }
    }

    #[test]
    fn cancel_reaches_attached_receiver() {
        let source = Source::new();
        let token = source.token();
        assert!(token.cancellable());
        assert!(!token.cancel_requested());

        let recv = Arc::new(Count(AtomicUsize::new(0), AtomicUsize::new(0)));
        let _sub = token.attach(recv.clone());

        assert!(source.cancel());
        assert!(token.cancel_requested());
        assert_eq!(recv.0.load(SeqCst), 1);

        // Second resolution is a no-op.
        assert!(!source.cancel());
        assert_eq!(recv.0.load(SeqCst), 1);
    }

    #[test]
    fn attach_after_resolution_fires_immediately() {
        let source = Source::new();
        let token = source.token();
        source.cancel();

        let recv = Arc::new(Count(AtomicUsize::new(0), AtomicUsize::new(0)));
        let _sub = token.attach(recv.clone());
        assert_eq!(recv.0.load(SeqCst), 1);
    }

    #[test]
    fn detach_consumes_pending_registration() {
        let source = Source::new();
        let token = source.token();

        let recv = Arc::new(Count(AtomicUsize::new(0), AtomicUsize::new(0)));
        let sub = token.attach(recv.clone());
        sub.detach();

        source.cancel();
        assert_eq!(recv.0.load(SeqCst), 0);
        assert_eq!(recv.1.load(SeqCst), 0);
    }

    #[test]
    fn drop_of_source_releases() {
        let recv = Arc::new(Count(AtomicUsize::new(0), AtomicUsize::new(0)));
        let token = {
            let source = Source::new();
            let token = source.token();
            let _sub = std::mem::ManuallyDrop::new(token.attach(recv.clone()));
            token
        };
        assert!(!token.cancel_requested());
        assert_eq!(recv.1.load(SeqCst), 1);
    }

    #[test]
    fn never_token_releases_on_attach() {
        let token = Token::never();
        assert!(!token.cancellable());
        assert!(!token.cancel_requested());

        let recv = Arc::new(Count(AtomicUsize::new(0), AtomicUsize::new(0)));
        let _sub = token.attach(recv.clone());
        assert_eq!(recv.1.load(SeqCst), 1);
    }
}
