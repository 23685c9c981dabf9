use crate::cancel::{SenderInner, Signal, SignalReceiver};

use std::sync::{Arc, Weak};

/// Observer handle over a cancellation scope.
///
/// Cloning a token observes the same scope. [`Token::never`] is the
/// permanently non-cancellable sentinel; attaching to it resolves the
/// registration with `Release` on the spot.
#[derive(Clone)]
pub struct Token {
    inner: Option<Arc<SenderInner>>,
}

impl Token {
    /// The non-cancellable sentinel.
    pub fn never() -> Token {
        Token { inner: None }
    }

    pub(crate) fn from_inner(inner: Arc<SenderInner>) -> Token {
        Token { inner: Some(inner) }
    }

    /// Whether cancellation can ever be requested through this token.
    pub fn cancellable(&self) -> bool {
        self.inner.is_some()
    }

    /// Whether cancellation has been requested.
    pub fn cancel_requested(&self) -> bool {
        match &self.inner {
            Some(inner) => inner.signal() == Some(Signal::Cancel),
            None => false,
        }
    }

    /// Register `receiver` for the scope's resolution. The registration
    /// is consumed by delivery; dropping the returned [`Subscription`]
    /// detaches it if it is still pending.
    pub fn attach(&self, receiver: Arc<dyn SignalReceiver>) -> Subscription {
        match &self.inner {
            Some(inner) => {
                inner.attach(receiver.clone());
                Subscription {
                    sender: Some(Arc::downgrade(inner)),
                    receiver: Some(receiver),
                }
            }
            None => {
                receiver.forward(Signal::Release);
                Subscription {
                    sender: None,
                    receiver: None,
                }
            }
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Token")
            .field("cancellable", &self.cancellable())
            .finish()
    }
}

/// Owned registration of a receiver on a sender.
///
/// Detaches on drop. Detaching races safely against a concurrently firing
/// resolution: whichever takes the registration first wins, the loser
/// observes a no-op.
pub struct Subscription {
    sender: Option<Weak<SenderInner>>,
    receiver: Option<Arc<dyn SignalReceiver>>,
}

impl Subscription {
    /// Cancel the registration if it has not fired yet.
    pub fn detach(mut self) {
        self.detach_inner();
    }

    /// Give up the handle without detaching: the registration stays until
    /// the sender resolves and is consumed by that delivery.
    pub fn forever(mut self) {
        self.sender.take();
        self.receiver.take();
    }

    fn detach_inner(&mut self) {
        if let (Some(sender), Some(receiver)) =
            (self.sender.take(), self.receiver.take())
        {
            if let Some(sender) = sender.upgrade() {
                sender.detach(&receiver);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_inner();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Subscription")
            .field("pending", &self.receiver.is_some())
            .finish()
    }
}
