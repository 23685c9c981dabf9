//! The promise / future pair over one shared state.

use crate::cancel::Token;
use crate::future::state::{Delivery, SharedState};
use crate::future::{Consumer, CoreError, Output, Result, SwitchContext, Thunk};

use std::sync::Arc;

/// One producer end, one consumer end, one delivery.
pub fn contract<T: Send + 'static>() -> (Promise<T>, ContractFuture<T>) {
    let state = SharedState::new();
    (
        Promise {
            state: Some(state.clone()),
        },
        ContractFuture { state: Some(state) },
    )
}

/// Producer end of a contract. Move-only: `set` and `cancel` consume it;
/// dropping it unfulfilled delivers [`CoreError::BrokenPromise`].
pub struct Promise<T: Send + 'static> {
    state: Option<Arc<SharedState<T>>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Fulfill with a result.
    pub fn set(mut self, result: Result<T>) {
        let state = self.state.take().expect("promise used twice");
        state.complete(Delivery::Output(Output::new(result)));
    }

    /// Propagate cancellation instead of completing.
    pub fn cancel(mut self) {
        let state = self.state.take().expect("promise used twice");
        state.complete(Delivery::Cancelled(SwitchContext::inline()));
    }

    /// Token resolved with `Cancel` if the consumer side gives up; the
    /// producer should stop working when it fires.
    pub fn cancel_token(&self) -> Token {
        self.state
            .as_ref()
            .expect("promise used twice")
            .producer_token()
    }
}

impl<T: Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.complete(Delivery::Output(Output::new(Err(
                CoreError::BrokenPromise.into(),
            ))));
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Promise<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Promise")
            .field("fulfilled", &self.state.is_none())
            .finish()
    }
}

/// Consumer end of a contract; a [`Thunk`] that completes when the
/// promise is fulfilled. This is also what eager combinators hand back.
pub struct ContractFuture<T: Send + 'static> {
    state: Option<Arc<SharedState<T>>>,
}

impl<T: Send + 'static> ContractFuture<T> {
    /// Discard the future, telling the producer to stop. The winner of
    /// the race against a concurrent completion is decided by the shared
    /// state; the loser's effect is a no-op.
    pub fn request_cancel(mut self) {
        let state = self.state.take().expect("contract future used twice");
        state.request_cancel();
    }
}

impl<T: Send + 'static> Thunk for ContractFuture<T> {
    type Value = T;

    fn start<C>(mut self, consumer: C)
    where
        C: Consumer<T>,
    {
        let state = self.state.take().expect("contract future used twice");
        state.attach(Box::new(consumer));
    }
}

impl<T: Send + 'static> Drop for ContractFuture<T> {
    fn drop(&mut self) {
        // Discarded without being started: the producer should not keep
        // working for nobody.
        if let Some(state) = self.state.take() {
            state.request_cancel();
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for ContractFuture<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("ContractFuture")
            .field("consumed", &self.state.is_none())
            .finish()
    }
}
