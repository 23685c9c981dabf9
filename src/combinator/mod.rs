//! Pipeline stages over [`Thunk`]s.
//!
//! Every stage is itself a thunk; none of them block, and each stage's
//! consumer reports the downstream cancel token upstream, so a cancel at
//! the tail of a chain reaches the producer at its head. Stages are
//! reached through the [`ThunkExt`] extension trait:
//!
//! ```ignore
//! let sum = fetch_a
//!     .both(fetch_b)
//!     .map(|(a, b)| a + b)
//!     .via(pool.clone(), SchedulerHint::UpToYou)
//!     .get();
//! ```

mod and_then;
mod both;
mod boxed;
mod detach;
mod eager;
mod first;
mod flatten;
mod fork;
mod hooks;
mod map;
mod via;

pub use self::and_then::AndThen;
pub use self::both::{both, Both};
pub use self::boxed::BoxThunk;
pub use self::first::{first, First};
pub use self::flatten::Flatten;
pub use self::fork::{fork_n, Tine};
pub use self::hooks::{Anyway, OnCancel, OnSuccess};
pub use self::map::{Map, MapErr};
pub use self::via::Via;

use crate::exec::{ExecutorRef, SchedulerHint};
use crate::future::{ContractFuture, Error, Result, Thunk};

/// Combinator methods, implemented for every [`Thunk`].
pub trait ThunkExt: Thunk {
    /// Transform the produced value.
    fn map<M, U>(self, f: M) -> Map<Self, M>
    where
        M: FnOnce(Self::Value) -> U + Send + 'static,
        U: Send + 'static,
    {
        Map::new(self, f)
    }

    /// Inspect or recover from a failure; `Ok` passes through untouched.
    fn map_err<M>(self, f: M) -> MapErr<Self, M>
    where
        M: FnOnce(Error) -> Result<Self::Value> + Send + 'static,
    {
        MapErr::new(self, f)
    }

    /// Chain a thunk-producing continuation (flat-map).
    fn and_then<M, U>(self, f: M) -> AndThen<Self, M, U>
    where
        M: FnOnce(Self::Value) -> U + Send + 'static,
        U: Thunk,
    {
        AndThen::new(self, f)
    }

    /// Collapse a thunk of a thunk into its inner value.
    fn flatten(self) -> Flatten<Self>
    where
        Self::Value: Thunk,
    {
        Flatten::new(self)
    }

    /// Hand the completion over to another executor.
    fn via(self, executor: ExecutorRef, hint: SchedulerHint) -> Via<Self> {
        Via::new(self, executor, hint)
    }

    /// Join with another thunk into a pair.
    fn both<B>(self, other: B) -> Both<Self, B>
    where
        B: Thunk,
    {
        both(self, other)
    }

    /// Race against another thunk producing the same value.
    fn first<B>(self, other: B) -> First<Self, B>
    where
        B: Thunk<Value = Self::Value>,
    {
        first(self, other)
    }

    /// Broadcast the result to `n` consumers; the source is computed
    /// once.
    fn fork_n(self, n: usize) -> Vec<Tine<Self::Value>>
    where
        Self::Value: Clone,
    {
        fork_n(self, n)
    }

    /// Run `f` on the value of a successful completion.
    fn on_success<M>(self, f: M) -> OnSuccess<Self, M>
    where
        M: FnOnce(&Self::Value) + Send + 'static,
    {
        OnSuccess::new(self, f)
    }

    /// Run `f` if the chain is cancelled.
    fn on_cancel<M>(self, f: M) -> OnCancel<Self, M>
    where
        M: FnOnce() + Send + 'static,
    {
        OnCancel::new(self, f)
    }

    /// Run `f` whatever happens, before the outcome moves on.
    fn anyway<M>(self, f: M) -> Anyway<Self, M>
    where
        M: FnOnce() + Send + 'static,
    {
        Anyway::new(self, f)
    }

    /// Start evaluating now, inline; the returned future observes the
    /// eventual outcome.
    fn force(self) -> ContractFuture<Self::Value> {
        eager::force(self)
    }

    /// Start evaluating now, on `executor`.
    fn start_on(self, executor: ExecutorRef) -> ContractFuture<Self::Value> {
        eager::start_on(self, executor)
    }

    /// Fire and forget: run to completion, log failures, keep nothing.
    fn detach(self) {
        detach::detach(self)
    }

    /// Fire and forget on `executor`.
    fn detach_on(self, executor: ExecutorRef) {
        detach::detach_on(self, executor)
    }

    /// Erase the concrete thunk type.
    fn boxed(self) -> BoxThunk<Self::Value> {
        BoxThunk::new(self)
    }
}

impl<F: Thunk> ThunkExt for F {}
