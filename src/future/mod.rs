//! The thunk protocol: lazy asynchronous values with explicit
//! cancellation.
//!
//! A [`Thunk`] represents a computation producing a [`Result`]. Its only
//! mandatory operation is [`start`](Thunk::start): begin evaluation and
//! later deliver exactly one of `consume(Output)` or `cancel(Context)` to
//! the given [`Consumer`]. Thunks are lazy by default and move-only; once
//! started (or discarded) they must not be touched again.
//!
//! Cancellation is honored in one canonical place: every producer checks
//! the consumer's token before doing real work and delivers `cancel`
//! instead of completing if the awaiting scope has asked to stop. The
//! completion/cancellation race itself is resolved by the shared state's
//! single-winner transition ([`state`] module).
//!
//! Cancellation and value-level failure are different channels: an error
//! travels inside `Result` through normal completion and can be mapped
//! away by a pipeline stage; a cancel means "no result was or will be
//! produced" and never appears inside `Result`.

mod contract;
mod error;
mod get;
mod make;
pub(crate) mod state;

pub use self::contract::{contract, ContractFuture, Promise};
pub use self::error::{CoreError, Error};
pub use self::make::{failure, just, never, submit, Failure, Just, Never, Submit, Value};
pub use self::make::value;

use crate::cancel::Token;
use crate::exec::{self, ExecutorRef, SchedulerHint};

/// Completion result of a thunk.
pub type Result<T> = std::result::Result<T, Error>;

/// Where a completion should resume: an executor and a scheduling hint.
///
/// Travels attached to an [`Output`]; it tells the next pipeline stage
/// where to run, not who called it.
#[derive(Clone)]
pub struct SwitchContext {
    /// Executor the continuation should run on.
    pub executor: ExecutorRef,
    /// Preference to pass along when submitting the continuation.
    pub hint: SchedulerHint,
}

impl SwitchContext {
    /// Resume on the given executor.
    pub fn new(executor: ExecutorRef, hint: SchedulerHint) -> SwitchContext {
        SwitchContext { executor, hint }
    }

    /// Resume inline, on whichever thread completes.
    pub fn inline() -> SwitchContext {
        SwitchContext {
            executor: exec::inline(),
            hint: SchedulerHint::UpToYou,
        }
    }
}

impl std::fmt::Debug for SwitchContext {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("SwitchContext").field("hint", &self.hint).finish()
    }
}

/// A completed value (or failure) plus its placement context.
pub struct Output<T> {
    /// The produced result.
    pub result: Result<T>,
    /// Where the continuation should resume.
    pub context: SwitchContext,
}

impl<T> Output<T> {
    /// Output resuming inline.
    pub fn new(result: Result<T>) -> Output<T> {
        Output {
            result,
            context: SwitchContext::inline(),
        }
    }

    /// Keep the context, replace the result.
    pub fn map_result<U>(self, result: Result<U>) -> Output<U> {
        Output {
            result,
            context: self.context,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Output<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Output").field("result", &self.result).finish()
    }
}

/// What a terminal wait observed: a delivered result, or cancellation.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The thunk completed and delivered this result.
    Done(Result<T>),
    /// The thunk was cancelled; no result was or will be produced.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Whether this is the cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Outcome::Cancelled => true,
            Outcome::Done(_) => false,
        }
    }

    /// The delivered result, if any.
    pub fn into_done(self) -> Option<Result<T>> {
        match self {
            Outcome::Done(result) => Some(result),
            Outcome::Cancelled => None,
        }
    }

    /// The delivered value.
    ///
    /// # Panics
    ///
    /// Panics on cancellation or failure.
    pub fn unwrap(self) -> T {
        match self {
            Outcome::Done(Ok(value)) => value,
            Outcome::Done(Err(e)) => panic!("thunk failed: {}", e),
            Outcome::Cancelled => panic!("thunk was cancelled"),
        }
    }
}

/// The receiving end of a thunk.
///
/// Exactly one of `consume` / `cancel` is called, exactly once. The
/// consumer's own token lets producers observe whether the awaiting scope
/// has asked to stop.
pub trait Consumer<T: Send + 'static>: Send + Sized + 'static {
    /// Deliver a completed output.
    fn consume(self, output: Output<T>);

    /// Deliver cancellation: no output was or will be produced.
    fn cancel(self, context: SwitchContext);

    /// Token of the awaiting scope.
    fn cancel_token(&self) -> Token;
}

/// A lazily evaluated asynchronous value.
///
/// Move-only; `start` consumes it. Discarding an unstarted thunk is fine,
/// starting it twice is impossible, and using a contract future after
/// `request_cancel` is a programming error.
pub trait Thunk: Send + Sized + 'static {
    /// The produced value type.
    type Value: Send + 'static;

    /// Begin evaluation; deliver to `consumer` exactly once.
    fn start<C>(self, consumer: C)
    where
        C: Consumer<Self::Value>;

    /// Block until completion: suspends the current fiber when called on
    /// one, parks the OS thread otherwise.
    fn get(self) -> Outcome<Self::Value> {
        get::get(self)
    }
}

// ===== object-safe bridges =====
//
// `Consumer` and `Thunk` consume `self` and are generic at the seams, so
// type erasure goes through these crate-internal vtable traits; the
// public `BoxThunk` wrapper lives with the combinators.

pub(crate) trait DynConsumer<T: Send + 'static>: Send + 'static {
    fn consume_boxed(self: Box<Self>, output: Output<T>);
    fn cancel_boxed(self: Box<Self>, context: SwitchContext);
    fn token(&self) -> Token;
}

impl<T, C> DynConsumer<T> for C
where
    T: Send + 'static,
    C: Consumer<T>,
{
    fn consume_boxed(self: Box<Self>, output: Output<T>) {
        (*self).consume(output)
    }

    fn cancel_boxed(self: Box<Self>, context: SwitchContext) {
        (*self).cancel(context)
    }

    fn token(&self) -> Token {
        self.cancel_token()
    }
}

impl<T: Send + 'static> Consumer<T> for Box<dyn DynConsumer<T>> {
    fn consume(self, output: Output<T>) {
        self.consume_boxed(output)
    }

    fn cancel(self, context: SwitchContext) {
        self.cancel_boxed(context)
    }

    fn cancel_token(&self) -> Token {
        // Plain `self.token()` resolves to the blanket `DynConsumer`
        // impl on the Box itself and recurses; go through the object.
        (**self).token()
    }
}

pub(crate) trait DynThunk<T: Send + 'static>: Send + 'static {
    fn start_boxed(self: Box<Self>, consumer: Box<dyn DynConsumer<T>>);
}

impl<T, F> DynThunk<T> for F
where
    T: Send + 'static,
    F: Thunk<Value = T>,
{
    fn start_boxed(self: Box<Self>, consumer: Box<dyn DynConsumer<T>>) {
        (*self).start(consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Source;

    struct Plain(Token);

    impl Consumer<u32> for Plain {
        fn consume(self, _output: Output<u32>) {}

        fn cancel(self, _context: SwitchContext) {}

        fn cancel_token(&self) -> Token {
            self.0.clone()
        }
    }

    // `cancel_token` on a boxed consumer has to reach the underlying
    // consumer's token through the vtable; the blanket `DynConsumer`
    // impl also applies to the Box itself and would loop.
    #[test]
    fn boxed_consumer_reports_the_underlying_token() {
        let source = Source::new();
        let boxed: Box<dyn DynConsumer<u32>> = Box::new(Plain(source.token()));
        assert!(boxed.cancel_token().cancellable());
        source.cancel();
        assert!(boxed.cancel_token().cancel_requested());
        boxed.cancel(SwitchContext::inline());
    }
}
