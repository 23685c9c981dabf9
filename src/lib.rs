#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! Cooperative concurrency runtime: user-level fibers multiplexed over a
//! thread pool, a lazy asynchronous value ("thunk") model with explicit
//! cancellation, and fiber-aware synchronization primitives on top of both.
//!
//! The pieces, leaves first:
//!
//! - [`coro`] — the raw symmetric context switch between two call sites.
//! - [`cancel`] — the signal-propagation protocol (tokens, senders,
//!   receivers) shared by every cancellable operation.
//! - [`exec`] — the executor capability and reference executors.
//! - [`fiber`] — a coroutine bound to an executor, carrying a cancellation
//!   token and a one-shot suspension callback.
//! - [`future`] — the start/consume thunk protocol and its shared
//!   completion state.
//! - [`combinator`] — composition stages over thunks.
//! - [`sync`] — Event, Mutex and WaitGroup that suspend fibers instead of
//!   blocking OS threads.
//! - [`timer`] — the delay collaborator; timeouts are races, not core.

#[macro_use]
extern crate log;

pub mod cancel;
pub mod combinator;
pub mod coro;
pub mod exec;
pub mod fiber;
pub mod future;
pub mod sync;
pub mod timer;

pub use crate::exec::{Executor, ExecutorRef, SchedulerHint, Task, ThreadPool};
pub use crate::fiber::{spawn, spawn_child, yield_now, sleep_for};
pub use crate::future::{Outcome, Thunk};
pub use crate::combinator::ThunkExt;
