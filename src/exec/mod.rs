//! The executor capability and reference executors.
//!
//! The core only ever asks an executor for one thing: run this [`Task`]
//! exactly once, with a [`SchedulerHint`] expressing where in the pending
//! work it would like to land. Everything else — queue layout, parking,
//! stealing — is the executor's own business.
//!
//! Shipped implementations: [`ThreadPool`] (fixed workers over one shared
//! queue), [`Strand`] (serial wrapper over any executor), [`Inline`]
//! (run on the submitting thread) and [`Manual`] (drained explicitly, for
//! deterministic tests).

mod inline;
mod manual;
mod pool;
mod strand;
mod task;

pub use self::inline::{inline, Inline};
pub use self::manual::Manual;
pub use self::pool::{Builder, SubmitError, ThreadPool};
pub use self::strand::Strand;
pub use self::task::{task_fn, Task, TaskFn};

use std::sync::Arc;

/// Scheduling preference attached to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerHint {
    /// No preference; the executor decides.
    UpToYou,
    /// Prefer running this task next (LIFO preference).
    Next,
    /// Yield behind all other pending work.
    Last,
}

impl Default for SchedulerHint {
    fn default() -> SchedulerHint {
        SchedulerHint::UpToYou
    }
}

/// The scheduling capability consumed by the core.
pub trait Executor: Send + Sync + 'static {
    /// Enqueue `task` to be run exactly once.
    fn submit(&self, task: Box<dyn Task>, hint: SchedulerHint);
}

/// Shared handle to an executor.
pub type ExecutorRef = Arc<dyn Executor>;

/// Submit a closure as a task.
pub fn submit_fn<F>(executor: &dyn Executor, hint: SchedulerHint, f: F)
where
    F: FnOnce() + Send + 'static,
{
    executor.submit(Box::new(task_fn(f)), hint);
}
