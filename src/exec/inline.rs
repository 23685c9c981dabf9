use crate::exec::{Executor, ExecutorRef, SchedulerHint, Task};

use lazy_static::lazy_static;

use std::sync::Arc;

lazy_static! {
    static ref INLINE: ExecutorRef = Arc::new(Inline);
}

/// Runs every submission on the submitting thread, immediately.
///
/// The terminal stages of a pipeline complete through this unless a
/// `via` stage redirected them.
#[derive(Debug)]
pub struct Inline;

impl Executor for Inline {
    fn submit(&self, task: Box<dyn Task>, _hint: SchedulerHint) {
        task.run();
    }
}

/// The shared inline executor.
pub fn inline() -> ExecutorRef {
    INLINE.clone()
}
