use crate::exec::{Executor, SchedulerHint, Task};

use parking_lot::Mutex;

use std::collections::VecDeque;

/// An executor that runs nothing until told to.
///
/// Tasks accumulate in a queue and are drained explicitly with
/// [`run_one`](Manual::run_one) / [`run_all`](Manual::run_all), which
/// makes interleavings in tests deterministic.
pub struct Manual {
    queue: Mutex<VecDeque<Box<dyn Task>>>,
}

impl Manual {
    /// New empty executor.
    pub fn new() -> Manual {
        Manual {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Run the next pending task. Returns whether one was run.
    pub fn run_one(&self) -> bool {
        let task = self.queue.lock().pop_front();
        match task {
            Some(task) => {
                task.run();
                true
            }
            None => false,
        }
    }

    /// Run until the queue is empty, including tasks submitted while
    /// draining. Returns how many tasks ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Default for Manual {
    fn default() -> Manual {
        Manual::new()
    }
}

impl Executor for Manual {
    fn submit(&self, task: Box<dyn Task>, hint: SchedulerHint) {
        let mut queue = self.queue.lock();
        match hint {
            SchedulerHint::Next => queue.push_front(task),
            SchedulerHint::UpToYou | SchedulerHint::Last => queue.push_back(task),
        }
    }
}

impl std::fmt::Debug for Manual {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Manual").field("len", &self.len()).finish()
    }
}
