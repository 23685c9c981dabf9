//! The minimal schedulable unit.

/// Run exactly once, non-reentrant. Fibers and futures both present
/// themselves to executors as tasks.
pub trait Task: Send + 'static {
    /// Execute the task, consuming it.
    fn run(self: Box<Self>);
}

/// Adapter turning a closure into a [`Task`].
pub struct TaskFn<F> {
    f: F,
}

/// Wrap a closure as a task.
pub fn task_fn<F>(f: F) -> TaskFn<F>
where
    F: FnOnce() + Send + 'static,
{
    TaskFn { f }
}

impl<F> Task for TaskFn<F>
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (self.f)()
    }
}

impl<F> std::fmt::Debug for TaskFn<F> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("TaskFn").finish()
    }
}
