//! Fixed thread pool over one shared queue.

use crate::exec::{Executor, SchedulerHint, Task};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Called after a worker starts / before it stops.
type Callback = Arc<dyn Fn() + Send + Sync>;

/// Submission refused because the pool is shutting down.
#[derive(Debug, Error)]
#[error("thread pool is shut down")]
pub struct SubmitError {
    _p: (),
}

/// Builds a [`ThreadPool`].
pub struct Builder {
    worker_threads: usize,
    thread_name: String,
    thread_stack_size: Option<usize>,
    after_start: Option<Callback>,
    before_stop: Option<Callback>,
}

impl Builder {
    /// Defaults: one worker per CPU, threads named "fibrx-worker".
    pub fn new() -> Builder {
        Builder {
            worker_threads: num_cpus::get(),
            thread_name: "fibrx-worker".to_string(),
            thread_stack_size: None,
            after_start: None,
            before_stop: None,
        }
    }

    /// Number of worker threads.
    pub fn worker_threads(mut self, n: usize) -> Builder {
        assert!(n > 0, "a pool needs at least one worker");
        self.worker_threads = n;
        self
    }

    /// Name for spawned worker threads.
    pub fn thread_name(mut self, name: impl Into<String>) -> Builder {
        self.thread_name = name.into();
        self
    }

    /// OS stack size for worker threads.
    pub fn thread_stack_size(mut self, size: usize) -> Builder {
        self.thread_stack_size = Some(size);
        self
    }

    /// Run `f` on each worker right after it starts.
    pub fn after_start<F>(mut self, f: F) -> Builder
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.after_start = Some(Arc::new(f));
        self
    }

    /// Run `f` on each worker right before it stops.
    pub fn before_stop<F>(mut self, f: F) -> Builder
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.before_stop = Some(Arc::new(f));
        self
    }

    /// Spawn the workers and hand back the pool.
    pub fn build(self) -> ThreadPool {
        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared {
                queue: VecDeque::new(),
                num_idle: 0,
                num_notify: 0,
                shutdown: false,
            }),
            condvar: Condvar::new(),
            after_start: self.after_start,
            before_stop: self.before_stop,
        });

        let mut workers = Vec::with_capacity(self.worker_threads);
        for index in 0..self.worker_threads {
            let mut builder = thread::Builder::new()
                .name(format!("{}-{}", self.thread_name, index));
            if let Some(stack_size) = self.thread_stack_size {
                builder = builder.stack_size(stack_size);
            }
            let inner = inner.clone();
            let handle = builder
                .spawn(move || inner.run(index))
                .expect("failed to spawn a pool worker thread");
            workers.push(handle);
        }

        debug!("thread pool started with {} workers", self.worker_threads);

        ThreadPool {
            inner,
            workers: Mutex::new(workers),
        }
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Builder")
            .field("worker_threads", &self.worker_threads)
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

/// A fixed set of worker threads draining one shared queue.
///
/// `Next` submissions go to the front of the queue, `Last` and `UpToYou`
/// to the back. Workers park on a condition variable when idle. Shutdown
/// drains the queue before the workers exit.
pub struct ThreadPool {
    inner: Arc<Inner>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

struct Inner {
    /// State shared between worker threads.
    shared: Mutex<Shared>,

    /// Idle workers wait on this.
    condvar: Condvar,

    after_start: Option<Callback>,
    before_stop: Option<Callback>,
}

struct Shared {
    queue: VecDeque<Box<dyn Task>>,
    num_idle: u32,
    num_notify: u32,
    shutdown: bool,
}

// ===== impl ThreadPool =====

impl ThreadPool {
    /// Pool with `workers` threads and default settings.
    pub fn new(workers: usize) -> ThreadPool {
        Builder::new().worker_threads(workers).build()
    }

    /// Submit, refusing instead of dropping when shut down.
    pub fn try_submit(
        &self,
        task: Box<dyn Task>,
        hint: SchedulerHint,
    ) -> Result<(), SubmitError> {
        self.inner.submit(task, hint)
    }

    /// Stop accepting work, finish what is queued, join the workers.
    pub fn shutdown(&self) {
        {
            let mut shared = self.inner.shared.lock();
            if shared.shutdown {
                return;
            }
            shared.shutdown = true;
        }
        self.inner.condvar.notify_all();

        let workers = {
            let mut workers = self.workers.lock();
            std::mem::replace(&mut *workers, Vec::new())
        };
        for handle in workers {
            let _ = handle.join();
        }
        debug!("thread pool shut down");
    }
}

impl Executor for ThreadPool {
    /// Submitting to a shut-down pool drops the task. A task carrying a
    /// suspended fiber aborts when dropped, so the pool must outlive
    /// everything that can still reschedule a fiber onto it; use
    /// [`ThreadPool::try_submit`] where refusal has to be handled.
    fn submit(&self, task: Box<dyn Task>, hint: SchedulerHint) {
        if self.inner.submit(task, hint).is_err() {
            warn!("task submitted to a pool that is shut down; dropping it");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("ThreadPool").finish()
    }
}

// ===== impl Inner =====

impl Inner {
    fn submit(
        &self,
        task: Box<dyn Task>,
        hint: SchedulerHint,
    ) -> Result<(), SubmitError> {
        let mut shared = self.shared.lock();
        if shared.shutdown {
            return Err(SubmitError { _p: () });
        }

        match hint {
            SchedulerHint::Next => shared.queue.push_front(task),
            SchedulerHint::UpToYou | SchedulerHint::Last => {
                shared.queue.push_back(task)
            }
        }

        if shared.num_idle > 0 {
            // The notification counter keeps us consistent under spurious
            // wakeups: a woken worker only takes a slot it was counted
            // for.
            shared.num_idle -= 1;
            shared.num_notify += 1;
            self.condvar.notify_one();
        }
        Ok(())
    }

    fn run(&self, index: usize) {
        trace!("worker {} starting", index);
        if let Some(f) = &self.after_start {
            f();
        }

        let mut shared = self.shared.lock();
        loop {
            // BUSY
            while let Some(task) = shared.queue.pop_front() {
                drop(shared);
                run_task(task);
                shared = self.shared.lock();
            }

            if shared.shutdown {
                break;
            }

            // IDLE
            shared.num_idle += 1;
            loop {
                self.condvar.wait(&mut shared);
                if shared.num_notify > 0 {
                    // A submission consumed our idle slot; acknowledge it
                    // even if shutdown raced in, so the counters stay
                    // exact.
                    shared.num_notify -= 1;
                    break;
                }
                if shared.shutdown {
                    // Woken for shutdown; our idle slot was never taken.
                    shared.num_idle -= 1;
                    break;
                }
                // Spurious wakeup, go back to sleep.
            }

            if shared.shutdown {
                // Drain whatever is left before exiting.
                while let Some(task) = shared.queue.pop_front() {
                    drop(shared);
                    run_task(task);
                    shared = self.shared.lock();
                }
                break;
            }
        }
        drop(shared);

        if let Some(f) = &self.before_stop {
            f();
        }
        trace!("worker {} stopping", index);
    }
}

fn run_task(task: Box<dyn Task>) {
    // A panicking task must not take the worker with it; fiber routines
    // catch their own panics, this guards plain submitted closures.
    if panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
        error!("task panicked on a pool worker");
    }
}
