use fibrx::exec::{ExecutorRef, Manual, ThreadPool};
use fibrx::{fiber, SchedulerHint};

use parking_lot::Mutex;

use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

fn pool(workers: usize) -> ExecutorRef {
    Arc::new(ThreadPool::new(workers))
}

#[test]
fn fiber_runs_to_completion() {
    let executor = pool(2);
    let (tx, rx) = mpsc::channel();

    fibrx::spawn(&executor, move || {
        assert!(fiber::in_fiber());
        tx.send(42usize).unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
}

#[test]
fn not_in_fiber_on_plain_thread() {
    assert!(!fiber::in_fiber());
    assert!(!fiber::cancel_token().cancellable());
}

#[test]
fn yield_interleaves_on_one_worker() {
    let manual = Arc::new(Manual::new());
    let executor: ExecutorRef = manual.clone();
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in &["a", "b"] {
        let log = log.clone();
        fibrx::spawn(&executor, move || {
            log.lock().push(format!("{}1", name));
            fibrx::yield_now();
            log.lock().push(format!("{}2", name));
        });
    }

    manual.run_all();
    assert_eq!(*log.lock(), vec!["a1", "b1", "a2", "b2"]);
}

#[test]
fn spawn_child_lands_on_same_executor() {
    let manual = Arc::new(Manual::new());
    let executor: ExecutorRef = manual.clone();
    let count = Arc::new(AtomicUsize::new(0));

    let inner = count.clone();
    fibrx::spawn(&executor, move || {
        let inner2 = inner.clone();
        fibrx::spawn_child(move || {
            inner2.fetch_add(10, SeqCst);
        });
        inner.fetch_add(1, SeqCst);
    });

    manual.run_all();
    assert_eq!(count.load(SeqCst), 11);
}

#[test]
fn sleep_for_delays_the_fiber() {
    let executor = pool(1);
    let (tx, rx) = mpsc::channel();

    fibrx::spawn(&executor, move || {
        let start = Instant::now();
        fibrx::sleep_for(Duration::from_millis(50));
        tx.send(start.elapsed()).unwrap();
    });

    let elapsed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(elapsed >= Duration::from_millis(50), "woke after {:?}", elapsed);
}

#[test]
fn sleeping_fiber_frees_the_worker() {
    // One worker: while the first fiber sleeps, the second must run.
    let executor = pool(1);
    let (tx, rx) = mpsc::channel();

    let tx1 = tx.clone();
    fibrx::spawn(&executor, move || {
        fibrx::sleep_for(Duration::from_millis(100));
        tx1.send("slept").unwrap();
    });
    fibrx::spawn(&executor, move || {
        tx.send("quick").unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "quick");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "slept");
}

#[test]
fn suspend_with_external_wakeup() {
    let executor = pool(2);
    let (tx, rx) = mpsc::channel();

    fibrx::spawn(&executor, move || {
        fiber::suspend_with(|handle| {
            // Wake from a foreign thread a moment later.
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                handle.schedule(SchedulerHint::UpToYou);
            });
            None
        });
        tx.send("resumed").unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "resumed");
}

#[test]
fn panicking_fiber_does_not_take_the_worker() {
    let executor = pool(1);
    let (tx, rx) = mpsc::channel();

    fibrx::spawn(&executor, || {
        panic!("fiber panic");
    });
    fibrx::spawn(&executor, move || {
        tx.send("alive").unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "alive");
}

#[test]
fn builder_sets_stack_size() {
    let executor = pool(1);
    let (tx, rx) = mpsc::channel();

    fiber::Builder::new()
        .stack_size(256 * 1024)
        .spawn(executor, move || {
            // Enough stack to do something real.
            let data = [0u8; 16 * 1024];
            tx.send(data.len()).unwrap();
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 16 * 1024);
}
