use fibrx::exec::{self, Builder, ExecutorRef, Manual, SchedulerHint, Strand, ThreadPool};

use parking_lot::Mutex;

use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::{mpsc, Arc};
use std::time::Duration;

#[test]
fn pool_runs_submitted_closures() {
    let pool = ThreadPool::new(2);
    let (tx, rx) = mpsc::channel();

    for i in 0..10 {
        let tx = tx.clone();
        exec::submit_fn(&pool, SchedulerHint::UpToYou, move || {
            tx.send(i).unwrap();
        });
    }

    let mut got: Vec<i32> = (0..10)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    got.sort();
    assert_eq!(got, (0..10).collect::<Vec<_>>());
}

#[test]
fn builder_callbacks_run_per_worker() {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));

    let s1 = started.clone();
    let s2 = stopped.clone();
    let pool = Builder::new()
        .worker_threads(3)
        .thread_name("exec-test")
        .after_start(move || {
            s1.fetch_add(1, SeqCst);
        })
        .before_stop(move || {
            s2.fetch_add(1, SeqCst);
        })
        .build();

    pool.shutdown();
    assert_eq!(started.load(SeqCst), 3);
    assert_eq!(stopped.load(SeqCst), 3);
}

#[test]
fn shutdown_drains_pending_tasks() {
    let pool = ThreadPool::new(1);
    let count = Arc::new(AtomicUsize::new(0));

    // The single worker chews slowly; the rest queue up behind it.
    let slow = count.clone();
    exec::submit_fn(&pool, SchedulerHint::UpToYou, move || {
        std::thread::sleep(Duration::from_millis(30));
        slow.fetch_add(1, SeqCst);
    });
    for _ in 0..20 {
        let count = count.clone();
        exec::submit_fn(&pool, SchedulerHint::UpToYou, move || {
            count.fetch_add(1, SeqCst);
        });
    }

    pool.shutdown();
    assert_eq!(count.load(SeqCst), 21);
}

#[test]
fn try_submit_after_shutdown_is_refused() {
    let pool = ThreadPool::new(1);
    pool.shutdown();
    let err = pool.try_submit(
        Box::new(exec::task_fn(|| {})),
        SchedulerHint::UpToYou,
    );
    assert!(err.is_err());
}

#[test]
fn manual_honors_hints() {
    let manual = Manual::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in &["back1", "back2"] {
        let log = log.clone();
        exec::submit_fn(&manual, SchedulerHint::Last, move || {
            log.lock().push(*name);
        });
    }
    let front_log = log.clone();
    exec::submit_fn(&manual, SchedulerHint::Next, move || {
        front_log.lock().push("front");
    });

    assert_eq!(manual.len(), 3);
    assert_eq!(manual.run_all(), 3);
    assert_eq!(*log.lock(), vec!["front", "back1", "back2"]);
}

#[test]
fn inline_runs_on_the_calling_thread() {
    let here = std::thread::current().id();
    let ran = Arc::new(Mutex::new(None));
    let inner = ran.clone();
    exec::submit_fn(&*exec::inline(), SchedulerHint::UpToYou, move || {
        *inner.lock() = Some(std::thread::current().id());
    });
    assert_eq!(*ran.lock(), Some(here));
}

#[test]
fn strand_serializes_and_preserves_order() {
    let underlying: ExecutorRef = Arc::new(ThreadPool::new(4));
    let strand = Strand::new(underlying);

    let running = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    const N: usize = 500;
    for i in 0..N {
        let running = running.clone();
        let order = order.clone();
        let tx = tx.clone();
        exec::submit_fn(&strand, SchedulerHint::UpToYou, move || {
            // Strict mutual exclusion: nobody else may be inside.
            assert_eq!(running.fetch_add(1, SeqCst), 0);
            order.lock().push(i);
            assert_eq!(running.fetch_sub(1, SeqCst), 1);
            tx.send(()).unwrap();
        });
    }

    for _ in 0..N {
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
    }
    assert_eq!(*order.lock(), (0..N).collect::<Vec<_>>());
}

#[test]
fn strand_survives_a_panicking_task() {
    let underlying: ExecutorRef = Arc::new(ThreadPool::new(2));
    let strand = Strand::new(underlying);
    let (tx, rx) = mpsc::channel();

    exec::submit_fn(&strand, SchedulerHint::UpToYou, || {
        panic!("strand task panic");
    });
    exec::submit_fn(&strand, SchedulerHint::UpToYou, move || {
        tx.send("after").unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "after");
}
