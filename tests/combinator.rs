use fibrx::cancel::Source;
use fibrx::exec::{ExecutorRef, ThreadPool};
use fibrx::future::{self, contract, CoreError, Error};
use fibrx::{Thunk, ThunkExt};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst};
use std::sync::{mpsc, Arc};
use std::time::Duration;

fn pool(workers: usize) -> ExecutorRef {
    Arc::new(ThreadPool::new(workers))
}

#[test]
fn map_transforms_the_value() {
    let got = future::value(4).map(|n| n * 10).get();
    assert_eq!(got.unwrap(), 40);
}

#[test]
fn map_passes_failure_through() {
    let got = future::failure::<u32>(Error::msg("boom")).map(|n| n + 1).get();
    let err = got.into_done().unwrap().unwrap_err();
    assert_eq!(err.to_string(), "boom");
}

#[test]
fn map_err_recovers() {
    let got = future::failure::<u32>(Error::msg("boom"))
        .map_err(|_| Ok(99))
        .get();
    assert_eq!(got.unwrap(), 99);
}

#[test]
fn map_err_skips_success() {
    let got = future::value(1).map_err(|_| Ok(2)).get();
    assert_eq!(got.unwrap(), 1);
}

#[test]
fn and_then_chains() {
    let got = future::value(3)
        .and_then(|n| future::value(n + 4))
        .and_then(|n| future::value(n * 2))
        .get();
    assert_eq!(got.unwrap(), 14);
}

#[test]
fn and_then_short_circuits_on_failure() {
    let ran = Arc::new(AtomicBool::new(false));
    let inner = ran.clone();
    let got = future::failure::<u32>(Error::msg("early"))
        .and_then(move |n| {
            inner.store(true, SeqCst);
            future::value(n)
        })
        .get();
    assert!(got.into_done().unwrap().is_err());
    assert!(!ran.load(SeqCst));
}

#[test]
fn flatten_collapses() {
    let got = future::value(future::value(5)).flatten().get();
    assert_eq!(got.unwrap(), 5);
}

#[test]
fn via_moves_the_continuation() {
    let executor = pool(2);
    let main = std::thread::current().id();
    let got = future::value(1)
        .via(executor, fibrx::SchedulerHint::UpToYou)
        .map(move |n| (n, std::thread::current().id()))
        .get();
    let (n, tid) = got.unwrap();
    assert_eq!(n, 1);
    assert_ne!(tid, main);
}

#[test]
fn both_joins_values() {
    let executor = pool(2);
    let a = future::submit(executor.clone(), || Ok(2));
    let b = future::submit(executor, || Ok("two"));
    let got = a.both(b).get();
    assert_eq!(got.unwrap(), (2, "two"));
}

#[test]
fn both_propagates_the_first_failure() {
    let got = future::value(1)
        .both(future::failure::<u32>(Error::msg("right broke")))
        .get();
    let err = got.into_done().unwrap().unwrap_err();
    assert_eq!(err.to_string(), "right broke");
}

#[test]
fn both_cancels_when_a_side_is_cancelled() {
    let (promise, fut) = contract::<u32>();
    promise.cancel();
    let got = fut.both(future::never::<u32>()).get();
    assert!(got.is_cancelled());
}

#[test]
fn first_takes_the_winner() {
    let got = future::value(1).first(future::never::<u32>()).get();
    assert_eq!(got.unwrap(), 1);

    let got = future::never::<u32>().first(future::value(2)).get();
    assert_eq!(got.unwrap(), 2);
}

#[test]
fn first_cancels_the_loser() {
    let (promise, fut) = contract::<u32>();
    let loser_scope = promise.cancel_token();

    let got = future::value(10).first(fut).get();
    assert_eq!(got.unwrap(), 10);
    assert!(loser_scope.cancel_requested());
    drop(promise);
}

#[test]
fn first_of_two_cancelled_sides_is_cancelled() {
    let (pa, fa) = contract::<u32>();
    let (pb, fb) = contract::<u32>();
    pa.cancel();
    pb.cancel();
    assert!(fa.first(fb).get().is_cancelled());
}

#[test]
fn fork_broadcasts_one_result() {
    let computed = Arc::new(AtomicUsize::new(0));
    let inner = computed.clone();
    let tines = future::value(0)
        .map(move |_| {
            inner.fetch_add(1, SeqCst);
            7u32
        })
        .fork_n(3);

    for tine in tines {
        assert_eq!(tine.get().unwrap(), 7);
    }
    // Computed once, observed three times.
    assert_eq!(computed.load(SeqCst), 1);
}

#[test]
fn fork_broadcasts_failure() {
    let tines = future::failure::<u32>(Error::msg("shared")).fork_n(2);
    for tine in tines {
        let err = tine.get().into_done().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "shared");
    }
}

#[test]
fn fork_cancels_source_when_all_tines_are_dropped() {
    let (promise, fut) = contract::<u32>();
    let producer_scope = promise.cancel_token();

    let tines = fut.fork_n(3);
    assert!(!producer_scope.cancel_requested());
    drop(tines);
    assert!(producer_scope.cancel_requested());
    drop(promise);
}

#[test]
fn hooks_observe_without_changing_the_outcome() {
    let success = Arc::new(AtomicUsize::new(0));
    let always = Arc::new(AtomicUsize::new(0));
    let s = success.clone();
    let a = always.clone();

    let got = future::value(3)
        .on_success(move |n| {
            s.store(*n as usize, SeqCst);
        })
        .anyway(move || {
            a.fetch_add(1, SeqCst);
        })
        .get();

    assert_eq!(got.unwrap(), 3);
    assert_eq!(success.load(SeqCst), 3);
    assert_eq!(always.load(SeqCst), 1);
}

#[test]
fn on_cancel_fires_on_cancellation() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();

    let (promise, fut) = contract::<u32>();
    promise.cancel();
    let got = fut
        .on_cancel(move || {
            flag.store(true, SeqCst);
        })
        .get();

    assert!(got.is_cancelled());
    assert!(cancelled.load(SeqCst));
}

#[test]
fn force_starts_eagerly() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let handle = future::value(8)
        .on_success(move |_| {
            flag.store(true, SeqCst);
        })
        .force();

    // Already evaluated before anyone waits.
    assert!(ran.load(SeqCst));
    assert_eq!(handle.get().unwrap(), 8);
}

#[test]
fn start_on_runs_on_the_pool() {
    let executor = pool(2);
    let handle = future::submit(pool(1), || Ok(21)).map(|n| n * 2).start_on(executor);
    assert_eq!(handle.get().unwrap(), 42);
}

#[test]
fn dropping_a_forced_handle_cancels_the_producer() {
    let (promise, fut) = contract::<u32>();
    let producer_scope = promise.cancel_token();

    let handle = fut.map(|n| n).force();
    drop(handle);
    assert!(producer_scope.cancel_requested());
    drop(promise);
}

#[test]
fn detach_runs_to_completion() {
    let executor = pool(1);
    let (tx, rx) = mpsc::channel();
    future::submit(executor, move || {
        tx.send("done").unwrap();
        Ok(())
    })
    .detach();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "done");
}

#[test]
fn boxed_erases_the_type() {
    let thunks = vec![
        future::value(1).boxed(),
        future::value(2).map(|n| n * 10).boxed(),
    ];
    let mut got = Vec::new();
    for thunk in thunks {
        got.push(thunk.get().unwrap());
    }
    assert_eq!(got, vec![1, 20]);
}

#[test]
fn timeout_loses_to_a_slow_producer() {
    let got = fibrx::timer::timeout(Duration::from_millis(30), future::never::<u32>()).get();
    let err = got.into_done().unwrap().unwrap_err();
    assert_eq!(*err.downcast_ref::<CoreError>().unwrap(), CoreError::Timeout);
}

#[test]
fn timeout_passes_a_fast_value() {
    let got = fibrx::timer::timeout(Duration::from_secs(5), future::value(3)).get();
    assert_eq!(got.unwrap(), 3);
}

#[test]
fn after_completes_once_elapsed() {
    let start = std::time::Instant::now();
    assert!(!fibrx::timer::after(Duration::from_millis(40)).get().is_cancelled());
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn cancelled_scope_skips_the_whole_chain() {
    let scope = Source::new();
    scope.cancel();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let thunk = future::value(1).map(move |n| {
        flag.store(true, SeqCst);
        n
    });

    // Route the delivery through a probe bound to the cancelled scope.
    use fibrx::cancel::Token;
    use fibrx::future::{Consumer, Output, SwitchContext};

    struct ScopedProbe {
        cancelled: Arc<AtomicBool>,
        token: Token,
    }

    impl Consumer<u32> for ScopedProbe {
        fn consume(self, _output: Output<u32>) {
            panic!("value delivered into a cancelled scope");
        }

        fn cancel(self, _context: SwitchContext) {
            self.cancelled.store(true, SeqCst);
        }

        fn cancel_token(&self) -> Token {
            self.token.clone()
        }
    }

    let observed = Arc::new(AtomicBool::new(false));
    thunk.start(ScopedProbe {
        cancelled: observed.clone(),
        token: scope.token(),
    });

    assert!(observed.load(SeqCst));
    assert!(!ran.load(SeqCst));
}
