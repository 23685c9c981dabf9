use fibrx::cancel::{Source, Token};
use fibrx::exec::{ExecutorRef, ThreadPool};
use fibrx::future::{
    self, contract, Consumer, CoreError, Error, Outcome, Output, SwitchContext,
};
use fibrx::Thunk;

use parking_lot::Mutex;

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

fn pool(workers: usize) -> ExecutorRef {
    Arc::new(ThreadPool::new(workers))
}

/// Records which delivery arrived.
#[derive(Clone)]
struct Probe<T> {
    seen: Arc<Mutex<Vec<Outcome<T>>>>,
    token: Token,
}

impl<T: Send + 'static> Probe<T> {
    fn new(token: Token) -> Probe<T> {
        Probe {
            seen: Arc::new(Mutex::new(Vec::new())),
            token,
        }
    }

    fn deliveries(&self) -> usize {
        self.seen.lock().len()
    }
}

impl<T: Send + 'static> Consumer<T> for Probe<T> {
    fn consume(self, output: Output<T>) {
        self.seen.lock().push(Outcome::Done(output.result));
    }

    fn cancel(self, _context: SwitchContext) {
        self.seen.lock().push(Outcome::Cancelled);
    }

    fn cancel_token(&self) -> Token {
        self.token.clone()
    }
}

#[test]
fn value_delivers() {
    assert_eq!(future::value(7).get().unwrap(), 7);
}

#[test]
fn just_delivers_unit() {
    assert!(!future::just().get().is_cancelled());
}

#[test]
fn failure_travels_in_result() {
    let outcome = future::failure::<u32>(Error::msg("nope")).get();
    let err = outcome.into_done().unwrap().unwrap_err();
    assert_eq!(err.to_string(), "nope");
}

#[test]
fn submit_runs_on_the_pool() {
    let executor = pool(2);
    let got = future::submit(executor, || Ok(6 * 7)).get();
    assert_eq!(got.unwrap(), 42);
}

#[test]
fn contract_fulfilled_from_another_thread() {
    let (promise, future) = contract::<&'static str>();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        promise.set(Ok("late"));
    });
    assert_eq!(future.get().unwrap(), "late");
}

#[test]
fn contract_fulfilled_before_wait() {
    let (promise, future) = contract::<u32>();
    promise.set(Ok(9));
    assert_eq!(future.get().unwrap(), 9);
}

#[test]
fn dropped_promise_is_a_broken_promise() {
    let (promise, future) = contract::<u32>();
    drop(promise);
    let err = future.get().into_done().unwrap().unwrap_err();
    assert!(err.is::<CoreError>());
    assert_eq!(*err.downcast_ref::<CoreError>().unwrap(), CoreError::BrokenPromise);
}

#[test]
fn cancelled_promise_delivers_cancellation() {
    let (promise, future) = contract::<u32>();
    promise.cancel();
    assert!(future.get().is_cancelled());
}

#[test]
fn request_cancel_reaches_the_producer() {
    let (promise, future) = contract::<u32>();
    let producer_side = promise.cancel_token();
    assert!(!producer_side.cancel_requested());

    future.request_cancel();
    assert!(producer_side.cancel_requested());

    // The late completion goes nowhere; nothing panics.
    promise.set(Ok(1));
}

#[test]
fn cancelled_consumer_never_receives_a_value() {
    let scope = Source::new();
    let probe = Probe::<u32>::new(scope.token());
    scope.cancel();

    let (promise, future) = contract::<u32>();
    promise.set(Ok(5));
    future.start(probe.clone());

    // The canonical token check turned the delivery into a cancel.
    let seen = probe.seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].is_cancelled());
}

#[test]
fn never_delivers_cancel_on_scope_cancel() {
    let scope = Source::new();
    let probe = Probe::<u32>::new(scope.token());

    future::never::<u32>().start(probe.clone());
    assert_eq!(probe.deliveries(), 0);

    scope.cancel();
    let seen = probe.seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].is_cancelled());
}

#[test]
fn get_inside_a_fiber_suspends() {
    let executor = pool(1);
    let (promise, future) = contract::<u32>();
    let (tx, rx) = mpsc::channel();

    fibrx::spawn(&executor, move || {
        tx.send(future.get().unwrap()).unwrap();
    });

    thread::sleep(Duration::from_millis(20));
    promise.set(Ok(11));
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 11);
}

#[test]
fn error_downcast_roundtrip() {
    let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "io").into();
    assert!(err.is::<std::io::Error>());
    assert!(!err.is::<CoreError>());
    assert_eq!(err.downcast_ref::<std::io::Error>().unwrap().to_string(), "io");
}
