//! Terminal wait: suspend the fiber or park the thread.

use crate::cancel::Token;
use crate::exec::SchedulerHint;
use crate::fiber::{self, FiberHandle};
use crate::future::{Consumer, Outcome, Output, SwitchContext, Thunk};

use parking_lot::{Condvar, Mutex};

use std::sync::Arc;

pub(crate) fn get<F>(thunk: F) -> Outcome<F::Value>
where
    F: Thunk,
{
    if fiber::in_fiber() {
        get_suspending(thunk)
    } else {
        get_blocking(thunk)
    }
}

struct GetCell<T> {
    inner: Mutex<GetInner<T>>,
    condvar: Condvar,
}

struct GetInner<T> {
    outcome: Option<Outcome<T>>,
    waiter: Option<FiberHandle>,
}

impl<T> GetCell<T> {
    fn new() -> Arc<GetCell<T>> {
        Arc::new(GetCell {
            inner: Mutex::new(GetInner {
                outcome: None,
                waiter: None,
            }),
            condvar: Condvar::new(),
        })
    }

    fn complete(&self, outcome: Outcome<T>) {
        let waiter = {
            let mut inner = self.inner.lock();
            inner.outcome = Some(outcome);
            inner.waiter.take()
        };
        match waiter {
            Some(handle) => handle.schedule(SchedulerHint::Next),
            None => {
                self.condvar.notify_one();
            }
        }
    }
}

struct GetConsumer<T: Send + 'static> {
    cell: Arc<GetCell<T>>,
    token: Token,
}

impl<T: Send + 'static> Consumer<T> for GetConsumer<T> {
    fn consume(self, output: Output<T>) {
        self.cell.complete(Outcome::Done(output.result));
    }

    fn cancel(self, _context: SwitchContext) {
        self.cell.complete(Outcome::Cancelled);
    }

    fn cancel_token(&self) -> Token {
        self.token.clone()
    }
}

fn get_blocking<F>(thunk: F) -> Outcome<F::Value>
where
    F: Thunk,
{
    let cell = GetCell::new();
    thunk.start(GetConsumer {
        cell: cell.clone(),
        // Blocking a plain thread is not a cancellable scope.
        token: Token::never(),
    });

    let mut inner = cell.inner.lock();
    while inner.outcome.is_none() {
        cell.condvar.wait(&mut inner);
    }
    inner.outcome.take().expect("woken without an outcome")
}

fn get_suspending<F>(thunk: F) -> Outcome<F::Value>
where
    F: Thunk,
{
    let cell = GetCell::new();
    thunk.start(GetConsumer {
        cell: cell.clone(),
        token: fiber::cancel_token(),
    });

    let awaiter_cell = cell.clone();
    fiber::suspend_with(move |handle| {
        let mut inner = awaiter_cell.inner.lock();
        if inner.outcome.is_some() {
            // Completed before we finished suspending; transfer straight
            // back.
            Some(handle)
        } else {
            inner.waiter = Some(handle);
            None
        }
    });

    let outcome = cell.inner.lock().outcome.take();
    outcome.expect("fiber resumed without an outcome")
}
