//! Type erasure.

use crate::future::{Consumer, DynThunk, Thunk};

/// A thunk with its concrete type erased; useful for storing
/// heterogeneous pipelines or breaking up deeply nested combinator
/// types.
pub struct BoxThunk<T: Send + 'static> {
    inner: Box<dyn DynThunk<T>>,
}

impl<T: Send + 'static> BoxThunk<T> {
    pub(crate) fn new<F>(thunk: F) -> BoxThunk<T>
    where
        F: Thunk<Value = T>,
    {
        BoxThunk {
            inner: Box::new(thunk),
        }
    }
}

impl<T: Send + 'static> Thunk for BoxThunk<T> {
    type Value = T;

    fn start<C>(self, consumer: C)
    where
        C: Consumer<T>,
    {
        self.inner.start_boxed(Box::new(consumer));
    }
}

impl<T: Send + 'static> std::fmt::Debug for BoxThunk<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("BoxThunk").finish()
    }
}
