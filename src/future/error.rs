//! Value-level failure.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error as ThisError;

/// Errors produced by the runtime itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum CoreError {
    /// The producing side was dropped before completing its contract.
    #[error("promise dropped before completion")]
    BrokenPromise,
    /// A timed race was lost to its timer.
    #[error("operation timed out")]
    Timeout,
}

/// The error half of a thunk's `Result`.
///
/// Reference counted so a forked result can be observed by every tine;
/// deliberately *not* `std::error::Error` itself, which keeps the blanket
/// `From` below coherent.
#[derive(Clone)]
pub struct Error {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl Error {
    /// Wrap a concrete error.
    pub fn new<E>(error: E) -> Error
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            inner: Arc::new(error),
        }
    }

    /// An ad-hoc message error.
    pub fn msg(message: impl Into<String>) -> Error {
        Error {
            inner: Arc::new(Message(message.into())),
        }
    }

    /// Whether the underlying error is of type `E`.
    pub fn is<E>(&self) -> bool
    where
        E: StdError + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>().is_some()
    }

    /// Borrow the underlying error as `E`, if it is one.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }
}

impl<E> From<E> for Error
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Error {
        Error::new(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, fmt)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, fmt)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

impl StdError for Message {}
