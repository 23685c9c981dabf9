//! Fiber-aware synchronization primitives.
//!
//! [`Event`], [`Mutex`] and [`WaitGroup`] never block an OS thread when
//! used from fiber context: a waiting fiber suspends, its handle is
//! parked with the primitive, and the releasing side reschedules it.
//! Called from a plain thread, the waiting operations fall back to
//! parking the thread itself.

mod event;
mod mutex;
mod park;
mod wait_group;
mod waiter;

pub use self::event::Event;
pub use self::mutex::{Mutex, MutexGuard};
pub use self::wait_group::WaitGroup;

/// Raw pointer a suspension awaiter can carry to its primitive.
///
/// The pointee is borrowed by the suspended caller's frame for the whole
/// wait, so it outlives the awaiter; `Sync` on the pointee is what makes
/// touching it from the worker thread sound.
pub(crate) struct SendPtr<T>(pub(crate) *const T);

unsafe impl<T: Sync> Send for SendPtr<T> {}
