//! Stack allocation and recycling.
//!
//! Per-coroutine allocation is the default; finished stacks of the
//! default size flow back into a small process-wide cache so that a
//! spawn-heavy workload is not remapping guard pages all day. Purely a
//! performance measure; the switch protocol never depends on it.

use context::stack::{ProtectedFixedSizeStack, Stack, StackError};

use lazy_static::lazy_static;
use parking_lot::Mutex;

/// Upper bound on cached stacks; beyond it they are unmapped as usual.
const POOL_CAP: usize = 64;

lazy_static! {
    static ref POOL: StackPool = StackPool::new(POOL_CAP);
}

/// Default coroutine stack size, as reported by the platform.
pub fn default_stack_size() -> usize {
    Stack::default_size()
}

pub(crate) fn take(size: usize) -> Result<ProtectedFixedSizeStack, StackError> {
    if size == default_stack_size() {
        if let Some(stack) = POOL.take() {
            return Ok(stack);
        }
    }
    ProtectedFixedSizeStack::new(size)
}

pub(crate) fn recycle(size: usize, stack: ProtectedFixedSizeStack) {
    if size == default_stack_size() {
        POOL.put(stack);
    }
}

// A retired stack is unreferenced memory; moving it between threads is
// fine, the stack type only lacks the marker because it holds raw
// pointers.
struct Retired(ProtectedFixedSizeStack);

unsafe impl Send for Retired {}

/// Bounded cache of default-sized coroutine stacks.
pub struct StackPool {
    stacks: Mutex<Vec<Retired>>,
    cap: usize,
}

impl StackPool {
    fn new(cap: usize) -> StackPool {
        StackPool {
            stacks: Mutex::new(Vec::new()),
            cap,
        }
    }

    fn take(&self) -> Option<ProtectedFixedSizeStack> {
        self.stacks.lock().pop().map(|r| r.0)
    }

    fn put(&self, stack: ProtectedFixedSizeStack) {
        let mut stacks = self.stacks.lock();
        if stacks.len() < self.cap {
            stacks.push(Retired(stack));
        }
    }

    /// Number of stacks currently cached.
    pub fn len(&self) -> usize {
        self.stacks.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.stacks.lock().is_empty()
    }
}

impl std::fmt::Debug for StackPool {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("StackPool").field("len", &self.len()).finish()
    }
}
