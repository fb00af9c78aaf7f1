//! Surrogate-id allocation for emitted layer rows.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic gid counter for the rows of one build job.
///
/// Owned by the job's build context and passed by reference — never a
/// process global — so concurrent jobs cannot collide and a fresh job starts
/// from 1 again. Increments are atomic in case a host shares one allocator
/// across threads anyway.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next gid, starting at 1.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
