//! Deterministic assignment of trees to workers.
//!
//! A logical worker is one `(client, thread)` pair. Workers are ordered by
//! `client_id * num_threads + thread_id`, and every worker derives its own
//! contiguous range of global tree indices from the shared run parameters
//! alone, with no coordination.

use std::ops::Range;

// =============================================================================
// TreeAssignment
// =============================================================================

/// A contiguous range of global tree indices owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeAssignment {
    /// First global tree index owned by this worker.
    pub start: usize,
    /// Number of trees this worker trains. May be zero when there are more
    /// workers than trees.
    pub count: usize,
}

impl TreeAssignment {
    /// One past the last owned tree index.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// The owned indices as a range, for iteration.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Compute the tree range owned by worker `(client_id, thread_id)`.
///
/// Each of the `num_clients * num_threads` workers receives
/// `num_trees / workers` trees, and the first `num_trees % workers` workers
/// in worker order receive one extra. Together the assignments cover
/// `0..num_trees` exactly once.
///
/// # Panics
///
/// Panics if either count is zero or an id is out of range.
pub fn plan(
    num_trees: usize,
    num_clients: usize,
    num_threads: usize,
    client_id: usize,
    thread_id: usize,
) -> TreeAssignment {
    assert!(num_clients > 0, "a run needs at least one client");
    assert!(num_threads > 0, "a run needs at least one thread per client");
    assert!(client_id < num_clients, "client id out of range");
    assert!(thread_id < num_threads, "thread id out of range");

    let num_workers = num_clients * num_threads;
    let worker = client_id * num_threads + thread_id;
    let base = num_trees / num_workers;
    let remainder = num_trees % num_workers;

    let count = base + usize::from(worker < remainder);
    let start = worker * base + worker.min(remainder);
    TreeAssignment { start, count }
}

// =============================================================================
// Tests
// =============================================================================
