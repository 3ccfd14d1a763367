//! Pool identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// A process-local sequence of pool identifiers.
///
/// Identifiers increase by one from a starting value and reset to 1 instead
/// of overflowing, so they are monotonic within a process but not globally
/// unique.
#[derive(Debug)]
pub struct PoolIdSequence {
    next: AtomicU64,
}

impl PoolIdSequence {
    /// Creates a sequence starting at 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a sequence whose first identifier is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.max(1)),
        }
    }

    /// Returns the next identifier.
    pub fn next_id(&self) -> u64 {
        let previous = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(if n == u64::MAX { 1 } else { n + 1 })
            })
            .unwrap_or_else(|n| n);
        if previous == u64::MAX {
            warn!("pool identifiers exhausted, resetting the sequence to 1");
        }
        previous
    }
}

impl Default for PoolIdSequence {
    fn default() -> Self {
        Self::new()
    }
}
