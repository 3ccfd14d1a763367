//! Tallies the outcome of every pool in an evaluation.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::PoolError;
use crate::processor::{PoolOutcome, PoolProcessingStatus};
use crate::request::PoolRequest;

#[derive(Debug, Default)]
struct Tally {
    statuses: BTreeMap<PoolProcessingStatus, usize>,
    failures: Vec<(String, String)>,
    warnings: usize,
    errors: usize,
}

/// Collects processing outcomes from concurrent pool processors.
///
/// The evaluation fails as a whole only when no pool produced statistics;
/// individual pools that were empty or failed are reported but tolerated.
#[derive(Debug, Default)]
pub struct PoolReporter {
    tally: Mutex<Tally>,
}

impl PoolReporter {
    /// Creates an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of processing `request`.
    pub fn record(&self, request: &PoolRequest, outcome: &Result<PoolOutcome, PoolError>) {
        let mut tally = self.tally.lock();
        match outcome {
            Ok(outcome) => {
                *tally.statuses.entry(outcome.status()).or_default() += 1;
                tally.warnings += outcome.warnings();
                tally.errors += outcome.errors();
            }
            Err(e) => tally.failures.push((request.to_string(), e.to_string())),
        }
    }

    /// Returns the number of pools with `status`.
    pub fn count(&self, status: PoolProcessingStatus) -> usize {
        self.tally.lock().statuses.get(&status).copied().unwrap_or(0)
    }

    /// Returns the number of warning events across all pools.
    pub fn warnings(&self) -> usize {
        self.tally.lock().warnings
    }

    /// Returns the number of pools that failed.
    pub fn failures(&self) -> usize {
        self.tally.lock().failures.len()
    }

    /// Returns the number of pools recorded.
    pub fn total(&self) -> usize {
        let tally = self.tally.lock();
        tally.statuses.values().sum::<usize>() + tally.failures.len()
    }

    /// Logs a summary and checks that some pool produced statistics.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoStatistics`] if no pool produced statistics.
    pub fn report(&self) -> Result<(), PoolError> {
        let tally = self.tally.lock();
        let total = tally.statuses.values().sum::<usize>() + tally.failures.len();
        let with_statistics: usize = tally
            .statuses
            .iter()
            .filter(|(s, _)| s.has_statistics())
            .map(|(_, n)| n)
            .sum();

        for (pool, error) in &tally.failures {
            warn!(%pool, %error, "pool failed");
        }
        info!(
            total,
            with_statistics,
            failed = tally.failures.len(),
            warnings = tally.warnings,
            errors = tally.errors,
            statuses = ?tally.statuses,
            "processed pools"
        );

        if with_statistics == 0 {
            return Err(PoolError::NoStatistics { total });
        }
        Ok(())
    }
}
