//! Error types for the wres-pooling crate.

use wres_datamodel::DataModelError;
use wres_pairing::PairingError;
use wres_rescale::RescaleError;
use wres_retrieval::{DatasetOrientation, RetrievalError};

/// Error type for all fallible operations in the wres-pooling crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    /// Returned when a single-use supplier or processor is invoked again.
    #[error(
        "Attempted to call a pool supplier more than once, which is not allowed. \
         The repeated call was made to the supplier of pool: {pool}."
    )]
    AlreadySupplied {
        /// Description of the pool whose supplier was reused.
        pool: String,
    },

    /// Returned when a component is configured inconsistently.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a series must be upscaled but no upscaler was supplied.
    #[error("the {orientation} data of pool {pool} requires upscaling, but no upscaler was supplied")]
    MissingUpscaler {
        /// The side whose series needed upscaling.
        orientation: DatasetOrientation,
        /// Description of the pool.
        pool: String,
    },

    /// Returned when optimized requests do not cover the original requests.
    #[error("invalid pool request optimization: {reason}")]
    InvalidOptimization {
        /// Description of the mismatch.
        reason: String,
    },

    /// Returned when values cannot be converted to the desired unit.
    #[error("cannot convert from {from} to {to}: {reason}")]
    UnitConversion {
        /// The existing unit.
        from: String,
        /// The desired unit.
        to: String,
        /// Why the conversion is unavailable.
        reason: String,
    },

    /// Returned when the owning evaluation has already failed.
    #[error("the evaluation has failed, so pool {pool} was not processed")]
    EvaluationFailed {
        /// Description of the pool.
        pool: String,
    },

    /// Returned when no pool in an evaluation produced statistics.
    #[error("none of the {total} pools produced statistics")]
    NoStatistics {
        /// The number of pools processed.
        total: usize,
    },

    /// Returned when statistics computation or publication fails.
    #[error("statistics for pool {pool} failed: {reason}")]
    Statistics {
        /// Description of the pool.
        pool: String,
        /// Description of the failure.
        reason: String,
    },

    /// Wraps a failure with the metadata of the pool being created.
    #[error("failed to create pool {pool}: {source}")]
    Creation {
        /// Description of the pool.
        pool: String,
        /// The underlying failure.
        source: Box<PoolError>,
    },

    /// Propagated from retrieval.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Propagated from rescaling.
    #[error(transparent)]
    Rescale(#[from] RescaleError),

    /// Propagated from pairing or cross-pairing.
    #[error(transparent)]
    Pairing(#[from] PairingError),

    /// Propagated from the data model.
    #[error(transparent)]
    DataModel(#[from] DataModelError),
}

impl PoolError {
    /// Wraps `self` with the description of the pool being created.
    ///
    /// Errors that already carry pool context are returned unchanged.
    pub fn in_pool(self, pool: impl ToString) -> Self {
        match self {
            e @ (Self::AlreadySupplied { .. } | Self::Creation { .. }) => e,
            other => Self::Creation {
                pool: pool.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Wraps `self`, the failure of a batched pool, with the description of
    /// one pool decomposed from that batch. The batch context is kept as the
    /// source.
    pub fn in_decomposed_pool(self, pool: impl ToString) -> Self {
        Self::Creation {
            pool: pool.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through pool context.
    pub fn root(&self) -> &PoolError {
        match self {
            Self::Creation { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_already_supplied() {
        let e = PoolError::AlreadySupplied {
            pool: "Pool[id=3]".into(),
        };
        assert_eq!(
            e.to_string(),
            "Attempted to call a pool supplier more than once, which is not allowed. \
             The repeated call was made to the supplier of pool: Pool[id=3]."
        );
    }

    #[test]
    fn display_missing_upscaler() {
        let e = PoolError::MissingUpscaler {
            orientation: DatasetOrientation::Right,
            pool: "P".into(),
        };
        assert_eq!(
            e.to_string(),
            "the right data of pool P requires upscaling, but no upscaler was supplied"
        );
    }

    #[test]
    fn creation_keeps_source_message() {
        let e = PoolError::InvalidConfig {
            reason: "bad".into(),
        }
        .in_pool("P");
        assert_eq!(e.to_string(), "failed to create pool P: invalid configuration: bad");
        assert!(matches!(e.root(), PoolError::InvalidConfig { .. }));
    }

    #[test]
    fn in_pool_does_not_double_wrap() {
        let e = PoolError::InvalidConfig { reason: "x".into() }
            .in_pool("A")
            .in_pool("B");
        assert!(e.to_string().starts_with("failed to create pool A"));
    }

    #[test]
    fn decomposed_pool_context_wraps_batch_context() {
        let e = PoolError::InvalidConfig { reason: "x".into() }
            .in_pool("batch")
            .in_decomposed_pool("A");
        assert!(e.to_string().starts_with("failed to create pool A: failed to create pool batch"));
        assert!(matches!(e.root(), PoolError::InvalidConfig { .. }));
    }

    #[test]
    fn from_retrieval_error() {
        let inner = RetrievalError::Source {
            orientation: DatasetOrientation::Left,
            reason: "gone".into(),
        };
        let e: PoolError = inner.clone().into();
        assert_eq!(e.to_string(), inner.to_string());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<PoolError>();
    }
}
