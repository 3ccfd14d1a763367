//! Pooling parameters.

use crate::error::PoolError;

/// Parameters that control feature batching.
///
/// # Example
///
/// ```
/// use wres_pooling::PoolParameters;
///
/// let params = PoolParameters::new()
///     .with_feature_batch_size(10)
///     .with_feature_batch_threshold(5);
///
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParameters {
    /// Maximum number of singleton feature groups retrieved together.
    feature_batch_size: usize,
    /// Batching is considered only above this many singleton groups.
    feature_batch_threshold: usize,
}

impl PoolParameters {
    /// Creates the default parameters.
    ///
    /// Defaults: `feature_batch_size = 50`, `feature_batch_threshold = 10`.
    pub fn new() -> Self {
        Self {
            feature_batch_size: 50,
            feature_batch_threshold: 10,
        }
    }

    /// Sets the feature batch size.
    pub fn with_feature_batch_size(mut self, size: usize) -> Self {
        self.feature_batch_size = size;
        self
    }

    /// Sets the feature batch threshold.
    pub fn with_feature_batch_threshold(mut self, threshold: usize) -> Self {
        self.feature_batch_threshold = threshold;
        self
    }

    // --- Accessors ---

    /// Returns the feature batch size.
    pub fn feature_batch_size(&self) -> usize {
        self.feature_batch_size
    }

    /// Returns the feature batch threshold.
    pub fn feature_batch_threshold(&self) -> usize {
        self.feature_batch_threshold
    }

    /// Validates the parameters.
    ///
    /// Returns an error if the batch size is zero.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.feature_batch_size == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "feature batch size must be >= 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for PoolParameters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = PoolParameters::default();
        assert_eq!(p.feature_batch_size(), 50);
        assert_eq!(p.feature_batch_threshold(), 10);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_rejected() {
        let p = PoolParameters::new().with_feature_batch_size(0);
        assert!(matches!(p.validate(), Err(PoolError::InvalidConfig { .. })));
    }
}
