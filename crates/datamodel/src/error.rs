//! Error types for the wres-datamodel crate.

use chrono::{DateTime, TimeDelta, Utc};

/// Error type for all fallible operations in the wres-datamodel crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DataModelError {
    /// Returned when a time series contains two events at the same valid time.
    #[error("duplicate event at valid time {time}")]
    DuplicateEventTime {
        /// The repeated valid time.
        time: DateTime<Utc>,
    },

    /// Returned when a time scale cannot be constructed.
    #[error("invalid time scale: {reason}")]
    InvalidTimeScale {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a time window has an inverted pair of bounds.
    #[error("invalid time window: {reason}")]
    InvalidTimeWindow {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a feature group cannot be constructed.
    #[error("invalid feature group: {reason}")]
    InvalidFeatureGroup {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when shifting a time would leave the representable range.
    #[error("adding {offset} to {time} overflows the supported time range")]
    TimeOverflow {
        /// The time being shifted.
        time: DateTime<Utc>,
        /// The offset applied.
        offset: TimeDelta,
    },

    /// Returned when a pool breaks the baseline data/metadata invariant.
    #[error("invalid pool: {reason}")]
    InvalidPool {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when decomposing a pool whose mini-pool spans several features.
    #[error("cannot decompose a pool by feature: found a mini-pool with {count} feature tuples, expected 1")]
    AmbiguousMiniPool {
        /// Number of feature tuples in the offending mini-pool.
        count: usize,
    },

    /// Returned when decomposing a pool that repeats a feature tuple.
    #[error("cannot decompose a pool by feature: feature tuple {feature} appears more than once")]
    DuplicateFeature {
        /// Short name of the repeated feature tuple.
        feature: String,
    },

    /// Returned when array lengths don't match.
    #[error("{field}: expected {expected} elements, got {got}")]
    LengthMismatch {
        /// Name of the mismatched field.
        field: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_ambiguous_mini_pool() {
        let e = DataModelError::AmbiguousMiniPool { count: 3 };
        assert_eq!(
            e.to_string(),
            "cannot decompose a pool by feature: found a mini-pool with 3 feature tuples, expected 1"
        );
    }

    #[test]
    fn display_length_mismatch() {
        let e = DataModelError::LengthMismatch {
            field: "labels",
            expected: 5,
            got: 4,
        };
        assert_eq!(e.to_string(), "labels: expected 5 elements, got 4");
    }

    #[test]
    fn display_invalid_pool() {
        let e = DataModelError::InvalidPool {
            reason: "baseline data without baseline metadata".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "invalid pool: baseline data without baseline metadata"
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<DataModelError>();
    }
}
