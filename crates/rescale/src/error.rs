//! Error types for the wres-rescale crate.

use wres_datamodel::TimeScale;

/// Error type for all fallible operations in the wres-rescale crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RescaleError {
    /// Returned when the desired period is shorter than the existing period.
    #[error("cannot downscale from {existing} to {desired}")]
    Downscaling {
        /// Existing time scale.
        existing: TimeScale,
        /// Desired time scale.
        desired: TimeScale,
    },

    /// Returned when the desired period is not a whole multiple of the existing one.
    #[error("the desired period of {desired} is not an integer multiple of the existing period of {existing}")]
    NonIntegerMultiple {
        /// Existing time scale.
        existing: TimeScale,
        /// Desired time scale.
        desired: TimeScale,
    },

    /// Returned when the existing aggregation function is unknown and the period changes.
    #[error("cannot upscale from {existing} to {desired} because the existing function is unknown")]
    UnknownFunction {
        /// Existing time scale.
        existing: TimeScale,
        /// Desired time scale.
        desired: TimeScale,
    },

    /// Returned when a time scale cannot be used for upscaling.
    #[error("unsupported time scale: {reason}")]
    UnsupportedTimeScale {
        /// Description of the problem.
        reason: String,
    },

    /// Data model error.
    #[error(transparent)]
    DataModel(#[from] wres_datamodel::DataModelError),
}
