//! Error types for the wres-pairing crate.

/// Error type for all fallible operations in the wres-pairing crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PairingError {
    /// Returned when exact cross-pairing finds no common reference-time type.
    #[error("cannot cross-pair exactly: {reason}")]
    NoCommonReferenceTimeType {
        /// Description of the problem.
        reason: String,
    },

    /// Data model error.
    #[error(transparent)]
    DataModel(#[from] wres_datamodel::DataModelError),
}
