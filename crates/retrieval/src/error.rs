//! Error types for the wres-retrieval crate.

use crate::source::DatasetOrientation;

/// Error type for all fallible operations in the wres-retrieval crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    /// Returned when the underlying source fails.
    #[error("failed to retrieve {orientation} data: {reason}")]
    Source {
        /// Which side of the evaluation was being retrieved.
        orientation: DatasetOrientation,
        /// Description of the failure.
        reason: String,
    },

    /// Data model error.
    #[error(transparent)]
    DataModel(#[from] wres_datamodel::DataModelError),
}
