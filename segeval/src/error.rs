use thiserror::Error;

/// The error type for `segeval` operations.
///
/// Configuration problems are raised eagerly, before any epoch starts.
/// Shape problems are raised per batch and abort the pass they occur in.
#[derive(Error, Debug)]
pub enum SegEvalError {
    /// Error for when a run configuration is logically inconsistent.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when an unknown dataset identifier is requested.
    #[error("Unknown dataset: {name} (expected 'spot67' or 'maxar_izmir')")]
    UnknownDataset {
        /// The identifier that failed to resolve.
        name: String,
    },

    /// Error for when an unknown model identifier is requested.
    #[error("Unknown model: {name} (expected 'unet++', 'deeplabv3+' or 'pspnet')")]
    UnknownModel {
        /// The identifier that failed to resolve.
        name: String,
    },

    /// Error for when a class id does not fit the configured class count.
    #[error("Class id {class_id} is out of range for {num_classes} classes")]
    ClassOutOfRange {
        /// The offending class id.
        class_id: usize,
        /// The configured number of classes.
        num_classes: usize,
    },

    /// Error for when prediction, truth or score tensors disagree in shape,
    /// or truth ids fall outside the class axis.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// The expected shape or value range.
        expected: String,
        /// The observed shape or value range.
        actual: String,
    },

    /// Error for when dataset operations fail.
    #[error("Dataset error: {message}")]
    Dataset {
        /// The error message.
        message: String,
    },

    /// Error for when saving or loading a checkpoint fails.
    #[error("Checkpoint error: {reason}")]
    Checkpoint {
        /// The reason for the failure.
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized `Result` type for `segeval` operations.
pub type SegEvalResult<T> = Result<T, SegEvalError>;

impl SegEvalError {
    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
