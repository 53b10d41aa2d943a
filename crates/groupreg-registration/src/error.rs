//! Error types for metric evaluation and optimisation.
//!
//! Numeric guards are explicit: a metric never hands NaN to the optimiser,
//! it returns one of these errors instead.

use groupreg_core::CoreError;
use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// Too few samples survived the support, mask and buffer checks.
    ///
    /// Recoverable: the optimiser may retry with a smaller step.
    #[error(
        "Insufficient samples: {valid} of {total} samples map inside the moving image \
         (required ratio {required_ratio})"
    )]
    InsufficientSamples {
        valid: usize,
        total: usize,
        required_ratio: f64,
    },

    /// The sampled data cannot produce a finite measure (too few rows,
    /// zero-variance column, non-finite statistics).
    #[error("Degenerate sample: {0}")]
    DegenerateSample(String),

    /// A caller-supplied argument violates a precondition.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Vector lengths do not agree.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error raised by the transform or imaging substrate.
    #[error("Transform error: {0}")]
    TransformError(#[from] CoreError),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create a degenerate sample error.
    pub fn degenerate_sample(msg: impl Into<String>) -> Self {
        Self::DegenerateSample(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// True for errors an optimiser can recover from by changing parameters.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientSamples { .. })
    }
}
