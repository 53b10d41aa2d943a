//! Error types for the imaging substrate.

use thiserror::Error;

/// Errors raised while building images, geometries and transforms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Geometry is unusable (zero size, non-positive spacing, singular direction).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Pixel buffer length does not match the geometry.
    #[error("Buffer length mismatch: expected {expected}, got {actual}")]
    BufferLength { expected: usize, actual: usize },

    /// Tensor data could not be read back to the host.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Filter settings are unusable.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Parameter vector length does not match the transform.
    #[error("Parameter count mismatch: expected {expected}, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an invalid geometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::ParameterCount { expected: 4, actual: 3 };
        assert_eq!(err.to_string(), "Parameter count mismatch: expected 4, got 3");
        assert!(CoreError::invalid_geometry("zero size")
            .to_string()
            .contains("zero size"));
    }
}
