//! Interpolator trait for device-side batch sampling.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::Result;

/// Samples tensor values at continuous indices on the tensor's own device.
///
/// # Type Parameters
/// * `B` - The burn backend; a GPU backend keeps the whole lookup on the GPU
pub trait Interpolator<B: Backend> {
    /// Interpolate `data` at `indices`.
    ///
    /// # Arguments
    /// * `data` - Pixel tensor stored slowest axis first (`[.., Y, X]`)
    /// * `indices` - Continuous indices `[Batch, D]` written `(x, y, ..)`
    ///
    /// # Returns
    /// Sampled values `[Batch]`
    fn interpolate<const D: usize>(
        &self,
        data: &Tensor<B, D>,
        indices: Tensor<B, 2>,
    ) -> Result<Tensor<B, 1>>;
}
