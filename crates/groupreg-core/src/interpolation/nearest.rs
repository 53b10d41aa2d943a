//! Device-side nearest neighbour interpolation.
//!
//! The kernel is expressed in burn tensor operations (round, clamp, gather),
//! so it executes on whichever backend holds the image: `NdArray` on the CPU,
//! `Wgpu` on the GPU. Nothing here is backend specific.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::trait_::Interpolator;
use crate::error::{CoreError, Result};
use crate::image::Image;

/// Rounds every index to the nearest pixel and clamps it into the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborInterpolator;

impl NearestNeighborInterpolator {
    pub fn new() -> Self {
        Self
    }

    /// Sample `image` at physical points `[Batch, D]`.
    ///
    /// Composes the image's world→index mapping with the interpolation kernel.
    pub fn evaluate_at_physical_points<B: Backend, const D: usize>(
        &self,
        image: &Image<B, D>,
        points: Tensor<B, 2>,
    ) -> Result<Tensor<B, 1>> {
        let indices = image.world_to_index_tensor(points);
        self.interpolate(image.data(), indices)
    }
}

impl<B: Backend> Interpolator<B> for NearestNeighborInterpolator {
    fn interpolate<const D: usize>(
        &self,
        data: &Tensor<B, D>,
        indices: Tensor<B, 2>,
    ) -> Result<Tensor<B, 1>> {
        let [batch, rank] = indices.dims();
        if D == 0 || rank != D {
            return Err(CoreError::invalid_geometry(format!(
                "index rank {} does not match image rank {}",
                rank, D
            )));
        }

        let dims = data.dims();
        let mut flat: Option<Tensor<B, 1, Int>> = None;
        let mut stride = 1usize;
        for axis in 0..D {
            // Index axis `axis` is tensor dimension `D - 1 - axis`.
            let extent = dims[D - 1 - axis];
            let discrete = indices
                .clone()
                .slice([0..batch, axis..axis + 1])
                .squeeze::<1>(1)
                .round()
                .clamp(0.0, (extent - 1) as f64)
                .int();
            let term = discrete * (stride as i32);
            flat = Some(match flat {
                Some(acc) => acc + term,
                None => term,
            });
            stride *= extent;
        }

        let flat = flat.ok_or_else(|| CoreError::invalid_geometry("empty index tensor"))?;
        Ok(data.clone().reshape([stride]).gather(0, flat))
    }
}
