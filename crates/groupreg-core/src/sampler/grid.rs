//! Regular grid sampler.

use std::sync::Arc;

use super::trait_::{ImageSample, ImageSampler};
use crate::image::{HostImage, ImageGeometry};
use crate::mask::ImageMask;

/// Every `step[axis]`-th pixel along each axis, starting at index 0.
#[derive(Clone)]
pub struct ImageGridSampler<const D: usize> {
    step: [usize; D],
    mask: Option<Arc<dyn ImageMask<D>>>,
}

impl<const D: usize> ImageGridSampler<D> {
    /// Create a grid sampler; zero steps are treated as one.
    pub fn new(step: [usize; D]) -> Self {
        Self {
            step: step.map(|s| s.max(1)),
            mask: None,
        }
    }

    /// Uniform step giving at most `number_of_samples` grid points on
    /// `geometry` (at least one).
    pub fn with_number_of_samples(geometry: &ImageGeometry<D>, number_of_samples: usize) -> Self {
        let size = geometry.size();
        let target = number_of_samples.max(1);
        let count = |step: usize| -> usize { size.iter().map(|&s| (s + step - 1) / step).product() };
        let ratio = geometry.number_of_pixels() as f64 / target as f64;
        let mut step = ratio.powf(1.0 / D as f64).floor().max(1.0) as usize;
        while count(step) > target {
            step += 1;
        }
        Self::new([step; D])
    }

    /// Keep only samples inside `mask`.
    pub fn with_mask(mut self, mask: Arc<dyn ImageMask<D>>) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn step(&self) -> [usize; D] {
        self.step
    }
}

impl<const D: usize> ImageSampler<D> for ImageGridSampler<D> {
    fn sample(&mut self, fixed: &HostImage<D>) -> Vec<ImageSample<D>> {
        let geometry = fixed.geometry();
        let size = geometry.size();
        let counts: [usize; D] = std::array::from_fn(|axis| (size[axis] + self.step[axis] - 1) / self.step[axis]);
        let total: usize = counts.iter().product();

        let mut samples = Vec::with_capacity(total);
        for linear in 0..total {
            let mut rest = linear;
            let mut index = [0usize; D];
            for axis in 0..D {
                index[axis] = (rest % counts[axis]) * self.step[axis];
                rest /= counts[axis];
            }
            let point = geometry.transform_index_to_physical_point(&index);
            if let Some(mask) = &self.mask {
                if !mask.is_inside(&point) {
                    continue;
                }
            }
            samples.push(ImageSample {
                point,
                value: fixed.value_at_index(&index),
            });
        }
        samples
    }
}
