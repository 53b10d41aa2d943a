//! Sampler visiting every fixed-image pixel.

use std::sync::Arc;

use super::grid::ImageGridSampler;
use super::trait_::{ImageSample, ImageSampler};
use crate::image::HostImage;
use crate::mask::ImageMask;

/// Every pixel of the fixed image, axis 0 fastest, optionally masked.
#[derive(Clone, Default)]
pub struct ImageFullSampler<const D: usize> {
    mask: Option<Arc<dyn ImageMask<D>>>,
}

impl<const D: usize> ImageFullSampler<D> {
    pub fn new() -> Self {
        Self { mask: None }
    }

    /// Keep only samples inside `mask`.
    pub fn with_mask(mut self, mask: Arc<dyn ImageMask<D>>) -> Self {
        self.mask = Some(mask);
        self
    }
}

impl<const D: usize> ImageSampler<D> for ImageFullSampler<D> {
    fn sample(&mut self, fixed: &HostImage<D>) -> Vec<ImageSample<D>> {
        let mut grid = ImageGridSampler::new([1; D]);
        if let Some(mask) = &self.mask {
            grid = grid.with_mask(Arc::clone(mask));
        }
        grid.sample(fixed)
    }
}
