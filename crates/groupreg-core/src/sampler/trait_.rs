//! Image sampler trait.

use crate::image::HostImage;
use crate::spatial::Point;

/// A fixed-image sample: physical position and the fixed image value there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSample<const D: usize> {
    pub point: Point<D>,
    pub value: f64,
}

/// Produces the ordered list of fixed-image samples a metric iterates over.
///
/// The output order must be deterministic for a given sampler state; metrics
/// rely on it for reproducible reductions.
pub trait ImageSampler<const D: usize>: Send + Sync {
    /// Draw samples from `fixed`.
    fn sample(&mut self, fixed: &HostImage<D>) -> Vec<ImageSample<D>>;
}
