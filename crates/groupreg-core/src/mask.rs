//! Spatial masks restricting where samples are accepted.

use crate::image::HostImage;
use crate::interpolation::{ImageFunction, NearestNeighborImageFunction};
use crate::spatial::Point;

/// A region of physical space.
pub trait ImageMask<const D: usize>: Send + Sync {
    fn is_inside(&self, point: &Point<D>) -> bool;
}

/// Accepts every point.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMask;

impl<const D: usize> ImageMask<D> for NoMask {
    fn is_inside(&self, _point: &Point<D>) -> bool {
        true
    }
}

/// Inside where the nearest pixel of a mask image is non-zero.
///
/// Points outside the mask image's buffer are outside the mask.
#[derive(Debug, Clone)]
pub struct BinaryImageMask<const D: usize> {
    function: NearestNeighborImageFunction<D>,
}

impl<const D: usize> BinaryImageMask<D> {
    pub fn new(image: HostImage<D>) -> Self {
        Self {
            function: NearestNeighborImageFunction::new(image),
        }
    }
}

impl<const D: usize> ImageMask<D> for BinaryImageMask<D> {
    fn is_inside(&self, point: &Point<D>) -> bool {
        matches!(self.function.evaluate(point), Some(v) if v != 0.0)
    }
}
