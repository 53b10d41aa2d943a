//! Host-resident pixel buffers for per-point evaluation.

use crate::error::{CoreError, Result};
use crate::image::ImageGeometry;

/// Image pixels held in host memory as `f64`, axis 0 fastest.
///
/// Metrics evaluate images one point at a time from many threads; a plain
/// slice avoids a device round trip per lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct HostImage<const D: usize> {
    geometry: ImageGeometry<D>,
    values: Vec<f64>,
}

impl<const D: usize> HostImage<D> {
    /// Wrap a pixel buffer; its length must equal the pixel count.
    pub fn new(geometry: ImageGeometry<D>, values: Vec<f64>) -> Result<Self> {
        let expected = geometry.number_of_pixels();
        if values.len() != expected {
            return Err(CoreError::BufferLength {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { geometry, values })
    }

    /// Fill a buffer by evaluating `f` at every discrete index.
    pub fn from_fn(geometry: ImageGeometry<D>, mut f: impl FnMut([usize; D]) -> f64) -> Self {
        let values = (0..geometry.number_of_pixels())
            .map(|offset| f(geometry.index_from_offset(offset)))
            .collect();
        Self { geometry, values }
    }

    pub fn geometry(&self) -> &ImageGeometry<D> {
        &self.geometry
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Pixel value at a discrete index.
    pub fn value_at_index(&self, index: &[usize; D]) -> f64 {
        self.values[self.geometry.offset(index)]
    }

    /// Minimum and maximum pixel value.
    pub fn intensity_range(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}
