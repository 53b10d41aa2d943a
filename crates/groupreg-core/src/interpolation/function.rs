//! Host-side image functions evaluated one physical point at a time.
//!
//! Metrics need a value *and* a spatial gradient at arbitrary mapped points,
//! from many threads. These functions read a [`HostImage`] directly.

use crate::image::{HostImage, ImageGeometry};
use crate::spatial::{Point, Vector};

/// Value (and optionally gradient) of an image at continuous positions.
///
/// Every method returns `None` when the position lies outside the buffer.
pub trait ImageFunction<const D: usize>: Send + Sync {
    fn geometry(&self) -> &ImageGeometry<D>;

    /// Value at a continuous index.
    fn evaluate_at_continuous_index(&self, cindex: &Point<D>) -> Option<f64>;

    /// Value and gradient with respect to the continuous index.
    fn evaluate_value_and_derivative_at_continuous_index(
        &self,
        cindex: &Point<D>,
    ) -> Option<(f64, Vector<D>)>;

    /// Value at a physical point.
    fn evaluate(&self, point: &Point<D>) -> Option<f64> {
        let cindex = self
            .geometry()
            .transform_physical_point_to_continuous_index(point);
        self.evaluate_at_continuous_index(&cindex)
    }

    /// Value and physical-space gradient at a physical point.
    fn evaluate_value_and_derivative(&self, point: &Point<D>) -> Option<(f64, Vector<D>)> {
        let geometry = self.geometry();
        let cindex = geometry.transform_physical_point_to_continuous_index(point);
        self.evaluate_value_and_derivative_at_continuous_index(&cindex)
            .map(|(value, gradient)| (value, geometry.gradient_to_physical(&gradient)))
    }
}

/// N-linear interpolation with its analytic gradient.
#[derive(Debug, Clone)]
pub struct LinearInterpolateImageFunction<const D: usize> {
    image: HostImage<D>,
}

impl<const D: usize> LinearInterpolateImageFunction<D> {
    pub fn new(image: HostImage<D>) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &HostImage<D> {
        &self.image
    }

    /// Lower corner and fractional offset of the cell containing `cindex`.
    fn cell(&self, cindex: &Point<D>) -> Option<([usize; D], [f64; D])> {
        let geometry = self.image.geometry();
        if !geometry.is_inside_buffer(cindex) {
            return None;
        }
        let size = geometry.size();
        let mut base = [0usize; D];
        let mut frac = [0.0f64; D];
        for axis in 0..D {
            if size[axis] > 1 {
                let b = (cindex[axis].floor() as usize).min(size[axis] - 2);
                base[axis] = b;
                frac[axis] = cindex[axis] - b as f64;
            }
        }
        Some((base, frac))
    }

    /// Visit the `2^D` corners of a cell with their per-axis upper/lower flags.
    fn for_each_corner(&self, base: &[usize; D], mut visit: impl FnMut(u32, f64)) {
        let size = self.image.geometry().size();
        for corner in 0..(1u32 << D) {
            let mut index = [0usize; D];
            for axis in 0..D {
                let upper = (corner >> axis) & 1 == 1;
                index[axis] = (base[axis] + upper as usize).min(size[axis] - 1);
            }
            visit(corner, self.image.value_at_index(&index));
        }
    }
}

impl<const D: usize> ImageFunction<D> for LinearInterpolateImageFunction<D> {
    fn geometry(&self) -> &ImageGeometry<D> {
        self.image.geometry()
    }

    fn evaluate_at_continuous_index(&self, cindex: &Point<D>) -> Option<f64> {
        let (base, frac) = self.cell(cindex)?;
        let mut value = 0.0;
        self.for_each_corner(&base, |corner, v| {
            let mut weight = 1.0;
            for axis in 0..D {
                let upper = (corner >> axis) & 1 == 1;
                weight *= if upper { frac[axis] } else { 1.0 - frac[axis] };
            }
            value += weight * v;
        });
        Some(value)
    }

    fn evaluate_value_and_derivative_at_continuous_index(
        &self,
        cindex: &Point<D>,
    ) -> Option<(f64, Vector<D>)> {
        let (base, frac) = self.cell(cindex)?;
        let mut value = 0.0;
        let mut gradient = Vector::<D>::zeros();
        self.for_each_corner(&base, |corner, v| {
            let mut factors = [0.0f64; D];
            let mut signs = [0.0f64; D];
            for axis in 0..D {
                let upper = (corner >> axis) & 1 == 1;
                factors[axis] = if upper { frac[axis] } else { 1.0 - frac[axis] };
                signs[axis] = if upper { 1.0 } else { -1.0 };
            }
            value += factors.iter().product::<f64>() * v;
            for axis in 0..D {
                let others: f64 = (0..D)
                    .filter(|&k| k != axis)
                    .map(|k| factors[k])
                    .product();
                gradient[axis] += signs[axis] * others * v;
            }
        });
        Some((value, gradient))
    }
}

/// Nearest pixel lookup; the gradient is identically zero.
#[derive(Debug, Clone)]
pub struct NearestNeighborImageFunction<const D: usize> {
    image: HostImage<D>,
}

impl<const D: usize> NearestNeighborImageFunction<D> {
    pub fn new(image: HostImage<D>) -> Self {
        Self { image }
    }

    fn nearest_index(&self, cindex: &Point<D>) -> Option<[usize; D]> {
        let size = self.image.geometry().size();
        let mut index = [0usize; D];
        for axis in 0..D {
            let rounded = cindex[axis].round();
            if !rounded.is_finite() || rounded < 0.0 || rounded > (size[axis] - 1) as f64 {
                return None;
            }
            index[axis] = rounded as usize;
        }
        Some(index)
    }
}

impl<const D: usize> ImageFunction<D> for NearestNeighborImageFunction<D> {
    fn geometry(&self) -> &ImageGeometry<D> {
        self.image.geometry()
    }

    fn evaluate_at_continuous_index(&self, cindex: &Point<D>) -> Option<f64> {
        self.nearest_index(cindex)
            .map(|index| self.image.value_at_index(&index))
    }

    fn evaluate_value_and_derivative_at_continuous_index(
        &self,
        cindex: &Point<D>,
    ) -> Option<(f64, Vector<D>)> {
        self.evaluate_at_continuous_index(cindex)
            .map(|value| (value, Vector::zeros()))
    }
}
