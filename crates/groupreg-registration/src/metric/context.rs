//! Sampling context: the image, transform and sampler capabilities a metric
//! consumes.
//!
//! Metrics do not inherit this machinery; they own a [`SamplingContext`] and
//! call through it. [`ImageSamplingContext`] is the stock composition of a
//! fixed image, a sampler, a transform, a moving image function and an
//! optional moving mask.

use std::sync::Arc;

use burn::tensor::backend::Backend;
use groupreg_core::image::{HostImage, Image, ImageGeometry};
use groupreg_core::interpolation::{ImageFunction, LinearInterpolateImageFunction};
use groupreg_core::mask::ImageMask;
use groupreg_core::sampler::{ImageSample, ImageSampler};
use groupreg_core::spatial::{Point, Vector};
use groupreg_core::transform::{AdvancedTransform, TransformJacobian};

use crate::error::Result;
use crate::validation::{validate_parameters, SampleCountPolicy};

/// Capabilities a metric needs from the imaging framework.
///
/// Read-only methods take `&self` and must be safe to call from several
/// threads at once; metrics evaluate samples in parallel.
pub trait SamplingContext<const D: usize>: Sync {
    fn number_of_parameters(&self) -> usize;

    /// Install the transform parameters used by the following calls.
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()>;

    /// Run the sampler and return the ordered fixed-image samples.
    fn fixed_samples(&mut self) -> Vec<ImageSample<D>>;

    fn fixed_geometry(&self) -> &ImageGeometry<D>;

    /// The fixed image the sampler draws from.
    fn fixed_image(&self) -> &HostImage<D>;

    /// Map a fixed point into moving space; `None` outside the transform support.
    fn transform_point(&self, point: &Point<D>) -> Option<Point<D>>;

    fn is_inside_moving_mask(&self, point: &Point<D>) -> bool;

    /// Moving image value; `None` outside the moving buffer.
    fn evaluate_moving_value(&self, point: &Point<D>) -> Option<f64>;

    /// Moving image value and physical gradient; `None` outside the buffer.
    fn evaluate_moving_value_and_derivative(&self, point: &Point<D>) -> Option<(f64, Vector<D>)>;

    /// Transform Jacobian at a fixed-space point.
    fn evaluate_transform_jacobian(&self, point: &Point<D>) -> TransformJacobian;

    fn sample_policy(&self) -> &SampleCountPolicy;
}

/// `(∂M/∂x)ᵀ · ∂T/∂μ` restricted to the Jacobian's nonzero columns.
pub fn transform_jacobian_inner_product<const D: usize>(
    jacobian: &TransformJacobian,
    moving_gradient: &Vector<D>,
) -> Vec<f64> {
    let mut image_jacobian = vec![0.0; jacobian.len()];
    for dim in 0..D {
        let derivative = moving_gradient[dim];
        for (mu, value) in image_jacobian.iter_mut().enumerate() {
            *value += jacobian.matrix[(dim, mu)] * derivative;
        }
    }
    image_jacobian
}

/// Stock [`SamplingContext`] built from host images.
pub struct ImageSamplingContext<const D: usize, T, S, F = LinearInterpolateImageFunction<D>> {
    fixed: HostImage<D>,
    sampler: S,
    transform: T,
    moving: F,
    moving_mask: Option<Arc<dyn ImageMask<D>>>,
    policy: SampleCountPolicy,
}

impl<const D: usize, T, S, F> ImageSamplingContext<D, T, S, F>
where
    T: AdvancedTransform<D>,
    S: ImageSampler<D>,
    F: ImageFunction<D>,
{
    pub fn new(fixed: HostImage<D>, moving: F, transform: T, sampler: S) -> Self {
        Self {
            fixed,
            sampler,
            transform,
            moving,
            moving_mask: None,
            policy: SampleCountPolicy::default(),
        }
    }

    /// Reject mapped points outside `mask`.
    pub fn with_moving_mask(mut self, mask: Arc<dyn ImageMask<D>>) -> Self {
        self.moving_mask = Some(mask);
        self
    }

    pub fn with_sample_policy(mut self, policy: SampleCountPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn moving_function(&self) -> &F {
        &self.moving
    }
}

impl<const D: usize, T, S> ImageSamplingContext<D, T, S, LinearInterpolateImageFunction<D>>
where
    T: AdvancedTransform<D>,
    S: ImageSampler<D>,
{
    /// Build a context from device images, interpolating the moving image linearly.
    pub fn from_images<B: Backend>(
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        transform: T,
        sampler: S,
    ) -> Result<Self> {
        let fixed = fixed.to_host()?;
        let moving = LinearInterpolateImageFunction::new(moving.to_host()?);
        Ok(Self::new(fixed, moving, transform, sampler))
    }
}

impl<const D: usize, T, S, F> SamplingContext<D> for ImageSamplingContext<D, T, S, F>
where
    T: AdvancedTransform<D>,
    S: ImageSampler<D>,
    F: ImageFunction<D>,
{
    fn number_of_parameters(&self) -> usize {
        self.transform.number_of_parameters()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        validate_parameters(parameters, self.transform.number_of_parameters())?;
        self.transform.set_parameters(parameters)?;
        Ok(())
    }

    fn fixed_samples(&mut self) -> Vec<ImageSample<D>> {
        self.sampler.sample(&self.fixed)
    }

    fn fixed_geometry(&self) -> &ImageGeometry<D> {
        self.fixed.geometry()
    }

    fn fixed_image(&self) -> &HostImage<D> {
        &self.fixed
    }

    fn transform_point(&self, point: &Point<D>) -> Option<Point<D>> {
        self.transform.transform_point(point)
    }

    fn is_inside_moving_mask(&self, point: &Point<D>) -> bool {
        self.moving_mask
            .as_ref()
            .map_or(true, |mask| mask.is_inside(point))
    }

    fn evaluate_moving_value(&self, point: &Point<D>) -> Option<f64> {
        self.moving.evaluate(point)
    }

    fn evaluate_moving_value_and_derivative(&self, point: &Point<D>) -> Option<(f64, Vector<D>)> {
        self.moving.evaluate_value_and_derivative(point)
    }

    fn evaluate_transform_jacobian(&self, point: &Point<D>) -> TransformJacobian {
        self.transform.jacobian(point)
    }

    fn sample_policy(&self) -> &SampleCountPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupreg_core::mask::BinaryImageMask;
    use groupreg_core::sampler::ImageFullSampler;
    use groupreg_core::transform::TranslationTransform;
    use nalgebra::DMatrix;

    fn ramp() -> HostImage<2> {
        let geometry = ImageGeometry::<2>::with_size([6, 4]).unwrap();
        HostImage::from_fn(geometry, |[x, y]| x as f64 + 10.0 * y as f64)
    }

    #[test]
    fn test_inner_product_uses_nonzero_columns() {
        let jacobian = TransformJacobian {
            matrix: DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]),
            nonzero_indices: vec![5, 9],
        };
        let gradient = Vector::new([10.0, 100.0]);
        let image_jacobian = transform_jacobian_inner_product(&jacobian, &gradient);
        assert_eq!(image_jacobian, vec![10.0 + 300.0, 20.0 + 400.0]);
    }

    #[test]
    fn test_context_delegates_to_transform_and_moving_image() {
        let mut context = ImageSamplingContext::new(
            ramp(),
            LinearInterpolateImageFunction::new(ramp()),
            TranslationTransform::<2>::identity(),
            ImageFullSampler::new(),
        );
        context.set_parameters(&[1.0, 0.5]).unwrap();

        let mapped = context.transform_point(&Point::new([2.0, 1.0])).unwrap();
        assert_eq!(mapped, Point::new([3.0, 1.5]));
        let (value, gradient) = context.evaluate_moving_value_and_derivative(&mapped).unwrap();
        assert!((value - 18.0).abs() < 1e-12);
        assert!((gradient[0] - 1.0).abs() < 1e-12);
        assert!((gradient[1] - 10.0).abs() < 1e-12);
        assert_eq!(context.fixed_samples().len(), 24);
    }

    #[test]
    fn test_context_rejects_wrong_parameter_count() {
        let mut context = ImageSamplingContext::new(
            ramp(),
            LinearInterpolateImageFunction::new(ramp()),
            TranslationTransform::<2>::identity(),
            ImageFullSampler::new(),
        );
        assert!(context.set_parameters(&[1.0]).is_err());
    }

    #[test]
    fn test_context_moving_mask() {
        let geometry = ImageGeometry::<2>::with_size([6, 4]).unwrap();
        let mask = BinaryImageMask::new(HostImage::from_fn(geometry, |[x, _]| (x < 3) as u8 as f64));
        let context = ImageSamplingContext::new(
            ramp(),
            LinearInterpolateImageFunction::new(ramp()),
            TranslationTransform::<2>::identity(),
            ImageFullSampler::new(),
        )
        .with_moving_mask(Arc::new(mask));
        assert!(context.is_inside_moving_mask(&Point::new([1.0, 1.0])));
        assert!(!context.is_inside_moving_mask(&Point::new([4.0, 1.0])));
    }
}
