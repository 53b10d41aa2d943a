//! Shared fixtures: a per-timepoint translation transform and synthetic
//! image stacks.
#![allow(dead_code)]

use groupreg_core::error::{CoreError, Result as CoreResult};
use groupreg_core::image::{HostImage, ImageGeometry};
use groupreg_core::interpolation::LinearInterpolateImageFunction;
use groupreg_core::sampler::ImageGridSampler;
use groupreg_core::spatial::Point;
use groupreg_core::transform::{AdvancedTransform, TransformJacobian};
use groupreg_registration::metric::{ImageSamplingContext, Metric, PcaMetric, PcaMetricConfig};
use nalgebra::DMatrix;

/// Translates every timepoint of a stack by its own spatial offset.
///
/// Parameters are laid out per timepoint: `x0 y0 .. x1 y1 .. ...`, `D - 1`
/// per timepoint. The last axis is never moved.
#[derive(Debug, Clone)]
pub struct StackTranslationTransform<const D: usize> {
    geometry: ImageGeometry<D>,
    offsets: Vec<f64>,
}

impl<const D: usize> StackTranslationTransform<D> {
    pub fn identity(geometry: ImageGeometry<D>) -> Self {
        let count = geometry.last_axis_size() * (D - 1);
        Self {
            geometry,
            offsets: vec![0.0; count],
        }
    }

    fn timepoint(&self, point: &Point<D>) -> Option<usize> {
        let cindex = self.geometry.transform_physical_point_to_continuous_index(point);
        let t = cindex[D - 1].round();
        if t < 0.0 || t >= self.geometry.last_axis_size() as f64 {
            return None;
        }
        Some(t as usize)
    }
}

impl<const D: usize> AdvancedTransform<D> for StackTranslationTransform<D> {
    fn number_of_parameters(&self) -> usize {
        self.offsets.len()
    }

    fn parameters(&self) -> Vec<f64> {
        self.offsets.clone()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> CoreResult<()> {
        if parameters.len() != self.offsets.len() {
            return Err(CoreError::ParameterCount {
                expected: self.offsets.len(),
                actual: parameters.len(),
            });
        }
        self.offsets.copy_from_slice(parameters);
        Ok(())
    }

    fn transform_point(&self, point: &Point<D>) -> Option<Point<D>> {
        let t = self.timepoint(point)?;
        let mut mapped = *point;
        for axis in 0..D - 1 {
            mapped[axis] += self.offsets[t * (D - 1) + axis];
        }
        Some(mapped)
    }

    fn jacobian(&self, point: &Point<D>) -> TransformJacobian {
        let Some(t) = self.timepoint(point) else {
            return TransformJacobian {
                matrix: DMatrix::zeros(D, 0),
                nonzero_indices: Vec::new(),
            };
        };
        let mut matrix = DMatrix::zeros(D, D - 1);
        for axis in 0..D - 1 {
            matrix[(axis, axis)] = 1.0;
        }
        TransformJacobian {
            matrix,
            nonzero_indices: (t * (D - 1)..(t + 1) * (D - 1)).collect(),
        }
    }
}

/// A stack of Gaussian blobs, one centre per timepoint, on a shallow ramp.
pub fn blob_stack<const D: usize>(size: [usize; D], centres: &[Vec<f64>]) -> HostImage<D> {
    assert_eq!(centres.len(), size[D - 1]);
    let geometry = ImageGeometry::with_size(size).unwrap();
    HostImage::from_fn(geometry, |index| {
        let centre = &centres[index[D - 1]];
        let mut r2 = 0.0;
        for axis in 0..D - 1 {
            let d = index[axis] as f64 - centre[axis];
            r2 += d * d;
        }
        100.0 * (-r2 / 8.0).exp() + 0.5 * index[0] as f64
    })
}

pub type StackContext<const D: usize> =
    ImageSamplingContext<D, StackTranslationTransform<D>, ImageGridSampler<D>>;

/// PCA metric on `stack` sampled every `step` voxels, registering the stack
/// to itself.
pub fn stack_metric<const D: usize>(
    stack: HostImage<D>,
    step: [usize; D],
    config: PcaMetricConfig,
) -> PcaMetric<D, StackContext<D>> {
    let transform = StackTranslationTransform::identity(stack.geometry().clone());
    let context = ImageSamplingContext::new(
        stack.clone(),
        LinearInterpolateImageFunction::new(stack),
        transform,
        ImageGridSampler::new(step),
    );
    PcaMetric::new(context, config).unwrap()
}

/// Central difference of `metric` along parameter `k`.
pub fn central_difference<M: Metric>(metric: &mut M, parameters: &[f64], k: usize, h: f64) -> f64 {
    let mut plus = parameters.to_vec();
    let mut minus = parameters.to_vec();
    plus[k] += h;
    minus[k] -= h;
    let f_plus = metric.value(&plus).unwrap();
    let f_minus = metric.value(&minus).unwrap();
    (f_plus - f_minus) / (2.0 * h)
}
