//! Advanced mean squares metric.
//!
//! `MS(μ) = factor / N · Σ (M(T_μ(x)) − F(x))²` over the samples whose
//! mapped position is inside the transform support, the moving mask and the
//! moving buffer. The derivative uses the analytic transform Jacobian.
//!
//! [`AdvancedMeanSquares::self_hessian`] approximates the Hessian from the
//! smoothed fixed image alone, for optimisers that want a preconditioner.

use groupreg_core::filter::GaussianFilter;
use groupreg_core::image::HostImage;
use groupreg_core::interpolation::{ImageFunction, LinearInterpolateImageFunction};
use groupreg_core::sampler::{ImageGridSampler, ImageSampler};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::context::{transform_jacobian_inner_product, SamplingContext};
use super::trait_::Metric;
use super::SAMPLES_PER_CHUNK;
use crate::error::{RegistrationError, Result};
use crate::validation::ensure_finite;

/// Grey value ranges used to normalise the measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityRanges {
    pub fixed: f64,
    pub moving: f64,
}

impl IntensityRanges {
    /// `max − min` of each image.
    pub fn from_images<const D: usize>(fixed: &HostImage<D>, moving: &HostImage<D>) -> Self {
        let (fixed_min, fixed_max) = fixed.intensity_range();
        let (moving_min, moving_max) = moving.intensity_range();
        Self {
            fixed: fixed_max - fixed_min,
            moving: moving_max - moving_min,
        }
    }
}

/// Settings of [`AdvancedMeanSquares::self_hessian`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfHessianConfig {
    /// Gaussian sigma applied to the fixed image, in physical units.
    pub smoothing_sigma: f64,
    /// Upper bound on the grid samples drawn from the fixed image.
    pub number_of_samples: usize,
}

impl Default for SelfHessianConfig {
    fn default() -> Self {
        Self {
            smoothing_sigma: 1.0,
            number_of_samples: 100_000,
        }
    }
}

impl SelfHessianConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.smoothing_sigma.is_finite() && self.smoothing_sigma >= 0.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "self-Hessian smoothing sigma must be finite and non-negative, got {}",
                self.smoothing_sigma
            )));
        }
        if self.number_of_samples == 0 {
            return Err(RegistrationError::invalid_configuration(
                "self-Hessian needs at least one sample",
            ));
        }
        Ok(())
    }
}

/// Configuration of [`AdvancedMeanSquares`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanSquaresConfig {
    /// Divide the measure by `(fixedRange · movingRange) / 100`, i.e. assume
    /// a typical difference of a tenth of the grey value range.
    pub use_normalization: bool,
    /// Required when `use_normalization` is set.
    pub intensity_ranges: Option<IntensityRanges>,
    #[serde(default)]
    pub self_hessian: SelfHessianConfig,
}

impl MeanSquaresConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable normalisation with the given grey value ranges.
    pub fn with_normalization(mut self, ranges: IntensityRanges) -> Self {
        self.use_normalization = true;
        self.intensity_ranges = Some(ranges);
        self
    }

    pub fn with_self_hessian(mut self, self_hessian: SelfHessianConfig) -> Self {
        self.self_hessian = self_hessian;
        self
    }

    /// Multiplier applied to measure and derivative.
    pub fn normalization_factor(&self) -> Result<f64> {
        if !self.use_normalization {
            return Ok(1.0);
        }
        let ranges = self.intensity_ranges.ok_or_else(|| {
            RegistrationError::invalid_configuration("normalization requires intensity ranges")
        })?;
        if !(ranges.fixed > 0.0 && ranges.moving > 0.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "intensity ranges must be positive, got fixed {} moving {}",
                ranges.fixed, ranges.moving
            )));
        }
        Ok(100.0 / ranges.fixed / ranges.moving)
    }
}

#[derive(Debug, Clone)]
struct Partial {
    measure: f64,
    derivative: Vec<f64>,
    count: usize,
}

impl Partial {
    fn new(number_of_parameters: usize) -> Self {
        Self {
            measure: 0.0,
            derivative: vec![0.0; number_of_parameters],
            count: 0,
        }
    }

    fn merge(mut self, other: Partial) -> Self {
        self.measure += other.measure;
        for (a, b) in self.derivative.iter_mut().zip(other.derivative) {
            *a += b;
        }
        self.count += other.count;
        self
    }
}

/// Mean squared intensity difference between fixed and mapped moving image.
pub struct AdvancedMeanSquares<const D: usize, C: SamplingContext<D>> {
    context: C,
    normalization_factor: f64,
    self_hessian: SelfHessianConfig,
    number_of_pixels_counted: usize,
}

impl<const D: usize, C: SamplingContext<D>> AdvancedMeanSquares<D, C> {
    pub fn new(context: C, config: MeanSquaresConfig) -> Result<Self> {
        let normalization_factor = config.normalization_factor()?;
        config.self_hessian.validate()?;
        context.sample_policy().validate()?;
        Ok(Self {
            context,
            normalization_factor,
            self_hessian: config.self_hessian,
            number_of_pixels_counted: 0,
        })
    }

    pub fn normalization_factor(&self) -> f64 {
        self.normalization_factor
    }

    /// Accepted samples of the most recent evaluation.
    pub fn number_of_pixels_counted(&self) -> usize {
        self.number_of_pixels_counted
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Approximate Hessian `2·factor/N · Σ Jᵀ·J` at `parameters`.
    ///
    /// `J` is the image Jacobian of the Gaussian-smoothed fixed image at each
    /// mapped grid sample. The fixed image stands in for the moving one, so
    /// the result is symmetric positive semi-definite and does not depend on
    /// the current mismatch.
    pub fn self_hessian(&mut self, parameters: &[f64]) -> Result<DMatrix<f64>> {
        self.context.set_parameters(parameters)?;
        let fixed = self.context.fixed_image();
        let smoothed = GaussianFilter::isotropic(self.self_hessian.smoothing_sigma).apply(fixed)?;
        let function = LinearInterpolateImageFunction::new(smoothed);
        let samples = ImageGridSampler::with_number_of_samples(
            fixed.geometry(),
            self.self_hessian.number_of_samples,
        )
        .sample(fixed);
        let context = &self.context;

        let terms: Vec<Option<(Vec<usize>, Vec<f64>)>> = samples
            .par_iter()
            .map(|sample| {
                let mapped = context.transform_point(&sample.point)?;
                if !context.is_inside_moving_mask(&mapped) {
                    return None;
                }
                let (_, gradient) = function.evaluate_value_and_derivative(&mapped)?;
                let jacobian = context.evaluate_transform_jacobian(&sample.point);
                let image_jacobian = transform_jacobian_inner_product(&jacobian, &gradient);
                Some((jacobian.nonzero_indices, image_jacobian))
            })
            .collect();

        let p = context.number_of_parameters();
        let mut hessian = DMatrix::zeros(p, p);
        let mut count = 0usize;
        for (indices, values) in terms.into_iter().flatten() {
            count += 1;
            for (a, &mu) in indices.iter().enumerate() {
                for (b, &nu) in indices.iter().enumerate() {
                    hessian[(mu, nu)] += values[a] * values[b];
                }
            }
        }

        self.number_of_pixels_counted = count;
        tracing::debug!(
            metric = "AdvancedMeanSquares",
            samples = samples.len(),
            accepted = count,
            "evaluated self-Hessian"
        );
        self.context.sample_policy().check(samples.len(), count)?;

        hessian *= 2.0 * self.normalization_factor / count as f64;
        if hessian.iter().any(|v| !v.is_finite()) {
            return Err(RegistrationError::degenerate_sample(
                "self-Hessian has non-finite entries",
            ));
        }
        Ok(hessian)
    }

    fn evaluate(&mut self, parameters: &[f64], with_derivative: bool) -> Result<(f64, DVector<f64>)> {
        self.context.set_parameters(parameters)?;
        let samples = self.context.fixed_samples();
        let p = if with_derivative {
            self.context.number_of_parameters()
        } else {
            0
        };
        let context = &self.context;

        let partials: Vec<Partial> = samples
            .par_chunks(SAMPLES_PER_CHUNK)
            .map(|chunk| {
                let mut partial = Partial::new(p);
                for sample in chunk {
                    let Some(mapped) = context.transform_point(&sample.point) else {
                        continue;
                    };
                    if !context.is_inside_moving_mask(&mapped) {
                        continue;
                    }
                    if !with_derivative {
                        if let Some(moving) = context.evaluate_moving_value(&mapped) {
                            let diff = moving - sample.value;
                            partial.measure += diff * diff;
                            partial.count += 1;
                        }
                        continue;
                    }
                    let Some((moving, gradient)) =
                        context.evaluate_moving_value_and_derivative(&mapped)
                    else {
                        continue;
                    };
                    let diff = moving - sample.value;
                    partial.measure += diff * diff;
                    partial.count += 1;

                    let jacobian = context.evaluate_transform_jacobian(&sample.point);
                    let image_jacobian = transform_jacobian_inner_product(&jacobian, &gradient);
                    for (k, &mu) in jacobian.nonzero_indices.iter().enumerate() {
                        partial.derivative[mu] += 2.0 * diff * image_jacobian[k];
                    }
                }
                partial
            })
            .collect();

        // Chunk partials are merged in sample order so results do not depend
        // on the thread count.
        let total = partials.into_iter().fold(Partial::new(p), Partial::merge);

        self.number_of_pixels_counted = total.count;
        tracing::debug!(
            metric = "AdvancedMeanSquares",
            samples = samples.len(),
            accepted = total.count,
            "evaluated"
        );
        self.context.sample_policy().check(samples.len(), total.count)?;

        let scale = self.normalization_factor / total.count as f64;
        let measure = ensure_finite("mean squares measure", total.measure * scale)?;
        let derivative = DVector::from_vec(total.derivative) * scale;
        Ok((measure, derivative))
    }
}

impl<const D: usize, C: SamplingContext<D>> Metric for AdvancedMeanSquares<D, C> {
    fn name(&self) -> &'static str {
        "AdvancedMeanSquares"
    }

    fn number_of_parameters(&self) -> usize {
        self.context.number_of_parameters()
    }

    fn value(&mut self, parameters: &[f64]) -> Result<f64> {
        self.evaluate(parameters, false).map(|(value, _)| value)
    }

    fn value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, DVector<f64>)> {
        self.evaluate(parameters, true)
    }
}
