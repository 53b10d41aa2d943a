//! PCA stack metric.
//!
//! Samples a stack of images along its last axis, builds the
//! sample-by-timepoint intensity matrix and scores the transform by a
//! weighted sum of the eigenvalues of the timepoint correlation matrix. A
//! well-aligned stack concentrates its variance in few components, which
//! lowers the measure.
//!
//! # Evaluation
//!
//! 1. [`select_timepoints`]: all timepoints, or a seeded random subset.
//! 2. [`build_sample_matrix`]: one row per fixed sample whose every timepoint
//!    maps into the moving image.
//! 3. [`PcaStatistics::compute`]: mean, covariance, correlation, eigenvalues.
//! 4. [`compute_gradient_terms`]: analytic derivative over the accepted rows.
//! 5. [`ParameterLayout::subtract_mean`]: optional post-processing.

mod config;
mod data_matrix;
mod gradient;
mod measure;
mod subtract_mean;
mod timepoints;

pub use config::PcaMetricConfig;
pub use data_matrix::{build_sample_matrix, point_at_timepoint, SampleMatrix};
pub use gradient::{compute_gradient_terms, EigenProjections, GradientTerms};
pub use measure::{weighted_eigenvalue_sum, PcaStatistics};
pub use subtract_mean::ParameterLayout;
pub use timepoints::{sample_random, select_timepoints};

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::context::SamplingContext;
use super::trait_::Metric;
use crate::error::Result;
use crate::validation::ensure_finite;

/// Output of pass 1, kept only for the duration of one evaluation.
struct FirstPass<const D: usize> {
    timepoints: Vec<usize>,
    samples: SampleMatrix<D>,
    stats: PcaStatistics,
}

/// PCA stack metric over a [`SamplingContext`].
///
/// Owns its timepoint generator; two metrics built with the same
/// configuration produce the same sequence of evaluations.
pub struct PcaMetric<const D: usize, C: SamplingContext<D>> {
    context: C,
    config: PcaMetricConfig,
    rng: StdRng,
    last_dimension_size: usize,
    number_of_pixels_counted: usize,
}

impl<const D: usize, C: SamplingContext<D>> PcaMetric<D, C> {
    /// Validate `config` against the fixed image and clamp the random draw
    /// count to what the stack can provide.
    pub fn new(context: C, mut config: PcaMetricConfig) -> Result<Self> {
        let last_dimension_size = context.fixed_geometry().last_axis_size();
        config.validate(last_dimension_size)?;
        context.sample_policy().validate()?;

        let max_draws = last_dimension_size - 1;
        if config.sample_last_dimension_randomly && config.num_samples_last_dimension > max_draws {
            tracing::debug!(
                requested = config.num_samples_last_dimension,
                clamped = max_draws,
                "clamping random timepoint count to the stack size"
            );
            config.num_samples_last_dimension = max_draws;
        }

        tracing::debug!(
            timepoints = config.number_of_timepoints(last_dimension_size),
            random = config.sample_last_dimension_randomly,
            subtract_mean = config.subtract_mean,
            "initialized PCA metric"
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            context,
            config,
            last_dimension_size,
            number_of_pixels_counted: 0,
        })
    }

    pub fn config(&self) -> &PcaMetricConfig {
        &self.config
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Accepted samples of the most recent evaluation.
    pub fn number_of_pixels_counted(&self) -> usize {
        self.number_of_pixels_counted
    }

    /// Parameter layout assumed by the subtract-mean step.
    pub fn parameter_layout(&self) -> ParameterLayout {
        if self.config.transform_is_stack_transform {
            ParameterLayout::Stack {
                num_timepoints: self.last_dimension_size,
            }
        } else {
            ParameterLayout::DimensionBlocked {
                dimension: D,
                grid_size_last_dimension: self.config.grid_size_last_dimension.unwrap_or(1),
            }
        }
    }

    fn first_pass(&mut self, parameters: &[f64]) -> Result<FirstPass<D>> {
        self.context.set_parameters(parameters)?;
        let timepoints = select_timepoints(&self.config, self.last_dimension_size, &mut self.rng)?;
        let fixed_samples = self.context.fixed_samples();
        let samples = build_sample_matrix(&self.context, &fixed_samples, &timepoints);
        self.number_of_pixels_counted = samples.number_of_rows();
        self.context
            .sample_policy()
            .check(samples.number_of_samples, samples.number_of_rows())?;

        let stats = PcaStatistics::compute(&samples.matrix)?;
        ensure_finite("PCA measure", stats.measure)?;
        tracing::debug!(
            samples = samples.number_of_samples,
            accepted = samples.number_of_rows(),
            timepoints = timepoints.len(),
            measure = stats.measure,
            "evaluated PCA measure"
        );
        Ok(FirstPass {
            timepoints,
            samples,
            stats,
        })
    }

    /// Measure and the unscaled derivative traces at `parameters`.
    pub fn gradient_terms(&mut self, parameters: &[f64]) -> Result<(f64, GradientTerms)> {
        let pass = self.first_pass(parameters)?;
        let terms = compute_gradient_terms(
            &self.context,
            &pass.stats,
            &pass.samples.accepted_points,
            &pass.timepoints,
            self.config.use_derivative_of_mean,
        )?;
        Ok((pass.stats.measure, terms))
    }
}

impl<const D: usize, C: SamplingContext<D>> Metric for PcaMetric<D, C> {
    fn name(&self) -> &'static str {
        "PCAMetric"
    }

    fn number_of_parameters(&self) -> usize {
        self.context.number_of_parameters()
    }

    fn value(&mut self, parameters: &[f64]) -> Result<f64> {
        self.first_pass(parameters).map(|pass| pass.stats.measure)
    }

    fn value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, DVector<f64>)> {
        let (measure, terms) = self.gradient_terms(parameters)?;
        let mut derivative = terms.combine();
        if self.config.subtract_mean {
            self.parameter_layout().subtract_mean(&mut derivative)?;
        }
        Ok((measure, derivative))
    }
}
