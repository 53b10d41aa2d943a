//! Configuration of the PCA stack metric.

use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};

/// Configuration for [`PcaMetric`](super::PcaMetric).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaMetricConfig {
    /// Evaluate a random subset of timepoints instead of all of them.
    pub sample_last_dimension_randomly: bool,
    /// Number of random timepoints drawn per evaluation.
    pub num_samples_last_dimension: usize,
    /// Remove the across-timepoint mean from the derivative.
    pub subtract_mean: bool,
    /// Parameters are laid out per timepoint (`x0y0z0.. x1y1z1..`) rather
    /// than per dimension (`xxxx yyyy zzzz tttt`).
    pub transform_is_stack_transform: bool,
    /// Include the correction terms for the parameter sensitivity of the
    /// column means.
    pub use_derivative_of_mean: bool,
    /// Copies of `reduced_dimension_index` prepended to every random draw.
    pub num_additional_samples_fixed: usize,
    /// Reference timepoint pinned by `num_additional_samples_fixed`.
    pub reduced_dimension_index: usize,
    /// Control point grid size along the last dimension; required by the
    /// per-dimension subtract-mean layout.
    pub grid_size_last_dimension: Option<usize>,
    /// Seed of the timepoint generator.
    pub seed: u64,
}

impl Default for PcaMetricConfig {
    fn default() -> Self {
        Self {
            sample_last_dimension_randomly: false,
            num_samples_last_dimension: 10,
            subtract_mean: false,
            transform_is_stack_transform: false,
            use_derivative_of_mean: true,
            num_additional_samples_fixed: 0,
            reduced_dimension_index: 0,
            grid_size_last_dimension: None,
            seed: 0,
        }
    }
}

impl PcaMetricConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `count` random timepoints per evaluation.
    pub fn with_random_timepoints(mut self, count: usize) -> Self {
        self.sample_last_dimension_randomly = true;
        self.num_samples_last_dimension = count;
        self
    }

    /// Pin `reference` into every random draw `repeats` times.
    pub fn with_fixed_reference(mut self, reference: usize, repeats: usize) -> Self {
        self.reduced_dimension_index = reference;
        self.num_additional_samples_fixed = repeats;
        self
    }

    pub fn with_subtract_mean(mut self, enabled: bool) -> Self {
        self.subtract_mean = enabled;
        self
    }

    pub fn with_stack_transform(mut self, enabled: bool) -> Self {
        self.transform_is_stack_transform = enabled;
        self
    }

    pub fn with_derivative_of_mean(mut self, enabled: bool) -> Self {
        self.use_derivative_of_mean = enabled;
        self
    }

    pub fn with_grid_size_last_dimension(mut self, size: usize) -> Self {
        self.grid_size_last_dimension = Some(size);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the configuration against a stack of `last_dimension_size`
    /// timepoints.
    pub fn validate(&self, last_dimension_size: usize) -> Result<()> {
        if last_dimension_size < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "a stack needs at least 2 timepoints, got {}",
                last_dimension_size
            )));
        }
        if self.sample_last_dimension_randomly {
            if self.num_samples_last_dimension == 0 {
                return Err(RegistrationError::invalid_configuration(
                    "num_samples_last_dimension must be positive",
                ));
            }
            if self.num_additional_samples_fixed > 0
                && self.reduced_dimension_index >= last_dimension_size
            {
                return Err(RegistrationError::invalid_configuration(format!(
                    "reduced_dimension_index {} outside the {} timepoints",
                    self.reduced_dimension_index, last_dimension_size
                )));
            }
        }
        if self.subtract_mean && !self.transform_is_stack_transform {
            match self.grid_size_last_dimension {
                Some(size) if size > 0 => {}
                _ => {
                    return Err(RegistrationError::invalid_configuration(
                        "subtract_mean without a stack transform requires grid_size_last_dimension",
                    ))
                }
            }
        }
        Ok(())
    }

    /// Number of columns of the data matrix.
    pub fn number_of_timepoints(&self, last_dimension_size: usize) -> usize {
        if self.sample_last_dimension_randomly {
            self.num_samples_last_dimension + self.num_additional_samples_fixed
        } else {
            last_dimension_size
        }
    }
}
