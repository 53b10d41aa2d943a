//! Line-search step state.
//!
//! Holds an initial position and a search direction; setting a step length
//! moves the current position along the line. A line-search strategy drives
//! this state by proposing step lengths and reading back the metric.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};

/// Step length bounds and starting guess for a line search.
///
/// The optimizer state applies whatever step it is given; a search strategy
/// keeps its proposals inside the bounds with [`LineSearchConfig::clamp_step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSearchConfig {
    pub minimum_step_length: f64,
    pub maximum_step_length: f64,
    pub initial_step_length_estimate: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            minimum_step_length: 0.0,
            maximum_step_length: f64::MAX,
            initial_step_length_estimate: 1.0,
        }
    }
}

impl LineSearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step_bounds(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum_step_length = minimum;
        self.maximum_step_length = maximum;
        self
    }

    pub fn with_initial_step_length_estimate(mut self, estimate: f64) -> Self {
        self.initial_step_length_estimate = estimate;
        self
    }

    /// `step` limited to `[minimum_step_length, maximum_step_length]`.
    pub fn clamp_step(&self, step: f64) -> f64 {
        step.clamp(self.minimum_step_length, self.maximum_step_length)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.minimum_step_length >= 0.0 && self.minimum_step_length <= self.maximum_step_length) {
            return Err(RegistrationError::invalid_configuration(format!(
                "step bounds [{}, {}] are not ordered and non-negative",
                self.minimum_step_length, self.maximum_step_length
            )));
        }
        Ok(())
    }
}

/// Position along `initial + step · direction`.
#[derive(Debug, Clone)]
pub struct LineSearchOptimizer {
    config: LineSearchConfig,
    initial_position: DVector<f64>,
    line_search_direction: DVector<f64>,
    current_position: DVector<f64>,
    current_step_length: f64,
}

impl LineSearchOptimizer {
    pub fn new(config: LineSearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            initial_position: DVector::zeros(0),
            line_search_direction: DVector::zeros(0),
            current_position: DVector::zeros(0),
            current_step_length: 0.0,
        })
    }

    /// Begin a new line search.
    ///
    /// # Arguments
    /// * `initial_position` - Parameters at step length zero
    /// * `direction` - Search direction, same length as `initial_position`
    pub fn start(&mut self, initial_position: DVector<f64>, direction: DVector<f64>) -> Result<()> {
        if initial_position.len() != direction.len() {
            return Err(RegistrationError::dimension_mismatch(format!(
                "initial position has {} entries, direction has {}",
                initial_position.len(),
                direction.len()
            )));
        }
        self.current_position = initial_position.clone();
        self.initial_position = initial_position;
        self.line_search_direction = direction;
        self.current_step_length = 0.0;
        Ok(())
    }

    /// Move to `initial + step · direction` and record `step`.
    ///
    /// Position and direction lengths were matched by [`Self::start`].
    pub fn set_current_step_length(&mut self, step: f64) {
        tracing::trace!(step, "line search step");
        self.current_step_length = step;
        self.current_position = &self.initial_position + &self.line_search_direction * step;
    }

    /// `⟨derivative, direction⟩`.
    ///
    /// # Returns
    /// The slope of the metric along the search line, or `DimensionMismatch`
    /// when `derivative` does not match the direction.
    pub fn directional_derivative(&self, derivative: &DVector<f64>) -> Result<f64> {
        if derivative.len() != self.line_search_direction.len() {
            return Err(RegistrationError::dimension_mismatch(format!(
                "derivative has {} entries, direction has {}",
                derivative.len(),
                self.line_search_direction.len()
            )));
        }
        Ok(derivative.dot(&self.line_search_direction))
    }

    pub fn config(&self) -> &LineSearchConfig {
        &self.config
    }

    pub fn initial_position(&self) -> &DVector<f64> {
        &self.initial_position
    }

    pub fn line_search_direction(&self) -> &DVector<f64> {
        &self.line_search_direction
    }

    pub fn current_position(&self) -> &DVector<f64> {
        &self.current_position
    }

    pub fn current_step_length(&self) -> f64 {
        self.current_step_length
    }
}
