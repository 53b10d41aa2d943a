//! Metric trait for analytic-derivative similarity measures.

use nalgebra::DVector;

use crate::error::Result;

/// A single-valued cost function of the transform parameters.
///
/// Lower is better. Every call is self-contained: the metric sets the
/// parameters, samples, and returns; nothing from one evaluation feeds the
/// next apart from the metric's own configuration and random state.
pub trait Metric {
    /// Identifier of this metric.
    fn name(&self) -> &'static str;

    /// Length of the parameter and derivative vectors.
    fn number_of_parameters(&self) -> usize;

    /// Measure at `parameters`.
    fn value(&mut self, parameters: &[f64]) -> Result<f64>;

    /// Derivative of the measure with respect to `parameters`.
    fn derivative(&mut self, parameters: &[f64]) -> Result<DVector<f64>> {
        self.value_and_derivative(parameters)
            .map(|(_, derivative)| derivative)
    }

    /// Measure and derivative from a single sampling pass.
    fn value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, DVector<f64>)>;
}
