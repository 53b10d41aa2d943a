//! Parametric transform trait with an analytic Jacobian.
//!
//! Metrics with closed-form derivatives need `∂T(x)/∂μ` at each sample.
//! Compactly supported transforms (B-splines) only have a few non-zero
//! columns per point, so the Jacobian is reported together with the indices
//! of the parameters those columns belong to.

use nalgebra::DMatrix;

use crate::error::Result;
use crate::spatial::Point;

/// Local Jacobian of a transform at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformJacobian {
    /// `D × nnz`; column `k` is `∂T/∂μ[nonzero_indices[k]]`.
    pub matrix: DMatrix<f64>,
    /// Parameter index of every column of `matrix`.
    pub nonzero_indices: Vec<usize>,
}

impl TransformJacobian {
    pub fn len(&self) -> usize {
        self.nonzero_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nonzero_indices.is_empty()
    }
}

/// A spatial mapping from fixed to moving physical space controlled by a
/// flat parameter vector.
pub trait AdvancedTransform<const D: usize>: Send + Sync {
    fn number_of_parameters(&self) -> usize;

    /// Current parameter vector.
    fn parameters(&self) -> Vec<f64>;

    /// Replace the parameter vector; its length must match.
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()>;

    /// Map a fixed-space point; `None` when the point is outside the
    /// transform's support region.
    fn transform_point(&self, point: &Point<D>) -> Option<Point<D>>;

    /// Jacobian with respect to the parameters at `point`.
    fn jacobian(&self, point: &Point<D>) -> TransformJacobian;
}
