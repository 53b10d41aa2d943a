//! Translation transform.

use nalgebra::DMatrix;

use super::trait_::{AdvancedTransform, TransformJacobian};
use crate::error::{CoreError, Result};
use crate::spatial::{Point, Vector};

/// `T(x) = x + t`; parameters are the `D` components of `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationTransform<const D: usize> {
    offset: Vector<D>,
}

impl<const D: usize> TranslationTransform<D> {
    pub fn new(offset: Vector<D>) -> Self {
        Self { offset }
    }

    pub fn identity() -> Self {
        Self::new(Vector::zeros())
    }

    pub fn offset(&self) -> &Vector<D> {
        &self.offset
    }
}

impl<const D: usize> AdvancedTransform<D> for TranslationTransform<D> {
    fn number_of_parameters(&self) -> usize {
        D
    }

    fn parameters(&self) -> Vec<f64> {
        self.offset.to_vec()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        self.offset = Vector::from_slice(parameters).ok_or(CoreError::ParameterCount {
            expected: D,
            actual: parameters.len(),
        })?;
        Ok(())
    }

    fn transform_point(&self, point: &Point<D>) -> Option<Point<D>> {
        Some(*point + self.offset)
    }

    fn jacobian(&self, _point: &Point<D>) -> TransformJacobian {
        TransformJacobian {
            matrix: DMatrix::identity(D, D),
            nonzero_indices: (0..D).collect(),
        }
    }
}
