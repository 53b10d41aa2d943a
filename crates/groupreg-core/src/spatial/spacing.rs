//! Spacing between adjacent pixels along each index axis.

use super::Vector;

/// Physical distance between adjacent pixels along each axis.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Same spacing along every axis.
    pub fn uniform(value: f64) -> Self {
        Self(nalgebra::SVector::repeat(value))
    }

    /// True when every component is strictly positive and finite.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|s| s.is_finite() && *s > 0.0)
    }
}
