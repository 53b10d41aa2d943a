//! Image filters.

pub mod gaussian;

pub use gaussian::GaussianFilter;
