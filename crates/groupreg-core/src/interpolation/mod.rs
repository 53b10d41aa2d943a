//! Interpolation: device-side batch kernels and host-side image functions.

pub mod function;
pub mod nearest;
pub mod trait_;

pub use function::{ImageFunction, LinearInterpolateImageFunction, NearestNeighborImageFunction};
pub use nearest::NearestNeighborInterpolator;
pub use trait_::Interpolator;
