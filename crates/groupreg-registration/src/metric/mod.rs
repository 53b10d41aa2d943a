//! Metric implementations.
//!
//! Metrics own a [`SamplingContext`] that supplies samples, the transform
//! and the moving image; every evaluation returns its measure and derivative
//! as values.

pub mod context;
pub mod mean_squares;
pub mod pca;
pub mod trait_;

pub use context::{transform_jacobian_inner_product, ImageSamplingContext, SamplingContext};
pub use mean_squares::{AdvancedMeanSquares, IntensityRanges, MeanSquaresConfig, SelfHessianConfig};
pub use pca::{PcaMetric, PcaMetricConfig};
pub use trait_::Metric;

/// Samples per rayon task. Partial sums are merged in chunk order, so results
/// do not depend on the number of threads.
pub(crate) const SAMPLES_PER_CHUNK: usize = 256;
