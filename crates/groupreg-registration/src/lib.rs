//! Groupwise registration metrics.
//!
//! The PCA stack metric scores how well a transform aligns every timepoint
//! of an image stack, with an analytic derivative for gradient-based
//! optimisation. A mean squares metric and line-search state complete the
//! pipeline.

pub mod error;
pub mod metric;
pub mod optimizer;
pub mod validation;

pub use error::{RegistrationError, Result};
pub use metric::{Metric, PcaMetric, PcaMetricConfig};
pub use validation::SampleCountPolicy;
