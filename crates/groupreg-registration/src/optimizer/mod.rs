//! Optimizer state used to drive metric evaluations.

pub mod line_search;

pub use line_search::{LineSearchConfig, LineSearchOptimizer};
