//! Fixed-image samplers.

pub mod full;
pub mod grid;
pub mod trait_;

pub use full::ImageFullSampler;
pub use grid::ImageGridSampler;
pub use trait_::{ImageSample, ImageSampler};
