//! Imaging substrate for groupwise registration: spatial types, image
//! geometry, device and host images, smoothing, interpolation, masks,
//! samplers and the analytic transform interface.

pub mod error;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod mask;
pub mod sampler;
pub mod spatial;
pub mod transform;

pub use error::{CoreError, Result};
pub use image::{HostImage, Image, ImageGeometry};
pub use spatial::{Direction, Point, Spacing, Vector};
