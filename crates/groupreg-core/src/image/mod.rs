//! Image types: geometry, device images and host pixel buffers.

pub mod geometry;
pub mod host;
pub mod image;

pub use geometry::ImageGeometry;
pub use host::HostImage;
pub use image::Image;
