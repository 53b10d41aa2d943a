use crate::error::{CoreError, Result};
use crate::image::HostImage;

/// Gaussian smoothing filter.
///
/// Separable 1D convolutions along every index axis. Sigmas are given in
/// physical units and divided by the spacing of each axis; the border is
/// extended by repeating the edge pixel.
#[derive(Debug, Clone)]
pub struct GaussianFilter {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
}

impl GaussianFilter {
    /// Create a filter with one sigma per axis; a single sigma applies to all.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 63,
        }
    }

    /// Same sigma along every axis.
    pub fn isotropic(sigma: f64) -> Self {
        Self::new(vec![sigma])
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    fn sigma(&self, axis: usize) -> f64 {
        self.sigmas
            .get(axis)
            .or_else(|| self.sigmas.first())
            .copied()
            .unwrap_or(0.0)
    }

    /// Smooth `image`, keeping its geometry.
    pub fn apply<const D: usize>(&self, image: &HostImage<D>) -> Result<HostImage<D>> {
        if self.sigmas.iter().any(|s| !(s.is_finite() && *s >= 0.0)) {
            return Err(CoreError::InvalidFilter(format!(
                "gaussian sigmas must be finite and non-negative, got {:?}",
                self.sigmas
            )));
        }
        let geometry = image.geometry();
        let size = geometry.size();
        let mut values = image.values().to_vec();

        let mut stride = 1usize;
        for axis in 0..D {
            let pixel_sigma = self.sigma(axis) / geometry.spacing()[axis];
            if pixel_sigma > 1e-6 {
                let radius = (3.0 * pixel_sigma).ceil() as usize;
                let width = (2 * radius + 1).min(self.max_kernel_width);
                let kernel = generate_kernel(pixel_sigma, (width - 1) / 2);
                values = convolve_axis(&values, &kernel, size[axis], stride);
            }
            stride *= size[axis];
        }
        HostImage::new(geometry.clone(), values)
    }
}

/// Normalised kernel of `2 * radius + 1` taps.
fn generate_kernel(sigma: f64, radius: usize) -> Vec<f64> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for value in &mut kernel {
        *value /= sum;
    }
    kernel
}

/// Convolve every line of length `extent` and pixel stride `stride`.
fn convolve_axis(values: &[f64], kernel: &[f64], extent: usize, stride: usize) -> Vec<f64> {
    let radius = (kernel.len() - 1) / 2;
    let block = extent * stride;
    let mut out = vec![0.0; values.len()];
    // A line starts at every pixel whose index along the axis is zero.
    let starts = (0..values.len()).filter(|offset| offset % block < stride);
    for base in starts {
        for i in 0..extent {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let j = (i + k).saturating_sub(radius).min(extent - 1);
                acc += w * values[base + j * stride];
            }
            out[base + i * stride] = acc;
        }
    }
    out
}
