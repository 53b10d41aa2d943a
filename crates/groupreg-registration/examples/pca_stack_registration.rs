//! PCA Stack Registration Example
//!
//! Builds a synthetic 2-D + time stack whose blob drifts from frame to frame,
//! then aligns every frame with a per-frame translation by descending the
//! PCA metric along backtracking line searches.
//!
//! Usage:
//!   RUST_LOG=debug cargo run --example pca_stack_registration

use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use groupreg_core::error::{CoreError, Result as CoreResult};
use groupreg_core::image::{HostImage, Image, ImageGeometry};
use groupreg_core::interpolation::NearestNeighborInterpolator;
use groupreg_core::sampler::ImageGridSampler;
use groupreg_core::spatial::Point;
use groupreg_core::transform::{AdvancedTransform, TransformJacobian};
use groupreg_registration::metric::{ImageSamplingContext, Metric, PcaMetric, PcaMetricConfig};
use groupreg_registration::optimizer::{LineSearchConfig, LineSearchOptimizer};
use nalgebra::{DMatrix, DVector};
use tracing_subscriber::EnvFilter;

type Backend = NdArray<f32>;

const FRAMES: usize = 5;

/// One `(x, y)` translation per frame, parameters `x0 y0 x1 y1 ...`.
struct FrameTranslation {
    geometry: ImageGeometry<3>,
    offsets: Vec<f64>,
}

impl FrameTranslation {
    fn frame(&self, point: &Point<3>) -> Option<usize> {
        let t = self.geometry.transform_physical_point_to_continuous_index(point)[2].round();
        (t >= 0.0 && t < FRAMES as f64).then_some(t as usize)
    }
}

impl AdvancedTransform<3> for FrameTranslation {
    fn number_of_parameters(&self) -> usize {
        self.offsets.len()
    }

    fn parameters(&self) -> Vec<f64> {
        self.offsets.clone()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> CoreResult<()> {
        if parameters.len() != self.offsets.len() {
            return Err(CoreError::ParameterCount {
                expected: self.offsets.len(),
                actual: parameters.len(),
            });
        }
        self.offsets.copy_from_slice(parameters);
        Ok(())
    }

    fn transform_point(&self, point: &Point<3>) -> Option<Point<3>> {
        let t = self.frame(point)?;
        Some(Point::new([
            point[0] + self.offsets[2 * t],
            point[1] + self.offsets[2 * t + 1],
            point[2],
        ]))
    }

    fn jacobian(&self, point: &Point<3>) -> TransformJacobian {
        let t = self.frame(point).unwrap_or(0);
        TransformJacobian {
            matrix: DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
            nonzero_indices: vec![2 * t, 2 * t + 1],
        }
    }
}

fn drifting_stack() -> anyhow::Result<HostImage<3>> {
    let geometry = ImageGeometry::with_size([32, 32, FRAMES])?;
    Ok(HostImage::from_fn(geometry, |[x, y, t]| {
        let cx = 14.0 + 0.8 * t as f64;
        let cy = 16.0 - 0.6 * t as f64;
        let (dx, dy) = (x as f64 - cx, y as f64 - cy);
        200.0 * (-(dx * dx + dy * dy) / 20.0).exp() + 0.5 * x as f64
    }))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let device = Default::default();
    let host = drifting_stack()?;
    let stack = Image::<Backend, 3>::from_host(&host, &device);

    // Peek at the blob centre of every frame on the device.
    let centres: Vec<f32> = (0..FRAMES)
        .flat_map(|t| [14.0, 16.0, t as f32])
        .collect();
    let points = Tensor::<Backend, 1>::from_floats(centres.as_slice(), &device).reshape([FRAMES, 3]);
    let peaks = NearestNeighborInterpolator::new().evaluate_at_physical_points(&stack, points)?;
    tracing::info!(peaks = ?peaks.into_data().to_vec::<f32>().ok(), "frame values at the first centre");

    let transform = FrameTranslation {
        geometry: stack.geometry().clone(),
        offsets: vec![0.0; 2 * FRAMES],
    };
    let context = ImageSamplingContext::from_images(
        &stack,
        &stack,
        transform,
        ImageGridSampler::new([2, 2, FRAMES]),
    )?;
    let config = PcaMetricConfig::new()
        .with_subtract_mean(true)
        .with_stack_transform(true);
    let mut metric = PcaMetric::new(context, config)?;

    let mut line_search = LineSearchOptimizer::new(LineSearchConfig::new().with_step_bounds(1e-8, 4.0))?;
    let mut position = DVector::zeros(metric.number_of_parameters());
    let (mut value, mut derivative) = metric.value_and_derivative(position.as_slice())?;
    tracing::info!(value, "initial measure");

    for iteration in 0..40 {
        line_search.start(position.clone(), -derivative.clone())?;
        let slope = line_search.directional_derivative(&derivative)?;
        if slope.abs() < 1e-10 {
            break;
        }

        let bounds = line_search.config().clone();
        let mut step = bounds.clamp_step(bounds.initial_step_length_estimate / derivative.norm());
        let mut accepted = None;
        while step > bounds.minimum_step_length {
            line_search.set_current_step_length(step);
            match metric.value_and_derivative(line_search.current_position().as_slice()) {
                Ok((candidate, gradient)) if candidate < value + 1e-4 * step * slope => {
                    accepted = Some((candidate, gradient));
                    break;
                }
                Ok(_) => step *= 0.5,
                Err(err) if err.is_recoverable() => step *= 0.5,
                Err(err) => return Err(err.into()),
            }
        }

        let Some((candidate, gradient)) = accepted else {
            tracing::info!(iteration, "no further decrease along the search line");
            break;
        };
        position = line_search.current_position().clone();
        value = candidate;
        derivative = gradient;
        tracing::info!(iteration, value, step = line_search.current_step_length(), "accepted step");
    }

    for t in 0..FRAMES {
        println!(
            "frame {}: offset ({:+.3}, {:+.3})",
            t,
            position[2 * t],
            position[2 * t + 1]
        );
    }
    Ok(())
}
