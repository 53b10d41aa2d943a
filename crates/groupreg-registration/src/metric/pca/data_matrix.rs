//! Pass 1: the sample-by-timepoint intensity matrix.

use groupreg_core::image::ImageGeometry;
use groupreg_core::sampler::ImageSample;
use groupreg_core::spatial::Point;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::metric::context::SamplingContext;

/// Moving intensities of the accepted samples at every selected timepoint.
#[derive(Debug, Clone)]
pub struct SampleMatrix<const D: usize> {
    /// `N × G`, rows in sample order.
    pub matrix: DMatrix<f64>,
    /// Fixed points of the accepted rows, reused by the gradient pass.
    pub accepted_points: Vec<Point<D>>,
    /// Samples drawn before rejection.
    pub number_of_samples: usize,
}

impl<const D: usize> SampleMatrix<D> {
    /// Accepted rows, `N`.
    pub fn number_of_rows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Evaluated timepoints, `G`.
    pub fn number_of_timepoints(&self) -> usize {
        self.matrix.ncols()
    }
}

/// `point` moved along the last axis of `geometry` onto `timepoint`.
pub fn point_at_timepoint<const D: usize>(
    geometry: &ImageGeometry<D>,
    point: &Point<D>,
    timepoint: usize,
) -> Point<D> {
    let mut cindex = geometry.transform_physical_point_to_continuous_index(point);
    cindex[D - 1] = timepoint as f64;
    geometry.transform_continuous_index_to_physical_point(&cindex)
}

/// Moving values of one sample at every timepoint, or `None` as soon as one
/// timepoint fails.
fn evaluate_row<const D: usize, C: SamplingContext<D>>(
    context: &C,
    point: &Point<D>,
    timepoints: &[usize],
) -> Option<Vec<f64>> {
    let geometry = context.fixed_geometry();
    timepoints
        .iter()
        .map(|&t| {
            let fixed_point = point_at_timepoint(geometry, point, t);
            let mapped = context.transform_point(&fixed_point)?;
            if !context.is_inside_moving_mask(&mapped) {
                return None;
            }
            context.evaluate_moving_value(&mapped)
        })
        .collect()
}

/// Build the data matrix for `samples` at `timepoints`.
///
/// A row is kept only when every timepoint maps inside the transform
/// support, the moving mask and the moving buffer. Rows are evaluated in
/// parallel and kept in sample order. The caller applies the sample-count
/// policy to the result.
pub fn build_sample_matrix<const D: usize, C: SamplingContext<D>>(
    context: &C,
    samples: &[ImageSample<D>],
    timepoints: &[usize],
) -> SampleMatrix<D> {
    let rows: Vec<Option<Vec<f64>>> = samples
        .par_iter()
        .map(|sample| evaluate_row(context, &sample.point, timepoints))
        .collect();

    let g = timepoints.len();
    let mut values = Vec::with_capacity(rows.len() * g);
    let mut accepted_points = Vec::new();
    for (sample, row) in samples.iter().zip(rows) {
        if let Some(row) = row {
            values.extend(row);
            accepted_points.push(sample.point);
        }
    }

    let n = accepted_points.len();
    tracing::trace!(samples = samples.len(), accepted = n, timepoints = g, "built sample matrix");

    SampleMatrix {
        matrix: DMatrix::from_row_slice(n, g, &values),
        accepted_points,
        number_of_samples: samples.len(),
    }
}
