//! Pass 2: analytic derivative of the weighted-eigenvalue measure.
//!
//! With `V` the eigenvectors in descending eigenvalue order, the derivative
//! of `Σ_z z·λ_z` is assembled from two traces per parameter:
//!
//! * `Σ z·(VᵀS·Ammᵀ)_{z,i} · ∂A_{i,d}/∂μ · (S·V)_{d,z}`, the sensitivity of
//!   the covariance, and
//! * `Σ z·(Vᵀ·(−S³))_{z,d} · Amm_{i,d} · ∂A_{i,d}/∂μ · (C·S·V)_{d,z}`, the
//!   sensitivity of the whitening scale,
//!
//! each optionally corrected for the derivative of the column means, then
//! scaled by `2/(N − 1)`. Weight `z` instead of `z + 1` is exact: the trace
//! of a correlation matrix is constant.

use groupreg_core::spatial::Point;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use super::data_matrix::point_at_timepoint;
use super::measure::PcaStatistics;
use crate::error::{RegistrationError, Result};
use crate::metric::context::{transform_jacobian_inner_product, SamplingContext};
use crate::metric::SAMPLES_PER_CHUNK;

/// Products of the eigenvectors with `S`, `C` and `Amm` shared by every
/// sample of pass 2.
#[derive(Debug, Clone)]
pub struct EigenProjections {
    /// `VᵀS·Ammᵀ`, `G × N`.
    pub v_s_atmm: DMatrix<f64>,
    /// `C·S·V`, `G × G`.
    pub c_s_v: DMatrix<f64>,
    /// `S·V`, `G × G`.
    pub s_v: DMatrix<f64>,
    /// `Vᵀ·(−S³)`, `G × G`.
    pub v_dsdmu: DMatrix<f64>,
}

impl EigenProjections {
    pub fn new(stats: &PcaStatistics) -> Self {
        let v = stats.descending_eigenvectors();
        let s = DMatrix::from_diagonal(&stats.inverse_std);
        let neg_s_cubed = DMatrix::from_diagonal(&stats.inverse_std.map(|s| -s * s * s));
        let vt = v.transpose();

        Self {
            v_s_atmm: &vt * &s * stats.centered.transpose(),
            c_s_v: &stats.covariance * &s * &v,
            s_v: &s * &v,
            v_dsdmu: &vt * neg_s_cubed,
        }
    }

    /// Eigen-weighted factors multiplying `∂A_{i,d}/∂μ` in the covariance and
    /// the scale trace.
    pub fn pixel_weights(&self, i: usize, d: usize, centered: f64) -> (f64, f64) {
        let g = self.s_v.ncols();
        let mut covariance_weight = 0.0;
        let mut scale_weight = 0.0;
        for z in 1..g {
            let w = z as f64;
            covariance_weight += w * self.v_s_atmm[(z, i)] * self.s_v[(d, z)];
            scale_weight += w * self.v_dsdmu[(z, d)] * centered * self.c_s_v[(d, z)];
        }
        (covariance_weight, scale_weight)
    }
}

/// The trace vectors of one derivative evaluation, before scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTerms {
    pub covariance_trace: DVector<f64>,
    pub scale_trace: DVector<f64>,
    /// Zero unless the mean correction is enabled.
    pub mean_covariance_trace: DVector<f64>,
    /// Zero unless the mean correction is enabled.
    pub mean_scale_trace: DVector<f64>,
    /// `Σ_i Σ_d ∂A_{i,d}/∂μ / N`.
    pub mean_image_jacobian: DVector<f64>,
    pub number_of_samples: usize,
}

impl GradientTerms {
    /// `2/(N − 1) · ((scale − mean scale) + (covariance − mean covariance))`.
    pub fn combine(&self) -> DVector<f64> {
        let scale = 2.0 / (self.number_of_samples as f64 - 1.0);
        ((&self.scale_trace - &self.mean_scale_trace)
            + (&self.covariance_trace - &self.mean_covariance_trace))
            * scale
    }
}

#[derive(Debug, Clone)]
struct Partial {
    covariance_trace: Vec<f64>,
    scale_trace: Vec<f64>,
    image_jacobian_sum: Vec<f64>,
}

impl Partial {
    fn new(p: usize) -> Self {
        Self {
            covariance_trace: vec![0.0; p],
            scale_trace: vec![0.0; p],
            image_jacobian_sum: vec![0.0; p],
        }
    }

    fn merge(mut self, other: Partial) -> Self {
        let pairs = [
            (&mut self.covariance_trace, other.covariance_trace),
            (&mut self.scale_trace, other.scale_trace),
            (&mut self.image_jacobian_sum, other.image_jacobian_sum),
        ];
        for (into, from) in pairs {
            for (a, b) in into.iter_mut().zip(from) {
                *a += b;
            }
        }
        self
    }
}

/// Accumulate the derivative traces over the accepted samples of pass 1.
///
/// `points` and `timepoints` must be the accepted rows and the columns the
/// statistics were computed from.
pub fn compute_gradient_terms<const D: usize, C: SamplingContext<D>>(
    context: &C,
    stats: &PcaStatistics,
    points: &[Point<D>],
    timepoints: &[usize],
    use_derivative_of_mean: bool,
) -> Result<GradientTerms> {
    let n = stats.number_of_samples();
    let g = stats.number_of_timepoints();
    if points.len() != n || timepoints.len() != g {
        return Err(RegistrationError::dimension_mismatch(format!(
            "statistics are {}×{}, got {} points and {} timepoints",
            n,
            g,
            points.len(),
            timepoints.len()
        )));
    }

    let p = context.number_of_parameters();
    let projections = EigenProjections::new(stats);
    let geometry = context.fixed_geometry();

    let partials: Vec<Partial> = points
        .par_chunks(SAMPLES_PER_CHUNK)
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let mut partial = Partial::new(p);
            for (offset, point) in chunk.iter().enumerate() {
                let i = chunk_index * SAMPLES_PER_CHUNK + offset;
                for (d, &t) in timepoints.iter().enumerate() {
                    let fixed_point = point_at_timepoint(geometry, point, t);
                    let (_, gradient) = context
                        .transform_point(&fixed_point)
                        .and_then(|mapped| context.evaluate_moving_value_and_derivative(&mapped))
                        .ok_or_else(|| {
                            RegistrationError::degenerate_sample(format!(
                                "accepted sample {} left the moving image at timepoint {}",
                                i, t
                            ))
                        })?;

                    let jacobian = context.evaluate_transform_jacobian(&fixed_point);
                    let image_jacobian = transform_jacobian_inner_product(&jacobian, &gradient);
                    let (covariance_weight, scale_weight) =
                        projections.pixel_weights(i, d, stats.centered[(i, d)]);

                    for (k, &mu) in jacobian.nonzero_indices.iter().enumerate() {
                        let dm = image_jacobian[k];
                        partial.image_jacobian_sum[mu] += dm;
                        partial.covariance_trace[mu] += covariance_weight * dm;
                        partial.scale_trace[mu] += scale_weight * dm;
                    }
                }
            }
            Ok(partial)
        })
        .collect::<Result<Vec<_>>>()?;

    let total = partials.into_iter().fold(Partial::new(p), Partial::merge);
    let mean_image_jacobian = DVector::from_vec(total.image_jacobian_sum) / n as f64;

    let (mean_covariance_trace, mean_scale_trace) = if use_derivative_of_mean {
        // The correction multiplies the mean image Jacobian by the weights
        // summed over every sample and timepoint.
        let mut covariance_total = 0.0;
        let mut scale_total = 0.0;
        for i in 0..n {
            for d in 0..g {
                let (cw, sw) = projections.pixel_weights(i, d, stats.centered[(i, d)]);
                covariance_total += cw;
                scale_total += sw;
            }
        }
        (
            &mean_image_jacobian * covariance_total,
            &mean_image_jacobian * scale_total,
        )
    } else {
        (DVector::zeros(p), DVector::zeros(p))
    };

    Ok(GradientTerms {
        covariance_trace: DVector::from_vec(total.covariance_trace),
        scale_trace: DVector::from_vec(total.scale_trace),
        mean_covariance_trace,
        mean_scale_trace,
        mean_image_jacobian,
        number_of_samples: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> PcaStatistics {
        let data = DMatrix::from_row_slice(
            5,
            3,
            &[
                1.0, 2.0, 0.5, //
                2.0, 1.0, 0.1, //
                0.0, 3.0, 0.9, //
                4.0, 2.5, 0.3, //
                3.0, 0.5, 0.7,
            ],
        );
        PcaStatistics::compute(&data).unwrap()
    }

    #[test]
    fn test_projection_shapes() {
        let projections = EigenProjections::new(&stats());
        assert_eq!(projections.v_s_atmm.shape(), (3, 5));
        assert_eq!(projections.c_s_v.shape(), (3, 3));
        assert_eq!(projections.s_v.shape(), (3, 3));
        assert_eq!(projections.v_dsdmu.shape(), (3, 3));
    }

    #[test]
    fn test_weights_sum_to_zero_over_samples() {
        // Amm has zero column sums, so the mean correction vanishes
        // analytically for every timepoint.
        let stats = stats();
        let projections = EigenProjections::new(&stats);
        for d in 0..3 {
            let (mut cw, mut sw) = (0.0, 0.0);
            for i in 0..5 {
                let (a, b) = projections.pixel_weights(i, d, stats.centered[(i, d)]);
                cw += a;
                sw += b;
            }
            assert!(cw.abs() < 1e-10);
            assert!(sw.abs() < 1e-10);
        }
    }

    #[test]
    fn test_combine_scales_by_sample_count() {
        let terms = GradientTerms {
            covariance_trace: DVector::from_vec(vec![1.0, 2.0]),
            scale_trace: DVector::from_vec(vec![3.0, 4.0]),
            mean_covariance_trace: DVector::from_vec(vec![0.5, 0.0]),
            mean_scale_trace: DVector::from_vec(vec![0.0, 1.0]),
            mean_image_jacobian: DVector::zeros(2),
            number_of_samples: 5,
        };
        let derivative = terms.combine();
        assert!((derivative[0] - 0.5 * 3.5).abs() < 1e-12);
        assert!((derivative[1] - 0.5 * 5.0).abs() < 1e-12);
    }
}
