//! Weighted-eigenvalue measure of the timepoint correlation matrix.
//!
//! For a data matrix `A` (`N` samples × `G` timepoints):
//!
//! 1. `mean_j = Σ_i A_ij / N`
//! 2. `Amm = A − mean` (row broadcast)
//! 3. `C = Ammᵀ·Amm / (N − 1)`
//! 4. `S_jj = 1 / √C_jj`
//! 5. `K = S·C·S`
//! 6. eigenvalues of `K`, ascending, with unit eigenvectors
//! 7. `measure = Σ_i (i + 1)·λ_{G−1−i}`
//!
//! The largest eigenvalue gets weight 1 and the smallest weight `G`.
//! Division by `N − 1` and by `√C_jj` are guarded explicitly: a column whose
//! variance is zero up to rounding is a degenerate sample.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::error::{RegistrationError, Result};

/// Everything pass 1 derives from the data matrix.
#[derive(Debug, Clone)]
pub struct PcaStatistics {
    /// Column means.
    pub mean: DVector<f64>,
    /// `Amm`, `N × G`.
    pub centered: DMatrix<f64>,
    /// `C`, `G × G`.
    pub covariance: DMatrix<f64>,
    /// Diagonal of `S`.
    pub inverse_std: DVector<f64>,
    /// `K`, `G × G`.
    pub correlation: DMatrix<f64>,
    /// Ascending.
    pub eigenvalues: DVector<f64>,
    /// Unit columns in the order of `eigenvalues`.
    pub eigenvectors: DMatrix<f64>,
    pub measure: f64,
}

impl PcaStatistics {
    pub fn compute(data: &DMatrix<f64>) -> Result<Self> {
        let (n, g) = data.shape();
        if g == 0 {
            return Err(RegistrationError::degenerate_sample("no timepoints were evaluated"));
        }
        if n < 2 {
            return Err(RegistrationError::degenerate_sample(format!(
                "{} accepted sample(s); the covariance needs at least 2",
                n
            )));
        }

        let mut mean = DVector::zeros(g);
        for i in 0..n {
            for j in 0..g {
                mean[j] += data[(i, j)];
            }
        }
        mean /= n as f64;

        let centered = DMatrix::from_fn(n, g, |i, j| data[(i, j)] - mean[j]);

        let mut covariance = centered.transpose() * &centered;
        covariance /= n as f64 - 1.0;

        let mut inverse_std = DVector::zeros(g);
        for j in 0..g {
            let variance = covariance[(j, j)];
            let column = data.column(j);
            let constant = column.iter().all(|&v| v == column[0]);
            // Rounding in the mean leaves a residue of order eps²·mean² on a
            // constant column.
            let floor = f64::EPSILON * (mean[j] * mean[j]).max(1.0);
            if constant || !(variance > floor && variance.is_finite()) {
                return Err(RegistrationError::degenerate_sample(format!(
                    "timepoint column {} has variance {}",
                    j, variance
                )));
            }
            inverse_std[j] = 1.0 / variance.sqrt();
        }

        let correlation =
            DMatrix::from_fn(g, g, |i, j| inverse_std[i] * covariance[(i, j)] * inverse_std[j]);

        let (eigenvalues, eigenvectors) = sorted_eigen(correlation.clone())?;
        let measure = weighted_eigenvalue_sum(&eigenvalues);

        Ok(Self {
            mean,
            centered,
            covariance,
            inverse_std,
            correlation,
            eigenvalues,
            eigenvectors,
            measure,
        })
    }

    pub fn number_of_samples(&self) -> usize {
        self.centered.nrows()
    }

    pub fn number_of_timepoints(&self) -> usize {
        self.centered.ncols()
    }

    /// Eigenvector matrix with column `z` belonging to the `z`-th largest
    /// eigenvalue.
    pub fn descending_eigenvectors(&self) -> DMatrix<f64> {
        let g = self.number_of_timepoints();
        let mut v = DMatrix::zeros(g, g);
        for z in 0..g {
            let column = self.eigenvectors.column(g - 1 - z);
            v.set_column(z, &column.normalize());
        }
        v
    }
}

/// `Σ_i (i + 1)·λ_{G−1−i}` for ascending `eigenvalues`.
pub fn weighted_eigenvalue_sum(eigenvalues: &DVector<f64>) -> f64 {
    let g = eigenvalues.len();
    (0..g).map(|i| (i + 1) as f64 * eigenvalues[g - 1 - i]).sum()
}

/// Symmetric eigendecomposition with eigenvalues sorted ascending.
fn sorted_eigen(matrix: DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let eigen = SymmetricEigen::new(matrix);
    if eigen.eigenvalues.iter().any(|v| !v.is_finite()) {
        return Err(RegistrationError::degenerate_sample(
            "correlation matrix has non-finite eigenvalues",
        ));
    }

    let g = eigen.eigenvalues.len();
    let mut order: Vec<usize> = (0..g).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    let eigenvalues = DVector::from_iterator(g, order.iter().map(|&k| eigen.eigenvalues[k]));
    let mut eigenvectors = DMatrix::zeros(g, g);
    for (column, &k) in order.iter().enumerate() {
        eigenvectors.set_column(column, &eigen.eigenvectors.column(k).normalize());
    }
    Ok((eigenvalues, eigenvectors))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    #[test]
    fn test_two_correlated_one_independent() {
        // Columns 0 and 1 are perfectly correlated, column 2 is uncorrelated
        // with both: K has eigenvalues {0, 1, 2}, measure = 1·2 + 2·1 + 3·0.
        let data = DMatrix::from_row_slice(
            4,
            3,
            &[
                1.0, 2.0, 1.0, //
                2.0, 4.0, -1.0, //
                3.0, 6.0, -1.0, //
                4.0, 8.0, 1.0,
            ],
        );
        let stats = PcaStatistics::compute(&data).unwrap();
        assert!((stats.eigenvalues[0] - 0.0).abs() < EPS);
        assert!((stats.eigenvalues[1] - 1.0).abs() < EPS);
        assert!((stats.eigenvalues[2] - 2.0).abs() < EPS);
        assert!((stats.measure - 4.0).abs() < EPS);
    }

    #[test]
    fn test_uncorrelated_columns() {
        let data = DMatrix::from_row_slice(
            4,
            2,
            &[
                1.0, 1.0, //
                -1.0, 1.0, //
                1.0, -1.0, //
                -1.0, -1.0,
            ],
        );
        let stats = PcaStatistics::compute(&data).unwrap();
        assert!((stats.measure - 3.0).abs() < EPS);
        assert!((stats.correlation[(0, 1)]).abs() < EPS);
    }

    #[test]
    fn test_statistics_intermediates() {
        let data = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 2.0, 3.0, 7.0]);
        let stats = PcaStatistics::compute(&data).unwrap();
        assert!((stats.mean[0] - 2.0).abs() < EPS);
        assert!((stats.mean[1] - 3.0).abs() < EPS);
        assert!((stats.covariance[(0, 0)] - 1.0).abs() < EPS);
        assert!((stats.covariance[(1, 1)] - 13.0).abs() < EPS);
        assert!((stats.correlation[(0, 0)] - 1.0).abs() < EPS);
        assert!((stats.correlation[(1, 1)] - 1.0).abs() < EPS);
    }

    #[test]
    fn test_single_row_is_degenerate() {
        let data = DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 3.0]);
        assert!(matches!(
            PcaStatistics::compute(&data),
            Err(RegistrationError::DegenerateSample(_))
        ));
    }

    #[test]
    fn test_constant_column_is_degenerate() {
        let data = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0]);
        assert!(matches!(
            PcaStatistics::compute(&data),
            Err(RegistrationError::DegenerateSample(_))
        ));
    }

    #[test]
    fn test_inexact_constant_column_is_degenerate() {
        for c in [0.1, 0.7, 3.3, 1.1, 100.3] {
            let data = DMatrix::from_row_slice(3, 2, &[1.0, c, 2.0, c, 4.0, c]);
            assert!(
                matches!(
                    PcaStatistics::compute(&data),
                    Err(RegistrationError::DegenerateSample(_))
                ),
                "constant column {} was accepted",
                c
            );
        }
    }

    #[test]
    fn test_nearly_constant_column_is_degenerate() {
        let data = DMatrix::from_row_slice(3, 2, &[1.0, 0.3, 2.0, 0.3 + 1e-16, 4.0, 0.3]);
        assert!(matches!(
            PcaStatistics::compute(&data),
            Err(RegistrationError::DegenerateSample(_))
        ));
    }

    #[test]
    fn test_eigen_pairs_sorted_and_unit() {
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
        let stats = PcaStatistics::compute(&data).unwrap();
        for z in 1..3 {
            assert!(stats.eigenvalues[z - 1] <= stats.eigenvalues[z]);
        }
        for z in 0..3 {
            let v = stats.eigenvectors.column(z);
            assert!((v.norm() - 1.0).abs() < EPS);
            let kv = &stats.correlation * v;
            assert!((kv - v * stats.eigenvalues[z]).norm() < 1e-9);
        }
        let descending = stats.descending_eigenvectors();
        assert!((descending.column(0) - stats.eigenvectors.column(2)).norm() < EPS);
    }

    #[test]
    fn test_weighted_sum() {
        let eigenvalues = DVector::from_vec(vec![0.5, 1.0, 1.5]);
        assert!((weighted_eigenvalue_sum(&eigenvalues) - (1.5 + 2.0 + 1.5)).abs() < EPS);
    }
}
