//! Removal of the across-timepoint mean from a derivative.
//!
//! Which derivative entries belong to the same control point depends on how
//! the transform lays out its parameters. Both supported layouts are explicit
//! preconditions on the caller.

use nalgebra::DVector;

use crate::error::{RegistrationError, Result};

/// Parameter layout of the transform driving the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLayout {
    /// One parameter block per timepoint: `x0y0z0.. x1y1z1.. ...`.
    ///
    /// `P / num_timepoints` parameters per timepoint; entry `c` of every
    /// block belongs to the same control point.
    Stack { num_timepoints: usize },
    /// One block per dimension, `xxxx yyyy zzzz tttt`.
    ///
    /// Each of the `dimension` blocks has `P / dimension` parameters for a
    /// grid of `P / dimension / grid_size_last_dimension` control points
    /// repeated over the last grid dimension; index `i mod` that count
    /// identifies the control point.
    DimensionBlocked {
        dimension: usize,
        grid_size_last_dimension: usize,
    },
}

impl ParameterLayout {
    /// Subtract the per-control-point mean from `derivative` in place.
    pub fn subtract_mean(&self, derivative: &mut DVector<f64>) -> Result<()> {
        let p = derivative.len();
        match *self {
            ParameterLayout::Stack { num_timepoints } => {
                let per_timepoint = checked_div(p, num_timepoints, "timepoints")?;
                let mut mean = vec![0.0; per_timepoint];
                for t in 0..num_timepoints {
                    let start = per_timepoint * t;
                    for c in start..start + per_timepoint {
                        mean[c % per_timepoint] += derivative[c];
                    }
                }
                for value in &mut mean {
                    *value /= num_timepoints as f64;
                }
                for c in 0..p {
                    derivative[c] -= mean[c % per_timepoint];
                }
            }
            ParameterLayout::DimensionBlocked {
                dimension,
                grid_size_last_dimension,
            } => {
                let per_dimension = checked_div(p, dimension, "dimension blocks")?;
                let control_points =
                    checked_div(per_dimension, grid_size_last_dimension, "last grid positions")?;
                let mut mean = vec![0.0; control_points];
                for d in 0..dimension {
                    mean.iter_mut().for_each(|m| *m = 0.0);
                    let start = per_dimension * d;
                    for i in start..start + per_dimension {
                        mean[i % control_points] += derivative[i];
                    }
                    for value in &mut mean {
                        *value /= grid_size_last_dimension as f64;
                    }
                    for i in start..start + per_dimension {
                        derivative[i] -= mean[i % control_points];
                    }
                }
            }
        }
        Ok(())
    }
}

fn checked_div(total: usize, parts: usize, what: &str) -> Result<usize> {
    if parts == 0 || total % parts != 0 || total / parts == 0 {
        return Err(RegistrationError::invalid_argument(format!(
            "{} parameters cannot be split evenly over {} {}",
            total, parts, what
        )));
    }
    Ok(total / parts)
}
