mod common;

use common::{blob_stack, central_difference, stack_metric};
use groupreg_core::image::{HostImage, ImageGeometry};
use groupreg_registration::metric::pca::ParameterLayout;
use groupreg_registration::metric::{Metric, PcaMetricConfig};
use groupreg_registration::RegistrationError;

fn stack_4d() -> HostImage<4> {
    blob_stack(
        [10, 10, 6, 3],
        &[
            vec![4.5, 4.5, 2.5],
            vec![5.0, 4.0, 2.8],
            vec![4.2, 5.1, 2.2],
        ],
    )
}

fn stack_3d() -> HostImage<3> {
    blob_stack(
        [12, 12, 3],
        &[vec![5.5, 5.5], vec![6.2, 5.0], vec![5.0, 6.0]],
    )
}

const PARAMS_4D: [f64; 9] = [0.3, -0.2, 0.15, -0.25, 0.35, 0.1, 0.2, 0.1, -0.3];
const PARAMS_3D: [f64; 6] = [0.3, -0.2, -0.15, 0.35, 0.25, 0.1];

#[test]
fn test_value_matches_value_and_derivative() {
    let mut metric = stack_metric(stack_4d(), [2, 2, 2, 3], PcaMetricConfig::new());
    let value = metric.value(&PARAMS_4D).unwrap();
    let (joint, derivative) = metric.value_and_derivative(&PARAMS_4D).unwrap();
    assert_eq!(value, joint);
    assert_eq!(derivative.len(), 9);
}

#[test]
fn test_repeated_evaluation_is_bit_identical() {
    let mut metric = stack_metric(stack_4d(), [2, 2, 2, 3], PcaMetricConfig::new());
    let (v1, d1) = metric.value_and_derivative(&PARAMS_4D).unwrap();
    let (v2, d2) = metric.value_and_derivative(&PARAMS_4D).unwrap();
    assert_eq!(v1.to_bits(), v2.to_bits());
    for (a, b) in d1.iter().zip(d2.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_number_of_pixels_counted() {
    let mut metric = stack_metric(stack_4d(), [2, 2, 2, 3], PcaMetricConfig::new());
    metric.value(&PARAMS_4D).unwrap();
    // Negative offsets push the first grid row out of the buffer for some
    // timepoint along x, y and z: 4 · 4 · 2 of 5 · 5 · 3 samples survive.
    assert_eq!(metric.number_of_pixels_counted(), 32);
}

#[test]
fn test_derivative_matches_finite_differences() {
    let mut metric = stack_metric(stack_4d(), [2, 2, 2, 3], PcaMetricConfig::new());
    let (_, derivative) = metric.value_and_derivative(&PARAMS_4D).unwrap();

    for k in 0..PARAMS_4D.len() {
        let numeric = central_difference(&mut metric, &PARAMS_4D, k, 1e-5);
        let tolerance = 1e-5 * numeric.abs().max(1.0);
        assert!(
            (derivative[k] - numeric).abs() < tolerance,
            "parameter {}: analytic {} vs numeric {}",
            k,
            derivative[k],
            numeric
        );
    }
}

#[test]
fn test_derivative_matches_finite_differences_3d() {
    let mut metric = stack_metric(stack_3d(), [1, 1, 3], PcaMetricConfig::new());
    let (_, derivative) = metric.value_and_derivative(&PARAMS_3D).unwrap();

    for k in 0..PARAMS_3D.len() {
        let numeric = central_difference(&mut metric, &PARAMS_3D, k, 1e-5);
        assert!(
            (derivative[k] - numeric).abs() < 1e-5 * numeric.abs().max(1.0),
            "parameter {}: analytic {} vs numeric {}",
            k,
            derivative[k],
            numeric
        );
    }
}

#[test]
fn test_derivative_of_mean_toggles_correction_terms() {
    let mut with_mean = stack_metric(stack_3d(), [1, 1, 3], PcaMetricConfig::new());
    let mut without_mean = stack_metric(
        stack_3d(),
        [1, 1, 3],
        PcaMetricConfig::new().with_derivative_of_mean(false),
    );

    let (_, off) = without_mean.gradient_terms(&PARAMS_3D).unwrap();
    assert!(off.mean_covariance_trace.iter().all(|&v| v == 0.0));
    assert!(off.mean_scale_trace.iter().all(|&v| v == 0.0));

    let (_, on) = with_mean.gradient_terms(&PARAMS_3D).unwrap();
    assert_eq!(on.covariance_trace, off.covariance_trace);
    assert_eq!(on.scale_trace, off.scale_trace);
    assert!(on.mean_image_jacobian.iter().any(|&v| v != 0.0));

    // The centred data has zero column sums, so the correction only moves
    // the derivative by rounding.
    let d_on = on.combine();
    let d_off = off.combine();
    for (a, b) in d_on.iter().zip(d_off.iter()) {
        assert!((a - b).abs() < 1e-8 * b.abs().max(1.0));
    }
}

#[test]
fn test_subtract_mean_stack_layout() {
    let mut plain = stack_metric(stack_4d(), [2, 2, 2, 3], PcaMetricConfig::new());
    let mut centred = stack_metric(
        stack_4d(),
        [2, 2, 2, 3],
        PcaMetricConfig::new()
            .with_subtract_mean(true)
            .with_stack_transform(true),
    );
    assert_eq!(
        centred.parameter_layout(),
        ParameterLayout::Stack { num_timepoints: 3 }
    );

    let (_, mut expected) = plain.value_and_derivative(&PARAMS_4D).unwrap();
    ParameterLayout::Stack { num_timepoints: 3 }
        .subtract_mean(&mut expected)
        .unwrap();
    let (_, derivative) = centred.value_and_derivative(&PARAMS_4D).unwrap();
    assert_eq!(derivative, expected);

    // Each spatial component averages to zero over the timepoints.
    for axis in 0..3 {
        let sum: f64 = (0..3).map(|t| derivative[t * 3 + axis]).sum();
        assert!(sum.abs() < 1e-10);
    }
}

#[test]
fn test_subtract_mean_blocked_layout() {
    let config = PcaMetricConfig::new()
        .with_subtract_mean(true)
        .with_grid_size_last_dimension(2);
    let mut plain = stack_metric(stack_3d(), [1, 1, 3], PcaMetricConfig::new());
    let mut centred = stack_metric(stack_3d(), [1, 1, 3], config);

    let (_, mut expected) = plain.value_and_derivative(&PARAMS_3D).unwrap();
    let layout = ParameterLayout::DimensionBlocked {
        dimension: 3,
        grid_size_last_dimension: 2,
    };
    assert_eq!(centred.parameter_layout(), layout);
    layout.subtract_mean(&mut expected).unwrap();

    let (_, derivative) = centred.value_and_derivative(&PARAMS_3D).unwrap();
    assert_eq!(derivative, expected);
    // Blocks of two: entries (0, 1), (2, 3), (4, 5) become ± pairs.
    for block in 0..3 {
        assert!((derivative[2 * block] + derivative[2 * block + 1]).abs() < 1e-10);
    }
}

#[test]
fn test_subtract_mean_rejects_incompatible_layout() {
    // 9 stack parameters cannot be split into 4 dimension blocks.
    let config = PcaMetricConfig::new()
        .with_subtract_mean(true)
        .with_grid_size_last_dimension(3);
    let mut metric = stack_metric(stack_4d(), [2, 2, 2, 3], config);
    assert!(matches!(
        metric.value_and_derivative(&PARAMS_4D),
        Err(RegistrationError::InvalidArgument(_))
    ));
}

#[test]
fn test_single_sample_is_degenerate() {
    let mut metric = stack_metric(stack_3d(), [12, 12, 3], PcaMetricConfig::new());
    assert!(matches!(
        metric.value(&[0.0; 6]),
        Err(RegistrationError::DegenerateSample(_))
    ));
}

#[test]
fn test_constant_timepoint_is_degenerate() {
    // 0.1 has no exact binary value, so its column mean carries rounding.
    for level in [7.0, 0.1, 3.3] {
        let geometry = ImageGeometry::<3>::with_size([8, 8, 3]).unwrap();
        let stack = HostImage::from_fn(geometry, |[x, y, t]| {
            if t == 1 {
                level
            } else {
                (x * y + t) as f64
            }
        });
        let mut metric = stack_metric(stack, [1, 1, 3], PcaMetricConfig::new());
        assert!(
            matches!(
                metric.value(&[0.0; 6]),
                Err(RegistrationError::DegenerateSample(_))
            ),
            "constant level {} was accepted",
            level
        );
    }
}

#[test]
fn test_stack_moved_outside_reports_insufficient_samples() {
    let mut metric = stack_metric(stack_3d(), [1, 1, 3], PcaMetricConfig::new());
    let err = metric
        .value(&[50.0, 0.0, 0.0, 0.0, 0.0, 0.0])
        .unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(err, RegistrationError::InsufficientSamples { valid: 0, .. }));
}

#[test]
fn test_pixel_count_updated_when_samples_are_insufficient() {
    let mut metric = stack_metric(stack_3d(), [1, 1, 3], PcaMetricConfig::new());
    metric.value(&[0.0; 6]).unwrap();
    assert_eq!(metric.number_of_pixels_counted(), 144);

    let err = metric
        .value(&[50.0, 0.0, 0.0, 0.0, 0.0, 0.0])
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InsufficientSamples { .. }));
    assert_eq!(metric.number_of_pixels_counted(), 0);
}

#[test]
fn test_random_timepoints_reproducible_by_seed() {
    let stack = blob_stack(
        [10, 10, 6],
        &(0..6)
            .map(|t| vec![4.5 + 0.2 * t as f64, 4.5 - 0.1 * t as f64])
            .collect::<Vec<_>>(),
    );
    let config = PcaMetricConfig::new()
        .with_random_timepoints(3)
        .with_fixed_reference(0, 1)
        .with_seed(42);
    let mut a = stack_metric(stack.clone(), [1, 1, 6], config.clone());
    let mut b = stack_metric(stack, [1, 1, 6], config);

    let params = vec![0.1; 12];
    for _ in 0..4 {
        let (va, da) = a.value_and_derivative(&params).unwrap();
        let (vb, db) = b.value_and_derivative(&params).unwrap();
        assert_eq!(va, vb);
        assert_eq!(da, db);
    }
}

#[test]
fn test_random_draw_count_is_clamped() {
    let config = PcaMetricConfig::new().with_random_timepoints(10);
    let metric = stack_metric(stack_3d(), [1, 1, 3], config);
    assert_eq!(metric.config().num_samples_last_dimension, 2);
}

#[test]
fn test_aligned_stack_scores_lower() {
    // Each timepoint's blob moved back onto timepoint 0 by the inverse offsets.
    let centres = [vec![5.0, 5.0], vec![6.0, 5.0], vec![5.0, 6.0]];
    let stack = blob_stack([12, 12, 3], &centres);
    let mut metric = stack_metric(stack, [1, 1, 3], PcaMetricConfig::new());

    let misaligned = metric.value(&[0.0; 6]).unwrap();
    let aligned = metric.value(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).unwrap();
    assert!(aligned < misaligned, "{} !< {}", aligned, misaligned);
}
