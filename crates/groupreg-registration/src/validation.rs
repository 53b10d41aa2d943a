//! Validation utilities: sample-count policy and explicit numeric guards.

use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};

/// Minimum fraction of drawn samples that must be usable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleCountPolicy {
    /// A metric evaluation fails when fewer than
    /// `required_ratio_of_valid_samples * drawn` samples are valid.
    pub required_ratio_of_valid_samples: f64,
}

impl Default for SampleCountPolicy {
    fn default() -> Self {
        Self {
            required_ratio_of_valid_samples: 0.25,
        }
    }
}

impl SampleCountPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the required ratio.
    pub fn with_required_ratio(mut self, ratio: f64) -> Self {
        self.required_ratio_of_valid_samples = ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ratio = self.required_ratio_of_valid_samples;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(RegistrationError::invalid_configuration(format!(
                "required ratio of valid samples must be in [0, 1], got {}",
                ratio
            )));
        }
        Ok(())
    }

    /// Fail with `InsufficientSamples` when `valid` is below the policy, or zero.
    pub fn check(&self, total: usize, valid: usize) -> Result<()> {
        let required = self.required_ratio_of_valid_samples * total as f64;
        if valid == 0 || (valid as f64) < required {
            tracing::warn!(
                valid,
                total,
                required_ratio = self.required_ratio_of_valid_samples,
                "too many samples map outside the moving image buffer"
            );
            return Err(RegistrationError::InsufficientSamples {
                valid,
                total,
                required_ratio: self.required_ratio_of_valid_samples,
            });
        }
        Ok(())
    }
}

/// Check that a parameter vector has the expected length.
pub fn validate_parameters(parameters: &[f64], expected: usize) -> Result<()> {
    if parameters.len() != expected {
        return Err(RegistrationError::dimension_mismatch(format!(
            "expected {} transform parameters, got {}",
            expected,
            parameters.len()
        )));
    }
    Ok(())
}

/// Reject non-finite intermediate values.
pub fn ensure_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RegistrationError::degenerate_sample(format!(
            "{} is not finite ({})",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_policy_default() {
        let policy = SampleCountPolicy::default();
        assert_eq!(policy.required_ratio_of_valid_samples, 0.25);
        assert!(policy.check(100, 25).is_ok());
        assert!(matches!(
            policy.check(100, 24),
            Err(RegistrationError::InsufficientSamples { valid: 24, total: 100, .. })
        ));
    }

    #[test]
    fn test_sample_policy_zero_valid_always_fails() {
        let policy = SampleCountPolicy::new().with_required_ratio(0.0);
        assert!(policy.check(0, 0).is_err());
        assert!(policy.check(10, 1).is_ok());
    }

    #[test]
    fn test_sample_policy_validate() {
        assert!(SampleCountPolicy::new().with_required_ratio(1.5).validate().is_err());
        assert!(SampleCountPolicy::new().with_required_ratio(1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_parameters() {
        assert!(validate_parameters(&[0.0; 3], 3).is_ok());
        assert!(matches!(
            validate_parameters(&[0.0; 2], 3),
            Err(RegistrationError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite("x", 2.0), Ok(2.0));
        assert!(ensure_finite("x", f64::NAN).is_err());
        assert!(ensure_finite("x", f64::INFINITY).is_err());
    }
}
