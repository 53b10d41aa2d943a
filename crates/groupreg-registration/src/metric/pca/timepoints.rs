//! Selection of the timepoints evaluated per metric call.

use rand::Rng;

use super::config::PcaMetricConfig;
use crate::error::{RegistrationError, Result};

/// Draw `n` distinct timepoints from the closed range `[0, m]`.
///
/// The result starts with `repeats` copies of `reference`, followed by the
/// `n` draws in the order they were made. A draw equal to any value already
/// in the list, the prefix included, is rejected and redrawn. Rejection gets
/// slow when `n` approaches `m`.
///
/// `n > m` is rejected with `InvalidArgument`: with `n ≤ m` the closed range
/// always holds enough unused values, prefix included.
pub fn sample_random<R: Rng + ?Sized>(
    n: usize,
    m: usize,
    reference: usize,
    repeats: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if n > m {
        return Err(RegistrationError::invalid_argument(format!(
            "cannot draw {} distinct timepoints from [0, {}]",
            n, m
        )));
    }

    let mut numbers = Vec::with_capacity(repeats + n);
    numbers.extend(std::iter::repeat(reference).take(repeats));

    let mut drawn = 0;
    while drawn < n {
        let candidate = rng.random_range(0..=m);
        if !numbers.contains(&candidate) {
            numbers.push(candidate);
            drawn += 1;
        }
    }
    Ok(numbers)
}

/// Timepoints for one evaluation: `0..last_dimension_size`, or a random
/// selection over the valid timepoint indices.
pub fn select_timepoints<R: Rng + ?Sized>(
    config: &PcaMetricConfig,
    last_dimension_size: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if !config.sample_last_dimension_randomly {
        return Ok((0..last_dimension_size).collect());
    }
    sample_random(
        config.num_samples_last_dimension,
        last_dimension_size.saturating_sub(1),
        config.reduced_dimension_index,
        config.num_additional_samples_fixed,
        rng,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_prefix_then_distinct_draws() {
        let mut rng = StdRng::seed_from_u64(3);
        let numbers = sample_random(4, 9, 2, 3, &mut rng).unwrap();
        assert_eq!(numbers.len(), 7);
        assert_eq!(&numbers[..3], &[2, 2, 2]);
        let draws = &numbers[3..];
        for (i, a) in draws.iter().enumerate() {
            assert!(*a <= 9);
            assert_ne!(*a, 2);
            assert!(draws[i + 1..].iter().all(|b| b != a));
        }
    }

    #[test]
    fn test_upper_bound_is_reachable() {
        let mut rng = StdRng::seed_from_u64(11);
        let hit = (0..50).any(|_| sample_random(4, 4, 0, 0, &mut rng).unwrap().contains(&4));
        assert!(hit);
        let full = sample_random(4, 4, 0, 1, &mut rng).unwrap();
        let mut sorted = full[1..].to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_more_draws_than_range() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            sample_random(6, 5, 0, 0, &mut rng),
            Err(RegistrationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_select_all_timepoints() {
        let mut rng = StdRng::seed_from_u64(0);
        let all = select_timepoints(&PcaMetricConfig::new(), 5, &mut rng).unwrap();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_select_random_timepoints_stay_valid() {
        let config = PcaMetricConfig::new()
            .with_random_timepoints(3)
            .with_fixed_reference(1, 1);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let selection = select_timepoints(&config, 5, &mut rng).unwrap();
            assert_eq!(selection.len(), 4);
            assert_eq!(selection[0], 1);
            assert!(selection.iter().all(|&t| t < 5));
        }
    }

    proptest! {
        #[test]
        fn prop_same_seed_same_sequence(seed in any::<u64>(), n in 1usize..8, extra in 0usize..8) {
            let m = n + extra;
            let a = sample_random(n, m, 0, 1, &mut StdRng::seed_from_u64(seed)).unwrap();
            let b = sample_random(n, m, 0, 1, &mut StdRng::seed_from_u64(seed)).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
