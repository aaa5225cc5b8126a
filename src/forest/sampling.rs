//! Instance and feature subsampling for tree growth.
//!
//! Both samplers take the RNG by reference so each tree's deterministic
//! stream drives every random decision made while growing it.

use rand::Rng;

/// Draw a bootstrap sample of instance indices, with replacement.
///
/// `count == 0` means no resampling: every instance appears exactly once.
pub fn bootstrap_indices<R: Rng>(rng: &mut R, num_instances: usize, count: usize) -> Vec<u32> {
    if count == 0 {
        return (0..num_instances as u32).collect();
    }
    (0..count)
        .map(|_| rng.gen_range(0..num_instances) as u32)
        .collect()
}

/// Choose `count` distinct feature indices via partial Fisher-Yates.
///
/// `count` is clamped to `feature_dim`; the returned order is the shuffle
/// order, not ascending.
pub fn sample_features<R: Rng>(rng: &mut R, feature_dim: usize, count: usize) -> Vec<u32> {
    let count = count.min(feature_dim);
    let mut indices: Vec<u32> = (0..feature_dim as u32).collect();
    for i in 0..count {
        let j = rng.gen_range(i..feature_dim);
        indices.swap(i, j);
    }
    indices.truncate(count);
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    #[test]
    fn test_bootstrap_zero_count_keeps_every_instance() {
        let indices = bootstrap_indices(&mut rng(1), 5, 0);
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_bootstrap_draws_requested_count_in_range() {
        let indices = bootstrap_indices(&mut rng(2), 10, 25);
        assert_eq!(indices.len(), 25);
        assert!(indices.iter().all(|&i| i < 10));
    }

    #[test]
    fn test_bootstrap_is_deterministic_for_fixed_seed() {
        let a = bootstrap_indices(&mut rng(7), 100, 50);
        let b = bootstrap_indices(&mut rng(7), 100, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_features_are_distinct() {
        let features = sample_features(&mut rng(3), 20, 8);
        assert_eq!(features.len(), 8);
        let mut sorted = features.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 8);
        assert!(features.iter().all(|&f| f < 20));
    }

    #[test]
    fn test_sample_features_clamps_to_dimension() {
        let features = sample_features(&mut rng(4), 3, 10);
        let mut sorted = features;
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
    }
}
