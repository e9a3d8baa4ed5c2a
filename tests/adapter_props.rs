//! Dimension adapter properties.

use embervec::adapt::{adapt_vector, AdaptPolicy};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn finite_vector() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-100.0f32..100.0, 1..64)
}

proptest! {
    /// Adapting a vector to its own dimension is the identity under every
    /// policy.
    #[test]
    fn same_dimension_is_identity(v in finite_vector()) {
        for policy in [
            AdaptPolicy::Strict,
            AdaptPolicy::AutoTruncate,
            AdaptPolicy::AutoPad,
            AdaptPolicy::SmartAdapt,
            AdaptPolicy::WarnOnly,
        ] {
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            let out = adapt_vector(&v, v.len(), policy, &mut rng).unwrap();
            prop_assert_eq!(&out, &v);
        }
    }

    /// Adapted outputs have the target length and unit norm (when the input
    /// is not all-zero).
    #[test]
    fn adapted_output_has_target_length_and_unit_norm(
        v in finite_vector(),
        target in 1usize..64,
    ) {
        prop_assume!(v.len() != target);
        prop_assume!(v.iter().any(|x| x.abs() > 1e-3));
        for policy in [
            AdaptPolicy::AutoTruncate,
            AdaptPolicy::AutoPad,
            AdaptPolicy::SmartAdapt,
        ] {
            let mut rng = ChaCha8Rng::seed_from_u64(2);
            let out = adapt_vector(&v, target, policy, &mut rng).unwrap();
            prop_assert_eq!(out.len(), target);
            let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
            // All-zero prefixes can survive truncation; anything else is
            // renormalized.
            if norm > 1e-6 {
                prop_assert!((norm - 1.0).abs() < 1e-3, "norm {norm} for {policy:?}");
            }
        }
    }

    /// Strict rejects every mismatch.
    #[test]
    fn strict_rejects_all_mismatches(v in finite_vector(), target in 1usize..64) {
        prop_assume!(v.len() != target);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        prop_assert!(adapt_vector(&v, target, AdaptPolicy::Strict, &mut rng).is_err());
    }

    /// SmartAdapt is deterministic for a fixed RNG seed.
    #[test]
    fn smart_adapt_is_seed_deterministic(v in finite_vector(), target in 1usize..64) {
        let mut rng_a = ChaCha8Rng::seed_from_u64(9);
        let mut rng_b = ChaCha8Rng::seed_from_u64(9);
        let a = adapt_vector(&v, target, AdaptPolicy::SmartAdapt, &mut rng_a).unwrap();
        let b = adapt_vector(&v, target, AdaptPolicy::SmartAdapt, &mut rng_b).unwrap();
        prop_assert_eq!(a, b);
    }
}
