//! Property-based tests for selection and statistics

use chrono::Utc;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use splitrun::engine::select_by_weight;
use splitrun::experiment::{ExperimentVariant, VariantConfig};
use splitrun::stats::{mean, median, normal_cdf, sample_std_dev, two_proportion_z_test};

fn variants_with_weights(weights: &[f64]) -> Vec<ExperimentVariant> {
    weights
        .iter()
        .enumerate()
        .map(|(i, &weight)| ExperimentVariant {
            id: format!("v-{i}"),
            experiment_id: "e-1".to_string(),
            name: format!("v-{i}"),
            description: None,
            is_control: i == 0,
            weight,
            config: VariantConfig::default(),
            created_at: Utc::now(),
        })
        .collect()
}

proptest! {
    #[test]
    fn normal_cdf_is_a_probability(x in -50.0f64..50.0) {
        let p = normal_cdf(x);
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    // Bounded away from the saturated tails, where a sub-ulp analytic
    // increase can round either way
    fn normal_cdf_is_monotonic(x in -6.0f64..6.0, step in 0.01f64..4.0) {
        prop_assert!(normal_cdf(x + step) >= normal_cdf(x));
    }

    #[test]
    fn z_test_p_value_is_a_probability(
        p1 in 0.0f64..=1.0,
        p2 in 0.0f64..=1.0,
        n1 in 1u64..100_000,
        n2 in 1u64..100_000,
    ) {
        let test = two_proportion_z_test(p1, n1, p2, n2);
        prop_assert!((0.0..=1.0).contains(&test.p_value), "p = {}", test.p_value);
    }

    #[test]
    fn z_sign_matches_rate_difference(
        p1 in 0.01f64..0.99,
        p2 in 0.01f64..0.99,
        n in 30u64..10_000,
    ) {
        let test = two_proportion_z_test(p1, n, p2, n);
        if p1 > p2 {
            prop_assert!(test.z > 0.0);
        } else if p1 < p2 {
            prop_assert!(test.z < 0.0);
        }
    }

    #[test]
    fn descriptive_stats_stay_in_range(values in prop::collection::vec(-1e6f64..1e6, 1..200)) {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let m = mean(&values).unwrap();
        prop_assert!(m >= lo - 1e-6 && m <= hi + 1e-6);

        let md = median(&values).unwrap();
        prop_assert!(md >= lo && md <= hi);

        if values.len() > 1 {
            prop_assert!(sample_std_dev(&values).unwrap() >= 0.0);
        }
    }

    #[test]
    fn selection_returns_a_member(
        weights in prop::collection::vec(0.0f64..1000.0, 1..10),
        seed in any::<u64>(),
    ) {
        let variants = variants_with_weights(&weights);
        let mut rng = StdRng::seed_from_u64(seed);
        let picked = select_by_weight(&variants, &mut rng);
        prop_assert!(variants.iter().any(|v| v.id == picked.id));
    }

    #[test]
    fn selection_never_picks_zero_weight_when_alternative_exists(
        heavy in 1.0f64..1000.0,
        seed in any::<u64>(),
    ) {
        // [0, heavy]: the zero-weight variant is unreachable
        let variants = variants_with_weights(&[0.0, heavy]);
        let mut rng = StdRng::seed_from_u64(seed);
        let picked = select_by_weight(&variants, &mut rng);
        prop_assert_eq!(picked.id.as_str(), "v-1");
    }
}
