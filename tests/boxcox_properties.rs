//! Property tests for the per-group Box-Cox transform.

use polars::prelude::*;
use proptest::prelude::*;
use tsprep::boxcox;

/// Positive, non-constant series that stay in a numerically sane range.
fn positive_series(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        prop::collection::vec(0.5..500.0_f64, len).prop_map(|mut v| {
            // Nudge values apart so no generated series is constant.
            for (i, val) in v.iter_mut().enumerate() {
                *val += (i as f64) * 0.01;
            }
            v
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scalar_round_trip_recovers_input(values in positive_series(4, 40)) {
        let lambda = boxcox::boxcox_lambda(&values);
        let forward = boxcox::boxcox(&values, lambda);
        let back = boxcox::inv_boxcox(&forward, lambda);
        for (a, b) in values.iter().zip(&back) {
            prop_assert!((a - b).abs() < 1e-6 * a.abs().max(1.0));
        }
    }

    #[test]
    fn fitted_lambda_stays_in_search_range(values in positive_series(4, 40)) {
        let lambda = boxcox::boxcox_lambda(&values);
        prop_assert!((-2.0..=2.0).contains(&lambda));
    }

    #[test]
    fn grouped_round_trip(values_a in positive_series(4, 20), values_b in positive_series(4, 20)) {
        let n_a = values_a.len();
        let n_b = values_b.len();
        let categories: Vec<&str> = [vec!["A"; n_a], vec!["B"; n_b]].concat();
        let subcategories = vec!["X"; n_a + n_b];
        let values: Vec<f64> = values_a.iter().chain(values_b.iter()).copied().collect();

        let df = df![
            "category" => categories,
            "subcategory" => subcategories,
            "value" => values.clone(),
        ]
        .unwrap();

        let (transformed, lambdas) =
            boxcox::transform(&df, "value", "category", "subcategory").unwrap();
        prop_assert_eq!(lambdas.height(), 2);

        let back = boxcox::inverse_transform(
            &transformed,
            "value",
            "category",
            "subcategory",
            &lambdas,
        )
        .unwrap();

        let restored = back.column("value").unwrap().f64().unwrap();
        for (i, original) in values.iter().enumerate() {
            let r = restored.get(i).unwrap();
            prop_assert!((original - r).abs() < 1e-6 * original.abs().max(1.0));
        }
    }

    #[test]
    fn constant_groups_pass_through(value in 1.0..100.0_f64, len in 2..20usize) {
        let df = df![
            "category" => vec!["C"; len],
            "subcategory" => vec!["X"; len],
            "value" => vec![value; len],
        ]
        .unwrap();

        let (transformed, lambdas) =
            boxcox::transform(&df, "value", "category", "subcategory").unwrap();
        prop_assert_eq!(lambdas.column("lambda").unwrap().null_count(), 1);

        let out = transformed.column("value").unwrap().f64().unwrap();
        for i in 0..len {
            prop_assert_eq!(out.get(i).unwrap(), value);
        }

        // And the inverse leaves them untouched as well.
        let back = boxcox::inverse_transform(
            &transformed,
            "value",
            "category",
            "subcategory",
            &lambdas,
        )
        .unwrap();
        let values = back.column("value").unwrap().f64().unwrap();
        for i in 0..len {
            prop_assert_eq!(values.get(i).unwrap(), value);
        }
    }
}
