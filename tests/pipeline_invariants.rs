//! Cross-stage invariant tests: row identity, group isolation, and
//! loud failures on bad strategies or missing transform state.

use polars::prelude::*;
use tsprep::boxcox;
use tsprep::impute::{impute, ImputeMethod};
use tsprep::outlier::{handle_outliers, OutlierMethod};
use tsprep::PrepError;

fn grouped_frame() -> DataFrame {
    df![
        "category" => ["A", "A", "A", "A", "A", "B", "B", "B", "B", "B"],
        "subcategory" => ["X", "X", "X", "X", "X", "Y", "Y", "Y", "Y", "Y"],
        "sales" => [
            Some(10.0), None, Some(12.0), Some(11.0), Some(13.0),
            Some(100.0), Some(110.0), None, Some(105.0), Some(120.0),
        ],
    ]
    .unwrap()
}

fn group_keys() -> Vec<String> {
    vec!["category".to_string(), "subcategory".to_string()]
}

fn sales(df: &DataFrame) -> Vec<Option<f64>> {
    df.column("sales").unwrap().f64().unwrap().into_iter().collect()
}

#[test]
fn every_stage_preserves_row_identity() {
    let df = grouped_frame();
    let columns = vec!["sales".to_string()];

    let imputed = impute(&df, &columns, &group_keys(), ImputeMethod::Mean).unwrap();
    assert_eq!(imputed.height(), df.height());
    assert_eq!(imputed.get_column_names(), df.get_column_names());

    let treated = handle_outliers(
        &imputed,
        &columns,
        &group_keys(),
        OutlierMethod::ZScore { threshold: 3.0 },
    )
    .unwrap();
    assert_eq!(treated.height(), df.height());

    let (transformed, _) =
        boxcox::transform(&treated, "sales", "category", "subcategory").unwrap();
    assert_eq!(transformed.height(), df.height());
    // Key columns untouched by every stage
    assert!(transformed
        .column("category")
        .unwrap()
        .as_materialized_series()
        .equals(df.column("category").unwrap().as_materialized_series()));
}

#[test]
fn perturbing_one_group_never_changes_another() {
    let base = grouped_frame();
    let mut perturbed = base.clone();
    // Blow up group A's values; group B's fills must not move.
    perturbed
        .with_column(Series::new(
            "sales".into(),
            vec![
                Some(9_999.0),
                None,
                Some(8_888.0),
                Some(7_777.0),
                Some(6_666.0),
                Some(100.0),
                Some(110.0),
                None,
                Some(105.0),
                Some(120.0),
            ],
        ))
        .unwrap();

    for method in [ImputeMethod::Mean, ImputeMethod::Median, ImputeMethod::Linear] {
        let filled_base = impute(&base, &["sales".to_string()], &group_keys(), method).unwrap();
        let filled_pert =
            impute(&perturbed, &["sales".to_string()], &group_keys(), method).unwrap();
        let b = sales(&filled_base);
        let p = sales(&filled_pert);
        for row in 5..10 {
            assert_eq!(b[row], p[row], "group B row {row} drifted under {method:?}");
        }
    }
}

#[test]
fn unknown_strategy_names_fail_without_touching_data() {
    assert!(matches!(
        "mode".parse::<ImputeMethod>(),
        Err(PrepError::InvalidMethod { .. })
    ));
    assert!(matches!(
        "isolation_forest".parse::<OutlierMethod>(),
        Err(PrepError::InvalidMethod { .. })
    ));
}

#[test]
fn inverse_transform_requires_every_group_key() {
    let df = grouped_frame();
    let filled = impute(&df, &["sales".to_string()], &group_keys(), ImputeMethod::Linear).unwrap();
    let (transformed, lambdas) =
        boxcox::transform(&filled, "sales", "category", "subcategory").unwrap();

    // Lambda table missing group (B, Y)
    let mask = BooleanChunked::new("mask".into(), &[true, false]);
    let partial = lambdas.filter(&mask).unwrap();
    let err = boxcox::inverse_transform(&transformed, "sales", "category", "subcategory", &partial)
        .unwrap_err();
    match err {
        PrepError::MissingLambda(key) => assert!(key.contains('B')),
        other => panic!("expected MissingLambda, got {other}"),
    }

    // With the full table the inverse succeeds and drops nothing.
    let back =
        boxcox::inverse_transform(&transformed, "sales", "category", "subcategory", &lambdas)
            .unwrap();
    assert_eq!(back.width(), transformed.width());
}

#[test]
fn knn_imputation_fills_from_group_neighbors() {
    let df = df![
        "g" => ["a", "a", "a", "a", "b", "b", "b"],
        "x" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(1.0), Some(2.0), Some(3.0)],
        "y" => [Some(10.0), Some(20.0), None, Some(40.0), Some(700.0), Some(800.0), None],
    ]
    .unwrap();
    let filled = impute(
        &df,
        &["x".to_string(), "y".to_string()],
        &["g".to_string()],
        ImputeMethod::Knn { k: 2 },
    )
    .unwrap();

    let y = filled.column("y").unwrap().f64().unwrap();
    let a_fill = y.get(2).unwrap();
    let b_fill = y.get(6).unwrap();
    // Group a's fill comes from values around 20-40, group b's from 700-800.
    assert!(a_fill > 10.0 && a_fill < 40.0, "got {a_fill}");
    assert!(b_fill >= 700.0 && b_fill <= 800.0, "got {b_fill}");
}
