//! Property-based tests for core components using proptest.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

use imputex_core::model::{Estimator, HyperparameterBag, KnnMetric, KnnWeights, ModelKind, Normalization};
use imputex_core::preview::{PreviewProjector, derive_points, stats};
use imputex_core::progress::{clamp_progress, format_eta, stage_index};
use imputex_core::translator::hyperparameters;
use imputex_core::types::{ImputationPreview, PreviewSeries};
use imputex_core::ChartView;

fn any_kind() -> impl Strategy<Value = ModelKind> {
    prop::sample::select(ModelKind::ALL.to_vec())
}

prop_compose! {
    fn any_bag()(
        max_iter in 1u32..500,
        random_state in any::<u64>(),
        estimator in prop::sample::select(vec![Estimator::BayesianRidge, Estimator::RandomForest, Estimator::ExtraTrees]),
        n_neighbors in 1u32..100,
        weights in prop::sample::select(vec![KnnWeights::Uniform, KnnWeights::Distance]),
        metric in prop::sample::select(vec![KnnMetric::NanEuclidean, KnnMetric::Euclidean]),
        hidden_dim in 1u32..1024,
        epochs in 1u32..1000,
        lr in 1e-6f64..1.0,
        num_resolutions in prop::option::of(1u32..8),
        totem_window_size in 1u32..512,
        totem_normalization in prop::sample::select(vec![Normalization::Zscore, Normalization::Minmax]),
    ) -> HyperparameterBag {
        HyperparameterBag {
            max_iter,
            random_state,
            estimator,
            n_neighbors,
            weights,
            metric,
            hidden_dim,
            epochs,
            lr,
            num_resolutions,
            totem_window_size,
            totem_normalization,
            ..HyperparameterBag::default()
        }
    }
}

// --- Config translation properties ---

proptest! {
    #[test]
    fn hyperparameter_keys_are_exactly_the_whitelist(bag in any_bag(), kind in any_kind()) {
        let map = hyperparameters(&bag.select(kind));
        let keys: BTreeSet<&str> = map.keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> = kind.hyperparameter_keys().iter().copied().collect();
        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn mean_never_carries_parameters(bag in any_bag()) {
        prop_assert!(hyperparameters(&bag.select(ModelKind::Mean)).is_empty());
    }

    #[test]
    fn totem_window_comes_from_totem_field(bag in any_bag()) {
        let map = hyperparameters(&bag.select(ModelKind::Totem));
        prop_assert_eq!(map["window_size"].as_u64(), Some(u64::from(bag.totem_window_size)));
    }
}

// --- Progress derivation properties ---

proptest! {
    #[test]
    fn eta_is_complete_only_at_full_progress(progress in 0u8..=100) {
        let eta = format_eta(progress);
        prop_assert_eq!(eta == "Complete", progress >= 100);
    }

    #[test]
    fn eta_minutes_are_at_least_one_and_non_increasing(progress in 0u8..99) {
        let minutes = |p: u8| -> u32 {
            format_eta(p).trim_start_matches('~').trim_end_matches(" min").parse().unwrap()
        };
        prop_assert!(minutes(progress) >= 1);
        prop_assert!(minutes(progress + 1) <= minutes(progress));
    }

    #[test]
    fn clamped_progress_is_in_range(raw in any::<f64>()) {
        prop_assert!(clamp_progress(raw) <= 100);
    }

    #[test]
    fn unknown_stage_labels_map_to_zero(label in "[a-z ]{0,20}") {
        prop_assert_eq!(stage_index(&label), 0);
    }
}

// --- Preview projection properties ---

prop_compose! {
    fn any_series()(original in prop::collection::vec(prop::option::of(-1e6f64..1e6), 0..48)) -> PreviewSeries {
        let n = original.len();
        PreviewSeries {
            column_name: "value".into(),
            timestamps: (0..n).map(|i| format!("2024-01-01 {:02}:{:02}", i / 2, (i % 2) * 30)).collect(),
            imputed: original.iter().map(|v| v.unwrap_or(0.0)).collect(),
            original,
        }
    }
}

proptest! {
    #[test]
    fn imputed_count_matches_missing_originals(series in any_series()) {
        let points = derive_points(&series);
        let missing = series.original.iter().filter(|v| v.is_none()).count();
        prop_assert_eq!(points.len(), series.timestamps.len());
        prop_assert_eq!(stats(&points).imputed, missing);
    }

    #[test]
    fn overlay_is_defined_only_where_original_is_missing(series in any_series()) {
        let mut preview_data = HashMap::new();
        preview_data.insert("2024-01-01".to_string(), series);
        let preview = ImputationPreview {
            dates_with_missing: vec!["2024-01-01".into()],
            preview_data,
        };
        let ChartView::Chart(data) = PreviewProjector::new().project(Some(&preview)) else {
            return Err(TestCaseError::fail("expected chart"));
        };
        for (original, overlay) in data.original_series().iter().zip(data.imputed_overlay()) {
            prop_assert_eq!(original.is_none(), overlay.is_some());
        }
    }

    #[test]
    fn selection_always_lands_on_a_listed_date(
        dates in prop::collection::btree_set("2024-0[1-9]-[12][0-9]", 1..6),
        selected in "2024-0[1-9]-[12][0-9]",
    ) {
        let dates: Vec<String> = dates.into_iter().collect();
        let preview = ImputationPreview {
            dates_with_missing: dates.clone(),
            preview_data: HashMap::new(),
        };
        let mut projector = PreviewProjector::new();
        projector.select(selected.clone());
        let resolved = projector.resolve(&preview).map(str::to_string);
        prop_assert!(resolved.as_ref().is_some_and(|d| dates.contains(d)));
        if dates.contains(&selected) {
            prop_assert_eq!(resolved, Some(selected));
        } else {
            prop_assert_eq!(resolved, Some(dates[0].clone()));
        }
    }
}
