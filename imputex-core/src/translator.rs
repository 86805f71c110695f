//! Translation from the edited job configuration to the job-start request.
//!
//! The hyperparameter map is built per variant of [`ModelSelection`], so a
//! kind can only ever emit its own keys. No business validation happens
//! here; the workflow checks the TARGET precondition before calling in.

use serde_json::{Map, Value, json};

use crate::model::ModelSelection;
use crate::schema::SchemaReview;
use crate::types::{ColumnConfig, ColumnRole, StartJobRequest};

/// Model choice plus the reduced column list, frozen at job start.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    model: ModelSelection,
    columns: Vec<ColumnConfig>,
}

impl JobConfig {
    pub fn new(model: ModelSelection, columns: Vec<ColumnConfig>) -> Self {
        Self { model, columns }
    }

    /// Freeze the current state of a schema review.
    pub fn freeze(schema: &SchemaReview, model: ModelSelection) -> Self {
        Self::new(model, schema.column_config())
    }

    pub fn model(&self) -> &ModelSelection {
        &self.model
    }

    pub fn columns(&self) -> &[ColumnConfig] {
        &self.columns
    }

    pub fn target_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.role == ColumnRole::Target)
            .count()
    }
}

/// Flatten a model selection into its wire-level hyperparameter map.
pub fn hyperparameters(model: &ModelSelection) -> Map<String, Value> {
    let value = match model {
        ModelSelection::Mice(p) | ModelSelection::Regression(p) => json!({
            "max_iter": p.max_iter,
            "random_state": p.random_state,
            "estimator": p.estimator,
        }),
        ModelSelection::Knn(p) => json!({
            "n_neighbors": p.n_neighbors,
            "weights": p.weights,
            "metric": p.metric,
        }),
        ModelSelection::Mean => json!({}),
        ModelSelection::Naomi(p) => json!({
            "hidden_dim": p.hidden_dim,
            "epochs": p.epochs,
            "lr": p.lr,
            "preview_updates": p.preview_updates,
            "window_size": p.window_size,
            "batch_size": p.batch_size,
            "n_layers": p.n_layers,
            "highest": p.highest,
            "clip": p.clip,
        }),
        ModelSelection::Totem(p) => json!({
            "window_size": p.window_size,
            "normalization": p.normalization,
            "preview_updates": p.preview_updates,
        }),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Build the job-start request body.
pub fn translate(config: &JobConfig) -> StartJobRequest {
    StartJobRequest {
        model_type: config.model.kind(),
        hyperparameters: hyperparameters(&config.model),
        column_config: config.columns.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Estimator, HyperparameterBag, KnnMetric, KnnParams, KnnWeights, ModelKind, Normalization,
    };
    use crate::types::ColumnType;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn columns() -> Vec<ColumnConfig> {
        vec![
            ColumnConfig {
                name: "ts".into(),
                column_type: ColumnType::Datetime,
                role: ColumnRole::Feature,
            },
            ColumnConfig {
                name: "value".into(),
                column_type: ColumnType::Numeric,
                role: ColumnRole::Target,
            },
        ]
    }

    #[test]
    fn test_mice_request_shape() {
        let config = JobConfig::new(ModelSelection::default(), columns());
        let request = translate(&config);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "model_type": "MICE",
                "hyperparameters": {
                    "max_iter": 10,
                    "random_state": 42,
                    "estimator": "bayesian_ridge"
                },
                "column_config": [
                    {"name": "ts", "type": "DATETIME", "role": "FEATURE"},
                    {"name": "value", "type": "NUMERIC", "role": "TARGET"}
                ]
            })
        );
    }

    #[test]
    fn test_knn_values() {
        let model = ModelSelection::Knn(KnnParams {
            n_neighbors: 7,
            weights: KnnWeights::Distance,
            metric: KnnMetric::Euclidean,
        });
        let map = hyperparameters(&model);
        assert_eq!(map["n_neighbors"], json!(7));
        assert_eq!(map["weights"], json!("distance"));
        assert_eq!(map["metric"], json!("euclidean"));
    }

    #[test]
    fn test_mean_is_empty() {
        assert!(hyperparameters(&ModelSelection::Mean).is_empty());
    }

    #[test]
    fn test_totem_uses_its_own_window_size() {
        let bag = HyperparameterBag {
            window_size: 50,
            totem_window_size: 128,
            totem_normalization: Normalization::Minmax,
            ..Default::default()
        };
        let map = hyperparameters(&bag.select(ModelKind::Totem));
        assert_eq!(map["window_size"], json!(128));
        assert_eq!(map["normalization"], json!("minmax"));
    }

    #[test]
    fn test_key_sets_match_whitelist_for_every_kind() {
        let bag = HyperparameterBag {
            num_resolutions: Some(3),
            estimator: Estimator::ExtraTrees,
            ..Default::default()
        };
        for kind in ModelKind::ALL {
            let keys: BTreeSet<String> = hyperparameters(&bag.select(kind)).keys().cloned().collect();
            let expected: BTreeSet<String> = kind
                .hyperparameter_keys()
                .iter()
                .map(|k| k.to_string())
                .collect();
            assert_eq!(keys, expected, "key set mismatch for {kind}");
        }
    }

    #[test]
    fn test_target_count() {
        let config = JobConfig::new(ModelSelection::Mean, columns());
        assert_eq!(config.target_count(), 1);
        let none = JobConfig::new(ModelSelection::Mean, columns()[..1].to_vec());
        assert_eq!(none.target_count(), 0);
    }
}
