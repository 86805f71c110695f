//! Imputation model kinds and their hyperparameters.
//!
//! [`ModelSelection`] is a tagged union: each variant carries only the
//! parameters its kind understands. [`HyperparameterBag`] is the editing
//! form that holds every kind's fields at once; [`HyperparameterBag::select`]
//! projects it onto a single variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The imputation algorithms the service offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelKind {
    Mice,
    Knn,
    Mean,
    Regression,
    Naomi,
    Totem,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Mice,
        ModelKind::Knn,
        ModelKind::Mean,
        ModelKind::Regression,
        ModelKind::Naomi,
        ModelKind::Totem,
    ];

    /// Wire keys this kind emits in the `hyperparameters` map.
    pub fn hyperparameter_keys(self) -> &'static [&'static str] {
        match self {
            ModelKind::Mice | ModelKind::Regression => &["max_iter", "random_state", "estimator"],
            ModelKind::Knn => &["n_neighbors", "weights", "metric"],
            ModelKind::Mean => &[],
            ModelKind::Naomi => &[
                "hidden_dim",
                "epochs",
                "lr",
                "preview_updates",
                "window_size",
                "batch_size",
                "n_layers",
                "highest",
                "clip",
            ],
            ModelKind::Totem => &["window_size", "normalization", "preview_updates"],
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Mice => write!(f, "MICE"),
            ModelKind::Knn => write!(f, "KNN"),
            ModelKind::Mean => write!(f, "MEAN"),
            ModelKind::Regression => write!(f, "REGRESSION"),
            ModelKind::Naomi => write!(f, "NAOMI"),
            ModelKind::Totem => write!(f, "TOTEM"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown model '{s}'"))
    }
}

/// Base estimator used by the iterative (MICE / regression) imputers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    #[default]
    BayesianRidge,
    RandomForest,
    ExtraTrees,
}

/// Neighbor weighting for KNN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnnWeights {
    #[default]
    Uniform,
    Distance,
}

/// Distance metric for KNN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnnMetric {
    #[default]
    NanEuclidean,
    Euclidean,
}

/// Input normalization for TOTEM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    #[default]
    Zscore,
    Minmax,
}

macro_rules! impl_snake_case_from_str {
    ($($ty:ty),+) => {$(
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
                    .map_err(|_| format!("unknown {} '{s}'", stringify!($ty)))
            }
        }
    )+};
}

impl_snake_case_from_str!(Estimator, KnnWeights, KnnMetric, Normalization);

/// Parameters for MICE and plain regression imputation.
#[derive(Debug, Clone, PartialEq)]
pub struct IterativeParams {
    pub max_iter: u32,
    pub random_state: u64,
    pub estimator: Estimator,
}

impl Default for IterativeParams {
    fn default() -> Self {
        Self {
            max_iter: 10,
            random_state: 42,
            estimator: Estimator::BayesianRidge,
        }
    }
}

/// Parameters for k-nearest-neighbor imputation.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnParams {
    pub n_neighbors: u32,
    pub weights: KnnWeights,
    pub metric: KnnMetric,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: KnnWeights::Uniform,
            metric: KnnMetric::NanEuclidean,
        }
    }
}

/// Parameters for the NAOMI sequence model.
#[derive(Debug, Clone, PartialEq)]
pub struct NaomiParams {
    pub hidden_dim: u32,
    pub epochs: u32,
    pub lr: f64,
    /// How many intermediate previews the service publishes during training.
    pub preview_updates: u32,
    pub window_size: u32,
    pub batch_size: u32,
    pub n_layers: u32,
    pub highest: u32,
    pub clip: f64,
}

impl Default for NaomiParams {
    fn default() -> Self {
        Self {
            hidden_dim: 64,
            epochs: 50,
            lr: 0.001,
            preview_updates: 10,
            window_size: 50,
            batch_size: 64,
            n_layers: 2,
            highest: 8,
            clip: 10.0,
        }
    }
}

/// Parameters for the TOTEM tokenized model.
#[derive(Debug, Clone, PartialEq)]
pub struct TotemParams {
    pub window_size: u32,
    pub normalization: Normalization,
    pub preview_updates: u32,
}

impl Default for TotemParams {
    fn default() -> Self {
        Self {
            window_size: 96,
            normalization: Normalization::Zscore,
            preview_updates: 10,
        }
    }
}

/// A chosen model together with exactly the parameters it accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSelection {
    Mice(IterativeParams),
    Regression(IterativeParams),
    Knn(KnnParams),
    Mean,
    Naomi(NaomiParams),
    Totem(TotemParams),
}

impl ModelSelection {
    /// Selection for `kind` with default parameters.
    pub fn default_for(kind: ModelKind) -> Self {
        HyperparameterBag::default().select(kind)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSelection::Mice(_) => ModelKind::Mice,
            ModelSelection::Regression(_) => ModelKind::Regression,
            ModelSelection::Knn(_) => ModelKind::Knn,
            ModelSelection::Mean => ModelKind::Mean,
            ModelSelection::Naomi(_) => ModelKind::Naomi,
            ModelSelection::Totem(_) => ModelKind::Totem,
        }
    }
}

impl Default for ModelSelection {
    fn default() -> Self {
        ModelSelection::Mice(IterativeParams::default())
    }
}

/// Editing form holding every model's fields side by side.
///
/// Values survive switching between kinds, which is why nothing reads this
/// directly when building a request: go through [`HyperparameterBag::select`].
#[derive(Debug, Clone, PartialEq)]
pub struct HyperparameterBag {
    pub max_iter: u32,
    pub random_state: u64,
    pub estimator: Estimator,
    pub n_neighbors: u32,
    pub weights: KnnWeights,
    pub metric: KnnMetric,
    pub hidden_dim: u32,
    pub epochs: u32,
    pub lr: f64,
    /// Accepted by the form but not forwarded for any kind.
    pub num_resolutions: Option<u32>,
    pub highest: u32,
    pub window_size: u32,
    pub batch_size: u32,
    pub n_layers: u32,
    pub clip: f64,
    pub preview_updates: u32,
    pub totem_window_size: u32,
    pub totem_normalization: Normalization,
    pub totem_preview_updates: u32,
}

impl Default for HyperparameterBag {
    fn default() -> Self {
        let iterative = IterativeParams::default();
        let knn = KnnParams::default();
        let naomi = NaomiParams::default();
        let totem = TotemParams::default();
        Self {
            max_iter: iterative.max_iter,
            random_state: iterative.random_state,
            estimator: iterative.estimator,
            n_neighbors: knn.n_neighbors,
            weights: knn.weights,
            metric: knn.metric,
            hidden_dim: naomi.hidden_dim,
            epochs: naomi.epochs,
            lr: naomi.lr,
            num_resolutions: None,
            highest: naomi.highest,
            window_size: naomi.window_size,
            batch_size: naomi.batch_size,
            n_layers: naomi.n_layers,
            clip: naomi.clip,
            preview_updates: naomi.preview_updates,
            totem_window_size: totem.window_size,
            totem_normalization: totem.normalization,
            totem_preview_updates: totem.preview_updates,
        }
    }
}

impl HyperparameterBag {
    /// Project the form onto the variant for `kind`.
    pub fn select(&self, kind: ModelKind) -> ModelSelection {
        let iterative = || IterativeParams {
            max_iter: self.max_iter,
            random_state: self.random_state,
            estimator: self.estimator,
        };
        match kind {
            ModelKind::Mice => ModelSelection::Mice(iterative()),
            ModelKind::Regression => ModelSelection::Regression(iterative()),
            ModelKind::Knn => ModelSelection::Knn(KnnParams {
                n_neighbors: self.n_neighbors,
                weights: self.weights,
                metric: self.metric,
            }),
            ModelKind::Mean => ModelSelection::Mean,
            ModelKind::Naomi => ModelSelection::Naomi(NaomiParams {
                hidden_dim: self.hidden_dim,
                epochs: self.epochs,
                lr: self.lr,
                preview_updates: self.preview_updates,
                window_size: self.window_size,
                batch_size: self.batch_size,
                n_layers: self.n_layers,
                highest: self.highest,
                clip: self.clip,
            }),
            ModelKind::Totem => ModelSelection::Totem(TotemParams {
                window_size: self.totem_window_size,
                normalization: self.totem_normalization,
                preview_updates: self.totem_preview_updates,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_roundtrip_through_display() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.to_string().parse::<ModelKind>(), Ok(kind));
        }
        assert_eq!("knn".parse::<ModelKind>(), Ok(ModelKind::Knn));
        assert!("xgboost".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_select_uses_totem_specific_fields() {
        let bag = HyperparameterBag {
            window_size: 12,
            totem_window_size: 48,
            preview_updates: 3,
            totem_preview_updates: 7,
            ..Default::default()
        };
        let ModelSelection::Totem(params) = bag.select(ModelKind::Totem) else {
            panic!("expected TOTEM selection");
        };
        assert_eq!(params.window_size, 48);
        assert_eq!(params.preview_updates, 7);
    }

    #[test]
    fn test_select_kind_matches_requested_kind() {
        let bag = HyperparameterBag::default();
        for kind in ModelKind::ALL {
            assert_eq!(bag.select(kind).kind(), kind);
        }
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("random_forest".parse::<Estimator>(), Ok(Estimator::RandomForest));
        assert_eq!("Distance".parse::<KnnWeights>(), Ok(KnnWeights::Distance));
        assert_eq!("nan_euclidean".parse::<KnnMetric>(), Ok(KnnMetric::NanEuclidean));
        assert_eq!("minmax".parse::<Normalization>(), Ok(Normalization::Minmax));
        assert!("cosine".parse::<KnnMetric>().is_err());
    }

    #[test]
    fn test_default_selection_is_mice() {
        assert_eq!(ModelSelection::default().kind(), ModelKind::Mice);
        assert_eq!(
            ModelSelection::default_for(ModelKind::Knn),
            ModelSelection::Knn(KnnParams::default())
        );
    }
}
