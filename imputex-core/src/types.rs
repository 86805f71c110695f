//! Wire-level types shared with the ImputeX service, plus the workflow phase.
//!
//! Field names follow the service's JSON contract (`snake_case` keys,
//! `UPPERCASE` enum tags).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::model::ModelKind;

/// Semantic type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Id,
    Numeric,
    Categorical,
    Datetime,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Id => write!(f, "ID"),
            ColumnType::Numeric => write!(f, "NUMERIC"),
            ColumnType::Categorical => write!(f, "CATEGORICAL"),
            ColumnType::Datetime => write!(f, "DATETIME"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ID" => Ok(ColumnType::Id),
            "NUMERIC" => Ok(ColumnType::Numeric),
            "CATEGORICAL" => Ok(ColumnType::Categorical),
            "DATETIME" => Ok(ColumnType::Datetime),
            other => Err(format!("unknown column type '{other}'")),
        }
    }
}

/// What the analyzer recommends doing with a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnAction {
    Impute,
    Ignore,
}

/// Role a column plays in an imputation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnRole {
    /// Column whose missing values get imputed.
    Target,
    /// Column used as an input signal only.
    Feature,
    /// Column left out of the job entirely.
    Ignore,
}

impl ColumnRole {
    /// The role that follows this one in the review cycle
    /// (TARGET → FEATURE → IGNORE → TARGET).
    pub fn next(self) -> Self {
        match self {
            ColumnRole::Target => ColumnRole::Feature,
            ColumnRole::Feature => ColumnRole::Ignore,
            ColumnRole::Ignore => ColumnRole::Target,
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRole::Target => write!(f, "TARGET"),
            ColumnRole::Feature => write!(f, "FEATURE"),
            ColumnRole::Ignore => write!(f, "IGNORE"),
        }
    }
}

impl FromStr for ColumnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TARGET" => Ok(ColumnRole::Target),
            "FEATURE" => Ok(ColumnRole::Feature),
            "IGNORE" => Ok(ColumnRole::Ignore),
            other => Err(format!("unknown column role '{other}'")),
        }
    }
}

/// Per-column profile produced by the analyze endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedColumn {
    pub name: String,
    pub detected_type: ColumnType,
    pub null_count: u64,
    pub null_ratio: f64,
    pub unique_count: u64,
    /// A handful of sample values; strings, numbers or nulls.
    #[serde(default)]
    pub example: Vec<serde_json::Value>,
    pub recommended_action: ColumnAction,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Response body of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub job_id: String,
    pub filename: String,
    pub sample_rows: u64,
    pub total_null_ratio: f64,
    pub columns: Vec<AnalyzedColumn>,
}

/// One entry of the `column_config` list sent at job start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub role: ColumnRole,
}

/// Request body of `POST /jobs/{job_id}/start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub model_type: ModelKind,
    pub hyperparameters: serde_json::Map<String, serde_json::Value>,
    pub column_config: Vec<ColumnConfig>,
}

/// Response body of `POST /jobs/{job_id}/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: String,
    pub status: String,
}

/// Lifecycle status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerJobStatus {
    Uploaded,
    Reviewed,
    Queued,
    Processing,
    Completed,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ServerJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServerJobStatus::Uploaded => "UPLOADED",
            ServerJobStatus::Reviewed => "REVIEWED",
            ServerJobStatus::Queued => "QUEUED",
            ServerJobStatus::Processing => "PROCESSING",
            ServerJobStatus::Completed => "COMPLETED",
            ServerJobStatus::Failed => "FAILED",
            ServerJobStatus::Canceled => "CANCELED",
            ServerJobStatus::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Response body of `GET /jobs/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: ServerJobStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub imputation_preview: Option<ImputationPreview>,
}

/// Before/after series for the dates that contained missing values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationPreview {
    #[serde(default)]
    pub dates_with_missing: Vec<String>,
    #[serde(default)]
    pub preview_data: HashMap<String, PreviewSeries>,
}

/// One date's worth of a column series. The three vectors are index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewSeries {
    #[serde(default)]
    pub column_name: String,
    pub timestamps: Vec<String>,
    /// `None` where the source value was missing.
    pub original: Vec<Option<f64>>,
    pub imputed: Vec<f64>,
}

/// The single active step of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Upload,
    Schema,
    Processing,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Upload => write!(f, "upload"),
            Phase::Schema => write!(f, "schema"),
            Phase::Processing => write!(f, "processing"),
            Phase::Complete => write!(f, "complete"),
        }
    }
}
