//! Boundary to the imputation service.
//!
//! The workflow only talks to the service through [`ImputationApi`], so the
//! HTTP implementation and the scripted mock are interchangeable.

pub mod http;
pub mod mock;

pub use http::HttpImputationClient;
pub use mock::{ApiCall, MockImputationApi};

use async_trait::async_trait;
use std::path::Path;

use crate::error::{ApiError, ImputexError};
use crate::types::{AnalyzeResponse, JobStatusResponse, StartJobRequest, StartJobResponse};

/// Operations the imputation service exposes.
#[async_trait]
pub trait ImputationApi: Send + Sync {
    /// Upload a dataset and get its inferred schema.
    async fn analyze(&self, upload: UploadFile) -> Result<AnalyzeResponse, ApiError>;

    /// Launch imputation for a previously analyzed dataset.
    async fn start_job(
        &self,
        job_id: &str,
        request: &StartJobRequest,
    ) -> Result<StartJobResponse, ApiError>;

    /// Fetch the current status snapshot of a job.
    async fn get_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError>;

    /// Ask the service to stop a job.
    async fn cancel_job(&self, job_id: &str) -> Result<(), ApiError>;

    /// Location the finished result can be downloaded from.
    fn download_url(&self, job_id: &str) -> String;
}

/// `{base}/jobs/{job_id}/download`
pub fn download_url(base_url: &str, job_id: &str) -> String {
    format!("{}/jobs/{}/download", base_url.trim_end_matches('/'), job_id)
}

const ACCEPTED_EXTENSIONS: [&str; 2] = ["csv", "xlsx"];

/// A dataset file ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    filename: String,
    bytes: Vec<u8>,
}

impl UploadFile {
    /// Wrap in-memory contents. Only `.csv` and `.xlsx` files are accepted.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ApiError> {
        let filename = filename.into();
        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension {
            Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(Self { filename, bytes }),
            _ => Err(ApiError::InvalidUpload {
                reason: format!("'{filename}' is not a .csv or .xlsx file"),
            }),
        }
    }

    /// Read a dataset from disk.
    pub async fn from_path(path: &Path) -> crate::error::Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        // Reject by name first so unsupported files are never read.
        Self::new(filename.clone(), Vec::new())?;
        let bytes = tokio::fs::read(path).await.map_err(ImputexError::Io)?;
        Ok(Self { filename, bytes })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        if self.filename.to_ascii_lowercase().ends_with(".xlsx") {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        } else {
            "text/csv"
        }
    }

    pub(crate) fn into_parts(self) -> (String, Vec<u8>) {
        (self.filename, self.bytes)
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Looks for a `detail` (string or list of `{msg}` objects) or `message`
/// field and falls back to `HTTP {status}`.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_body = parsed.as_ref().and_then(|v| {
        let detail = match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                    .collect();
                (!msgs.is_empty()).then(|| msgs.join("; "))
            }
            _ => None,
        };
        detail.or_else(|| v.get("message")?.as_str().map(str::to_string))
    });
    from_body
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"))
}
