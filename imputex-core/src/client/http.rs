//! HTTP implementation of [`ImputationApi`] on top of `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Response, multipart};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ImputationApi, UploadFile, download_url, error_message};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::types::{AnalyzeResponse, JobStatusResponse, StartJobRequest, StartJobResponse};

/// Talks to the ImputeX REST API.
pub struct HttpImputationClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpImputationClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Request {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            ApiError::Request {
                message: e.to_string(),
            }
        }
    }

    /// Turn a non-success status into [`ApiError::Status`], else hand back the body text.
    async fn checked_body(&self, response: Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        if !status.is_success() {
            debug!(status = status.as_u16(), body = %body, "Service returned an error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }
        Ok(body)
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let body = self.checked_body(response).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::ResponseParse {
            message: format!("Invalid JSON: {}", e),
        })
    }
}

#[async_trait]
impl ImputationApi for HttpImputationClient {
    async fn analyze(&self, upload: UploadFile) -> Result<AnalyzeResponse, ApiError> {
        let url = self.url("/analyze");
        let mime = upload.mime_type();
        let (filename, bytes) = upload.into_parts();
        debug!(url = %url, filename = %filename, size = bytes.len(), "Uploading dataset for analysis");

        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(mime)
            .map_err(|e| ApiError::InvalidUpload {
                reason: e.to_string(),
            })?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        self.read_json(response).await
    }

    async fn start_job(
        &self,
        job_id: &str,
        request: &StartJobRequest,
    ) -> Result<StartJobResponse, ApiError> {
        let url = self.url(&format!("/jobs/{job_id}/start"));
        debug!(url = %url, model = %request.model_type, "Starting imputation job");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        self.read_json(response).await
    }

    async fn get_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        let url = self.url(&format!("/jobs/{job_id}"));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        self.read_json(response).await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/jobs/{job_id}"));
        debug!(url = %url, "Cancelling job");
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        self.checked_body(response).await.map(|_| ())
    }

    fn download_url(&self, job_id: &str) -> String {
        download_url(&self.base_url, job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = ApiConfig {
            base_url: "http://svc:8000/api/v1/".into(),
            request_timeout_secs: 3,
        };
        let client = HttpImputationClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://svc:8000/api/v1");
        assert_eq!(client.url("/analyze"), "http://svc:8000/api/v1/analyze");
        assert_eq!(
            client.download_url("j9"),
            "http://svc:8000/api/v1/jobs/j9/download"
        );
    }
}
