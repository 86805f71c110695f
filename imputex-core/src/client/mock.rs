//! Scripted in-memory [`ImputationApi`] for tests and offline demos.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{ImputationApi, UploadFile, download_url};
use crate::error::ApiError;
use crate::types::{AnalyzeResponse, JobStatusResponse, StartJobRequest, StartJobResponse};

/// A call the mock received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Analyze { filename: String },
    StartJob { job_id: String, request: StartJobRequest },
    GetStatus { job_id: String },
    CancelJob { job_id: String },
}

/// Mock service that replays queued responses.
///
/// Status responses are consumed in order; once the queue is empty the last
/// successful snapshot is repeated.
pub struct MockImputationApi {
    base_url: String,
    analyze_responses: Mutex<VecDeque<Result<AnalyzeResponse, ApiError>>>,
    start_responses: Mutex<VecDeque<Result<StartJobResponse, ApiError>>>,
    status_responses: Mutex<VecDeque<Result<JobStatusResponse, ApiError>>>,
    last_status: Mutex<Option<JobStatusResponse>>,
    cancel_result: Mutex<Result<(), ApiError>>,
    status_delay: Mutex<Option<Duration>>,
    cancel_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<ApiCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockImputationApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockImputationApi {
    pub fn new() -> Self {
        Self {
            base_url: "http://mock.imputex/api/v1".to_string(),
            analyze_responses: Mutex::new(VecDeque::new()),
            start_responses: Mutex::new(VecDeque::new()),
            status_responses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(None),
            cancel_result: Mutex::new(Ok(())),
            status_delay: Mutex::new(None),
            cancel_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn queue_analyze(&self, response: Result<AnalyzeResponse, ApiError>) {
        lock(&self.analyze_responses).push_back(response);
    }

    pub fn queue_start(&self, response: Result<StartJobResponse, ApiError>) {
        lock(&self.start_responses).push_back(response);
    }

    pub fn queue_status(&self, response: Result<JobStatusResponse, ApiError>) {
        lock(&self.status_responses).push_back(response);
    }

    /// Make every subsequent `cancel_job` call return `result`.
    pub fn set_cancel_result(&self, result: Result<(), ApiError>) {
        *lock(&self.cancel_result) = result;
    }

    /// Delay each status response, to simulate a slow service.
    pub fn set_status_delay(&self, delay: Duration) {
        *lock(&self.status_delay) = Some(delay);
    }

    /// Delay each cancel response.
    pub fn set_cancel_delay(&self, delay: Duration) {
        *lock(&self.cancel_delay) = Some(delay);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    pub fn status_calls(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::GetStatus { .. }))
    }

    pub fn start_calls(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::StartJob { .. }))
    }

    pub fn cancel_calls(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::CancelJob { .. }))
    }

    /// Highest number of status requests observed in flight at once.
    pub fn max_concurrent_status_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: ApiCall) {
        lock(&self.calls).push(call);
    }

    fn unscripted(operation: &str) -> ApiError {
        ApiError::Request {
            message: format!("no scripted {operation} response"),
        }
    }
}

#[async_trait]
impl ImputationApi for MockImputationApi {
    async fn analyze(&self, upload: UploadFile) -> Result<AnalyzeResponse, ApiError> {
        self.record(ApiCall::Analyze {
            filename: upload.filename().to_string(),
        });
        lock(&self.analyze_responses)
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("analyze")))
    }

    async fn start_job(
        &self,
        job_id: &str,
        request: &StartJobRequest,
    ) -> Result<StartJobResponse, ApiError> {
        self.record(ApiCall::StartJob {
            job_id: job_id.to_string(),
            request: request.clone(),
        });
        lock(&self.start_responses)
            .pop_front()
            .unwrap_or_else(|| {
                Ok(StartJobResponse {
                    job_id: job_id.to_string(),
                    status: "QUEUED".to_string(),
                })
            })
    }

    async fn get_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        self.record(ApiCall::GetStatus {
            job_id: job_id.to_string(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *lock(&self.status_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.status_responses).pop_front();
        let result = match next {
            Some(Ok(status)) => {
                *lock(&self.last_status) = Some(status.clone());
                Ok(status)
            }
            Some(Err(e)) => Err(e),
            None => lock(&self.last_status)
                .clone()
                .ok_or_else(|| Self::unscripted("status")),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::CancelJob {
            job_id: job_id.to_string(),
        });
        let delay = *lock(&self.cancel_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.cancel_result).clone()
    }

    fn download_url(&self, job_id: &str) -> String {
        download_url(&self.base_url, job_id)
    }
}
