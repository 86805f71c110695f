//! HTTP client tests against an in-process axum stub of the imputation service.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use imputex_core::client::{HttpImputationClient, ImputationApi, UploadFile};
use imputex_core::config::{ApiConfig, ImputexConfig};
use imputex_core::model::ModelSelection;
use imputex_core::types::Phase;
use imputex_core::{ApiError, JobState, TickOutcome, Workflow};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Stub {
    uploads: Arc<Mutex<Vec<(String, String)>>>,
    starts: Arc<Mutex<Vec<(String, Value)>>>,
    cancels: Arc<Mutex<Vec<String>>>,
    polls: Arc<AtomicUsize>,
}

async fn analyze(State(stub): State<Stub>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = String::from_utf8_lossy(&body).to_string();
    stub.uploads
        .lock()
        .unwrap()
        .push((content_type, body.clone()));

    if body.contains("filename=\"empty.csv\"") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Uploaded file is empty"})),
        )
            .into_response();
    }
    Json(json!({
        "job_id": "job-7",
        "filename": "plant.csv",
        "sample_rows": 50,
        "total_null_ratio": 0.1,
        "columns": [
            {"name": "ts", "detected_type": "DATETIME", "null_count": 0, "null_ratio": 0.0,
             "unique_count": 50, "example": ["2024-01-01 00:00"], "recommended_action": "IGNORE"},
            {"name": "flow", "detected_type": "NUMERIC", "null_count": 5, "null_ratio": 0.1,
             "unique_count": 40, "example": [1.5, null], "recommended_action": "IMPUTE",
             "warnings": ["Skewed distribution"]}
        ]
    }))
    .into_response()
}

async fn start(State(stub): State<Stub>, Path(job_id): Path<String>, Json(body): Json<Value>) -> Response {
    stub.starts.lock().unwrap().push((job_id.clone(), body));
    if job_id == "locked" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [{"msg": "model_type: field required"}]})),
        )
            .into_response();
    }
    Json(json!({"job_id": job_id, "status": "QUEUED"})).into_response()
}

async fn status(State(stub): State<Stub>, Path(job_id): Path<String>) -> Response {
    if job_id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Job not found"}))).into_response();
    }
    let n = stub.polls.fetch_add(1, Ordering::SeqCst);
    if n == 0 {
        Json(json!({
            "job_id": job_id,
            "status": "PROCESSING",
            "progress": 40.0,
            "stage": "Imputing",
            "logs": ["Imputing flow"]
        }))
        .into_response()
    } else {
        Json(json!({
            "job_id": job_id,
            "status": "COMPLETED",
            "progress": 100.0,
            "stage": "Complete",
            "download_url": format!("/jobs/{job_id}/download"),
            "imputation_preview": {
                "dates_with_missing": ["2024-01-01"],
                "preview_data": {
                    "2024-01-01": {
                        "column_name": "flow",
                        "timestamps": ["2024-01-01 00:00", "2024-01-01 01:00"],
                        "original": [1.5, null],
                        "imputed": [1.5, 1.7]
                    }
                }
            }
        }))
        .into_response()
    }
}

async fn cancel(State(stub): State<Stub>, Path(job_id): Path<String>) -> Response {
    stub.cancels.lock().unwrap().push(job_id.clone());
    if job_id == "stuck" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "worker unavailable").into_response();
    }
    Json(json!({"job_id": job_id, "status": "CANCELED"})).into_response()
}

async fn spawn_stub() -> (String, Stub) {
    let stub = Stub::default();
    let app = Router::new()
        .route("/api/v1/analyze", post(analyze))
        .route("/api/v1/jobs/{job_id}/start", post(start))
        .route("/api/v1/jobs/{job_id}", get(status).delete(cancel))
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/v1"), stub)
}

fn client(base_url: &str) -> HttpImputationClient {
    HttpImputationClient::new(&ApiConfig {
        base_url: base_url.to_string(),
        request_timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_analyze_sends_multipart_file() {
    let (base, stub) = spawn_stub().await;
    let api = client(&base);
    let upload = UploadFile::new("plant.csv", b"ts,flow\n2024-01-01 00:00,1.5\n".to_vec()).unwrap();

    let response = api.analyze(upload).await.unwrap();
    assert_eq!(response.job_id, "job-7");
    assert_eq!(response.columns.len(), 2);
    assert_eq!(response.columns[1].warnings, vec!["Skewed distribution"]);

    let uploads = stub.uploads.lock().unwrap();
    let (content_type, body) = &uploads[0];
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"plant.csv\""));
    assert!(body.contains("text/csv"));
}

#[tokio::test]
async fn test_error_detail_becomes_message() {
    let (base, _stub) = spawn_stub().await;
    let api = client(&base);

    let err = api
        .analyze(UploadFile::new("empty.csv", Vec::new()).unwrap())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Status {
            status: 400,
            message: "Uploaded file is empty".into()
        }
    );

    let err = api.get_status("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Job not found");

    let request = imputex_core::translate(&imputex_core::JobConfig::new(ModelSelection::Mean, Vec::new()));
    let err = api.start_job("locked", &request).await.unwrap_err();
    assert_eq!(err.to_string(), "model_type: field required");
}

#[tokio::test]
async fn test_cancel_maps_plain_text_errors_to_status() {
    let (base, stub) = spawn_stub().await;
    let api = client(&base);

    api.cancel_job("job-7").await.unwrap();
    let err = api.cancel_job("stuck").await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 500");
    assert_eq!(*stub.cancels.lock().unwrap(), vec!["job-7", "stuck"]);
}

#[tokio::test]
async fn test_unreachable_service_is_request_error() {
    let api = client("http://127.0.0.1:9/api/v1");
    let err = api.get_status("job-7").await.unwrap_err();
    assert!(matches!(err, ApiError::Request { .. } | ApiError::Timeout { .. }));
}

#[tokio::test]
async fn test_workflow_over_http() {
    let (base, stub) = spawn_stub().await;
    let mut config = ImputexConfig::default();
    config.api.base_url = base.clone();
    config.polling.interval_ms = 20;
    let api = Arc::new(client(&base));
    let mut wf = Workflow::new(api, &config);

    let upload = UploadFile::new("plant.csv", b"ts,flow\n".to_vec()).unwrap();
    wf.analyze(upload).await.unwrap();
    assert_eq!(wf.phase(), Phase::Schema);
    assert_eq!(wf.schema().unwrap().role_counts().target, 1);

    wf.start_job(ModelSelection::default()).await.unwrap();
    assert_eq!(wf.run_until_settled().await, Some(TickOutcome::Completed));
    assert_eq!(wf.phase(), Phase::Complete);
    assert_eq!(
        wf.download_url(),
        Some(format!("{base}/jobs/job-7/download"))
    );

    let starts = stub.starts.lock().unwrap();
    let (job_id, body) = &starts[0];
    assert_eq!(job_id, "job-7");
    assert_eq!(body["model_type"], "MICE");
    assert_eq!(body["hyperparameters"]["max_iter"], 10);
    assert_eq!(body["hyperparameters"]["estimator"], "bayesian_ridge");
    assert_eq!(body["column_config"][1], json!({"name": "flow", "type": "NUMERIC", "role": "TARGET"}));
    assert_eq!(stub.polls.load(Ordering::SeqCst), 2);

    let job = wf.job().unwrap();
    assert_eq!(job.preview.as_ref().unwrap().dates_with_missing.len(), 1);
    assert_eq!(job.status, JobState::Complete);
    assert_eq!(job.logs, Vec::<String>::new());
}
