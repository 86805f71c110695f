//! The workflow state machine.
//!
//! [`Workflow`] owns the active phase, the editable schema, the running job
//! view and the single error banner. Boundary calls are made through an
//! [`ImputationApi`]; their failures are settled into the banner and never
//! escape as anything but a returned error. At most one [`JobPoller`] exists
//! at a time and every path out of PROCESSING stops it.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{ImputationApi, UploadFile};
use crate::config::ImputexConfig;
use crate::error::WorkflowError;
use crate::model::ModelSelection;
use crate::poller::{JobPoller, PollEvent, PollSettings};
use crate::preview::{ChartView, PreviewProjector};
use crate::progress::{JobState, JobView};
use crate::schema::SchemaReview;
use crate::translator::{JobConfig, translate};
use crate::types::Phase;

const EVENT_BUFFER: usize = 16;
const DEFAULT_FAILURE_MESSAGE: &str = "Job failed";

/// Which operation raised the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Analyze,
    StartJob,
    Validation,
    JobFailed,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSource::Analyze => write!(f, "analyze"),
            ErrorSource::StartJob => write!(f, "start job"),
            ErrorSource::Validation => write!(f, "validation"),
            ErrorSource::JobFailed => write!(f, "job failed"),
        }
    }
}

/// The dismissible error shown alongside whatever phase is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBanner {
    pub source: ErrorSource,
    pub message: String,
}

/// What applying one poll event did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Progress { progress: u8, stage: i8 },
    Completed,
    Failed { message: String },
    /// Stale, out of order, or arrived after the job left PROCESSING.
    Ignored,
}

impl TickOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TickOutcome::Completed | TickOutcome::Failed { .. })
    }
}

struct ActivePoll {
    poller: JobPoller,
    last_sequence: u64,
}

pub struct Workflow {
    api: Arc<dyn ImputationApi>,
    poll_settings: PollSettings,
    phase: Phase,
    schema: Option<SchemaReview>,
    job: Option<JobView>,
    poll: Option<ActivePoll>,
    generation: u64,
    events_tx: mpsc::Sender<PollEvent>,
    events_rx: mpsc::Receiver<PollEvent>,
    error: Option<ErrorBanner>,
    projector: PreviewProjector,
}

impl Workflow {
    pub fn new(api: Arc<dyn ImputationApi>, config: &ImputexConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            api,
            poll_settings: PollSettings {
                interval: config.polling.interval(),
                request_timeout: config.api.request_timeout(),
            },
            phase: Phase::default(),
            schema: None,
            job: None,
            poll: None,
            generation: 0,
            events_tx,
            events_rx,
            error: None,
            projector: PreviewProjector::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn schema(&self) -> Option<&SchemaReview> {
        self.schema.as_ref()
    }

    /// Mutable access to the schema. Edits are only allowed during SCHEMA.
    pub fn schema_mut(&mut self) -> Result<&mut SchemaReview, WorkflowError> {
        self.require(Phase::Schema, "edit the schema")?;
        let phase = self.phase;
        self.schema.as_mut().ok_or(WorkflowError::InvalidPhase {
            action: "edit the schema",
            phase,
        })
    }

    pub fn job(&self) -> Option<&JobView> {
        self.job.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorBanner> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Whether a poller is currently scheduled.
    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().is_some_and(|p| p.poller.is_active())
    }

    /// Upload a dataset and move to SCHEMA with the inferred columns.
    pub async fn analyze(&mut self, upload: UploadFile) -> Result<(), WorkflowError> {
        self.require(Phase::Upload, "analyze a file")?;
        info!(filename = %upload.filename(), size = upload.len(), "Analyzing dataset");

        let result = self.api.analyze(upload).await.map_err(WorkflowError::from);
        let response = self.settle(ErrorSource::Analyze, result)?;

        info!(
            job_id = %response.job_id,
            columns = response.columns.len(),
            sample_rows = response.sample_rows,
            "Schema received"
        );
        self.schema = Some(SchemaReview::from(response));
        self.transition(Phase::Schema);
        Ok(())
    }

    /// Discard the schema and return to UPLOAD.
    pub fn back_to_upload(&mut self) -> Result<(), WorkflowError> {
        self.require(Phase::Schema, "go back")?;
        self.schema = None;
        self.error = None;
        self.transition(Phase::Upload);
        Ok(())
    }

    /// Freeze the schema, start the job remotely and begin polling.
    ///
    /// With no TARGET column the request is never sent.
    pub async fn start_job(&mut self, model: ModelSelection) -> Result<(), WorkflowError> {
        self.require(Phase::Schema, "start a job")?;
        let Some(schema) = self.schema.as_ref() else {
            return Err(WorkflowError::InvalidPhase {
                action: "start a job",
                phase: self.phase,
            });
        };

        let config = JobConfig::freeze(schema, model);
        if config.target_count() == 0 {
            return self.settle(ErrorSource::Validation, Err(WorkflowError::NoTargetColumns));
        }
        let request = translate(&config);
        let job_id = schema.job_id.clone();
        info!(
            job_id = %job_id,
            model = %request.model_type,
            targets = config.target_count(),
            "Starting job"
        );

        let result = self
            .api
            .start_job(&job_id, &request)
            .await
            .map_err(WorkflowError::from);
        let response = self.settle(ErrorSource::StartJob, result)?;

        let job_id = if response.job_id.is_empty() {
            job_id
        } else {
            response.job_id
        };
        let Some(schema) = self.schema.as_ref() else {
            return Err(WorkflowError::InvalidPhase {
                action: "start a job",
                phase: self.phase,
            });
        };
        self.job = Some(JobView::new(job_id.clone(), &config, schema));
        self.projector.reset();
        self.spawn_poller(job_id);
        self.transition(Phase::Processing);
        Ok(())
    }

    fn spawn_poller(&mut self, job_id: String) {
        // Replacing an active poll would leave two running.
        self.stop_polling();
        self.generation += 1;
        let poller = JobPoller::spawn(
            self.api.clone(),
            job_id,
            self.generation,
            self.poll_settings,
            self.events_tx.clone(),
        );
        self.poll = Some(ActivePoll {
            poller,
            last_sequence: 0,
        });
    }

    /// Stop the active poller. Returns `true` only if one was running.
    pub fn stop_polling(&mut self) -> bool {
        match self.poll.take() {
            Some(mut poll) => poll.poller.stop(),
            None => false,
        }
    }

    /// Wait for the next poll event. `None` when nothing is polling.
    ///
    /// Cancel-safe: dropping the future loses no events.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.poll.as_ref()?;
        self.events_rx.recv().await
    }

    /// Fold one snapshot into the job view and drive the phase.
    pub fn apply_event(&mut self, event: PollEvent) -> TickOutcome {
        if self.phase != Phase::Processing {
            debug!(phase = %self.phase, sequence = event.sequence, "Dropping snapshot outside processing");
            return TickOutcome::Ignored;
        }
        let Some(poll) = self.poll.as_mut() else {
            return TickOutcome::Ignored;
        };
        if event.generation != poll.poller.generation() || event.sequence <= poll.last_sequence {
            debug!(
                generation = event.generation,
                sequence = event.sequence,
                last_sequence = poll.last_sequence,
                "Dropping stale snapshot"
            );
            return TickOutcome::Ignored;
        }
        poll.last_sequence = event.sequence;

        let Some(job) = self.job.as_mut() else {
            return TickOutcome::Ignored;
        };
        if event.status.job_id != job.job_id {
            debug!(job_id = %job.job_id, reported = %event.status.job_id, "Snapshot reports a different job id");
        }
        job.apply(event.status);

        let status = job.status;
        match status {
            JobState::Processing => TickOutcome::Progress {
                progress: job.progress,
                stage: job.stage,
            },
            JobState::Complete => {
                info!(job_id = %job.job_id, "Job completed");
                self.stop_polling();
                self.transition(Phase::Complete);
                TickOutcome::Completed
            }
            JobState::Error => {
                let message = job
                    .error_message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                warn!(job_id = %job.job_id, error = %message, "Job failed");
                self.stop_polling();
                self.error = Some(ErrorBanner {
                    source: ErrorSource::JobFailed,
                    message: message.clone(),
                });
                TickOutcome::Failed { message }
            }
        }
    }

    /// Receive and apply one event.
    pub async fn pump(&mut self) -> Option<TickOutcome> {
        let event = self.next_event().await?;
        Some(self.apply_event(event))
    }

    /// Pump events until the job completes, fails, or polling stops.
    pub async fn run_until_settled(&mut self) -> Option<TickOutcome> {
        while let Some(outcome) = self.pump().await {
            if outcome.is_terminal() {
                return Some(outcome);
            }
        }
        None
    }

    /// Abandon the running job and return to UPLOAD.
    ///
    /// Local state is reset before the remote cancel is sent. The remote
    /// cancel is best effort; its failure is only logged.
    pub async fn cancel(&mut self) -> Result<(), WorkflowError> {
        self.require(Phase::Processing, "cancel")?;
        self.stop_polling();
        let job_id = self.job.take().map(|job| job.job_id);
        self.reset();
        if let Some(job_id) = job_id {
            info!(job_id = %job_id, "Cancelling job");
            if let Err(e) = self.api.cancel_job(&job_id).await {
                warn!(job_id = %job_id, error = %e, "Remote cancel failed");
            }
        }
        Ok(())
    }

    /// Leave a finished job and start over.
    pub fn new_job(&mut self) -> Result<(), WorkflowError> {
        self.require(Phase::Complete, "start a new job")?;
        self.stop_polling();
        self.reset();
        Ok(())
    }

    /// Download link, offered once the job reports a result handle.
    pub fn download_url(&self) -> Option<String> {
        let job = self.job.as_ref()?;
        job.download_url.as_ref()?;
        Some(self.api.download_url(&job.job_id))
    }

    /// Chart for the currently selected preview date.
    pub fn chart(&mut self) -> ChartView {
        let preview = self.job.as_ref().and_then(|j| j.preview.as_ref());
        self.projector.project(preview)
    }

    pub fn select_preview_date(&mut self, date: impl Into<String>) {
        self.projector.select(date);
    }

    pub fn selected_preview_date(&self) -> Option<&str> {
        self.projector.selected_date()
    }

    fn require(&self, phase: Phase, action: &'static str) -> Result<(), WorkflowError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(WorkflowError::InvalidPhase {
                action,
                phase: self.phase,
            })
        }
    }

    fn settle<T>(
        &mut self,
        source: ErrorSource,
        result: Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        match result {
            Ok(value) => {
                self.error = None;
                Ok(value)
            }
            Err(e) => {
                warn!(source = %source, phase = %self.phase, error = %e, "Workflow step failed");
                self.error = Some(ErrorBanner {
                    source,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn transition(&mut self, to: Phase) {
        debug!(from = %self.phase, to = %to, "Phase transition");
        self.phase = to;
    }

    fn reset(&mut self) {
        self.schema = None;
        self.job = None;
        self.error = None;
        self.projector.reset();
        self.transition(Phase::Upload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockImputationApi;
    use crate::error::ApiError;
    use crate::schema::tests::sample_response;
    use crate::types::{JobStatusResponse, ServerJobStatus};

    fn workflow(mock: &Arc<MockImputationApi>) -> Workflow {
        Workflow::new(mock.clone(), &ImputexConfig::default())
    }

    fn upload() -> UploadFile {
        UploadFile::new("readings.csv", b"a,b\n1,2\n".to_vec()).unwrap()
    }

    fn event(generation: u64, sequence: u64, status: ServerJobStatus, progress: f64) -> PollEvent {
        PollEvent {
            generation,
            sequence,
            status: JobStatusResponse {
                job_id: "job-1".into(),
                status,
                progress,
                stage: "Imputing".into(),
                download_url: None,
                error_message: None,
                logs: Vec::new(),
                imputation_preview: None,
            },
        }
    }

    async fn in_schema(mock: &Arc<MockImputationApi>) -> Workflow {
        mock.queue_analyze(Ok(sample_response()));
        let mut wf = workflow(mock);
        wf.analyze(upload()).await.unwrap();
        wf
    }

    #[tokio::test]
    async fn test_actions_rejected_in_wrong_phase() {
        let mock = Arc::new(MockImputationApi::new());
        let mut wf = workflow(&mock);
        assert!(matches!(
            wf.schema_mut(),
            Err(WorkflowError::InvalidPhase { phase: Phase::Upload, .. })
        ));
        assert!(wf.start_job(ModelSelection::default()).await.is_err());
        assert!(wf.cancel().await.is_err());
        assert!(wf.new_job().is_err());
        assert!(wf.error().is_none(), "phase misuse is not a banner");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_upload_discards_schema() {
        let mock = Arc::new(MockImputationApi::new());
        let mut wf = in_schema(&mock).await;
        assert_eq!(wf.phase(), Phase::Schema);
        wf.back_to_upload().unwrap();
        assert_eq!(wf.phase(), Phase::Upload);
        assert!(wf.schema().is_none());
    }

    #[tokio::test]
    async fn test_analyze_failure_sets_banner_and_success_clears_it() {
        let mock = Arc::new(MockImputationApi::new());
        mock.queue_analyze(Err(ApiError::Status {
            status: 400,
            message: "Unsupported file".into(),
        }));
        mock.queue_analyze(Ok(sample_response()));
        let mut wf = workflow(&mock);

        assert!(wf.analyze(upload()).await.is_err());
        assert_eq!(wf.phase(), Phase::Upload);
        let banner = wf.error().unwrap();
        assert_eq!(banner.source, ErrorSource::Analyze);
        assert_eq!(banner.message, "Unsupported file");

        wf.analyze(upload()).await.unwrap();
        assert!(wf.error().is_none());
    }

    #[tokio::test]
    async fn test_dismiss_error_keeps_phase() {
        let mock = Arc::new(MockImputationApi::new());
        let mut wf = in_schema(&mock).await;
        wf.schema_mut().unwrap().mark_all_as_features();
        assert!(wf.start_job(ModelSelection::default()).await.is_err());
        assert_eq!(wf.error().unwrap().source, ErrorSource::Validation);
        wf.dismiss_error();
        assert!(wf.error().is_none());
        assert_eq!(wf.phase(), Phase::Schema);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_and_out_of_order_events_are_ignored() {
        let mock = Arc::new(MockImputationApi::new());
        let mut wf = in_schema(&mock).await;
        wf.start_job(ModelSelection::default()).await.unwrap();
        let generation = wf.generation;

        assert_eq!(
            wf.apply_event(event(generation, 2, ServerJobStatus::Processing, 40.0)),
            TickOutcome::Progress { progress: 40, stage: 2 }
        );
        assert_eq!(
            wf.apply_event(event(generation, 1, ServerJobStatus::Processing, 10.0)),
            TickOutcome::Ignored
        );
        assert_eq!(
            wf.apply_event(event(generation - 1, 9, ServerJobStatus::Completed, 100.0)),
            TickOutcome::Ignored
        );
        assert_eq!(wf.job().unwrap().progress, 40);
        assert_eq!(wf.phase(), Phase::Processing);
        assert!(wf.stop_polling());
        assert!(!wf.stop_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_after_leaving_processing_are_ignored() {
        let mock = Arc::new(MockImputationApi::new());
        let mut wf = in_schema(&mock).await;
        wf.start_job(ModelSelection::default()).await.unwrap();
        let generation = wf.generation;
        assert_eq!(
            wf.apply_event(event(generation, 1, ServerJobStatus::Completed, 100.0)),
            TickOutcome::Completed
        );
        assert_eq!(wf.phase(), Phase::Complete);
        assert_eq!(
            wf.apply_event(event(generation, 2, ServerJobStatus::Failed, 100.0)),
            TickOutcome::Ignored
        );
        assert!(wf.error().is_none());
        assert!(!wf.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_requires_result_handle() {
        let mock = Arc::new(MockImputationApi::new());
        let mut wf = in_schema(&mock).await;
        wf.start_job(ModelSelection::default()).await.unwrap();
        let generation = wf.generation;

        let mut done = event(generation, 1, ServerJobStatus::Completed, 100.0);
        wf.apply_event(done.clone());
        assert_eq!(wf.download_url(), None);

        wf.new_job().unwrap();
        let mut wf = in_schema(&mock).await;
        wf.start_job(ModelSelection::default()).await.unwrap();
        done.generation = wf.generation;
        done.status.download_url = Some("/jobs/job-1/download".into());
        wf.apply_event(done);
        assert_eq!(
            wf.download_url().as_deref(),
            Some("http://mock.imputex/api/v1/jobs/job-1/download")
        );
    }
}
