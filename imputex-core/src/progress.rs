//! Renderable job model derived from status snapshots.
//!
//! Every snapshot replaces the server-derived fields of [`JobView`]
//! wholesale; nothing is merged across ticks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::model::ModelKind;
use crate::schema::SchemaReview;
use crate::translator::JobConfig;
use crate::types::{ColumnRole, ImputationPreview, JobStatusResponse, ServerJobStatus};

/// Display names of the pipeline stages, in order.
pub const STAGE_LABELS: [&str; 4] = ["Preprocess", "Encode", "Impute", "Export"];

/// Server status collapsed to what the client distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Processing,
    Complete,
    Error,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Processing => write!(f, "PROCESSING"),
            JobState::Complete => write!(f, "COMPLETE"),
            JobState::Error => write!(f, "ERROR"),
        }
    }
}

pub fn collapse_status(status: ServerJobStatus) -> JobState {
    match status {
        ServerJobStatus::Completed => JobState::Complete,
        ServerJobStatus::Failed => JobState::Error,
        _ => JobState::Processing,
    }
}

/// Rough time-to-completion label. Assumes ~15 percentage points per minute.
pub fn format_eta(progress: u8) -> String {
    if progress >= 100 {
        return "Complete".to_string();
    }
    let remaining = u32::from(100 - progress);
    let minutes = remaining.div_ceil(15).max(1);
    format!("~{minutes} min")
}

/// Map a server stage label to its position in [`STAGE_LABELS`].
///
/// `4` means every stage is done, `-1` means the job failed. Unknown labels map to `0`.
pub fn stage_index(label: &str) -> i8 {
    match label {
        "Queued" | "Reading data" => 0,
        "Preprocessing" | "Encoding" => 1,
        "Imputing" => 2,
        "Exporting" => 3,
        "Complete" => 4,
        "Failed" => -1,
        _ => 0,
    }
}

/// Round and clamp a reported progress value into `0..=100`.
pub fn clamp_progress(progress: f64) -> u8 {
    if progress.is_finite() {
        progress.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Done,
    Active,
    Pending,
}

/// Fill status of one TARGET column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProgress {
    pub name: String,
    pub missing_count: u64,
    pub total_count: u64,
    pub fill_progress: u8,
}

/// Everything the client shows about a running or finished job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub model: ModelKind,
    pub status: JobState,
    pub progress: u8,
    pub eta: String,
    pub stage: i8,
    pub columns: Vec<ColumnProgress>,
    pub logs: Vec<String>,
    pub download_url: Option<String>,
    pub error_message: Option<String>,
    pub preview: Option<ImputationPreview>,
    /// When the last snapshot was applied; `None` until the first tick.
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobView {
    /// Placeholder view for a job that was just accepted by the service.
    pub fn new(job_id: impl Into<String>, config: &JobConfig, schema: &SchemaReview) -> Self {
        let columns = config
            .columns()
            .iter()
            .filter(|c| c.role == ColumnRole::Target)
            .map(|c| ColumnProgress {
                name: c.name.clone(),
                missing_count: schema.column(&c.name).map_or(0, |p| p.null_count),
                total_count: schema.sample_rows,
                fill_progress: 0,
            })
            .collect();
        Self {
            job_id: job_id.into(),
            model: config.model().kind(),
            status: JobState::Processing,
            progress: 0,
            eta: format_eta(0),
            stage: 0,
            columns,
            logs: Vec::new(),
            download_url: None,
            error_message: None,
            preview: None,
            updated_at: None,
        }
    }

    /// Replace the server-derived fields with `snapshot`.
    ///
    /// The snapshot's own `job_id` is not compared; the poller only asks for this job.
    pub fn apply(&mut self, snapshot: JobStatusResponse) {
        let progress = clamp_progress(snapshot.progress);
        self.status = collapse_status(snapshot.status);
        self.progress = progress;
        self.eta = format_eta(progress);
        self.stage = stage_index(&snapshot.stage);
        self.logs = snapshot.logs;
        self.download_url = snapshot.download_url;
        self.error_message = snapshot.error_message;
        self.preview = snapshot.imputation_preview;
        for column in &mut self.columns {
            column.fill_progress = progress;
        }
        self.updated_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status != JobState::Processing
    }

    /// Each display stage paired with its state relative to the current one.
    pub fn stages(&self) -> Vec<(&'static str, StageState)> {
        STAGE_LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let i = i as i8;
                let state = if i < self.stage {
                    StageState::Done
                } else if i == self.stage {
                    StageState::Active
                } else {
                    StageState::Pending
                };
                (*label, state)
            })
            .collect()
    }

    /// The last `n` log lines.
    pub fn log_tail(&self, n: usize) -> &[String] {
        let start = self.logs.len().saturating_sub(n);
        &self.logs[start..]
    }
}
