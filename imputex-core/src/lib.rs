//! # ImputeX Core
//!
//! Client-side orchestration for the ImputeX imputation service.
//! Provides the workflow state machine, schema review, job configuration
//! translation, status polling, preview projection, the HTTP client and
//! configuration loading.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod poller;
pub mod preview;
pub mod progress;
pub mod schema;
pub mod translator;
pub mod types;
pub mod workflow;

// Re-export commonly used types at the crate root.
pub use client::{ApiCall, HttpImputationClient, ImputationApi, MockImputationApi, UploadFile};
pub use config::{ImputexConfig, load_config};
pub use error::{ApiError, ConfigError, ImputexError, Result, WorkflowError};
pub use model::{HyperparameterBag, ModelKind, ModelSelection};
pub use poller::{JobPoller, PollEvent, PollSettings};
pub use preview::{ChartData, ChartPoint, ChartView, PreviewProjector};
pub use progress::{JobState, JobView, StageState};
pub use schema::{ColumnFilter, ColumnProfile, SchemaReview};
pub use translator::{JobConfig, translate};
pub use types::{ColumnRole, ColumnType, Phase, ServerJobStatus};
pub use workflow::{ErrorBanner, ErrorSource, TickOutcome, Workflow};
