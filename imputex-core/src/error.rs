//! Error types for the ImputeX client core.
//!
//! Uses `thiserror` for public API error types, split by domain: the service
//! boundary, the workflow state machine, and configuration.

use crate::types::Phase;

/// Top-level error type for the ImputeX core library.
#[derive(Debug, thiserror::Error)]
pub enum ImputexError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from calls to the imputation service.
///
/// Cloneable so scripted mock responses and the error banner can hold them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {message}")]
    Request { message: String },

    /// Non-success HTTP status; `message` is the server's detail or `HTTP {status}`.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Invalid upload: {reason}")]
    InvalidUpload { reason: String },
}

/// Errors from workflow transitions and schema edits.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Cannot {action} while in the {phase} phase")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error("Select at least one TARGET column before starting a job")]
    NoTargetColumns,

    #[error("Unknown column: {name}")]
    UnknownColumn { name: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `ImputexError`.
pub type Result<T> = std::result::Result<T, ImputexError>;
