//! Typed error hierarchy for the board core.
//!
//! - `BackendError`: any failed call to the CRM backend
//! - `TransitionError`: stage transition failures surfaced to the user
//! - `WorkflowValidationError`: side-workflow form problems caught before any call

use thiserror::Error;

/// A failed call to the CRM backend.
///
/// The controller does not distinguish between variants: every one of them
/// triggers a rollback. They exist so logs and notifications can say what
/// went wrong.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Record {id} not found")]
    NotFound { id: i64 },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Backend rejected request to {endpoint} with status {status}: {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    #[error("Transport error talking to {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
}

/// Errors produced while deciding or executing a stage transition.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid stage '{stage}' for {kind} board")]
    InvalidStage { kind: String, stage: String },

    #[error("A stage transition is already pending for record {record_id}")]
    TransitionPending { record_id: i64 },

    #[error("No side workflow is open")]
    NoWorkflowOpen,

    #[error("Workflow input does not match the open {expected} workflow")]
    WorkflowMismatch { expected: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Problems with side-workflow input. These keep the workflow open.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkflowValidationError {
    #[error("Deal title is required")]
    MissingDealTitle,

    #[error("Deal value must be a non-negative number, got {value}")]
    InvalidDealValue { value: f64 },

    #[error("Invalid deal stage '{stage}'")]
    InvalidDealStage { stage: String },

    #[error("Result text is required")]
    MissingResultText,
}
