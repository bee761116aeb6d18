//! Typed errors for the application layer.
//!
//! The board core defines its own hierarchy (`BackendError`,
//! `TransitionError`, `WorkflowValidationError`). `KanbanError` wraps those
//! and adds the failures that only exist at this level: configuration,
//! client construction, and argument parsing.

use crm_kanban_core::{BackendError, TransitionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("Invalid board kind '{0}'. Valid values: leads, deals, tasks")]
    InvalidBoardKind(String),

    #[error("Invalid configuration:\n  - {}", warnings.join("\n  - "))]
    InvalidConfig { warnings: Vec<String> },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Record {record_id} is not on the {kind} board")]
    RecordNotOnBoard { kind: String, record_id: i64 },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
