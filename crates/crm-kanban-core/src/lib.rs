//! Core of the CRM kanban boards.
//!
//! Everything here is independent of transport: the board model, the drag
//! state machine, the stage transition policy, side workflow forms, and the
//! controller that sequences them against a [`backend::CrmBackend`].

pub mod backend;
pub mod board;
pub mod controller;
pub mod drag;
pub mod error;
pub mod policy;
pub mod records;
pub mod rollback;
pub mod workflow;

pub use backend::{ConversionReceipt, ConvertLeadRequest, CrmBackend, TaskResultRequest};
pub use board::{Board, BoardSnapshot, Container, ContainerId, Item, ItemId, LoadReport, UnknownStagePolicy};
pub use controller::{BoardController, ControllerOptions, TransitionOutcome};
pub use drag::{DragCoordinator, DragEvent, DragOutcome, DragPhase, DropTarget, Point};
pub use error::{BackendError, TransitionError, WorkflowValidationError};
pub use policy::{PendingTransition, Transition, WorkflowKind};
pub use records::{BoardKind, CardFields, CrmRecord, Deal, DealStage, Lead, LeadStage, Record, Task, TaskStatus};
pub use workflow::{DealConversionInput, ResultCaptureInput, WorkflowInput, WorkflowPrompt, WorkflowRequest};
