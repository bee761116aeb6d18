//! Stage Transition Policy.
//!
//! Decides what has to happen before a dropped card's new stage is durable:
//! nothing (same stage), an immediate persist (ungated), or a side workflow
//! followed by a persist (gated).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::{BoardSnapshot, ItemId};
use crate::error::TransitionError;
use crate::records::{BoardKind, LeadStage, TaskStatus};

/// Side workflow that gates a stage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Lead → "Converted": create a deal from the lead first.
    DealConversion,
    /// Task → "completed": record the outcome first.
    ResultCapture,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DealConversion => "deal_conversion",
            Self::ResultCapture => "result_capture",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    NoOp,
    Plain { stage: String },
    Gated { stage: String, workflow: WorkflowKind },
}

/// The workflow, if any, that gates moving a `kind` record into `target`.
pub fn gate_for(kind: BoardKind, target: &str) -> Option<WorkflowKind> {
    match kind {
        BoardKind::Leads if LeadStage::from_str(target) == Ok(LeadStage::Converted) => {
            Some(WorkflowKind::DealConversion)
        }
        BoardKind::Tasks if TaskStatus::from_str(target) == Ok(TaskStatus::Completed) => {
            Some(WorkflowKind::ResultCapture)
        }
        _ => None,
    }
}

/// Classify a drop from `source` to `target`.
///
/// Same-stage drops are a no-op regardless of vocabulary. A target outside
/// the board kind's stage set is a caller error.
pub fn classify(kind: BoardKind, source: &str, target: &str) -> Result<Transition, TransitionError> {
    if source == target {
        return Ok(Transition::NoOp);
    }
    kind.validate_stage(target)?;
    let stage = target.to_string();
    Ok(match gate_for(kind, target) {
        Some(workflow) => Transition::Gated { stage, workflow },
        None => Transition::Plain { stage },
    })
}

/// A stage change between drop and resolution.
///
/// Holds the pre-drag snapshot until the transition either commits (the
/// snapshot is discarded with this value) or fails (the snapshot is
/// restored by the rollback mechanism).
#[derive(Debug, Clone, Serialize)]
pub struct PendingTransition {
    pub item_id: ItemId,
    pub record_id: i64,
    pub from_stage: String,
    pub to_stage: String,
    /// Open side workflow, `None` for a plain persist in flight.
    pub workflow: Option<WorkflowKind>,
    #[serde(skip)]
    pub(crate) snapshot: BoardSnapshot,
}

impl PendingTransition {
    pub fn new(
        item_id: ItemId,
        record_id: i64,
        from_stage: String,
        to_stage: String,
        workflow: Option<WorkflowKind>,
        snapshot: BoardSnapshot,
    ) -> Self {
        Self {
            item_id,
            record_id,
            from_stage,
            to_stage,
            workflow,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> &BoardSnapshot {
        &self.snapshot
    }

    pub fn is_gated(&self) -> bool {
        self.workflow.is_some()
    }
}
