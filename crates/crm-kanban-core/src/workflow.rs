//! Side workflows that gate a stage change, and the seam the UI uses to
//! answer them.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::board::ItemId;
use crate::error::WorkflowValidationError;
use crate::policy::WorkflowKind;
use crate::records::DealStage;

/// What the UI needs to render an open workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub workflow: WorkflowKind,
    pub item_id: ItemId,
    pub record_id: i64,
    /// Card headline, e.g. lead name or task title.
    pub headline: String,
    pub from_stage: String,
    pub to_stage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealConversionInput {
    pub deal_title: String,
    pub deal_value: f64,
    pub deal_stage: String,
}

impl DealConversionInput {
    /// Check the form before any network call.
    pub fn validate(&self) -> Result<DealStage, WorkflowValidationError> {
        if self.deal_title.trim().is_empty() {
            return Err(WorkflowValidationError::MissingDealTitle);
        }
        if !self.deal_value.is_finite() || self.deal_value < 0.0 {
            return Err(WorkflowValidationError::InvalidDealValue {
                value: self.deal_value,
            });
        }
        DealStage::from_str(self.deal_stage.trim()).map_err(|_| {
            WorkflowValidationError::InvalidDealStage {
                stage: self.deal_stage.clone(),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultCaptureInput {
    pub result_text: String,
    #[serde(default = "default_result_type")]
    pub result_type: String,
    #[serde(default)]
    pub created_by: Option<i64>,
    #[serde(default)]
    pub created_by_name: Option<String>,
}

fn default_result_type() -> String {
    "note".to_string()
}

impl ResultCaptureInput {
    pub fn validate(&self) -> Result<(), WorkflowValidationError> {
        if self.result_text.trim().is_empty() {
            return Err(WorkflowValidationError::MissingResultText);
        }
        Ok(())
    }
}

/// A confirmed workflow form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "workflow", rename_all = "snake_case")]
pub enum WorkflowInput {
    DealConversion(DealConversionInput),
    ResultCapture(ResultCaptureInput),
}

impl WorkflowInput {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            Self::DealConversion(_) => WorkflowKind::DealConversion,
            Self::ResultCapture(_) => WorkflowKind::ResultCapture,
        }
    }
}

/// Collects a workflow form from the user.
///
/// `None` means the user cancelled. Implementations: the CLI's dialoguer
/// prompt; tests use scripted answers.
#[async_trait]
pub trait WorkflowPrompt: Send + Sync {
    async fn collect(&self, request: &WorkflowRequest) -> Option<WorkflowInput>;
}
