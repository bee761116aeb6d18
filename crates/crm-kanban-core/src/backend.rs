use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::records::{BoardKind, CrmRecord};

/// Body of `POST /leads/{id}/convert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertLeadRequest {
    pub deal_title: String,
    pub deal_value: f64,
    pub deal_stage: String,
    pub lead_data: serde_json::Value,
}

/// Created deal and updated lead as returned by the backend.
///
/// Kept loosely typed: the board refetches afterwards, so only success
/// matters here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionReceipt {
    #[serde(default)]
    pub deal: Option<serde_json::Value>,
    #[serde(default)]
    pub lead: Option<serde_json::Value>,
}

/// Body of the task result creation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultRequest {
    pub result_text: String,
    pub result_type: String,
    pub created_by: Option<i64>,
    pub created_by_name: Option<String>,
}

/// Abstraction over the CRM backend for testability.
/// Real implementation: `HttpCrmClient`. Test double: `MockBackend`.
///
/// `set_stage` is the remote stage persistence call: idempotent, one record,
/// success or failure only.
#[async_trait]
pub trait CrmBackend: Send + Sync {
    async fn fetch_records(&self, kind: BoardKind) -> Result<Vec<CrmRecord>, BackendError>;

    async fn set_stage(&self, kind: BoardKind, record_id: i64, stage: &str) -> Result<(), BackendError>;

    async fn convert_lead(
        &self,
        lead_id: i64,
        request: &ConvertLeadRequest,
    ) -> Result<ConversionReceipt, BackendError>;

    async fn create_task_result(&self, task_id: i64, request: &TaskResultRequest) -> Result<(), BackendError>;
}

#[async_trait]
impl<T: CrmBackend + ?Sized> CrmBackend for Arc<T> {
    async fn fetch_records(&self, kind: BoardKind) -> Result<Vec<CrmRecord>, BackendError> {
        (**self).fetch_records(kind).await
    }

    async fn set_stage(&self, kind: BoardKind, record_id: i64, stage: &str) -> Result<(), BackendError> {
        (**self).set_stage(kind, record_id, stage).await
    }

    async fn convert_lead(
        &self,
        lead_id: i64,
        request: &ConvertLeadRequest,
    ) -> Result<ConversionReceipt, BackendError> {
        (**self).convert_lead(lead_id, request).await
    }

    async fn create_task_result(&self, task_id: i64, request: &TaskResultRequest) -> Result<(), BackendError> {
        (**self).create_task_result(task_id, request).await
    }
}
