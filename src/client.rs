//! HTTP client for the CRM backend.
//!
//! One request per call, an explicit timeout and no retries. Any non-2xx
//! status, transport error, timeout or undecodable body comes back as a
//! [`BackendError`], which the board controller treats as one failure signal.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use crm_kanban_core::{
    BackendError, BoardKind, ConversionReceipt, ConvertLeadRequest, CrmBackend, CrmRecord, Deal, Lead, Task,
    TaskResultRequest,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::errors::KanbanError;
use crate::kanban_config::KanbanConfig;

/// List endpoints answer either with a bare array or wrapped in `data`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) | ListBody::Wrapped { data: items } => items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpCrmClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCrmClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, KanbanError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KanbanError::ClientBuild)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &KanbanConfig) -> Result<Self, KanbanError> {
        Self::new(config.backend_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send and turn anything but 2xx into a `BackendError`.
    ///
    /// `record_id` lets a 404 name the record it was about.
    async fn send(
        &self,
        endpoint: &str,
        record_id: Option<i64>,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let started = Instant::now();
        let response = request.send().await.map_err(|e| transport_error(endpoint, e))?;
        let status = response.status();
        tracing::debug!(
            endpoint,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "crm request"
        );
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND
            && let Some(id) = record_id
        {
            return Err(BackendError::NotFound { id });
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Rejected {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, BackendError> {
        let response = self.send(path, None, self.http.get(self.url(path))).await?;
        let bytes = response.bytes().await.map_err(|e| transport_error(path, e))?;
        serde_json::from_slice::<ListBody<T>>(&bytes)
            .map(ListBody::into_vec)
            .map_err(|e| BackendError::MalformedResponse {
                endpoint: path.to_string(),
                message: e.to_string(),
            })
    }
}

/// Path and body of the stage persistence call for one record.
fn stage_request(kind: BoardKind, record_id: i64, stage: &str) -> (String, serde_json::Value) {
    match kind {
        BoardKind::Leads => (format!("leads/{}/stage", record_id), serde_json::json!({ "stage": stage })),
        BoardKind::Deals => (format!("deals/{}/stage", record_id), serde_json::json!({ "stage": stage })),
        BoardKind::Tasks => (
            format!("tasks/{}/updateStatus", record_id),
            serde_json::json!({ "status": stage }),
        ),
    }
}

fn transport_error(endpoint: &str, error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else if error.is_decode() {
        BackendError::MalformedResponse {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        }
    } else {
        BackendError::Transport {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        }
    }
}

/// Pull a readable message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[async_trait]
impl CrmBackend for HttpCrmClient {
    async fn fetch_records(&self, kind: BoardKind) -> Result<Vec<CrmRecord>, BackendError> {
        let path = kind.as_str();
        let records = match kind {
            BoardKind::Leads => self
                .fetch_list::<Lead>(path)
                .await?
                .into_iter()
                .map(CrmRecord::Lead)
                .collect(),
            BoardKind::Deals => self
                .fetch_list::<Deal>(path)
                .await?
                .into_iter()
                .map(CrmRecord::Deal)
                .collect(),
            BoardKind::Tasks => self
                .fetch_list::<Task>(path)
                .await?
                .into_iter()
                .map(CrmRecord::Task)
                .collect(),
        };
        Ok(records)
    }

    async fn set_stage(&self, kind: BoardKind, record_id: i64, stage: &str) -> Result<(), BackendError> {
        let (path, body) = stage_request(kind, record_id, stage);
        self.send(&path, Some(record_id), self.http.put(self.url(&path)).json(&body))
            .await?;
        Ok(())
    }

    async fn convert_lead(
        &self,
        lead_id: i64,
        request: &ConvertLeadRequest,
    ) -> Result<ConversionReceipt, BackendError> {
        let path = format!("leads/{}/convert", lead_id);
        let response = self
            .send(&path, Some(lead_id), self.http.post(self.url(&path)).json(request))
            .await?;
        let bytes = response.bytes().await.map_err(|e| transport_error(&path, e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ConversionReceipt::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| BackendError::MalformedResponse {
            endpoint: path,
            message: e.to_string(),
        })
    }

    async fn create_task_result(&self, task_id: i64, request: &TaskResultRequest) -> Result<(), BackendError> {
        let path = format!("tasks/{}/results", task_id);
        self.send(&path, Some(task_id), self.http.post(self.url(&path)).json(request))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining_ignores_extra_slashes() {
        let client = HttpCrmClient::new("http://crm.local/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://crm.local/api");
        assert_eq!(client.url("leads"), "http://crm.local/api/leads");
        assert_eq!(client.url("/leads/1/stage"), "http://crm.local/api/leads/1/stage");
    }

    #[test]
    fn test_stage_request_per_kind() {
        let (path, body) = stage_request(BoardKind::Leads, 4, "Qualified");
        assert_eq!(path, "leads/4/stage");
        assert_eq!(body, serde_json::json!({"stage": "Qualified"}));

        let (path, body) = stage_request(BoardKind::Deals, 2, "Closed Won");
        assert_eq!(path, "deals/2/stage");
        assert_eq!(body["stage"], "Closed Won");

        let (path, body) = stage_request(BoardKind::Tasks, 9, "in_progress");
        assert_eq!(path, "tasks/9/updateStatus");
        assert_eq!(body, serde_json::json!({"status": "in_progress"}));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"Lead locked"}"#), "Lead locked");
        assert_eq!(error_message(r#"{"error":"nope"}"#), "nope");
        assert_eq!(error_message("  plain text \n"), "plain text");
        assert_eq!(error_message(""), "no details");
        assert_eq!(error_message(&"x".repeat(500)).len(), 200);
    }

    #[test]
    fn test_list_body_accepts_both_shapes() {
        let bare: ListBody<Task> = serde_json::from_str(r#"[{"id":1,"title":"Call"}]"#).unwrap();
        assert_eq!(bare.into_vec().len(), 1);
        let wrapped: ListBody<Task> = serde_json::from_str(r#"{"data":[{"id":1,"title":"Call"},{"id":2,"title":"Mail"}]}"#).unwrap();
        assert_eq!(wrapped.into_vec().len(), 2);
        assert!(serde_json::from_str::<ListBody<Task>>(r#"{"rows":[]}"#).is_err());
    }
}
