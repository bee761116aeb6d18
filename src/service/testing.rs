//! In-memory CRM used by the service tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crm_kanban_core::{
    BackendError, BoardKind, ConversionReceipt, ConvertLeadRequest, CrmBackend, CrmRecord, Deal, Lead, Task,
    TaskResultRequest,
};

#[derive(Default)]
pub struct FakeBackend {
    records: Mutex<Vec<CrmRecord>>,
    stage_calls: Mutex<Vec<(BoardKind, i64, String)>>,
    conversions: Mutex<Vec<(i64, String)>>,
    fail_stage: AtomicBool,
    fail_fetch: AtomicBool,
}

impl FakeBackend {
    /// Leads 1-3 (3 has a stage no board knows), deal 10, tasks 20-21.
    pub fn with_sample_data() -> Arc<Self> {
        let lead = |id: i64, name: &str, stage: &str| {
            CrmRecord::Lead(Lead {
                id,
                name: name.to_string(),
                organization: Some("Acme".to_string()),
                email: None,
                phone: None,
                stage: Some(stage.to_string()),
                extra: Default::default(),
            })
        };
        let task = |id: i64, title: &str, status: &str| {
            CrmRecord::Task(Task {
                id,
                title: title.to_string(),
                category: Some("call".to_string()),
                priority: Some("high".to_string()),
                status: Some(status.to_string()),
            })
        };
        let records = vec![
            lead(1, "Ada", "New"),
            lead(2, "Grace", "Qualified"),
            lead(3, "Linus", "Archived"),
            CrmRecord::Deal(Deal {
                id: 10,
                title: "Acme renewal".to_string(),
                value: Some(5000.0),
                organization: Some("Acme".to_string()),
                stage: Some("Proposal".to_string()),
                lead_id: None,
            }),
            task(20, "Send contract", "pending"),
            task(21, "Follow up", "in_progress"),
        ];
        Arc::new(Self {
            records: Mutex::new(records),
            ..Default::default()
        })
    }

    pub fn fail_stage_updates(&self) {
        self.fail_stage.store(true, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn stage_calls(&self) -> Vec<(BoardKind, i64, String)> {
        self.stage_calls.lock().unwrap().clone()
    }

    pub fn conversions(&self) -> Vec<(i64, String)> {
        self.conversions.lock().unwrap().clone()
    }
}

#[async_trait]
impl CrmBackend for FakeBackend {
    async fn fetch_records(&self, kind: BoardKind) -> Result<Vec<CrmRecord>, BackendError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BackendError::Transport {
                endpoint: kind.as_str().to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect())
    }

    async fn set_stage(&self, kind: BoardKind, record_id: i64, stage: &str) -> Result<(), BackendError> {
        self.stage_calls
            .lock()
            .unwrap()
            .push((kind, record_id, stage.to_string()));
        if self.fail_stage.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected {
                endpoint: format!("{}/{}", kind, record_id),
                status: 500,
                message: "database unavailable".to_string(),
            });
        }
        for record in self.records.lock().unwrap().iter_mut() {
            match record {
                CrmRecord::Lead(l) if kind == BoardKind::Leads && l.id == record_id => l.stage = Some(stage.into()),
                CrmRecord::Deal(d) if kind == BoardKind::Deals && d.id == record_id => d.stage = Some(stage.into()),
                CrmRecord::Task(t) if kind == BoardKind::Tasks && t.id == record_id => t.status = Some(stage.into()),
                _ => {}
            }
        }
        Ok(())
    }

    async fn convert_lead(
        &self,
        lead_id: i64,
        request: &ConvertLeadRequest,
    ) -> Result<ConversionReceipt, BackendError> {
        self.conversions
            .lock()
            .unwrap()
            .push((lead_id, request.deal_title.clone()));
        Ok(ConversionReceipt::default())
    }

    async fn create_task_result(&self, _task_id: i64, _request: &TaskResultRequest) -> Result<(), BackendError> {
        Ok(())
    }
}
