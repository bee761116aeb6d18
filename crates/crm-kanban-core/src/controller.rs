//! Board controller: sequences drag, policy, persistence and rollback.
//!
//! ## Ordering
//!
//! For a gated transition the workflow's own mutation (deal creation,
//! result capture) must succeed before the stage persistence call is
//! attempted. A lead is never marked "Converted" without a deal, and a task
//! is never "completed" without a recorded result.
//!
//! ## Pending transitions
//!
//! At most one `PendingTransition` exists. While it does, the drag
//! coordinator is locked and refreshes are refused, so nothing else can
//! touch the board until the transition commits or rolls back.
//!
//! A reload while a gesture is in flight abandons that gesture: its snapshot
//! describes the old board and must never be restored over the new one.

use std::collections::HashMap;

use serde::Serialize;

use crate::backend::{ConvertLeadRequest, CrmBackend, TaskResultRequest};
use crate::board::{Board, ContainerId, Item, ItemId, LoadReport, UnknownStagePolicy};
use crate::drag::{DEFAULT_ACTIVATION_DISTANCE, DragCoordinator, DragEvent, DragOutcome, DragPhase, DropResolution};
use crate::error::{BackendError, TransitionError};
use crate::policy::{PendingTransition, Transition, WorkflowKind, classify};
use crate::records::{BoardKind, CrmRecord, Record};
use crate::rollback::roll_back;
use crate::workflow::{WorkflowInput, WorkflowPrompt, WorkflowRequest};

/// How many invalid forms `settle_workflow` accepts before giving up.
pub const MAX_PROMPT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    pub activation_distance: f64,
    pub unknown_stage: UnknownStagePolicy,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            activation_distance: DEFAULT_ACTIVATION_DISTANCE,
            unknown_stage: UnknownStagePolicy::default(),
        }
    }
}

/// Result of feeding one event or workflow answer to the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// Nothing to report (e.g. press below the activation threshold).
    Idle,
    Started { item_id: ItemId },
    Hovered { changed: bool },
    /// Press and release without a drag: navigate to the record.
    Click { record_id: i64 },
    /// Gesture aborted; board restored from the drag snapshot.
    Cancelled,
    /// Input arrived while a transition was pending or out of sequence.
    Ignored,
    ContainerStarted { container_id: ContainerId },
    /// Column order changed locally. Never persisted.
    Reordered { changed: bool },
    /// Dropped in the source container; only the order changed, nothing persisted.
    NoOp,
    Committed {
        record_id: i64,
        stage: String,
        /// False if the follow-up refetch failed; the optimistic board stays.
        refreshed: bool,
    },
    AwaitingWorkflow { request: WorkflowRequest },
    /// Workflow form rejected locally. The workflow stays open.
    Invalid { reason: String },
    RolledBack { record_id: i64, reason: String },
}

pub struct BoardController<B> {
    kind: BoardKind,
    backend: B,
    board: Board,
    drag: DragCoordinator,
    records: HashMap<i64, CrmRecord>,
    pending: Option<PendingTransition>,
}

impl<B: CrmBackend> BoardController<B> {
    pub fn new(kind: BoardKind, backend: B, options: ControllerOptions) -> Self {
        Self {
            kind,
            backend,
            board: Board::for_kind(kind, options.unknown_stage),
            drag: DragCoordinator::new(options.activation_distance),
            records: HashMap::new(),
            pending: None,
        }
    }

    pub fn kind(&self) -> BoardKind {
        self.kind
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref()
    }

    pub fn is_workflow_open(&self) -> bool {
        self.pending.as_ref().is_some_and(PendingTransition::is_gated)
    }

    pub fn drag_phase(&self) -> DragPhase {
        self.drag.phase()
    }

    pub fn record(&self, record_id: i64) -> Option<&CrmRecord> {
        self.records.get(&record_id)
    }

    /// Replace the board from already-fetched records.
    pub fn load_records(&mut self, records: Vec<CrmRecord>) -> LoadReport {
        if self.drag.reset() {
            tracing::debug!(kind = %self.kind, "board reloaded mid-gesture; gesture abandoned");
        }
        let records: Vec<CrmRecord> = records
            .into_iter()
            .filter(|r| {
                let matches = r.kind() == self.kind;
                if !matches {
                    tracing::warn!(record_id = r.record_id(), kind = %self.kind, "skipping record of another kind");
                }
                matches
            })
            .collect();
        let report = self.board.load_from_records(&records, self.kind.group_by_field(), |r| {
            Item::new(r.record_id(), r.card_fields())
        });
        self.records = records.into_iter().map(|r| (r.record_id(), r)).collect();
        tracing::debug!(kind = %self.kind, loaded = report.loaded, dropped = report.dropped, "board loaded");
        report
    }

    /// Refetch from the backend and rebuild the board wholesale.
    pub async fn refresh(&mut self) -> Result<LoadReport, TransitionError> {
        if let Some(pending) = &self.pending {
            return Err(TransitionError::TransitionPending {
                record_id: pending.record_id,
            });
        }
        let records = self.backend.fetch_records(self.kind).await?;
        Ok(self.load_records(records))
    }

    pub async fn handle_drag(&mut self, event: DragEvent) -> TransitionOutcome {
        match self.drag.handle(&mut self.board, event) {
            DragOutcome::None => TransitionOutcome::Idle,
            DragOutcome::Started { item_id } => TransitionOutcome::Started { item_id },
            DragOutcome::Hovered { changed } => TransitionOutcome::Hovered { changed },
            DragOutcome::Click { record_id } => TransitionOutcome::Click { record_id },
            DragOutcome::Cancelled => TransitionOutcome::Cancelled,
            DragOutcome::Ignored => TransitionOutcome::Ignored,
            DragOutcome::ContainerStarted { container_id } => TransitionOutcome::ContainerStarted { container_id },
            DragOutcome::Reordered { changed } => TransitionOutcome::Reordered { changed },
            DragOutcome::Dropped(drop) => self.on_drop(drop).await,
        }
    }

    async fn on_drop(&mut self, drop: DropResolution) -> TransitionOutcome {
        let transition = match classify(self.kind, &drop.source_title, &drop.target_title) {
            Ok(transition) => transition,
            Err(e) => {
                self.board.restore(&drop.snapshot);
                tracing::warn!(record_id = drop.record_id, error = %e, "drop rejected");
                return TransitionOutcome::RolledBack {
                    record_id: drop.record_id,
                    reason: e.to_string(),
                };
            }
        };

        match transition {
            Transition::NoOp => TransitionOutcome::NoOp,
            Transition::Plain { stage } => {
                let record_id = drop.record_id;
                self.open_pending(drop.into_pending(None));
                self.persist_stage(record_id, stage).await
            }
            Transition::Gated { workflow, .. } => {
                self.open_pending(drop.into_pending(Some(workflow)));
                match self.workflow_request() {
                    Some(request) => {
                        tracing::info!(
                            record_id = request.record_id,
                            workflow = %workflow,
                            "side workflow opened"
                        );
                        TransitionOutcome::AwaitingWorkflow { request }
                    }
                    None => self.fail_unexpected(),
                }
            }
        }
    }

    fn open_pending(&mut self, pending: PendingTransition) {
        self.pending = Some(pending);
        self.drag.set_locked(true);
    }

    /// The open workflow, if a gated transition is pending.
    pub fn workflow_request(&self) -> Option<WorkflowRequest> {
        let pending = self.pending.as_ref()?;
        let workflow = pending.workflow?;
        let headline = self
            .board
            .item(&pending.item_id)
            .map(|i| i.fields.headline().to_string())
            .unwrap_or_default();
        Some(WorkflowRequest {
            workflow,
            item_id: pending.item_id.clone(),
            record_id: pending.record_id,
            headline,
            from_stage: pending.from_stage.clone(),
            to_stage: pending.to_stage.clone(),
        })
    }

    /// Confirm the open workflow with the user's form.
    ///
    /// Invalid forms return `Invalid` and keep the workflow open. Otherwise
    /// the workflow mutation runs, then the stage persistence; either failing
    /// rolls the board back.
    pub async fn confirm_workflow(&mut self, input: WorkflowInput) -> Result<TransitionOutcome, TransitionError> {
        let (record_id, stage, workflow) = match &self.pending {
            Some(PendingTransition {
                record_id,
                to_stage,
                workflow: Some(workflow),
                ..
            }) => (*record_id, to_stage.clone(), *workflow),
            _ => return Err(TransitionError::NoWorkflowOpen),
        };

        match (workflow, input) {
            (WorkflowKind::DealConversion, WorkflowInput::DealConversion(form)) => {
                let deal_stage = match form.validate() {
                    Ok(deal_stage) => deal_stage,
                    Err(e) => return Ok(TransitionOutcome::Invalid { reason: e.to_string() }),
                };
                let request = ConvertLeadRequest {
                    deal_title: form.deal_title.trim().to_string(),
                    deal_value: form.deal_value,
                    deal_stage: deal_stage.as_str().to_string(),
                    lead_data: self.lead_data(record_id),
                };
                if let Err(e) = self.backend.convert_lead(record_id, &request).await {
                    return Ok(self.fail(record_id, e));
                }
                tracing::info!(record_id, deal_title = %request.deal_title, "deal created from lead");
            }
            (WorkflowKind::ResultCapture, WorkflowInput::ResultCapture(form)) => {
                if let Err(e) = form.validate() {
                    return Ok(TransitionOutcome::Invalid { reason: e.to_string() });
                }
                let request = TaskResultRequest {
                    result_text: form.result_text,
                    result_type: form.result_type,
                    created_by: form.created_by,
                    created_by_name: form.created_by_name,
                };
                if let Err(e) = self.backend.create_task_result(record_id, &request).await {
                    return Ok(self.fail(record_id, e));
                }
                tracing::info!(record_id, "task result recorded");
            }
            (expected, _) => {
                return Err(TransitionError::WorkflowMismatch {
                    expected: expected.as_str().to_string(),
                });
            }
        }

        let outcome = self.persist_stage(record_id, stage).await;
        if let TransitionOutcome::RolledBack { reason, .. } = &outcome {
            tracing::error!(
                record_id,
                workflow = workflow.as_str(),
                %reason,
                "stage update failed after the workflow side effect; side effect kept"
            );
        }
        Ok(outcome)
    }

    /// Cancel the open workflow. No backend call is made.
    pub fn cancel_workflow(&mut self) -> Result<TransitionOutcome, TransitionError> {
        let record_id = match &self.pending {
            Some(pending) if pending.is_gated() => pending.record_id,
            _ => return Err(TransitionError::NoWorkflowOpen),
        };
        self.roll_back();
        Ok(TransitionOutcome::RolledBack {
            record_id,
            reason: "workflow cancelled".to_string(),
        })
    }

    /// Ask `prompt` to resolve the open workflow and apply its answer.
    pub async fn settle_workflow(&mut self, prompt: &dyn WorkflowPrompt) -> Result<TransitionOutcome, TransitionError> {
        let request = self.workflow_request().ok_or(TransitionError::NoWorkflowOpen)?;
        for attempt in 1..=MAX_PROMPT_ATTEMPTS {
            let Some(input) = prompt.collect(&request).await else {
                return self.cancel_workflow();
            };
            match self.confirm_workflow(input).await? {
                TransitionOutcome::Invalid { reason } => {
                    tracing::warn!(attempt, %reason, "workflow form rejected");
                }
                outcome => return Ok(outcome),
            }
        }
        self.cancel_workflow()
    }

    /// Restore the pre-drag board and clear any pending transition.
    pub fn roll_back(&mut self) -> bool {
        let restored = roll_back(&mut self.board, &mut self.pending);
        self.drag.set_locked(false);
        restored
    }

    async fn persist_stage(&mut self, record_id: i64, stage: String) -> TransitionOutcome {
        match self.backend.set_stage(self.kind, record_id, &stage).await {
            Ok(()) => self.commit(record_id, stage).await,
            Err(e) => self.fail(record_id, e),
        }
    }

    async fn commit(&mut self, record_id: i64, stage: String) -> TransitionOutcome {
        self.pending = None;
        self.drag.set_locked(false);
        self.set_cached_stage(record_id, &stage);
        tracing::info!(record_id, %stage, kind = %self.kind, "stage transition committed");

        let refreshed = match self.refresh().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(record_id, error = %e, "refresh after commit failed; keeping optimistic board");
                false
            }
        };
        TransitionOutcome::Committed {
            record_id,
            stage,
            refreshed,
        }
    }

    fn fail(&mut self, record_id: i64, error: BackendError) -> TransitionOutcome {
        tracing::warn!(record_id, error = %error, "stage transition failed");
        self.roll_back();
        TransitionOutcome::RolledBack {
            record_id,
            reason: error.to_string(),
        }
    }

    fn fail_unexpected(&mut self) -> TransitionOutcome {
        let record_id = self.pending.as_ref().map(|p| p.record_id).unwrap_or_default();
        self.roll_back();
        TransitionOutcome::RolledBack {
            record_id,
            reason: "pending transition lost".to_string(),
        }
    }

    fn lead_data(&self, record_id: i64) -> serde_json::Value {
        match self.records.get(&record_id) {
            Some(CrmRecord::Lead(lead)) => serde_json::to_value(lead).unwrap_or_default(),
            _ => serde_json::json!({ "id": record_id }),
        }
    }

    fn set_cached_stage(&mut self, record_id: i64, stage: &str) {
        match self.records.get_mut(&record_id) {
            Some(CrmRecord::Lead(lead)) => lead.stage = Some(stage.to_string()),
            Some(CrmRecord::Deal(deal)) => deal.stage = Some(stage.to_string()),
            Some(CrmRecord::Task(task)) => task.status = Some(stage.to_string()),
            None => {}
        }
    }
}

impl DropResolution {
    fn into_pending(self, workflow: Option<WorkflowKind>) -> PendingTransition {
        PendingTransition::new(
            self.item_id,
            self.record_id,
            self.source_title,
            self.target_title,
            workflow,
            self.snapshot,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::backend::ConversionReceipt;
    use crate::drag::DropTarget;
    use crate::records::{Lead, Task};
    use crate::workflow::{DealConversionInput, ResultCaptureInput};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Fetch(BoardKind),
        SetStage(BoardKind, i64, String),
        Convert(i64, ConvertLeadRequest),
        TaskResult(i64, TaskResultRequest),
    }

    #[derive(Default)]
    struct MockBackend {
        records: Mutex<Vec<CrmRecord>>,
        calls: Mutex<Vec<Call>>,
        fail_fetch: AtomicBool,
        fail_set_stage: AtomicBool,
        fail_convert: AtomicBool,
        fail_result: AtomicBool,
    }

    impl MockBackend {
        fn with_records(records: Vec<CrmRecord>) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(records),
                ..Default::default()
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn calls_after_load(&self) -> Vec<Call> {
            self.calls().into_iter().skip(1).collect()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn rejected(endpoint: &str) -> BackendError {
            BackendError::Rejected {
                endpoint: endpoint.to_string(),
                status: 500,
                message: "boom".to_string(),
            }
        }
    }

    #[async_trait]
    impl CrmBackend for MockBackend {
        async fn fetch_records(&self, kind: BoardKind) -> Result<Vec<CrmRecord>, BackendError> {
            self.record(Call::Fetch(kind));
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(Self::rejected("fetch"));
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn set_stage(&self, kind: BoardKind, record_id: i64, stage: &str) -> Result<(), BackendError> {
            self.record(Call::SetStage(kind, record_id, stage.to_string()));
            if self.fail_set_stage.load(Ordering::SeqCst) {
                return Err(Self::rejected("stage"));
            }
            let mut records = self.records.lock().unwrap();
            for record in records.iter_mut() {
                match record {
                    CrmRecord::Lead(l) if l.id == record_id => l.stage = Some(stage.to_string()),
                    CrmRecord::Task(t) if t.id == record_id => t.status = Some(stage.to_string()),
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
            self.record(Call::Convert(lead_id, request.clone()));
            if self.fail_convert.load(Ordering::SeqCst) {
                return Err(Self::rejected("convert"));
            }
            Ok(ConversionReceipt::default())
        }

        async fn create_task_result(&self, task_id: i64, request: &TaskResultRequest) -> Result<(), BackendError> {
            self.record(Call::TaskResult(task_id, request.clone()));
            if self.fail_result.load(Ordering::SeqCst) {
                return Err(Self::rejected("results"));
            }
            Ok(())
        }
    }

    struct ScriptedPrompt {
        answers: Mutex<VecDeque<Option<WorkflowInput>>>,
        asked: Mutex<Vec<WorkflowRequest>>,
    }

    impl ScriptedPrompt {
        fn new(answers: Vec<Option<WorkflowInput>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WorkflowPrompt for ScriptedPrompt {
        async fn collect(&self, request: &WorkflowRequest) -> Option<WorkflowInput> {
            self.asked.lock().unwrap().push(request.clone());
            self.answers.lock().unwrap().pop_front().flatten()
        }
    }

    fn lead(id: i64, stage: &str) -> CrmRecord {
        CrmRecord::Lead(Lead {
            id,
            name: format!("Lead {}", id),
            organization: Some("Acme".into()),
            email: None,
            phone: None,
            stage: Some(stage.into()),
            extra: Default::default(),
        })
    }

    fn task(id: i64, status: &str) -> CrmRecord {
        CrmRecord::Task(Task {
            id,
            title: format!("Task {}", id),
            category: None,
            priority: None,
            status: Some(status.into()),
        })
    }

    fn acme_deal() -> WorkflowInput {
        WorkflowInput::DealConversion(DealConversionInput {
            deal_title: "Acme Deal".into(),
            deal_value: 1000.0,
            deal_stage: "Qualification".into(),
        })
    }

    fn outcome_result() -> WorkflowInput {
        WorkflowInput::ResultCapture(ResultCaptureInput {
            result_text: "Customer signed".into(),
            result_type: "outcome".into(),
            created_by: Some(7),
            created_by_name: Some("Sam".into()),
        })
    }

    async fn controller(
        kind: BoardKind,
        records: Vec<CrmRecord>,
    ) -> (BoardController<Arc<MockBackend>>, Arc<MockBackend>) {
        let backend = MockBackend::with_records(records);
        let mut ctrl = BoardController::new(kind, backend.clone(), ControllerOptions::default());
        ctrl.refresh().await.unwrap();
        (ctrl, backend)
    }

    fn column(ctrl: &BoardController<Arc<MockBackend>>, title: &str) -> Vec<i64> {
        ctrl.board()
            .container_by_title(title)
            .unwrap()
            .items
            .iter()
            .map(|i| i.record_id)
            .collect()
    }

    async fn drag_to(ctrl: &mut BoardController<Arc<MockBackend>>, record_id: i64, title: &str) -> TransitionOutcome {
        let item_id = ctrl.board().item_by_record(record_id).unwrap().id.clone();
        let over = DropTarget::Container(ctrl.board().container_by_title(title).unwrap().id.clone());
        ctrl.handle_drag(DragEvent::KeyboardPickUp { item_id }).await;
        ctrl.handle_drag(DragEvent::KeyboardMove { over }).await;
        ctrl.handle_drag(DragEvent::KeyboardDrop).await
    }

    #[tokio::test]
    async fn test_drop_in_source_container_never_persists() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New"), lead(2, "New")]).await;
        let first = ctrl.board().item_by_record(1).unwrap().id.clone();
        let second = ctrl.board().item_by_record(2).unwrap().id.clone();

        ctrl.handle_drag(DragEvent::KeyboardPickUp { item_id: first }).await;
        ctrl.handle_drag(DragEvent::KeyboardMove {
            over: DropTarget::Item(second),
        })
        .await;
        let outcome = ctrl.handle_drag(DragEvent::KeyboardDrop).await;

        assert_eq!(outcome, TransitionOutcome::NoOp);
        assert_eq!(column(&ctrl, "New"), vec![2, 1]);
        assert!(backend.calls_after_load().is_empty());
        assert!(ctrl.pending().is_none());
    }

    #[tokio::test]
    async fn test_ungated_success_commits_and_refreshes() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;

        let outcome = drag_to(&mut ctrl, 1, "Contacted").await;

        assert_eq!(
            outcome,
            TransitionOutcome::Committed {
                record_id: 1,
                stage: "Contacted".into(),
                refreshed: true
            }
        );
        assert_eq!(
            backend.calls_after_load(),
            vec![
                Call::SetStage(BoardKind::Leads, 1, "Contacted".into()),
                Call::Fetch(BoardKind::Leads),
            ]
        );
        assert_eq!(column(&ctrl, "Contacted"), vec![1]);
        assert!(ctrl.pending().is_none());
        // Snapshot discarded: nothing left to roll back.
        assert!(!ctrl.roll_back());
        assert_eq!(column(&ctrl, "Contacted"), vec![1]);
    }

    #[tokio::test]
    async fn test_ungated_failure_restores_pre_drag_board() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New"), lead(2, "Qualified")]).await;
        backend.fail_set_stage.store(true, Ordering::SeqCst);
        let before = ctrl.board().snapshot();

        let outcome = drag_to(&mut ctrl, 1, "Lost").await;

        assert!(matches!(outcome, TransitionOutcome::RolledBack { record_id: 1, .. }));
        assert!(ctrl.board().matches(&before));
        assert!(ctrl.pending().is_none());
        assert_eq!(backend.calls_after_load().len(), 1);

        // Input is unlocked again: the user can simply drag again.
        let item_id = ctrl.board().item_by_record(1).unwrap().id.clone();
        let started = ctrl.handle_drag(DragEvent::KeyboardPickUp { item_id }).await;
        assert!(matches!(started, TransitionOutcome::Started { .. }));
    }

    #[tokio::test]
    async fn test_lead_conversion_cancel_restores_board_without_calls() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        let before = ctrl.board().snapshot();

        let outcome = drag_to(&mut ctrl, 1, "Converted").await;
        match &outcome {
            TransitionOutcome::AwaitingWorkflow { request } => {
                assert_eq!(request.workflow, WorkflowKind::DealConversion);
                assert_eq!(request.record_id, 1);
                assert_eq!(request.headline, "Lead 1");
                assert_eq!(request.from_stage, "New");
                assert_eq!(request.to_stage, "Converted");
            }
            other => panic!("Expected AwaitingWorkflow, got {:?}", other),
        }
        assert!(ctrl.is_workflow_open());
        assert_eq!(column(&ctrl, "Converted"), vec![1]);

        let cancelled = ctrl.cancel_workflow().unwrap();
        assert!(matches!(cancelled, TransitionOutcome::RolledBack { record_id: 1, .. }));
        assert!(ctrl.board().matches(&before));
        assert_eq!(column(&ctrl, "New"), vec![1]);
        assert!(column(&ctrl, "Converted").is_empty());
        assert!(backend.calls_after_load().is_empty());
        assert!(!ctrl.is_workflow_open());
    }

    #[tokio::test]
    async fn test_drags_ignored_while_workflow_open() {
        let (mut ctrl, _backend) = controller(BoardKind::Leads, vec![lead(1, "New"), lead(2, "New")]).await;
        drag_to(&mut ctrl, 1, "Converted").await;
        let other = ctrl.board().item_by_record(2).unwrap().id.clone();
        let outcome = ctrl.handle_drag(DragEvent::KeyboardPickUp { item_id: other }).await;
        assert_eq!(outcome, TransitionOutcome::Ignored);
        assert!(matches!(
            ctrl.refresh().await,
            Err(TransitionError::TransitionPending { record_id: 1 })
        ));
    }

    #[tokio::test]
    async fn test_refresh_mid_drag_keeps_fetched_board() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New"), lead(2, "New")]).await;
        let item_id = ctrl.board().item_by_record(1).unwrap().id.clone();
        let contacted = ctrl.board().container_by_title("Contacted").unwrap().id.clone();
        ctrl.handle_drag(DragEvent::KeyboardPickUp { item_id }).await;
        ctrl.handle_drag(DragEvent::KeyboardMove {
            over: DropTarget::Container(contacted),
        })
        .await;

        backend.records.lock().unwrap().push(lead(3, "Qualified"));
        let report = ctrl.refresh().await.unwrap();
        assert_eq!(report.loaded, 3);
        assert_eq!(ctrl.drag_phase(), DragPhase::Idle);

        let outcome = ctrl.handle_drag(DragEvent::KeyboardDrop).await;
        assert_eq!(outcome, TransitionOutcome::Ignored);
        assert_eq!(ctrl.board().record_ids(), vec![1, 2, 3]);
        assert_eq!(column(&ctrl, "New"), vec![1, 2]);
        assert_eq!(column(&ctrl, "Qualified"), vec![3]);
        assert_eq!(backend.calls_after_load(), vec![Call::Fetch(BoardKind::Leads)]);
    }

    #[tokio::test]
    async fn test_column_drag_reorders_without_persisting() {
        let (mut ctrl, backend) = controller(BoardKind::Tasks, vec![task(1, "pending")]).await;
        let completed = ctrl.board().container_by_title("completed").unwrap().id.clone();
        let pending = ctrl.board().container_by_title("pending").unwrap().id.clone();

        let started = ctrl
            .handle_drag(DragEvent::ContainerPickUp {
                container_id: completed.clone(),
            })
            .await;
        assert_eq!(
            started,
            TransitionOutcome::ContainerStarted {
                container_id: completed
            }
        );
        ctrl.handle_drag(DragEvent::ContainerMove { over: pending }).await;
        let outcome = ctrl.handle_drag(DragEvent::ContainerDrop).await;

        assert_eq!(outcome, TransitionOutcome::Reordered { changed: true });
        assert_eq!(ctrl.board().containers()[0].title, "completed");
        assert!(ctrl.pending().is_none());
        assert!(backend.calls_after_load().is_empty());

        // Column order survives a reload.
        ctrl.refresh().await.unwrap();
        assert_eq!(ctrl.board().containers()[0].title, "completed");
        assert_eq!(column(&ctrl, "pending"), vec![1]);
    }

    #[tokio::test]
    async fn test_lead_conversion_confirm_creates_deal_then_persists_stage() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        drag_to(&mut ctrl, 1, "Converted").await;

        let outcome = ctrl.confirm_workflow(acme_deal()).await.unwrap();

        assert_eq!(
            outcome,
            TransitionOutcome::Committed {
                record_id: 1,
                stage: "Converted".into(),
                refreshed: true
            }
        );
        let calls = backend.calls_after_load();
        assert_eq!(calls.len(), 3);
        match &calls[0] {
            Call::Convert(1, request) => {
                assert_eq!(request.deal_title, "Acme Deal");
                assert_eq!(request.deal_value, 1000.0);
                assert_eq!(request.deal_stage, "Qualification");
                assert_eq!(request.lead_data["name"], "Lead 1");
            }
            other => panic!("Expected Convert first, got {:?}", other),
        }
        assert_eq!(calls[1], Call::SetStage(BoardKind::Leads, 1, "Converted".into()));
        assert_eq!(calls[2], Call::Fetch(BoardKind::Leads));
        assert!(column(&ctrl, "New").is_empty());
        assert_eq!(column(&ctrl, "Converted"), vec![1]);
    }

    #[tokio::test]
    async fn test_conversion_failure_never_persists_stage() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        backend.fail_convert.store(true, Ordering::SeqCst);
        let before = ctrl.board().snapshot();
        drag_to(&mut ctrl, 1, "Converted").await;

        let outcome = ctrl.confirm_workflow(acme_deal()).await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::RolledBack { record_id: 1, .. }));
        assert!(ctrl.board().matches(&before));
        let calls = backend.calls_after_load();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], Call::Convert(1, _)));
    }

    #[tokio::test]
    async fn test_stage_failure_after_conversion_rolls_back() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        backend.fail_set_stage.store(true, Ordering::SeqCst);
        let before = ctrl.board().snapshot();
        drag_to(&mut ctrl, 1, "Converted").await;

        let outcome = ctrl.confirm_workflow(acme_deal()).await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::RolledBack { .. }));
        assert!(ctrl.board().matches(&before));
        assert_eq!(backend.calls_after_load().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_form_keeps_workflow_open() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        drag_to(&mut ctrl, 1, "Converted").await;

        let outcome = ctrl
            .confirm_workflow(WorkflowInput::DealConversion(DealConversionInput {
                deal_title: "".into(),
                deal_value: 10.0,
                deal_stage: "Qualification".into(),
            }))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TransitionOutcome::Invalid {
                reason: "Deal title is required".into()
            }
        );
        assert!(ctrl.is_workflow_open());
        assert!(backend.calls_after_load().is_empty());
    }

    #[tokio::test]
    async fn test_workflow_mismatch_and_missing_workflow() {
        let (mut ctrl, _backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        assert!(matches!(
            ctrl.confirm_workflow(acme_deal()).await,
            Err(TransitionError::NoWorkflowOpen)
        ));
        assert!(matches!(ctrl.cancel_workflow(), Err(TransitionError::NoWorkflowOpen)));

        drag_to(&mut ctrl, 1, "Converted").await;
        assert!(matches!(
            ctrl.confirm_workflow(outcome_result()).await,
            Err(TransitionError::WorkflowMismatch { .. })
        ));
        assert!(ctrl.is_workflow_open());
    }

    #[tokio::test]
    async fn test_task_completion_cancel_keeps_task_pending() {
        let (mut ctrl, backend) = controller(BoardKind::Tasks, vec![task(5, "pending")]).await;

        let outcome = drag_to(&mut ctrl, 5, "completed").await;
        assert!(matches!(
            outcome,
            TransitionOutcome::AwaitingWorkflow { ref request } if request.workflow == WorkflowKind::ResultCapture
        ));

        ctrl.cancel_workflow().unwrap();
        assert_eq!(column(&ctrl, "pending"), vec![5]);
        assert!(backend.calls_after_load().is_empty());
    }

    #[tokio::test]
    async fn test_task_completion_records_result_before_status() {
        let (mut ctrl, backend) = controller(BoardKind::Tasks, vec![task(5, "pending")]).await;
        drag_to(&mut ctrl, 5, "completed").await;

        let outcome = ctrl.confirm_workflow(outcome_result()).await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::Committed { record_id: 5, .. }));
        let calls = backend.calls_after_load();
        match &calls[0] {
            Call::TaskResult(5, request) => {
                assert_eq!(request.result_text, "Customer signed");
                assert_eq!(request.created_by_name.as_deref(), Some("Sam"));
            }
            other => panic!("Expected TaskResult first, got {:?}", other),
        }
        assert_eq!(calls[1], Call::SetStage(BoardKind::Tasks, 5, "completed".into()));
        assert_eq!(column(&ctrl, "completed"), vec![5]);
    }

    #[tokio::test]
    async fn test_result_failure_rolls_back_without_status_call() {
        let (mut ctrl, backend) = controller(BoardKind::Tasks, vec![task(5, "pending")]).await;
        backend.fail_result.store(true, Ordering::SeqCst);
        drag_to(&mut ctrl, 5, "completed").await;

        let outcome = ctrl.confirm_workflow(outcome_result()).await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::RolledBack { .. }));
        assert_eq!(column(&ctrl, "pending"), vec![5]);
        assert!(
            !backend
                .calls()
                .iter()
                .any(|c| matches!(c, Call::SetStage(..)))
        );
    }

    #[tokio::test]
    async fn test_settle_workflow_retries_invalid_answers() {
        let (mut ctrl, _backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        drag_to(&mut ctrl, 1, "Converted").await;
        let prompt = ScriptedPrompt::new(vec![
            Some(WorkflowInput::DealConversion(DealConversionInput {
                deal_title: "Acme".into(),
                deal_value: -5.0,
                deal_stage: "Qualification".into(),
            })),
            Some(acme_deal()),
        ]);

        let outcome = ctrl.settle_workflow(&prompt).await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::Committed { .. }));
        assert_eq!(prompt.asked.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_settle_workflow_cancel_rolls_back() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        let before = ctrl.board().snapshot();
        drag_to(&mut ctrl, 1, "Converted").await;
        let prompt = ScriptedPrompt::new(vec![None]);

        let outcome = ctrl.settle_workflow(&prompt).await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::RolledBack { .. }));
        assert!(ctrl.board().matches(&before));
        assert!(backend.calls_after_load().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_after_commit_keeps_optimistic_board() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        backend.fail_fetch.store(true, Ordering::SeqCst);

        let outcome = drag_to(&mut ctrl, 1, "Qualified").await;

        assert_eq!(
            outcome,
            TransitionOutcome::Committed {
                record_id: 1,
                stage: "Qualified".into(),
                refreshed: false
            }
        );
        assert_eq!(column(&ctrl, "Qualified"), vec![1]);
        match ctrl.record(1) {
            Some(CrmRecord::Lead(l)) => assert_eq!(l.stage.as_deref(), Some("Qualified")),
            other => panic!("Expected cached lead, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_records_of_other_kinds_are_skipped() {
        let (ctrl, _backend) = controller(BoardKind::Leads, vec![lead(1, "New"), task(2, "pending")]).await;
        assert_eq!(ctrl.board().record_ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_click_is_reported() {
        let (mut ctrl, backend) = controller(BoardKind::Leads, vec![lead(1, "New")]).await;
        let item_id = ctrl.board().item_by_record(1).unwrap().id.clone();
        ctrl.handle_drag(DragEvent::PointerDown {
            item_id,
            at: crate::drag::Point::new(0.0, 0.0),
        })
        .await;
        let outcome = ctrl.handle_drag(DragEvent::PointerUp { over: None }).await;
        assert_eq!(outcome, TransitionOutcome::Click { record_id: 1 });
        assert!(backend.calls_after_load().is_empty());
    }
}
