use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crm_kanban_core::{
    Board, BoardController, BoardKind, ControllerOptions, CrmBackend, DragEvent, DragPhase, PendingTransition,
    TransitionError, TransitionOutcome, WorkflowInput, WorkflowRequest,
};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};

use super::ws::{NotificationLevel, WsMessage, broadcast_message};

// ── Shared application state ──────────────────────────────────────────

pub type SharedBackend = Arc<dyn CrmBackend>;
pub type SharedController = Mutex<BoardController<SharedBackend>>;

/// One live controller per board kind. Each is behind its own lock, so a
/// slow persist on one board never blocks drags on another.
pub struct AppState {
    pub boards: HashMap<BoardKind, SharedController>,
    pub ws_tx: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(backend: SharedBackend, options: ControllerOptions, ws_tx: broadcast::Sender<String>) -> Self {
        let boards = BoardKind::ALL
            .into_iter()
            .map(|kind| (kind, Mutex::new(BoardController::new(kind, backend.clone(), options))))
            .collect();
        Self { boards, ws_tx }
    }

    fn controller(&self, kind: &str) -> Result<(BoardKind, &SharedController), ApiError> {
        let kind = BoardKind::from_str(kind).map_err(ApiError::NotFound)?;
        let controller = self
            .boards
            .get(&kind)
            .ok_or_else(|| ApiError::Internal(format!("No controller for {} board", kind)))?;
        Ok((kind, controller))
    }

    /// Load every board once. Failures are logged; the board stays empty
    /// until a refresh succeeds.
    pub async fn load_all(&self) {
        for (kind, controller) in &self.boards {
            match controller.lock().await.refresh().await {
                Ok(report) => tracing::info!(%kind, loaded = report.loaded, "board loaded"),
                Err(e) => tracing::warn!(%kind, error = %e, "initial board load failed"),
            }
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Response payload types ────────────────────────────────────────────

#[derive(Serialize)]
pub struct BoardView {
    pub kind: BoardKind,
    pub board: Board,
    pub pending: Option<PendingTransition>,
    pub workflow: Option<WorkflowRequest>,
    pub drag_phase: DragPhase,
}

impl BoardView {
    fn of(controller: &BoardController<SharedBackend>) -> Self {
        Self {
            kind: controller.kind(),
            board: controller.board().clone(),
            pending: controller.pending().cloned(),
            workflow: controller.workflow_request(),
            drag_phase: controller.drag_phase(),
        }
    }
}

#[derive(Serialize)]
pub struct OutcomeResponse {
    pub outcome: TransitionOutcome,
    pub view: BoardView,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        let message = e.to_string();
        match e {
            TransitionError::TransitionPending { .. } | TransitionError::NoWorkflowOpen => ApiError::Conflict(message),
            TransitionError::Backend(_) => ApiError::BadGateway(message),
            TransitionError::InvalidStage { .. } | TransitionError::WorkflowMismatch { .. } => {
                ApiError::BadRequest(message)
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/boards/{kind}", get(get_board))
        .route("/api/boards/{kind}/refresh", post(refresh_board))
        .route("/api/boards/{kind}/drag", post(drag))
        .route("/api/boards/{kind}/workflow/confirm", post(confirm_workflow))
        .route("/api/boards/{kind}/workflow/cancel", post(cancel_workflow))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Tell connected clients what a controller step did.
fn broadcast_outcome(tx: &broadcast::Sender<String>, kind: BoardKind, outcome: &TransitionOutcome, board: &Board) {
    let board_updated = || WsMessage::BoardUpdated {
        kind,
        board: board.clone(),
    };
    match outcome {
        TransitionOutcome::Committed {
            record_id,
            stage,
            refreshed,
        } => {
            broadcast_message(
                tx,
                &WsMessage::TransitionCommitted {
                    kind,
                    record_id: *record_id,
                    stage: stage.clone(),
                    refreshed: *refreshed,
                },
            );
            broadcast_message(tx, &board_updated());
            if !refreshed {
                broadcast_message(
                    tx,
                    &WsMessage::notify(
                        NotificationLevel::Info,
                        format!("Moved to {}, but the board could not be reloaded", stage),
                    ),
                );
            }
        }
        TransitionOutcome::RolledBack { record_id, reason } => {
            broadcast_message(
                tx,
                &WsMessage::TransitionRolledBack {
                    kind,
                    record_id: *record_id,
                    reason: reason.clone(),
                },
            );
            broadcast_message(tx, &board_updated());
            broadcast_message(
                tx,
                &WsMessage::notify(NotificationLevel::Error, format!("Move reverted: {}", reason)),
            );
        }
        TransitionOutcome::AwaitingWorkflow { request } => {
            broadcast_message(
                tx,
                &WsMessage::WorkflowOpened {
                    kind,
                    request: request.clone(),
                },
            );
            broadcast_message(tx, &board_updated());
        }
        TransitionOutcome::NoOp
        | TransitionOutcome::Cancelled
        | TransitionOutcome::Hovered { changed: true }
        | TransitionOutcome::Reordered { changed: true } => {
            broadcast_message(tx, &board_updated());
        }
        _ => {}
    }
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn get_board(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, controller) = state.controller(&kind)?;
    let controller = controller.lock().await;
    Ok(Json(BoardView::of(&controller)))
}

async fn refresh_board(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, controller) = state.controller(&kind)?;
    let mut controller = controller.lock().await;
    controller.refresh().await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::BoardUpdated {
            kind,
            board: controller.board().clone(),
        },
    );
    Ok(Json(BoardView::of(&controller)))
}

async fn drag(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    Json(event): Json<DragEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, controller) = state.controller(&kind)?;
    let mut controller = controller.lock().await;
    let outcome = controller.handle_drag(event).await;
    broadcast_outcome(&state.ws_tx, kind, &outcome, controller.board());
    Ok(Json(OutcomeResponse {
        outcome,
        view: BoardView::of(&controller),
    }))
}

async fn confirm_workflow(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    Json(input): Json<WorkflowInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, controller) = state.controller(&kind)?;
    let mut controller = controller.lock().await;
    let outcome = controller.confirm_workflow(input).await?;
    broadcast_outcome(&state.ws_tx, kind, &outcome, controller.board());
    Ok(Json(OutcomeResponse {
        outcome,
        view: BoardView::of(&controller),
    }))
}

async fn cancel_workflow(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, controller) = state.controller(&kind)?;
    let mut controller = controller.lock().await;
    let outcome = controller.cancel_workflow()?;
    broadcast_outcome(&state.ws_tx, kind, &outcome, controller.board());
    Ok(Json(OutcomeResponse {
        outcome,
        view: BoardView::of(&controller),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────
