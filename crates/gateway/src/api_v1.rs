//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /v1/chat/stream`       : Run the agent on a message, get an SSE stream of events
//! - `GET  /v1/sessions`          : List sessions
//! - `GET  /v1/sessions/{id}`     : Get a session with its messages
//! - `GET  /v1/artifacts`         : List artifacts (without content)
//! - `GET  /v1/artifacts/{id}`    : Get an artifact
//! - `GET  /v1/courses`           : List courses
//! - `GET  /v1/tools`             : List available tools

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

use lectern_agent::RunRequest;
use lectern_core::artifact::{Artifact, ArtifactRole, ArtifactType, Course};
use lectern_core::error::{Error, StoreError};
use lectern_core::event::{AgentEvent, ChannelSink};
use lectern_core::message::{Session, SessionId};

use crate::SharedState;

/// Build the v1 API router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat/stream", post(chat_stream_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/artifacts", get(list_artifacts_handler))
        .route("/artifacts/{id}", get(get_artifact_handler))
        .route("/courses", get(list_courses_handler))
        .route("/tools", get(list_tools_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatStreamRequest {
    pub session_id: String,
    pub message: String,
    /// Model key overriding the configured model
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(what) => api_error(StatusCode::NOT_FOUND, format!("Not found: {what}")),
        StoreError::Storage(reason) => api_error(StatusCode::INTERNAL_SERVER_ERROR, reason),
    }
}

#[derive(Debug, Serialize)]
pub struct SessionSummaryDto {
    pub id: String,
    pub message_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummaryDto>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactSummaryDto {
    pub id: String,
    pub title: String,
    pub artifact_type: ArtifactType,
    pub role: ArtifactRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Artifact> for ArtifactSummaryDto {
    fn from(a: Artifact) -> Self {
        Self {
            id: a.id,
            title: a.title,
            artifact_type: a.artifact_type,
            role: a.role,
            description: a.description,
            created_at: a.created_at.to_rfc3339(),
            updated_at: a.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArtifactListResponse {
    pub artifacts: Vec<ArtifactSummaryDto>,
}

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub courses: Vec<Course>,
}

#[derive(Debug, Serialize)]
pub struct ToolDto {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDto>,
    pub count: usize,
}

// ── SSE Streaming ─────────────────────────────────────────────────────────

/// What the event stream still has to deliver.
struct RunStream {
    events: mpsc::UnboundedReceiver<AgentEvent>,
    /// Resolves to the error message of a failed run
    outcome: Option<oneshot::Receiver<Option<String>>>,
    /// Cancels the run when the client goes away
    _cancel_on_drop: DropGuard,
}

fn event_frame(event: &AgentEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_default();
    SseEvent::default().event(event.event_type()).data(data)
}

fn error_frame(message: &str) -> SseEvent {
    let data = serde_json::json!({ "error": message }).to_string();
    SseEvent::default().event("error").data(data)
}

/// `POST /v1/chat/stream`: Run the agent and stream its events.
///
/// A busy session is answered with 409 before the stream opens. A run that
/// fails after the stream opened ends it with an `error` frame.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatStreamRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    if payload.session_id.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "session_id must not be empty"));
    }
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    info!(session_id = %payload.session_id, "v1/chat/stream SSE request");

    let session_id = SessionId::from(payload.session_id);
    let permit = state
        .orchestrator
        .begin(&session_id)
        .await
        .map_err(|e| match e {
            Error::SessionBusy(_) => api_error(StatusCode::CONFLICT, e.to_string()),
            other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })?;

    let mut request = RunRequest::new(session_id, payload.message);
    request.model = payload.model;

    let (sink, events) = ChannelSink::channel();
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let cancel = CancellationToken::new();

    let orchestrator = state.orchestrator.clone();
    let run_cancel = cancel.clone();
    tokio::spawn(async move {
        let result = orchestrator
            .run(permit, request, Arc::new(sink), run_cancel)
            .await;
        let _ = outcome_tx.send(result.err().map(|e| e.to_string()));
    });

    let stream = futures::stream::unfold(
        RunStream {
            events,
            outcome: Some(outcome_rx),
            _cancel_on_drop: cancel.drop_guard(),
        },
        |mut run| async move {
            if let Some(event) = run.events.recv().await {
                return Some((Ok(event_frame(&event)), run));
            }
            // All senders are gone, so the run has ended.
            let outcome = run.outcome.take()?;
            match outcome.await {
                Ok(Some(message)) => {
                    warn!(error = %message, "Run failed, closing stream with error frame");
                    Some((Ok(error_frame(&message)), run))
                }
                _ => None,
            }
        },
    );

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ── Sessions ──────────────────────────────────────────────────────────────

async fn list_sessions_handler(
    State(state): State<SharedState>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state
        .orchestrator
        .context()
        .sessions
        .list()
        .await
        .map_err(store_error)?;

    Ok(Json(SessionListResponse {
        sessions: sessions
            .into_iter()
            .map(|s| SessionSummaryDto {
                id: s.id.to_string(),
                message_count: s.messages.len(),
                created_at: s.created_at.to_rfc3339(),
                updated_at: s.updated_at.to_rfc3339(),
            })
            .collect(),
    }))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .orchestrator
        .context()
        .sessions
        .get(&SessionId::from(id))
        .await
        .map_err(store_error)?;
    Ok(Json(session))
}

// ── Artifacts & courses ───────────────────────────────────────────────────

async fn list_artifacts_handler(
    State(state): State<SharedState>,
) -> Result<Json<ArtifactListResponse>, ApiError> {
    let artifacts = state
        .orchestrator
        .context()
        .artifacts
        .list()
        .await
        .map_err(store_error)?;
    Ok(Json(ArtifactListResponse {
        artifacts: artifacts.into_iter().map(ArtifactSummaryDto::from).collect(),
    }))
}

async fn get_artifact_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Artifact>, ApiError> {
    state
        .orchestrator
        .context()
        .artifacts
        .get(&id)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Artifact {id} not found")))
}

async fn list_courses_handler(
    State(state): State<SharedState>,
) -> Result<Json<CourseListResponse>, ApiError> {
    let courses = state
        .orchestrator
        .context()
        .courses
        .list_courses()
        .await
        .map_err(store_error)?;
    Ok(Json(CourseListResponse { courses }))
}

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let defs = state.orchestrator.context().tools.definitions();
    let count = defs.len();

    Json(ToolListResponse {
        tools: defs
            .into_iter()
            .map(|d| ToolDto {
                name: d.name,
                description: d.description,
                parameters: d.parameters,
            })
            .collect(),
        count,
    })
}
