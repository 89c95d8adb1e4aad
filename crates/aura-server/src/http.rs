//! HTTP endpoints: session lifecycle and quiz lookup.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use aura_core::commands::Quiz;
use aura_core::ids::SessionId;
use aura_core::session::Session;

use crate::errors::{Result, ServerError};
use crate::server::AppState;

/// `POST /sessions` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    /// Subject being taught.
    pub subject: String,
    /// Opaque client metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// POST /sessions
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<Session>)> {
    let subject = req.subject.trim();
    if subject.is_empty() {
        return Err(ServerError::BadRequest("subject must not be empty".into()));
    }
    let session = state
        .orchestrator
        .start_session(subject, req.metadata.as_ref())?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>> {
    Ok(Json(state.orchestrator.session(&SessionId::from_raw(id))?))
}

/// POST /sessions/{id}/end
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>> {
    let session_id = SessionId::from_raw(id);
    let session = state.orchestrator.end_session(&session_id)?;
    let observers = state.broadcast.session_connections(&session_id).await.len();
    info!(session_id = %session_id, observers, "session ended over HTTP");
    Ok(Json(session))
}

/// GET /quiz/{code}
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Quiz>> {
    let code = code.trim().to_ascii_uppercase();
    state
        .orchestrator
        .store()
        .quiz_by_share_code(&code)?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("quiz {code}")))
}
