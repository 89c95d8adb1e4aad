//! Inbound `WebSocket` message dispatch.
//!
//! Clients send `{type, data, timestamp}` envelopes. Each message is handled
//! against the orchestrator and may produce one direct reply; everything else
//! reaches the client through the event bridge.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use aura_core::events::ReplyTarget;
use aura_core::ids::SessionId;
use aura_runtime::{Orchestrator, VisualCapture};

use super::connection::ClientConnection;

/// Messages a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Observe a session.
    JoinSession(JoinSession),
    /// Recognized speech from the client's recognizer.
    TranscriptText(TranscriptText),
    /// Whiteboard state with its extracted text.
    CanvasSnapshot(CanvasSnapshot),
    /// Spoken command, possibly without the wake phrase.
    VoiceCommand(VoiceCommand),
    /// Application-level keepalive.
    Ping(Value),
}

/// `join_session` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSession {
    /// Session to observe.
    pub session_id: SessionId,
}

/// `transcript_text` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptText {
    /// Target session; defaults to the joined one.
    pub session_id: Option<SessionId>,
    /// Recognized text.
    #[serde(default)]
    pub text: String,
    /// Capture time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Recognizer confidence.
    pub confidence: Option<f64>,
}

/// `canvas_snapshot` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSnapshot {
    /// Target session; defaults to the joined one.
    pub session_id: Option<SessionId>,
    /// Text extracted from the board image.
    #[serde(default)]
    pub extracted_text: String,
    /// Opaque editor state.
    #[serde(default)]
    pub tldraw_state: Value,
    /// Reference to the stored board image.
    #[serde(default)]
    pub image_ref: String,
    /// Board page.
    pub page_number: Option<u32>,
    /// Capture time.
    pub timestamp: Option<DateTime<Utc>>,
}

/// `voice_command` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommand {
    /// Target session; defaults to the joined one.
    pub session_id: Option<SessionId>,
    /// The utterance.
    #[serde(default)]
    pub command: String,
    /// Capture time.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Whether `command` contains `wake_phrase`, ignoring case.
pub fn has_wake_phrase(command: &str, wake_phrase: &str) -> bool {
    command.to_lowercase().contains(&wake_phrase.to_lowercase())
}

/// Handle one inbound text frame. Returns the direct reply, if any.
#[instrument(skip_all, fields(conn_id = %connection.id))]
pub async fn handle_message(
    text: &str,
    orchestrator: &Orchestrator,
    wake_phrase: &str,
    connection: &ClientConnection,
) -> Option<Value> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "invalid client message");
            return Some(reply("error", &json!({ "message": format!("Invalid message: {e}") })));
        }
    };

    match message {
        ClientMessage::Ping(_) => Some(reply("pong", &json!({}))),
        ClientMessage::JoinSession(join) => match orchestrator.session(&join.session_id) {
            Ok(session) => {
                connection.bind_session(session.id.clone());
                debug!(session_id = %session.id, "connection joined session");
                Some(reply(
                    "session_joined",
                    &json!({
                        "sessionId": session.id,
                        "subject": session.subject,
                        "status": session.status,
                    }),
                ))
            }
            Err(e) => Some(error_reply(&e)),
        },
        ClientMessage::TranscriptText(body) => {
            let session_id = resolve(body.session_id, connection)?;
            let timestamp = body.timestamp.unwrap_or_else(Utc::now);
            let confidence = body.confidence.unwrap_or(1.0);
            match orchestrator
                .ingest_speech(&session_id, &body.text, timestamp, confidence)
                .await
            {
                Ok(Some(receipt)) => Some(reply(
                    "transcript_update",
                    &json!({
                        "text": body.text.trim(),
                        "timestamp": timestamp.to_rfc3339(),
                        "isFinal": true,
                        "tokenEstimate": receipt.token_estimate,
                    }),
                )),
                Ok(None) => None,
                Err(e) => Some(error_reply(&e)),
            }
        }
        ClientMessage::CanvasSnapshot(body) => {
            let session_id = resolve(body.session_id, connection)?;
            let capture = VisualCapture {
                ocr_text: body.extracted_text,
                timestamp: body.timestamp.unwrap_or_else(Utc::now),
                snapshot: body.tldraw_state,
                image_ref: body.image_ref,
                page_number: body.page_number.unwrap_or(1),
            };
            match orchestrator.ingest_visual(&session_id, capture).await {
                Ok(_) => None,
                Err(e) => Some(error_reply(&e)),
            }
        }
        ClientMessage::VoiceCommand(body) => {
            let session_id = resolve(body.session_id, connection)?;
            if !has_wake_phrase(&body.command, wake_phrase) {
                debug!("voice command without wake phrase ignored");
                return None;
            }
            let target = ReplyTarget::Connection {
                id: connection.id.clone(),
            };
            let timestamp = body.timestamp.unwrap_or_else(Utc::now);
            match orchestrator.submit_command(&session_id, &body.command, timestamp, target) {
                Ok(_) => None,
                Err(e) => Some(error_reply(&e)),
            }
        }
    }
}

fn resolve(explicit: Option<SessionId>, connection: &ClientConnection) -> Option<SessionId> {
    let resolved = explicit.or_else(|| connection.session_id());
    if resolved.is_none() {
        debug!("message without a session dropped");
    }
    resolved
}

fn reply(kind: &str, data: &Value) -> Value {
    json!({
        "type": kind,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

fn error_reply(err: &aura_runtime::RuntimeError) -> Value {
    warn!(category = err.category(), error = %err, "client message rejected");
    reply("error", &json!({ "message": err.to_string() }))
}
