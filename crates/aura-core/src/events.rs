//! Outbound notifications.
//!
//! The runtime emits [`AuraEvent`]s on a broadcast channel. The delivery
//! layer routes each one by its [`ReplyTarget`] and serializes it with
//! [`AuraEvent::event_type`] and [`AuraEvent::data`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::commands::ResponseKind;
use crate::ids::{CommandId, ConnectionId, SessionId};
use crate::segments::CompressionMethod;

/// Who should receive an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyTarget {
    /// Every observer of the session.
    Session,
    /// One specific connection (the command's requester).
    Connection {
        /// Requesting connection.
        id: ConnectionId,
    },
}

/// What happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A compression cycle began.
    CompressionStarted,
    /// A compression cycle committed a segment.
    CompressionComplete {
        /// Generative or fallback.
        method: CompressionMethod,
        /// Sequence number of the new segment.
        segment_num: u32,
    },
    /// A command was accepted and is being processed.
    CommandProcessing {
        /// Accepted command.
        command_id: CommandId,
    },
    /// A command completed.
    CommandResponse {
        /// Command that completed.
        command_id: CommandId,
        /// Response type tag.
        kind: ResponseKind,
        /// Response payload.
        data: Value,
        /// Wall-clock processing time.
        processing_time_ms: u64,
    },
    /// Something failed.
    Error {
        /// Human-readable reason.
        message: String,
        /// Failed command, if the error belongs to one.
        command_id: Option<CommandId>,
    },
}

/// A notification addressed to a session's observers or one requester.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuraEvent {
    /// Session the event belongs to.
    pub session_id: SessionId,
    /// Recipient.
    pub target: ReplyTarget,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// Event body.
    pub payload: EventPayload,
}

impl AuraEvent {
    /// Event addressed to every observer of `session_id`.
    #[must_use]
    pub fn to_session(session_id: SessionId, payload: EventPayload) -> Self {
        Self {
            session_id,
            target: ReplyTarget::Session,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Event addressed to `target`.
    #[must_use]
    pub fn to_target(session_id: SessionId, target: ReplyTarget, payload: EventPayload) -> Self {
        Self {
            session_id,
            target,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Wire name of the event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self.payload {
            EventPayload::CompressionStarted => "compression_started",
            EventPayload::CompressionComplete { .. } => "compression_complete",
            EventPayload::CommandProcessing { .. } => "command_processing",
            EventPayload::CommandResponse { .. } => "command_response",
            EventPayload::Error { .. } => "error",
        }
    }

    /// Wire body of the event, camelCase.
    #[must_use]
    pub fn data(&self) -> Value {
        match &self.payload {
            EventPayload::CompressionStarted => json!({
                "status": "started",
                "message": "Compressing context...",
            }),
            EventPayload::CompressionComplete {
                method,
                segment_num,
            } => json!({
                "status": "complete",
                "method": method,
                "segmentNum": segment_num,
                "message": format!("Context compressed into segment {segment_num}"),
            }),
            EventPayload::CommandProcessing { command_id } => json!({
                "message": "Processing your command...",
                "commandId": command_id,
            }),
            EventPayload::CommandResponse {
                command_id,
                kind,
                data,
                processing_time_ms,
            } => json!({
                "type": kind,
                "data": data,
                "commandId": command_id,
                "processingTime": processing_time_ms,
            }),
            EventPayload::Error {
                message,
                command_id,
            } => {
                let mut body = json!({ "message": message });
                if let Some(id) = command_id {
                    body["commandId"] = json!(id);
                }
                body
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::from("sess-1")
    }

    #[test]
    fn compression_started_body() {
        let event = AuraEvent::to_session(session(), EventPayload::CompressionStarted);
        assert_eq!(event.event_type(), "compression_started");
        assert_eq!(event.data()["status"], "started");
        assert_eq!(event.target, ReplyTarget::Session);
    }

    #[test]
    fn compression_complete_body() {
        let event = AuraEvent::to_session(
            session(),
            EventPayload::CompressionComplete {
                method: CompressionMethod::Fallback,
                segment_num: 3,
            },
        );
        let data = event.data();
        assert_eq!(data["status"], "complete");
        assert_eq!(data["method"], "fallback");
        assert_eq!(data["segmentNum"], 3);
    }

    #[test]
    fn command_response_body() {
        let event = AuraEvent::to_target(
            session(),
            ReplyTarget::Connection {
                id: ConnectionId::from("c1"),
            },
            EventPayload::CommandResponse {
                command_id: CommandId::from("cmd-1"),
                kind: ResponseKind::Quiz,
                data: json!({"title": "Q"}),
                processing_time_ms: 42,
            },
        );
        assert_eq!(event.event_type(), "command_response");
        let data = event.data();
        assert_eq!(data["type"], "quiz");
        assert_eq!(data["commandId"], "cmd-1");
        assert_eq!(data["processingTime"], 42);
        assert_eq!(data["data"]["title"], "Q");
    }

    #[test]
    fn error_body_includes_command_only_when_present() {
        let bare = AuraEvent::to_session(
            session(),
            EventPayload::Error {
                message: "Compression failed".into(),
                command_id: None,
            },
        );
        assert!(bare.data().get("commandId").is_none());

        let tied = AuraEvent::to_session(
            session(),
            EventPayload::Error {
                message: "timeout".into(),
                command_id: Some(CommandId::from("cmd-2")),
            },
        );
        assert_eq!(tied.data()["commandId"], "cmd-2");
    }
}
