//! Event bridge: orchestrator notifications to `WebSocket` clients.
//!
//! Session-addressed events go to every connection observing the session.
//! Connection-addressed events (command results) go only to the requester.

use std::sync::Arc;

use aura_core::events::{AuraEvent, ReplyTarget};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcast::BroadcastManager;

/// Bridges orchestrator events to connected clients.
pub struct EventBridge {
    rx: broadcast::Receiver<AuraEvent>,
    broadcast: Arc<BroadcastManager>,
}

impl EventBridge {
    /// Create a bridge reading from `rx`.
    pub fn new(rx: broadcast::Receiver<AuraEvent>, broadcast: Arc<BroadcastManager>) -> Self {
        Self { rx, broadcast }
    }

    /// Run until `cancel` fires or the sender is dropped.
    #[tracing::instrument(skip_all, name = "event_bridge")]
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => break,
                received = self.rx.recv() => received,
            };
            match received {
                Ok(event) => self.route(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged = n, "event bridge lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("event sender closed, bridge exiting");
                    break;
                }
            }
        }
    }

    async fn route(&self, event: &AuraEvent) {
        let message = match serde_json::to_string(&envelope(event)) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(event_type = event.event_type(), error = %e, "failed to serialize event");
                return;
            }
        };
        match &event.target {
            ReplyTarget::Session => {
                let _ = self
                    .broadcast
                    .send_to_session(&event.session_id, &message)
                    .await;
            }
            ReplyTarget::Connection { id } => {
                if !self.broadcast.send_to_connection(id, message).await {
                    debug!(
                        event_type = event.event_type(),
                        conn_id = %id,
                        "requester unreachable, event dropped"
                    );
                }
            }
        }
    }
}

/// Wire envelope `{type, sessionId, data, timestamp}`.
pub fn envelope(event: &AuraEvent) -> Value {
    json!({
        "type": event.event_type(),
        "sessionId": event.session_id,
        "data": event.data(),
        "timestamp": event.timestamp.to_rfc3339(),
    })
}
