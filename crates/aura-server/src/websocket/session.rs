//! One connected client, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use aura_core::ids::{ConnectionId, SessionId};

use super::connection::ClientConnection;
use super::handler::handle_message;
use crate::server::AppState;

/// Interval between server-initiated Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long a client may stay silent before it is dropped.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// Outbound queue depth per client.
const SEND_QUEUE: usize = 256;

/// Run a `WebSocket` session for a connected client.
///
/// 1. Registers the connection, bound to `join` if the URL named a session
/// 2. Sends `connection_established` with the connection ID
/// 3. Forwards queued events and replies, pinging periodically
/// 4. Dispatches inbound text frames
/// 5. Deregisters on disconnect or server shutdown
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    join: Option<SessionId>,
    state: AppState,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));
    if let Some(session_id) = join {
        connection.bind_session(session_id);
    }
    state.broadcast.add(Arc::clone(&connection)).await;
    info!(session_id = ?connection.session_id(), "client connected");

    let established = serde_json::json!({
        "type": "connection_established",
        "data": {
            "clientId": connection_id,
            "sessionId": connection.session_id(),
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let _ = connection.send_json(&established);

    let outbound_conn = Arc::clone(&connection);
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        let _ = ping_interval.tick().await;
        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive() && outbound_conn.last_pong_elapsed() > PONG_TIMEOUT {
                        warn!("client unresponsive for {PONG_TIMEOUT:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let cancel = state.shutdown.token();
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break,
            frame = ws_rx.next() => frame,
        };
        let Some(Ok(msg)) = frame else { break };
        connection.mark_alive();
        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    debug!(len = data.len(), "non-UTF8 binary frame ignored");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Some(reply) =
            handle_message(&text, &state.orchestrator, &state.wake_phrase, &connection).await
        {
            if !connection.send_json(&reply) {
                debug!("failed to enqueue reply");
            }
        }
    }

    outbound.abort();
    state.broadcast.remove(&connection_id).await;
    info!(
        dropped = connection.drop_count(),
        age_secs = connection.connected_at.elapsed().as_secs(),
        "client disconnected"
    );
}
