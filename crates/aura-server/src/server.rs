//! `AuraServer`: axum router, listener, and shared handler state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use aura_core::ids::{ConnectionId, SessionId};
use aura_runtime::Orchestrator;
use aura_settings::{AuraSettings, ServerSettings};

use crate::errors::{Result, ServerError};
use crate::health::{self, HealthResponse};
use crate::http;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::event_bridge::EventBridge;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle, ingestion and commands.
    pub orchestrator: Arc<Orchestrator>,
    /// Connection registry and fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Phrase a voice command must contain.
    pub wake_phrase: Arc<str>,
    /// Connection cap.
    pub max_connections: usize,
    /// Inbound frame cap in bytes.
    pub max_message_size: usize,
}

/// The Aura HTTP + `WebSocket` server.
pub struct AuraServer {
    settings: ServerSettings,
    state: AppState,
}

impl AuraServer {
    /// Create a server in front of `orchestrator`.
    pub fn new(settings: &AuraSettings, orchestrator: Arc<Orchestrator>) -> Self {
        let state = AppState {
            orchestrator,
            broadcast: Arc::new(BroadcastManager::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            wake_phrase: Arc::from(settings.commands.wake_phrase.as_str()),
            max_connections: settings.server.max_connections,
            max_message_size: settings.server.max_message_size,
        };
        Self {
            settings: settings.server.clone(),
            state,
        }
    }

    /// Build the router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .route("/sessions", post(http::start_session))
            .route("/sessions/{id}", get(http::get_session))
            .route("/sessions/{id}/end", post(http::end_session))
            .route("/quiz/{code}", get(http::get_quiz))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.settings.allowed_origins))
    }

    /// Start forwarding orchestrator events to connected clients.
    pub fn spawn_event_bridge(&self) -> JoinHandle<()> {
        let bridge = EventBridge::new(
            self.state.orchestrator.subscribe(),
            Arc::clone(&self.state.broadcast),
        );
        tokio::spawn(bridge.run(self.state.shutdown.token()))
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Port `0` picks a free port; the bound address is returned.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let router = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server exited with error");
            }
        });
        info!(%local, "listening");
        Ok((local, handle))
    }

    /// The connection registry.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.state.broadcast
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// The orchestrator behind the server.
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.state.orchestrator
    }

    /// Server settings in effect.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }
}

fn cors_layer(allowed: &[String]) -> CorsLayer {
    if allowed.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.connection_count().await;
    Json(health::health_check(
        state.start_time,
        connections,
        state.orchestrator.active_session_count(),
    ))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    session_id: Option<String>,
}

/// GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let connections = state.broadcast.connection_count().await;
    if connections >= state.max_connections {
        warn!(connections, "connection limit reached, rejecting upgrade");
        return ServerError::TooManyConnections(state.max_connections).into_response();
    }
    let join = query.session_id.map(SessionId::from_raw);
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, ConnectionId::new(), join, state))
}
