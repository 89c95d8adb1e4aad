//! # aura-server
//!
//! Axum HTTP + `WebSocket` gateway in front of the Aura orchestrator.
//!
//! - HTTP endpoints: health check, session start/end/lookup, quiz by share code
//! - `WebSocket` gateway: connection registry, inbound message dispatch, ping keepalive
//! - Event bridge: orchestrator notifications routed to session observers or
//!   to the single connection that asked
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod http;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use errors::{Result, ServerError};
pub use server::AuraServer;
