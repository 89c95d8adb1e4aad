//! # aura-runtime
//!
//! Session pipelines, command dispatch, and orchestration.
//!
//! - **Pipeline**: one ordered ingestion queue per session; persists inputs,
//!   runs fusion, buffers text, and starts compression cycles
//! - **Commands**: intent classification, per-intent generation strategies,
//!   and the dispatcher that drives each command to a terminal state
//! - **Emitter**: broadcast channel carrying every outbound notification
//! - **Orchestrator**: session lifecycle and the entry points used by the
//!   delivery layer

#![deny(unsafe_code)]

pub mod commands;
pub mod emitter;
pub mod errors;
pub mod noise;
pub mod orchestrator;
pub mod pipeline;

pub use commands::{CommandDispatcher, CompletedCommand};
pub use emitter::EventEmitter;
pub use errors::{Result, RuntimeError};
pub use orchestrator::{Orchestrator, VisualCapture};
pub use pipeline::{IngestReceipt, SessionPipeline};
