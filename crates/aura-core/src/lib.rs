//! # aura-core
//!
//! Foundation types, errors, branded IDs, and logging for the Aura classroom
//! pipeline.
//!
//! This crate provides the shared vocabulary that all other Aura crates depend on:
//!
//! - **Branded IDs**: `SessionId`, `CommandId`, `QuizId` and friends as newtypes
//! - **Sessions**: `Session` and its `SessionStatus` lifecycle
//! - **Buffer items**: `BufferItem` with its speech/visual `ItemKind`
//! - **Segments**: `CompressedSegment` and the structured `SegmentSummary`
//! - **Fusion**: `FusionLink` records tying speech to visual content
//! - **Commands**: `Intent`, `CommandStatus` state machine, `Command`, `Quiz`
//! - **Events**: `AuraEvent` notifications fanned out to connected clients
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod commands;
pub mod constants;
pub mod errors;
pub mod events;
pub mod fusion;
pub mod ids;
pub mod items;
pub mod logging;
pub mod segments;
pub mod session;

pub use errors::CoreError;
