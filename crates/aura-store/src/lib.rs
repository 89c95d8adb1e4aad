//! # aura-store
//!
//! Durable storage for Aura on `SQLite`.
//!
//! - Sessions with their status and persisted buffer token count
//! - Append-only compressed segments, gapless per session
//! - Raw transcripts and whiteboard snapshots, and the fusion links between them
//! - Commands with compare-and-set status transitions, and the quizzes they produce
//!
//! [`AuraStore`] is the entry point; the repositories under [`sqlite`] are
//! stateless and take a `&Connection`.

#![deny(unsafe_code)]

pub mod errors;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use sqlite::connection::ConnectionConfig;
pub use sqlite::repositories::transcript::Transcript;
pub use sqlite::repositories::whiteboard::WhiteboardLog;
pub use store::{AuraStore, NewSegment};
