//! # aura-context
//!
//! Per-session working memory for Aura.
//!
//! - [`ContextBuffer`]: ordered speech/visual items with a running token estimate
//! - [`CompressionEngine`]: turns a captured buffer into a [`CompressedSegment`]
//!   and commits it through a [`SegmentSink`]
//! - [`FusionCorrelator`]: links demonstrative speech to nearby whiteboard captures
//! - [`SessionRegistry`]: concurrent map of live session contexts
//!
//! [`CompressedSegment`]: aura_core::segments::CompressedSegment

#![deny(unsafe_code)]

pub mod buffer;
pub mod compression;
pub mod errors;
pub mod fusion;
pub mod registry;
pub mod tokens;

pub use buffer::{AppendOutcome, BufferSnapshot, ContextBuffer};
pub use compression::{COMPRESSION_TASK, CompressionEngine, SegmentSink, fallback_summary};
pub use errors::{ContextError, Result};
pub use fusion::{FusionCorrelator, FusionMatch, SpeechEvent, VisualEvent};
pub use registry::{SessionContext, SessionRegistry};
pub use tokens::estimate_tokens;
