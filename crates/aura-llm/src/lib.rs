//! # aura-llm
//!
//! Generation backends for Aura.
//!
//! - [`GenerationBackend`]: one prompt in, one text response out
//! - [`TimeoutBackend`]: enforces a per-call deadline
//! - [`extract_json_object`]: tolerant JSON-object extraction from model output
//! - [`OpenAiCompatibleBackend`]: `reqwest` client for `/chat/completions` endpoints
//! - [`MockBackend`]: scripted replies keyed on prompt substrings

#![deny(unsafe_code)]

pub mod json;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod timeout;

pub use json::{extract_json_object, strip_code_fences};
pub use mock::{MockBackend, MockReply};
pub use openai::{OpenAiCompatibleBackend, OpenAiCompatibleConfig};
pub use provider::{
    GenerationBackend, GenerationRequest, ModelTier, ProviderError, ProviderResult, SharedBackend,
    UnconfiguredBackend,
};
pub use timeout::TimeoutBackend;
