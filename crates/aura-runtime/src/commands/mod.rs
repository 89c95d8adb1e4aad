//! Voice command handling: classification, strategies, and dispatch.

pub mod classifier;
pub mod context;
pub mod dispatcher;
pub mod share_code;
pub mod strategies;

pub use classifier::{CLASSIFY_TASK, IntentClassifier};
pub use dispatcher::{CommandDispatcher, CompletedCommand};
pub use strategies::{Strategy, strategy_for};
