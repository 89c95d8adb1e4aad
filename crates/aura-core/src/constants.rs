//! Package-level constants.

/// Current version of Aura (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "aura";

/// Marker recorded for every concept produced by the fallback compressor.
pub const FALLBACK_CONCEPT_MARKER: &str = "mentioned";

/// Fixed reply for commands whose intent could not be recognized.
pub const UNRECOGNIZED_COMMAND_REPLY: &str =
    "I don't understand that command. Try asking for a quiz, summary, or explanation.";

/// Message sent when a compression cycle fails outright.
pub const COMPRESSION_FAILED_MESSAGE: &str = "Compression failed";
