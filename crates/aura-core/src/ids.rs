//! Branded ID newtypes.
//!
//! Sessions, commands, quizzes and the persisted transcript/whiteboard rows
//! each get their own ID type so a `CommandId` can never be passed where a
//! `SessionId` is expected. Fresh IDs are UUID v7, so they sort by creation
//! time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh time-ordered ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Wrap an ID that was already issued (e.g. read back from storage).
            #[must_use]
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a classroom session.
    SessionId
}

branded_id! {
    /// Identifier of a submitted voice/text command.
    CommandId
}

branded_id! {
    /// Identifier of a generated quiz.
    QuizId
}

branded_id! {
    /// Identifier of a persisted speech transcript.
    TranscriptId
}

branded_id! {
    /// Identifier of a persisted whiteboard snapshot.
    WhiteboardId
}

branded_id! {
    /// Identifier of a persisted fusion link.
    FusionLinkId
}

branded_id! {
    /// Identifier of a live client connection.
    ConnectionId
}
