//! Commands, their intents, and the quizzes some of them produce.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::{CommandId, QuizId, SessionId};

// ─────────────────────────────────────────────────────────────────────────────
// Intent
// ─────────────────────────────────────────────────────────────────────────────

/// What a command asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Generate a multiple-choice quiz.
    GenerateQuiz,
    /// Summarize the session so far.
    Summarize,
    /// Explain a concept.
    Explain,
    /// Answer a direct question.
    AnswerQuestion,
    /// Produce a worked example.
    GenerateExample,
    /// Produce a diagram description.
    GenerateDiagram,
    /// Anything unrecognized.
    Other,
}

impl Intent {
    /// Every intent, `Other` last.
    pub const ALL: [Self; 7] = [
        Self::GenerateQuiz,
        Self::Summarize,
        Self::Explain,
        Self::AnswerQuestion,
        Self::GenerateExample,
        Self::GenerateDiagram,
        Self::Other,
    ];

    /// Wire/storage string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerateQuiz => "generate_quiz",
            Self::Summarize => "summarize",
            Self::Explain => "explain",
            Self::AnswerQuestion => "answer_question",
            Self::GenerateExample => "generate_example",
            Self::GenerateDiagram => "generate_diagram",
            Self::Other => "other",
        }
    }

    /// Interpret a classifier's free-form label.
    ///
    /// Case, surrounding whitespace, quotes and trailing punctuation are
    /// ignored. Anything that still does not name an intent is `Other`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
            .trim()
            .to_ascii_lowercase();
        cleaned.parse().unwrap_or(Self::Other)
    }

    /// The response type clients see for this intent.
    #[must_use]
    pub fn response_kind(self) -> ResponseKind {
        match self {
            Self::GenerateQuiz => ResponseKind::Quiz,
            Self::Summarize => ResponseKind::Summary,
            Self::Explain => ResponseKind::Explanation,
            Self::AnswerQuestion => ResponseKind::Answer,
            Self::GenerateExample => ResponseKind::Example,
            Self::GenerateDiagram => ResponseKind::Diagram,
            Self::Other => ResponseKind::Other,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "intent",
                value: s.to_owned(),
            })
    }
}

/// Response type tag pushed to clients alongside a command result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Quiz payload.
    Quiz,
    /// Session summary.
    Summary,
    /// Concept explanation.
    Explanation,
    /// Worked example.
    Example,
    /// Direct answer.
    Answer,
    /// Diagram description.
    Diagram,
    /// Canned reply for unrecognized commands.
    Other,
}

// ─────────────────────────────────────────────────────────────────────────────
// CommandStatus
// ─────────────────────────────────────────────────────────────────────────────

/// Processing state of a command.
///
/// ```text
/// pending ──► processing ──► completed
///    │             │
///    └─────────────┴───────► failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Recorded, not yet classified.
    Pending,
    /// Intent known, response being produced.
    Processing,
    /// Response persisted.
    Completed,
    /// Gave up; `error_message` says why.
    Failed,
}

impl CommandStatus {
    /// Wire/storage string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether `self -> next` is a legal move.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    /// Validate `self -> next`.
    pub fn transition_to(self, next: Self) -> Result<Self, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self.as_str().to_owned(),
                to: next.as_str().to_owned(),
            })
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownVariant {
                kind: "command status",
                value: other.to_owned(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A persisted command and its outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Command ID.
    pub id: CommandId,
    /// Session the command was issued in.
    pub session_id: SessionId,
    /// Raw text as submitted.
    pub raw_text: String,
    /// Classified intent, once known.
    pub intent: Option<Intent>,
    /// Processing state.
    pub status: CommandStatus,
    /// Response payload, set on completion.
    pub response: Option<serde_json::Value>,
    /// Wall-clock processing time, set on completion or failure.
    pub processing_time_ms: Option<u64>,
    /// Failure reason, set on failure.
    pub error_message: Option<String>,
    /// When the command was issued.
    pub timestamp: DateTime<Utc>,
}

/// A persisted quiz, retrievable by its share code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Quiz ID.
    pub id: QuizId,
    /// Owning session.
    pub session_id: SessionId,
    /// Command that produced it.
    pub command_id: CommandId,
    /// Short uppercase alphanumeric code.
    pub share_code: String,
    /// Questions payload as generated.
    pub data: serde_json::Value,
    /// When the quiz was stored.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_strict_parse() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), intent);
        }
        assert!("Summarize".parse::<Intent>().is_err());
    }

    #[test]
    fn intent_from_label_is_lenient() {
        assert_eq!(Intent::from_label("  Summarize\n"), Intent::Summarize);
        assert_eq!(Intent::from_label("\"generate_quiz\"."), Intent::GenerateQuiz);
        assert_eq!(Intent::from_label("`explain`"), Intent::Explain);
    }

    #[test]
    fn intent_from_label_collapses_unknown_to_other() {
        assert_eq!(Intent::from_label("make me a sandwich"), Intent::Other);
        assert_eq!(Intent::from_label(""), Intent::Other);
    }

    #[test]
    fn response_kind_mapping() {
        assert_eq!(Intent::GenerateQuiz.response_kind(), ResponseKind::Quiz);
        assert_eq!(Intent::Summarize.response_kind(), ResponseKind::Summary);
        assert_eq!(Intent::Explain.response_kind(), ResponseKind::Explanation);
        assert_eq!(Intent::GenerateExample.response_kind(), ResponseKind::Example);
        assert_eq!(Intent::AnswerQuestion.response_kind(), ResponseKind::Answer);
        assert_eq!(Intent::GenerateDiagram.response_kind(), ResponseKind::Diagram);
        assert_eq!(Intent::Other.response_kind(), ResponseKind::Other);
    }

    // -- status machine --

    #[test]
    fn legal_transitions() {
        use CommandStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
    }

    #[test]
    fn terminal_states_are_final() {
        use CommandStatus::*;
        for next in [Pending, Processing, Completed, Failed] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn no_skipping_processing() {
        assert!(CommandStatus::Pending
            .transition_to(CommandStatus::Completed)
            .is_err());
    }

    #[test]
    fn response_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ResponseKind::Explanation).unwrap(),
            "\"explanation\""
        );
    }
}
