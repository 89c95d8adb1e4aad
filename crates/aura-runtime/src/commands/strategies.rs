//! Generation strategies, one per intent.
//!
//! Every strategy has the same shape: build a prompt from the assembled
//! session context and the command text, ask the smart model tier for JSON,
//! then check the payload carries the fields clients render. `other` has no
//! strategy and is answered with a fixed reply.

use aura_core::commands::Intent;
use aura_core::constants::UNRECOGNIZED_COMMAND_REPLY;
use aura_llm::{GenerationRequest, ModelTier, SharedBackend, extract_json_object};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::errors::{Result, RuntimeError};

macro_rules! quiz_question_count {
    () => {
        5
    };
}

/// Questions every quiz must carry.
pub const QUIZ_QUESTION_COUNT: usize = quiz_question_count!();

/// How one intent is turned into a payload.
#[derive(Debug)]
pub struct Strategy {
    /// Intent served.
    pub intent: Intent,
    /// Marker line that opens the prompt.
    pub task: &'static str,
    /// What to produce.
    pub instructions: &'static str,
    /// JSON shape to respond with.
    pub shape: &'static str,
    /// Top-level fields the payload must have.
    pub required: &'static [&'static str],
}

const STRATEGIES: &[Strategy] = &[
    Strategy {
        intent: Intent::GenerateQuiz,
        task: "TASK: generate_quiz",
        instructions: concat!(
            "Generate a quiz with ",
            quiz_question_count!(),
            " multiple-choice questions relevant to the lecture. \
             Give each question 4 options, the index of the correct option (0-3), \
             and a brief explanation."
        ),
        shape: r#"{"title": "Quiz Title", "questions": [{"question": "Question text?", "options": ["A", "B", "C", "D"], "correctAnswer": 0, "explanation": "Brief explanation"}]}"#,
        required: &["title", "questions"],
    },
    Strategy {
        intent: Intent::Summarize,
        task: "TASK: summarize",
        instructions: "Summarize the lecture so far: a concise 2-3 sentence summary, \
                       the key points, and the main topics covered.",
        shape: r#"{"title": "Summary", "content": "Main summary text", "keyPoints": ["Point 1"], "topics": ["Topic 1"]}"#,
        required: &["content"],
    },
    Strategy {
        intent: Intent::Explain,
        task: "TASK: explain",
        instructions: "Explain the concept the user asks about clearly and concisely, \
                       grounded in the lecture.",
        shape: r#"{"title": "Concept Name", "content": "Detailed explanation"}"#,
        required: &["content"],
    },
    Strategy {
        intent: Intent::AnswerQuestion,
        task: "TASK: answer_question",
        instructions: "Answer the user's question directly, using the lecture where relevant.",
        shape: r#"{"title": "Short restatement of the question", "content": "The answer"}"#,
        required: &["content"],
    },
    Strategy {
        intent: Intent::GenerateExample,
        task: "TASK: generate_example",
        instructions: "Provide one practical, easy-to-understand worked example that \
                       applies the lecture material, with its solution.",
        shape: r#"{"title": "Example", "problem": "Problem statement", "correctAnswer": "Solution", "explanation": "How to get there"}"#,
        required: &["problem"],
    },
    Strategy {
        intent: Intent::GenerateDiagram,
        task: "TASK: generate_diagram",
        instructions: "Design a diagram that illustrates what the user asks for, \
                       written as Mermaid source.",
        shape: r#"{"diagramType": "mermaid", "title": "Diagram title", "description": "What it shows", "code": "graph TD; A-->B"}"#,
        required: &["code"],
    },
];

/// Strategy serving `intent`. `None` for [`Intent::Other`].
pub fn strategy_for(intent: Intent) -> Option<&'static Strategy> {
    STRATEGIES.iter().find(|s| s.intent == intent)
}

/// Fixed payload for commands no strategy serves.
pub fn unrecognized_reply() -> Value {
    json!({ "content": UNRECOGNIZED_COMMAND_REPLY })
}

impl Strategy {
    /// Full prompt for this strategy.
    pub fn prompt(&self, context: &str, command: &str) -> String {
        format!(
            "{task}\n\
             You are a teaching assistant for a live lecture.\n\
             \n\
             LECTURE CONTEXT:\n\
             {context}\n\
             \n\
             USER REQUEST: {command}\n\
             \n\
             {instructions}\n\
             \n\
             Respond ONLY with valid JSON in this exact format:\n\
             {shape}",
            task = self.task,
            instructions = self.instructions,
            shape = self.shape,
        )
    }

    /// Check `payload` has this strategy's required fields.
    pub fn validate(&self, payload: &Map<String, Value>) -> Result<()> {
        for field in self.required {
            match payload.get(*field) {
                None | Some(Value::Null) => return Err(self.invalid(format!("missing `{field}`"))),
                Some(_) => {}
            }
        }
        if self.intent == Intent::GenerateQuiz {
            self.validate_questions(payload)?;
        }
        Ok(())
    }

    fn validate_questions(&self, payload: &Map<String, Value>) -> Result<()> {
        let questions = payload
            .get("questions")
            .and_then(Value::as_array)
            .ok_or_else(|| self.invalid("`questions` is not an array".into()))?;
        if questions.len() != QUIZ_QUESTION_COUNT {
            return Err(self.invalid(format!(
                "expected {QUIZ_QUESTION_COUNT} questions, got {}",
                questions.len()
            )));
        }
        for (n, q) in questions.iter().enumerate() {
            let has_text = q.get("question").is_some_and(Value::is_string);
            let has_options = q.get("options").and_then(Value::as_array).is_some_and(|o| !o.is_empty());
            if !has_text || !has_options {
                return Err(self.invalid(format!("question {n} lacks text or options")));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> RuntimeError {
        RuntimeError::InvalidPayload {
            intent: self.intent.as_str(),
            reason,
        }
    }

    /// Generate and validate a payload.
    pub async fn generate(
        &self,
        backend: &SharedBackend,
        context: &str,
        command: &str,
    ) -> Result<Map<String, Value>> {
        let request = GenerationRequest::new(self.prompt(context, command), ModelTier::Smart);
        let raw = backend.generate(&request).await?;
        let payload = extract_json_object(&raw)?;
        self.validate(&payload)?;
        debug!(intent = %self.intent, fields = payload.len(), "payload generated");
        Ok(payload)
    }
}
