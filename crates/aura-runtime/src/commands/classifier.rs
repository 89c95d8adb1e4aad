//! Intent classification.

use aura_core::commands::Intent;
use aura_llm::{GenerationRequest, ModelTier, SharedBackend};
use tracing::{debug, warn};

/// Marker line that opens every classification prompt.
pub const CLASSIFY_TASK: &str = "TASK: classify_intent";

const CLASSIFY_TEMPERATURE: f64 = 0.0;

/// Maps free text onto the closed [`Intent`] set with the fast model tier.
///
/// Never fails: backend errors and unrecognized labels both yield
/// [`Intent::Other`].
pub struct IntentClassifier {
    backend: SharedBackend,
}

impl IntentClassifier {
    /// Classifier over `backend`.
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Classify `command`.
    pub async fn classify(&self, command: &str) -> Intent {
        let request = GenerationRequest::new(classification_prompt(command), ModelTier::Fast)
            .with_temperature(CLASSIFY_TEMPERATURE);
        match self.backend.generate(&request).await {
            Ok(label) => {
                let intent = Intent::from_label(&label);
                debug!(intent = %intent, label = label.trim(), "intent classified");
                intent
            }
            Err(error) => {
                warn!(
                    category = error.category(),
                    error = %error,
                    "intent classification failed, treating as other"
                );
                Intent::Other
            }
        }
    }
}

/// Prompt listing every intent with a one-line description.
pub fn classification_prompt(command: &str) -> String {
    format!(
        "{CLASSIFY_TASK}\n\
         Classify the following command into one of these intents:\n\
         - generate_quiz: the user wants a quiz\n\
         - summarize: the user wants a summary\n\
         - explain: the user wants a concept explained\n\
         - generate_example: the user wants an example\n\
         - generate_diagram: the user wants a diagram\n\
         - answer_question: the user asks a specific question\n\
         - other: none of the above\n\
         \n\
         Command: \"{command}\"\n\
         \n\
         Respond with ONLY the intent name, nothing else."
    )
}
