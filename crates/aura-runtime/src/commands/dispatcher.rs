//! Command dispatcher.
//!
//! Drives each command through `pending -> processing -> completed | failed`:
//!
//! 1. [`CommandDispatcher::submit`] persists the command as `pending`, tells
//!    the requester it is being processed, and hands it to a background task.
//! 2. The intent is classified (never fails; unknown becomes `other`).
//! 3. The command is marked `processing` with its intent before any
//!    generation call.
//! 4. Context is assembled and the intent's strategy generates a payload.
//!    Quizzes additionally get a share code and a quiz row, written in the
//!    same transaction that completes the command.
//! 5. Any failure in 3-4 marks the command `failed` with the error message.
//!
//! Either way the requester receives exactly one terminal notification.
//! Commands of one session may run concurrently; each command's own
//! transitions are compare-and-set in the store.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

use aura_context::SessionRegistry;
use aura_core::commands::{Command, CommandStatus, Intent, Quiz};
use aura_core::events::{AuraEvent, EventPayload, ReplyTarget};
use aura_core::ids::{CommandId, QuizId, SessionId};
use aura_llm::SharedBackend;
use aura_settings::AuraSettings;
use aura_store::{AuraStore, StoreError};

use crate::commands::classifier::IntentClassifier;
use crate::commands::context::assemble_context;
use crate::commands::share_code::{MAX_SHARE_CODE_ATTEMPTS, generate_share_code};
use crate::commands::strategies::{strategy_for, unrecognized_reply};
use crate::emitter::EventEmitter;
use crate::errors::{Result, RuntimeError};

/// A command that reached `completed`.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedCommand {
    /// Classified intent.
    pub intent: Intent,
    /// Response payload as persisted and delivered.
    pub data: Value,
    /// Wall-clock processing time.
    pub processing_time_ms: u64,
}

/// Classifies, generates, persists and answers commands.
pub struct CommandDispatcher {
    store: Arc<AuraStore>,
    registry: Arc<SessionRegistry>,
    backend: SharedBackend,
    emitter: Arc<EventEmitter>,
    classifier: IntentClassifier,
    recent_item_limit: usize,
    share_code_length: usize,
}

impl CommandDispatcher {
    /// Create a dispatcher. `backend` should already enforce a timeout.
    pub fn new(
        store: Arc<AuraStore>,
        registry: Arc<SessionRegistry>,
        backend: SharedBackend,
        emitter: Arc<EventEmitter>,
        settings: &AuraSettings,
    ) -> Self {
        Self {
            store,
            registry,
            classifier: IntentClassifier::new(Arc::clone(&backend)),
            backend,
            emitter,
            recent_item_limit: settings.context.recent_item_limit,
            share_code_length: settings.commands.share_code_length,
        }
    }

    /// Accept a command and process it in the background.
    ///
    /// Returns the new command's ID as soon as it is persisted. The outcome
    /// arrives later as a `command_response` or `error` event for `target`.
    pub fn submit(
        self: &Arc<Self>,
        session_id: &SessionId,
        text: &str,
        timestamp: DateTime<Utc>,
        target: ReplyTarget,
    ) -> Result<CommandId> {
        if self.store.get_session(session_id)?.is_none() {
            return Err(RuntimeError::SessionNotFound(session_id.to_string()));
        }
        let command = self.store.create_command(session_id, text, timestamp)?;
        let command_id = command.id.clone();
        self.notify(
            session_id,
            &target,
            EventPayload::CommandProcessing {
                command_id: command_id.clone(),
            },
        );

        let this = Arc::clone(self);
        drop(tokio::spawn(async move {
            let _ = this.process(command, target).await;
        }));
        Ok(command_id)
    }

    /// Drive `command` to a terminal state and notify `target`.
    #[instrument(skip_all, fields(command_id = %command.id, session_id = %command.session_id))]
    pub async fn process(&self, command: Command, target: ReplyTarget) -> CommandStatus {
        let started = Instant::now();
        match self.run(&command, started).await {
            Ok(done) => {
                info!(
                    intent = %done.intent,
                    processing_time_ms = done.processing_time_ms,
                    "command completed"
                );
                self.notify(
                    &command.session_id,
                    &target,
                    EventPayload::CommandResponse {
                        command_id: command.id.clone(),
                        kind: done.intent.response_kind(),
                        data: done.data,
                        processing_time_ms: done.processing_time_ms,
                    },
                );
                CommandStatus::Completed
            }
            Err(failure) => {
                let message = failure.to_string();
                warn!(category = failure.category(), error = %message, "command failed");
                if let Err(e) = self
                    .store
                    .fail_command(&command.id, &message, elapsed_ms(started))
                {
                    error!(error = %e, "could not record command failure");
                }
                self.notify(
                    &command.session_id,
                    &target,
                    EventPayload::Error {
                        message: format!("Command failed: {message}"),
                        command_id: Some(command.id.clone()),
                    },
                );
                CommandStatus::Failed
            }
        }
    }

    async fn run(&self, command: &Command, started: Instant) -> Result<CompletedCommand> {
        let intent = self.classifier.classify(&command.raw_text).await;
        self.store.mark_command_processing(&command.id, intent)?;

        let Some(strategy) = strategy_for(intent) else {
            return self.complete(command, intent, unrecognized_reply(), started);
        };

        let context = self.context_for(&command.session_id)?;
        let payload = strategy
            .generate(&self.backend, &context, &command.raw_text)
            .await?;

        if intent == Intent::GenerateQuiz {
            self.complete_with_quiz(command, payload, started)
        } else {
            self.complete(command, intent, Value::Object(payload), started)
        }
    }

    fn context_for(&self, session_id: &SessionId) -> Result<String> {
        let segments = self.store.list_segments(session_id)?;
        let recent = self
            .registry
            .get(session_id)
            .map(|ctx| ctx.recent(self.recent_item_limit))
            .unwrap_or_default();
        Ok(assemble_context(&segments, &recent))
    }

    fn complete(
        &self,
        command: &Command,
        intent: Intent,
        data: Value,
        started: Instant,
    ) -> Result<CompletedCommand> {
        let processing_time_ms = elapsed_ms(started);
        self.store
            .complete_command(&command.id, &data, processing_time_ms, None)?;
        Ok(CompletedCommand {
            intent,
            data,
            processing_time_ms,
        })
    }

    fn complete_with_quiz(
        &self,
        command: &Command,
        quiz_data: Map<String, Value>,
        started: Instant,
    ) -> Result<CompletedCommand> {
        let quiz_id = QuizId::new();
        for attempt in 1..=MAX_SHARE_CODE_ATTEMPTS {
            let share_code = generate_share_code(self.share_code_length);
            let quiz = Quiz {
                id: quiz_id.clone(),
                session_id: command.session_id.clone(),
                command_id: command.id.clone(),
                share_code: share_code.clone(),
                data: Value::Object(quiz_data.clone()),
                created_at: Utc::now(),
            };
            let mut response = quiz_data.clone();
            let _ = response.insert("shareCode".into(), Value::String(share_code));
            let _ = response.insert("quizId".into(), Value::String(quiz_id.to_string()));
            let data = Value::Object(response);

            let processing_time_ms = elapsed_ms(started);
            match self
                .store
                .complete_command(&command.id, &data, processing_time_ms, Some(&quiz))
            {
                Ok(()) => {
                    return Ok(CompletedCommand {
                        intent: Intent::GenerateQuiz,
                        data,
                        processing_time_ms,
                    });
                }
                Err(StoreError::ShareCodeTaken(code)) => {
                    warn!(attempt, share_code = %code, "share code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(RuntimeError::ShareCodeExhausted(MAX_SHARE_CODE_ATTEMPTS))
    }

    fn notify(&self, session_id: &SessionId, target: &ReplyTarget, payload: EventPayload) {
        let _ = self.emitter.emit(AuraEvent::to_target(
            session_id.clone(),
            target.clone(),
            payload,
        ));
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use aura_core::commands::ResponseKind;
    use aura_core::constants::UNRECOGNIZED_COMMAND_REPLY;
    use aura_core::ids::ConnectionId;
    use aura_llm::{MockBackend, MockReply, TimeoutBackend};
    use serde_json::json;

    use crate::commands::classifier::CLASSIFY_TASK;

    struct Fixture {
        store: Arc<AuraStore>,
        emitter: Arc<EventEmitter>,
        dispatcher: Arc<CommandDispatcher>,
        session_id: SessionId,
    }

    fn fixture(backend: MockBackend) -> Fixture {
        let settings = AuraSettings::default();
        let store = Arc::new(AuraStore::open_in_memory().unwrap());
        let registry = Arc::new(SessionRegistry::new(
            settings.context.clone(),
            settings.fusion.clone(),
        ));
        let emitter = Arc::new(EventEmitter::new());
        let session_id = store.create_session("Biology", None).unwrap().id;
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&store),
            registry,
            Arc::new(backend),
            Arc::clone(&emitter),
            &settings,
        ));
        Fixture {
            store,
            emitter,
            dispatcher,
            session_id,
        }
    }

    fn pending(f: &Fixture, text: &str) -> Command {
        f.store.create_command(&f.session_id, text, Utc::now()).unwrap()
    }

    fn quiz_payload() -> Value {
        let question = json!({
            "question": "What pigment absorbs light?",
            "options": ["Chlorophyll", "Keratin", "Melanin", "Hemoglobin"],
            "correctAnswer": 0,
            "explanation": "Chlorophyll absorbs red and blue light."
        });
        json!({ "title": "Photosynthesis", "questions": vec![question; 5] })
    }

    #[tokio::test]
    async fn quiz_command_completes_with_share_code() {
        let f = fixture(
            MockBackend::new()
                .on(CLASSIFY_TASK, MockReply::text("generate_quiz"))
                .on("TASK: generate_quiz", MockReply::json(&quiz_payload())),
        );
        let command = pending(&f, "quiz us on photosynthesis");
        let status = f.dispatcher.process(command.clone(), ReplyTarget::Session).await;
        assert_eq!(status, CommandStatus::Completed);

        let stored = f.store.get_command(&command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Completed);
        assert_eq!(stored.intent, Some(Intent::GenerateQuiz));
        let response = stored.response.unwrap();
        let code = response["shareCode"].as_str().unwrap();
        assert_eq!(code.len(), 8);

        let quiz = f.store.quiz_by_share_code(code).unwrap().unwrap();
        assert_eq!(quiz.command_id, command.id);
        assert_eq!(quiz.data["questions"].as_array().unwrap().len(), 5);
        assert_eq!(response["quizId"], quiz.id.as_str());
    }

    #[tokio::test]
    async fn other_intent_gets_canned_reply_without_generation() {
        let backend = MockBackend::new().on(CLASSIFY_TASK, MockReply::text("other"));
        let f = fixture(backend);
        let command = pending(&f, "open the window");
        let mut rx = f.emitter.subscribe();

        let status = f.dispatcher.process(command.clone(), ReplyTarget::Session).await;
        assert_eq!(status, CommandStatus::Completed);

        let event = rx.recv().await.unwrap();
        match event.payload {
            EventPayload::CommandResponse { kind, data, command_id, .. } => {
                assert_eq!(kind, ResponseKind::Other);
                assert_eq!(data["content"], UNRECOGNIZED_COMMAND_REPLY);
                assert_eq!(command_id, command.id);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_fails_command() {
        let f = fixture(
            MockBackend::new()
                .on(CLASSIFY_TASK, MockReply::text("summarize"))
                .on("TASK: summarize", MockReply::text("no json here")),
        );
        let command = pending(&f, "summarize please");
        let target = ReplyTarget::Connection {
            id: ConnectionId::from("conn-1"),
        };
        let mut rx = f.emitter.subscribe();

        let status = f.dispatcher.process(command.clone(), target.clone()).await;
        assert_eq!(status, CommandStatus::Failed);

        let stored = f.store.get_command(&command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Failed);
        assert!(!stored.error_message.unwrap().is_empty());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.target, target);
        assert_eq!(event.event_type(), "error");
    }

    #[tokio::test]
    async fn short_quiz_fails_without_quiz_row() {
        let mut payload = quiz_payload();
        payload["questions"].as_array_mut().unwrap().truncate(2);
        let f = fixture(
            MockBackend::new()
                .on(CLASSIFY_TASK, MockReply::text("generate_quiz"))
                .on("TASK: generate_quiz", MockReply::json(&payload)),
        );
        let command = pending(&f, "quiz us on photosynthesis");

        let status = f.dispatcher.process(command.clone(), ReplyTarget::Session).await;
        assert_eq!(status, CommandStatus::Failed);

        let stored = f.store.get_command(&command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Failed);
        assert!(stored.error_message.unwrap().contains("expected 5 questions"));
        assert!(f.store.list_quizzes(&f.session_id).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_command_and_persists_nothing_else() {
        let slow = MockBackend::new()
            .on(CLASSIFY_TASK, MockReply::text("generate_quiz"))
            .on(
                "TASK: generate_quiz",
                MockReply::delayed(Duration::from_secs(120), MockReply::json(&quiz_payload())),
            );
        let settings = AuraSettings::default();
        let store = Arc::new(AuraStore::open_in_memory().unwrap());
        let session_id = store.create_session("Chemistry", None).unwrap().id;
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&store),
            Arc::new(SessionRegistry::new(settings.context.clone(), settings.fusion.clone())),
            Arc::new(TimeoutBackend::new(Arc::new(slow), Duration::from_secs(30))),
            Arc::new(EventEmitter::new()),
            &settings,
        );
        let command = store.create_command(&session_id, "quiz", Utc::now()).unwrap();

        let status = dispatcher.process(command.clone(), ReplyTarget::Session).await;
        assert_eq!(status, CommandStatus::Failed);
        assert!(store.list_quizzes(&session_id).unwrap().is_empty());
        let stored = store.get_command(&command.id).unwrap().unwrap();
        assert!(stored.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn submit_returns_id_and_notifies_twice() {
        let f = fixture(
            MockBackend::new()
                .on(CLASSIFY_TASK, MockReply::text("explain"))
                .on("TASK: explain", MockReply::json(&json!({"title": "Osmosis", "content": "Water moves"}))),
        );
        let mut rx = f.emitter.subscribe();
        let id = f
            .dispatcher
            .submit(&f.session_id, "explain osmosis", Utc::now(), ReplyTarget::Session)
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_type(), "command_processing");
        let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.event_type(), "command_response");
        assert_eq!(second.data()["commandId"], id.as_str());
    }

    #[tokio::test]
    async fn submit_to_unknown_session_is_rejected() {
        let f = fixture(MockBackend::new());
        let result = f.dispatcher.submit(
            &SessionId::from("nobody"),
            "quiz",
            Utc::now(),
            ReplyTarget::Session,
        );
        assert!(matches!(result, Err(RuntimeError::SessionNotFound(_))));
    }
}
