use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink, CLASSIFIER_DEGRADED,
    FRAME_POPPED, FRAME_PUSHED, FRAME_REPLACED, TURN_COMPLETED,
};
use crate::classifier::{classify_detailed, IntentClassifier};
use crate::dialog::engine::{DialogEngine, PopReason, StackEvent, TurnOutcome};
use crate::domain::conversation::{ConversationId, ConversationState};
use crate::domain::intent::IntentResult;
use crate::domain::message::OutgoingMessage;
use crate::errors::ApplicationError;
use crate::store::ConversationStore;
use crate::tasks::{TaskKind, TaskValue};

const ACTOR: &str = "router";

/// Everything one turn produced, in emission order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnReply {
    pub conversation_id: ConversationId,
    pub correlation_id: String,
    pub turn: u64,
    pub messages: Vec<OutgoingMessage>,
    pub intent: Option<IntentResult>,
    pub completed: Vec<TaskValue>,
    pub active_task: Option<TaskKind>,
    pub depth: usize,
}

/// One async mutex per conversation id. Turns of the same conversation are
/// serialised; distinct conversations never contend. An entry lives only
/// while some caller holds or waits on it, so the map stays bounded by the
/// conversations currently in flight.
#[derive(Default)]
pub struct ConversationLocks {
    locks: StdMutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn handle(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(id.clone()).or_default().clone()
    }

    /// Drops the entry for `id` unless another caller still holds a handle.
    /// Call after dropping your own handle.
    pub fn release(&self, id: &ConversationId) {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Router {
    engine: DialogEngine,
    classifier: Arc<dyn IntentClassifier>,
    store: Arc<dyn ConversationStore>,
    audit: Arc<dyn AuditSink>,
    locks: ConversationLocks,
}

impl Router {
    pub fn new(
        engine: DialogEngine,
        classifier: Arc<dyn IntentClassifier>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            engine,
            classifier,
            store,
            audit: Arc::new(TracingAuditSink),
            locks: ConversationLocks::default(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn engine(&self) -> &DialogEngine {
        &self.engine
    }

    pub fn classifier(&self) -> &dyn IntentClassifier {
        self.classifier.as_ref()
    }

    pub fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    /// Runs one turn: load, classify (skipped on a welcome turn), apply the
    /// dialog algorithm, save. The conversation lock is held throughout, and a
    /// turn that fails is not saved.
    pub async fn handle_turn(
        &self,
        conversation_id: &ConversationId,
        utterance: &str,
    ) -> Result<TurnReply, ApplicationError> {
        let lock = self.locks.handle(conversation_id);
        let result = {
            let _guard = lock.lock().await;
            self.run_turn(conversation_id, utterance).await
        };
        drop(lock);
        self.locks.release(conversation_id);
        result
    }

    async fn run_turn(
        &self,
        conversation_id: &ConversationId,
        utterance: &str,
    ) -> Result<TurnReply, ApplicationError> {
        let correlation_id = format!("turn-{}", Uuid::new_v4());

        let mut state = self
            .store
            .load(conversation_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(conversation_id.clone()));

        let outcome = if state.stack.is_empty() {
            self.engine.welcome(&mut state)
        } else {
            let threshold = self.engine.settings().confidence_threshold;
            let classification =
                classify_detailed(self.classifier.as_ref(), utterance, &state, threshold).await;
            if let Some(degraded) = &classification.degraded {
                self.audit.emit(
                    AuditEvent::new(
                        conversation_id.clone(),
                        &correlation_id,
                        CLASSIFIER_DEGRADED,
                        AuditCategory::Classifier,
                        self.classifier.name(),
                        AuditOutcome::Degraded,
                    )
                    .with_metadata("error", degraded.to_string()),
                );
            }
            self.engine.route(&mut state, utterance, &classification.intent)
        };

        let outcome = outcome.map_err(|domain_error| {
            error!(
                event_name = "router.turn_failed",
                conversation_id = %conversation_id,
                correlation_id = %correlation_id,
                error = %domain_error,
                "dialog turn failed; state not saved"
            );
            ApplicationError::from(domain_error)
        })?;

        state.turn_count += 1;
        state.updated_at = Utc::now();
        self.store.save(&state).await?;

        self.audit_stack_events(conversation_id, &correlation_id, &outcome);
        let reply = TurnReply {
            conversation_id: conversation_id.clone(),
            correlation_id,
            turn: state.turn_count,
            messages: outcome.messages,
            intent: outcome.intent,
            completed: outcome.completed,
            active_task: state.active_task(),
            depth: state.stack.depth(),
        };

        self.audit.emit(
            AuditEvent::new(
                conversation_id.clone(),
                &reply.correlation_id,
                TURN_COMPLETED,
                AuditCategory::Router,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("turn", reply.turn.to_string())
            .with_metadata("messages", reply.messages.len().to_string())
            .with_metadata("depth", reply.depth.to_string()),
        );
        info!(
            event_name = "router.turn_completed",
            conversation_id = %conversation_id,
            correlation_id = %reply.correlation_id,
            turn = reply.turn,
            intent = reply.intent.as_ref().map(|intent| intent.intent.as_str()).unwrap_or("welcome"),
            messages = reply.messages.len(),
            depth = reply.depth,
            "turn completed"
        );

        Ok(reply)
    }

    pub async fn snapshot(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationState>, ApplicationError> {
        let lock = self.locks.handle(conversation_id);
        let state = {
            let _guard = lock.lock().await;
            self.store.load(conversation_id).await
        };
        drop(lock);
        self.locks.release(conversation_id);
        Ok(state?)
    }

    /// Forgets a conversation's stored state; its next turn is a welcome
    /// turn. Turns already queued on the conversation keep their place.
    pub async fn reset(&self, conversation_id: &ConversationId) -> Result<bool, ApplicationError> {
        let lock = self.locks.handle(conversation_id);
        let removed = {
            let _guard = lock.lock().await;
            self.store.remove(conversation_id).await
        };
        drop(lock);
        self.locks.release(conversation_id);
        Ok(removed?)
    }

    /// Conversations with a turn running or queued.
    pub fn conversations_in_flight(&self) -> usize {
        self.locks.len()
    }

    fn audit_stack_events(
        &self,
        conversation_id: &ConversationId,
        correlation_id: &str,
        outcome: &TurnOutcome,
    ) {
        for event in &outcome.events {
            let audit_event = match event {
                StackEvent::Pushed { frame_id, task } => self
                    .dialog_event(conversation_id, correlation_id, FRAME_PUSHED)
                    .with_metadata("frame_id", frame_id.to_string())
                    .with_metadata("task", task.as_str()),
                StackEvent::Replaced { discarded_id, discarded_task, frame_id, task } => self
                    .dialog_event(conversation_id, correlation_id, FRAME_REPLACED)
                    .with_metadata("discarded_frame_id", discarded_id.to_string())
                    .with_metadata("discarded_task", discarded_task.as_str())
                    .with_metadata("frame_id", frame_id.to_string())
                    .with_metadata("task", task.as_str()),
                StackEvent::Popped { frame_id, task, reason } => self
                    .dialog_event(conversation_id, correlation_id, FRAME_POPPED)
                    .with_metadata("frame_id", frame_id.to_string())
                    .with_metadata("task", task.as_str())
                    .with_metadata(
                        "reason",
                        match reason {
                            PopReason::Completed => "completed",
                            PopReason::Cancelled => "cancelled",
                        },
                    ),
            };
            self.audit.emit(audit_event);
        }
    }

    fn dialog_event(
        &self,
        conversation_id: &ConversationId,
        correlation_id: &str,
        event_type: &str,
    ) -> AuditEvent {
        AuditEvent::new(
            conversation_id.clone(),
            correlation_id,
            event_type,
            AuditCategory::Dialog,
            "dialog-engine",
            AuditOutcome::Success,
        )
    }
}
