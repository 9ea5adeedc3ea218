use std::sync::Arc;

use tracing::debug;

use crate::config::RouterConfig;
use crate::dialog::policy::{InterruptPolicy, InterruptPolicyTable};
use crate::dialog::stack::{FrameId, TaskFrame};
use crate::domain::conversation::ConversationState;
use crate::domain::intent::{Entities, IntentResult};
use crate::domain::message::OutgoingMessage;
use crate::errors::DomainError;
use crate::tasks::{
    RegistryError, SlotCollector, SlotState, StepOutcome, TaskHandler, TaskKind, TaskRegistry,
    TaskResult, TaskValue,
};

pub const DEFAULT_RESTART_PROMPT: &str = "What else can I do for you?";
pub const DEFAULT_CANCEL_NOTICE: &str = "Cancelling.";

#[derive(Clone, Debug, PartialEq)]
pub struct DialogSettings {
    pub confidence_threshold: f32,
    /// Emitted whenever the stack empties.
    pub restart_prompt: String,
    /// Emitted when a task is cancelled; `None` pops silently.
    pub cancel_notice: Option<String>,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            restart_prompt: DEFAULT_RESTART_PROMPT.to_string(),
            cancel_notice: Some(DEFAULT_CANCEL_NOTICE.to_string()),
        }
    }
}

impl From<&RouterConfig> for DialogSettings {
    fn from(config: &RouterConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            restart_prompt: config.restart_prompt.clone(),
            cancel_notice: config.cancel_notice.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopReason {
    Completed,
    Cancelled,
}

/// Stack mutations performed during one turn, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackEvent {
    Pushed { frame_id: FrameId, task: TaskKind },
    Replaced { discarded_id: FrameId, discarded_task: TaskKind, frame_id: FrameId, task: TaskKind },
    Popped { frame_id: FrameId, task: TaskKind, reason: PopReason },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnOutcome {
    pub messages: Vec<OutgoingMessage>,
    pub events: Vec<StackEvent>,
    pub completed: Vec<TaskValue>,
    pub intent: Option<IntentResult>,
}

/// Runs the per-turn algorithm against one conversation's state. Pure and
/// synchronous; classification and persistence belong to the router.
#[derive(Debug)]
pub struct DialogEngine {
    registry: TaskRegistry,
    policy: InterruptPolicyTable,
    settings: DialogSettings,
}

impl DialogEngine {
    pub fn new(
        registry: TaskRegistry,
        policy: InterruptPolicyTable,
        settings: DialogSettings,
    ) -> Result<Self, RegistryError> {
        registry.validate_policy(&policy)?;
        Ok(Self { registry, policy, settings })
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &InterruptPolicyTable {
        &self.policy
    }

    pub fn settings(&self) -> &DialogSettings {
        &self.settings
    }

    /// First turn of a conversation, or the first after the stack emptied:
    /// start the root task and ask its first question. The utterance is not
    /// consumed.
    pub fn welcome(&self, state: &mut ConversationState) -> Result<TurnOutcome, DomainError> {
        let mut outcome = TurnOutcome::default();
        let frame = TaskFrame::new(self.registry.root());
        outcome.events.push(StackEvent::Pushed { frame_id: frame.id.clone(), task: frame.task });
        state.stack.push(frame);

        self.step_active(state, None, &mut outcome)?;
        Ok(outcome)
    }

    /// Routes one classified utterance on a non-empty stack.
    pub fn route(
        &self,
        state: &mut ConversationState,
        utterance: &str,
        intent: &IntentResult,
    ) -> Result<TurnOutcome, DomainError> {
        let mut outcome = TurnOutcome { intent: Some(intent.clone()), ..TurnOutcome::default() };
        let active_task = state.active_task().ok_or(DomainError::EmptyStack)?;
        let policy = self.policy.policy_for(intent.intent);
        let target = self.registry.task_for(intent.intent);

        debug!(
            event_name = "dialog.route",
            conversation_id = %state.conversation_id,
            intent = %intent.intent,
            confidence = intent.confidence,
            policy = policy.as_str(),
            active_task = %active_task,
            depth = state.stack.depth(),
            "routing utterance"
        );

        match (policy, target) {
            (InterruptPolicy::Ignore, _) | (_, None) => {
                self.step_active(state, Some(utterance), &mut outcome)?;
            }
            (_, Some(task)) if task == active_task => {
                let filled = self.prefill_active(state, &intent.entities)?;
                let input = (!filled).then_some(utterance);
                self.step_active(state, input, &mut outcome)?;
            }
            (InterruptPolicy::InterruptAndPush, Some(task)) => {
                let frame = TaskFrame::with_slots(task, self.prefilled_slots(task, &intent.entities)?);
                outcome.events.push(StackEvent::Pushed { frame_id: frame.id.clone(), task });
                state.stack.push(frame);
                self.step_active(state, None, &mut outcome)?;
            }
            (InterruptPolicy::InterruptAndReplace, Some(task)) => {
                let frame = TaskFrame::with_slots(task, self.prefilled_slots(task, &intent.entities)?);
                let frame_id = frame.id.clone();
                let discarded = state.stack.replace_active(frame).ok_or(DomainError::EmptyStack)?;
                outcome.events.push(StackEvent::Replaced {
                    discarded_id: discarded.id,
                    discarded_task: discarded.task,
                    frame_id,
                    task,
                });
                self.step_active(state, None, &mut outcome)?;
            }
        }

        Ok(outcome)
    }

    /// Steps the active frame and keeps unwinding while frames finish: each
    /// finished frame is popped and the frame beneath is resumed with no
    /// input. A resumed frame still waiting on the same slot repeats the
    /// exact prompt it last asked, reprompts included. Terminates because
    /// every iteration either ends the turn or shrinks the stack.
    fn step_active(
        &self,
        state: &mut ConversationState,
        input: Option<&str>,
        outcome: &mut TurnOutcome,
    ) -> Result<(), DomainError> {
        let mut input = input;
        let mut resuming = false;

        loop {
            let frame = state.stack.peek_active_mut().ok_or(DomainError::EmptyStack)?;
            let handler = self.handler(frame.task)?;
            let waiting_for = pending_slot(handler.as_ref(), frame);
            let StepOutcome { result, slots } = handler.step(input.take(), &frame.slots);
            frame.slots = slots;

            let reason = match result {
                TaskResult::NeedsInput(prompt) => {
                    if prompt.trim().is_empty() {
                        return Err(DomainError::InvariantViolation(format!(
                            "task `{}` asked for input with an empty prompt",
                            frame.task
                        )));
                    }
                    let still_waiting = pending_slot(handler.as_ref(), frame) == waiting_for;
                    let prompt = match frame.last_prompt.as_deref() {
                        Some(last) if resuming && still_waiting => last.to_string(),
                        _ => prompt,
                    };
                    frame.last_prompt = Some(prompt.clone());
                    outcome.messages.push(OutgoingMessage::prompt(prompt));
                    return Ok(());
                }
                TaskResult::Completed(value) => {
                    if !value.summary.trim().is_empty() {
                        outcome.messages.push(OutgoingMessage::confirmation(value.summary.clone()));
                    }
                    outcome.completed.push(value);
                    PopReason::Completed
                }
                TaskResult::Cancelled => {
                    if let Some(notice) = &self.settings.cancel_notice {
                        outcome.messages.push(OutgoingMessage::cancellation(notice.clone()));
                    }
                    PopReason::Cancelled
                }
            };

            let popped = state.stack.pop().ok_or(DomainError::EmptyStack)?;
            outcome.events.push(StackEvent::Popped {
                frame_id: popped.id,
                task: popped.task,
                reason,
            });

            if state.stack.is_empty() {
                outcome.messages.push(OutgoingMessage::restart(self.settings.restart_prompt.clone()));
                return Ok(());
            }
            resuming = true;
        }
    }

    /// Applies entities to the active frame's still-missing slots. Returns
    /// whether anything was filled.
    fn prefill_active(
        &self,
        state: &mut ConversationState,
        entities: &Entities,
    ) -> Result<bool, DomainError> {
        let frame = state.stack.peek_active_mut().ok_or(DomainError::EmptyStack)?;
        let handler = self.handler(frame.task)?;
        let mut filled = false;

        for (name, value) in accepted_entities(handler.as_ref(), entities) {
            if !frame.slots.contains_key(&name) {
                frame.slots.insert(name, value);
                filled = true;
            }
        }
        Ok(filled)
    }

    fn prefilled_slots(&self, task: TaskKind, entities: &Entities) -> Result<SlotState, DomainError> {
        let handler = self.handler(task)?;
        Ok(accepted_entities(handler.as_ref(), entities).collect())
    }

    fn handler(&self, task: TaskKind) -> Result<&Arc<dyn TaskHandler>, DomainError> {
        self.registry.handler(task).ok_or(DomainError::UnregisteredTask(task))
    }
}

/// Entities that name a declared slot and pass that slot's parser. Anything
/// else is dropped.
fn accepted_entities<'a>(
    handler: &'a dyn TaskHandler,
    entities: &'a Entities,
) -> impl Iterator<Item = (String, String)> + 'a {
    let declared = handler.slots();
    entities.iter().filter_map(move |(name, raw)| {
        let Some(slot) = declared.iter().find(|slot| slot.name == name.as_str()) else {
            debug!(entity = %name, task = %handler.kind(), "dropping entity with no matching slot");
            return None;
        };
        slot.parse(raw).map(|value| (name.clone(), value))
    })
}

/// First still-missing slot of a frame, if the task declares any.
pub fn pending_slot(handler: &dyn TaskHandler, frame: &TaskFrame) -> Option<&'static str> {
    SlotCollector::new(handler.slots()).first_missing(&frame.slots).map(|slot| slot.name)
}

#[cfg(test)]
mod tests {
    use super::{DialogEngine, DialogSettings, PopReason, StackEvent};
    use crate::dialog::policy::{InterruptPolicy, InterruptPolicyTable};
    use crate::domain::conversation::{ConversationId, ConversationState};
    use crate::domain::intent::{Entities, Intent, IntentResult};
    use crate::domain::message::{MessageKind, OutgoingMessage};
    use crate::errors::DomainError;
    use crate::tasks::collector::{parse_text, parse_yes_no};
    use crate::tasks::{
        Collected, RegistryError, SlotCollector, SlotSpec, SlotState, StepOutcome, TaskHandler,
        TaskKind, TaskRegistry, TaskValue,
    };

    const SURVEY_SLOTS: &[SlotSpec] = &[
        SlotSpec::new("fever", "Do you have a fever?", parse_yes_no)
            .with_reprompt("Please answer yes or no. Do you have a fever?"),
        SlotSpec::new("cough", "Do you have a cough?", parse_yes_no),
    ];

    const BOOKING_SLOTS: &[SlotSpec] = &[
        SlotSpec::new("destination", "Where would you like to travel to?", parse_text),
        SlotSpec::new("origin", "Where are you traveling from?", parse_text),
    ];

    struct CollectTask {
        kind: TaskKind,
        slots: &'static [SlotSpec],
        summary: &'static str,
    }

    impl TaskHandler for CollectTask {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        fn slots(&self) -> &[SlotSpec] {
            self.slots
        }

        fn step(&self, input: Option<&str>, slots: &SlotState) -> StepOutcome {
            match SlotCollector::new(self.slots).collect(input, slots) {
                Collected::Ask { prompt, slots, .. } => StepOutcome::needs_input(prompt, slots),
                Collected::Complete(slots) => StepOutcome::completed(
                    TaskValue::new(self.kind, self.summary).with_fields(slots.clone()),
                    slots,
                ),
                Collected::Cancelled(slots) => StepOutcome::cancelled(slots),
            }
        }
    }

    struct SilentTask;

    impl TaskHandler for SilentTask {
        fn kind(&self) -> TaskKind {
            TaskKind::Help
        }

        fn slots(&self) -> &[SlotSpec] {
            &[]
        }

        fn step(&self, _input: Option<&str>, slots: &SlotState) -> StepOutcome {
            StepOutcome::needs_input("  ", slots.clone())
        }
    }

    fn registry() -> TaskRegistry {
        TaskRegistry::builder()
            .register(CollectTask {
                kind: TaskKind::SelfAssessment,
                slots: SURVEY_SLOTS,
                summary: "Thanks for completing the assessment.",
            })
            .register(CollectTask {
                kind: TaskKind::EmergencyCare,
                slots: &[],
                summary: "Please call 911 or go directly to your nearest emergency department.",
            })
            .register(CollectTask {
                kind: TaskKind::BookFlight,
                slots: BOOKING_SLOTS,
                summary: "Your flight is booked.",
            })
            .register(CollectTask {
                kind: TaskKind::Help,
                slots: &[],
                summary: "I can check symptoms or book a flight.",
            })
            .route(Intent::SelfAssessment, TaskKind::SelfAssessment)
            .route(Intent::Emergency, TaskKind::EmergencyCare)
            .route(Intent::BookFlight, TaskKind::BookFlight)
            .route(Intent::Help, TaskKind::Help)
            .root(TaskKind::SelfAssessment)
            .build()
            .expect("valid registry")
    }

    fn engine() -> DialogEngine {
        DialogEngine::new(registry(), InterruptPolicyTable::default(), DialogSettings::default())
            .expect("valid engine")
    }

    fn started(engine: &DialogEngine) -> ConversationState {
        let mut state = ConversationState::new(ConversationId::new("conversation-1"));
        engine.welcome(&mut state).expect("welcome");
        state
    }

    fn intent(intent: Intent) -> IntentResult {
        IntentResult { intent, confidence: 0.9, entities: Entities::new() }
    }

    fn texts(messages: &[OutgoingMessage]) -> Vec<&str> {
        messages.iter().map(|message| message.text.as_str()).collect()
    }

    #[test]
    fn welcome_starts_root_task_and_asks_first_question() {
        let engine = engine();
        let mut state = ConversationState::new(ConversationId::new("conversation-1"));

        let outcome = engine.welcome(&mut state).expect("welcome");

        assert_eq!(texts(&outcome.messages), vec!["Do you have a fever?"]);
        assert_eq!(state.active_task(), Some(TaskKind::SelfAssessment));
        assert!(matches!(
            outcome.events.as_slice(),
            [StackEvent::Pushed { task: TaskKind::SelfAssessment, .. }]
        ));
        assert_eq!(
            state.stack.peek_active().and_then(|frame| frame.last_prompt.as_deref()),
            Some("Do you have a fever?")
        );
    }

    #[test]
    fn unclassified_utterance_goes_to_active_task() {
        let engine = engine();
        let mut state = started(&engine);

        let outcome =
            engine.route(&mut state, "yes", &IntentResult::unclassified()).expect("route");

        assert_eq!(texts(&outcome.messages), vec!["Do you have a cough?"]);
        let slots = &state.stack.peek_active().expect("active frame").slots;
        assert_eq!(slots.get("fever").map(String::as_str), Some("yes"));
    }

    #[test]
    fn rejected_answer_uses_reprompt() {
        let engine = engine();
        let mut state = started(&engine);

        let outcome =
            engine.route(&mut state, "purple", &IntentResult::unclassified()).expect("route");

        assert_eq!(texts(&outcome.messages), vec!["Please answer yes or no. Do you have a fever?"]);
        assert!(state.stack.peek_active().expect("active frame").slots.is_empty());
    }

    #[test]
    fn pushed_interrupt_resumes_suspended_task_with_same_prompt() {
        let engine = engine();
        let mut state = started(&engine);
        engine.route(&mut state, "yes", &IntentResult::unclassified()).expect("answer");
        let before = state.stack.peek_active().expect("active frame").clone();

        let outcome = engine.route(&mut state, "what can you do", &intent(Intent::Help)).expect("help");

        assert_eq!(
            texts(&outcome.messages),
            vec!["I can check symptoms or book a flight.", "Do you have a cough?"]
        );
        assert_eq!(outcome.messages[0].kind, MessageKind::Confirmation);
        assert_eq!(outcome.messages[1].kind, MessageKind::Prompt);
        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(state.stack.depth(), 1);

        let after = state.stack.peek_active().expect("active frame");
        assert_eq!(after.id, before.id);
        assert_eq!(after.slots, before.slots);
    }

    #[test]
    fn resume_repeats_the_reprompt_that_was_last_asked() {
        let engine = engine();
        let mut state = started(&engine);
        let reprompt = "Please answer yes or no. Do you have a fever?";
        engine.route(&mut state, "purple", &IntentResult::unclassified()).expect("rejected answer");

        let outcome = engine.route(&mut state, "help", &intent(Intent::Help)).expect("help");

        assert_eq!(
            texts(&outcome.messages),
            vec!["I can check symptoms or book a flight.", reprompt]
        );
        assert_eq!(
            state.stack.peek_active().and_then(|frame| frame.last_prompt.as_deref()),
            Some(reprompt)
        );

        let answered =
            engine.route(&mut state, "yes", &IntentResult::unclassified()).expect("answer");
        assert_eq!(texts(&answered.messages), vec!["Do you have a cough?"]);
    }

    #[test]
    fn every_pop_matches_an_earlier_push_of_the_same_frame() {
        let engine = engine();
        let mut state = ConversationState::new(ConversationId::new("conversation-1"));
        let mut events = engine.welcome(&mut state).expect("welcome").events;
        let mut depths = vec![state.stack.depth()];

        let mut book = intent(Intent::BookFlight);
        book.entities.insert("destination".to_string(), "Lisbon".to_string());
        let turns = [
            ("book a flight", book),
            ("help", intent(Intent::Help)),
            ("cancel", IntentResult::unclassified()),
            ("book a flight", intent(Intent::BookFlight)),
            ("chest pain", intent(Intent::Emergency)),
            ("no", IntentResult::unclassified()),
            ("stop", IntentResult::unclassified()),
        ];
        for (utterance, recognized) in &turns {
            if state.stack.is_empty() {
                events.extend(engine.welcome(&mut state).expect("welcome").events);
            }
            events.extend(engine.route(&mut state, utterance, recognized).expect("route").events);
            depths.push(state.stack.depth());
        }

        let mut live = Vec::new();
        for event in &events {
            match event {
                StackEvent::Pushed { frame_id, .. } => live.push(frame_id.clone()),
                StackEvent::Replaced { discarded_id, frame_id, .. } => {
                    assert_eq!(live.pop().as_ref(), Some(discarded_id), "replaced unknown frame");
                    live.push(frame_id.clone());
                }
                StackEvent::Popped { frame_id, .. } => {
                    assert_eq!(live.pop().as_ref(), Some(frame_id), "popped a frame never pushed");
                }
            }
        }

        let remaining =
            state.stack.frames().iter().map(|frame| frame.id.clone()).collect::<Vec<_>>();
        assert_eq!(live, remaining);
        assert!(events.iter().any(|event| matches!(event, StackEvent::Replaced { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, StackEvent::Popped { reason: PopReason::Cancelled, .. })));
        assert!(depths.iter().all(|depth| *depth <= 3));
    }

    #[test]
    fn pushed_task_collects_before_parent_resumes() {
        let engine = engine();
        let mut state = started(&engine);

        let mut book = intent(Intent::BookFlight);
        book.entities.insert("destination".to_string(), "Seattle".to_string());
        book.entities.insert("airline".to_string(), "Contoso".to_string());
        let pushed = engine.route(&mut state, "fly me to Seattle", &book).expect("push");

        assert_eq!(texts(&pushed.messages), vec!["Where are you traveling from?"]);
        assert_eq!(state.stack.depth(), 2);
        let slots = &state.stack.peek_active().expect("booking frame").slots;
        assert_eq!(slots.get("destination").map(String::as_str), Some("Seattle"));
        assert!(!slots.contains_key("airline"));

        let finished =
            engine.route(&mut state, "New York", &IntentResult::unclassified()).expect("origin");
        assert_eq!(
            texts(&finished.messages),
            vec!["Your flight is booked.", "Do you have a fever?"]
        );
        assert_eq!(finished.completed[0].fields.get("origin").map(String::as_str), Some("New York"));
        assert_eq!(state.stack.depth(), 1);
        assert!(state.stack.peek_active().expect("root").slots.is_empty());
    }

    #[test]
    fn replace_discards_active_frame_and_restarts_when_empty() {
        let engine = engine();
        let mut state = started(&engine);
        engine.route(&mut state, "no", &IntentResult::unclassified()).expect("answer");
        let root_id = state.stack.peek_active().expect("root").id.clone();

        let outcome =
            engine.route(&mut state, "I can't breathe", &intent(Intent::Emergency)).expect("replace");

        assert_eq!(
            texts(&outcome.messages),
            vec![
                "Please call 911 or go directly to your nearest emergency department.",
                "What else can I do for you?",
            ]
        );
        assert!(state.stack.is_empty());
        assert!(matches!(
            outcome.events.as_slice(),
            [
                StackEvent::Replaced { discarded_id, discarded_task: TaskKind::SelfAssessment, task: TaskKind::EmergencyCare, .. },
                StackEvent::Popped { task: TaskKind::EmergencyCare, reason: PopReason::Completed, .. },
            ] if *discarded_id == root_id
        ));
    }

    #[test]
    fn replace_inside_nested_stack_keeps_lower_frames() {
        let engine = engine();
        let mut state = started(&engine);
        engine.route(&mut state, "book a flight", &intent(Intent::BookFlight)).expect("push");
        assert_eq!(state.stack.depth(), 2);

        let outcome =
            engine.route(&mut state, "chest pain", &intent(Intent::Emergency)).expect("replace");

        assert_eq!(state.stack.depth(), 1);
        assert_eq!(state.active_task(), Some(TaskKind::SelfAssessment));
        assert_eq!(
            outcome.messages.last().map(|message| message.text.as_str()),
            Some("Do you have a fever?")
        );
    }

    #[test]
    fn cancel_pops_only_the_active_frame() {
        let engine = engine();
        let mut state = started(&engine);
        engine.route(&mut state, "book a flight", &intent(Intent::BookFlight)).expect("push");

        let outcome =
            engine.route(&mut state, "cancel", &IntentResult::unclassified()).expect("cancel");

        assert_eq!(texts(&outcome.messages), vec!["Cancelling.", "Do you have a fever?"]);
        assert_eq!(outcome.messages[0].kind, MessageKind::Cancellation);
        assert!(outcome.completed.is_empty());
        assert!(matches!(
            outcome.events.as_slice(),
            [StackEvent::Popped { task: TaskKind::BookFlight, reason: PopReason::Cancelled, .. }]
        ));
        assert_eq!(state.stack.depth(), 1);
    }

    #[test]
    fn same_task_intent_fills_slots_instead_of_pushing() {
        let engine = engine();
        let mut state = started(&engine);
        engine.route(&mut state, "book a flight", &intent(Intent::BookFlight)).expect("push");

        let mut again = intent(Intent::BookFlight);
        again.entities.insert("destination".to_string(), "Paris".to_string());
        let outcome = engine.route(&mut state, "to Paris", &again).expect("fill");

        assert_eq!(state.stack.depth(), 2);
        assert!(outcome.events.is_empty());
        assert_eq!(texts(&outcome.messages), vec!["Where are you traveling from?"]);
    }

    #[test]
    fn ignored_intent_is_answered_by_active_task() {
        let engine = engine();
        let mut state = started(&engine);

        let outcome = engine.route(&mut state, "yes", &intent(Intent::Greeting)).expect("route");

        assert!(outcome.events.is_empty());
        assert_eq!(texts(&outcome.messages), vec!["Do you have a cough?"]);
    }

    #[test]
    fn route_on_empty_stack_is_an_invariant_error() {
        let engine = engine();
        let mut state = ConversationState::new(ConversationId::new("conversation-1"));

        let error = engine
            .route(&mut state, "hello", &IntentResult::unclassified())
            .expect_err("empty stack");
        assert_eq!(error, DomainError::EmptyStack);
    }

    #[test]
    fn blank_runtime_prompt_is_rejected() {
        let registry = TaskRegistry::builder()
            .register(SilentTask)
            .root(TaskKind::Help)
            .build()
            .expect("valid registry");
        let engine =
            DialogEngine::new(registry, InterruptPolicyTable::empty(), DialogSettings::default())
                .expect("valid engine");
        let mut state = ConversationState::new(ConversationId::new("conversation-1"));

        let error = engine.welcome(&mut state).expect_err("blank prompt");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn policy_for_unrouted_intent_is_rejected_at_startup() {
        let registry = TaskRegistry::builder()
            .register(CollectTask { kind: TaskKind::Help, slots: &[], summary: "help" })
            .root(TaskKind::Help)
            .build()
            .expect("valid registry");
        let policy = InterruptPolicyTable::empty()
            .with_rule(Intent::BookFlight, InterruptPolicy::InterruptAndPush);

        let error = DialogEngine::new(registry, policy, DialogSettings::default())
            .expect_err("policy without route");
        assert!(matches!(error, RegistryError::PolicyWithoutRoute { intent: Intent::BookFlight, .. }));
    }

    #[test]
    fn silent_cancel_notice_is_omitted() {
        let settings = DialogSettings { cancel_notice: None, ..DialogSettings::default() };
        let engine = DialogEngine::new(registry(), InterruptPolicyTable::default(), settings)
            .expect("valid engine");
        let mut state = started(&engine);

        let outcome =
            engine.route(&mut state, "stop", &IntentResult::unclassified()).expect("cancel");

        assert_eq!(texts(&outcome.messages), vec!["What else can I do for you?"]);
        assert!(state.stack.is_empty());
    }
}
