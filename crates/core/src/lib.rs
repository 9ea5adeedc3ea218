pub mod audit;
pub mod classifier;
pub mod config;
pub mod dialog;
pub mod domain;
pub mod errors;
pub mod harness;
pub mod prompts;
pub mod router;
pub mod store;
pub mod tasks;

pub use classifier::{
    classify, classify_detailed, Classification, ClassifierError, IntentClassifier,
    ScriptedClassifier,
};
pub use dialog::{
    DialogEngine, DialogSettings, DialogStack, FrameId, InterruptPolicy, InterruptPolicyTable,
    StackEvent, TaskFrame, TurnOutcome,
};
pub use domain::conversation::{ConversationId, ConversationState};
pub use domain::intent::{Entities, Intent, IntentResult, Recognition};
pub use domain::message::{MessageKind, OutgoingMessage};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use harness::{TranscriptEntry, TurnHarness};
pub use router::{ConversationLocks, Router, TurnReply};
pub use store::{ConversationStore, InMemoryConversationStore, StoreError};
pub use tasks::{
    RegistryError, SlotSpec, SlotState, StepOutcome, TaskHandler, TaskKind, TaskRegistry,
    TaskResult, TaskValue,
};
