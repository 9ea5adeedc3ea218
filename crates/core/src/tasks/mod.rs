//! Task handler contract.
//!
//! A task is a small multi-step collection flow. Handlers are stateless: all
//! progress lives in the [`SlotState`] carried by the owning dialog frame, so a
//! step is a pure function of `(input, slots)`.

pub mod collector;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::prompts::PromptTemplate;

pub use collector::{Collected, SlotCollector, SlotParser, SlotSpec};
pub use registry::{RegistryError, TaskRegistry, TaskRegistryBuilder};

/// Partially collected fields of one task, keyed by declared slot name.
pub type SlotState = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    SelfAssessment,
    EmergencyCare,
    BookFlight,
    Help,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] =
        [TaskKind::SelfAssessment, TaskKind::EmergencyCare, TaskKind::BookFlight, TaskKind::Help];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfAssessment => "self_assessment",
            Self::EmergencyCare => "emergency_care",
            Self::BookFlight => "book_flight",
            Self::Help => "help",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized).ok_or_else(|| {
            format!(
                "unsupported task `{value}` (expected self_assessment|emergency_care|book_flight|help)"
            )
        })
    }
}

/// Result record of a completed task. `summary` is the confirmation shown to
/// the user; `fields` is the opaque record handed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskValue {
    pub task: TaskKind,
    pub summary: String,
    pub fields: BTreeMap<String, String>,
}

impl TaskValue {
    pub fn new(task: TaskKind, summary: impl Into<String>) -> Self {
        Self { task, summary: summary.into(), fields: BTreeMap::new() }
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = fields;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskResult {
    NeedsInput(String),
    Completed(TaskValue),
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub result: TaskResult,
    pub slots: SlotState,
}

impl StepOutcome {
    pub fn needs_input(prompt: impl Into<String>, slots: SlotState) -> Self {
        Self { result: TaskResult::NeedsInput(prompt.into()), slots }
    }

    pub fn completed(value: TaskValue, slots: SlotState) -> Self {
        Self { result: TaskResult::Completed(value), slots }
    }

    pub fn cancelled(slots: SlotState) -> Self {
        Self { result: TaskResult::Cancelled, slots }
    }
}

pub trait TaskHandler: Send + Sync {
    fn kind(&self) -> TaskKind;

    /// Declared slots, in the fixed order they are asked for.
    fn slots(&self) -> &[SlotSpec];

    /// Templates rendered from this task's slots. Checked against the declared
    /// slots when the task is registered.
    fn templates(&self) -> Vec<&PromptTemplate> {
        Vec::new()
    }

    /// Runs one step. `None` input means "resume": re-ask whatever is still
    /// missing without consuming anything.
    fn step(&self, input: Option<&str>, slots: &SlotState) -> StepOutcome;
}

const CANCEL_PHRASES: &[&str] =
    &["cancel", "quit", "stop", "exit", "never mind", "nevermind", "forget it"];

pub fn is_cancel_request(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(|character: char| character.is_ascii_punctuation())
        .to_ascii_lowercase();
    CANCEL_PHRASES.contains(&normalized.as_str())
}
