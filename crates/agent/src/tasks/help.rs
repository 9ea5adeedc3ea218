use corebot_core::tasks::{SlotSpec, SlotState, StepOutcome, TaskHandler, TaskKind, TaskValue};

pub const HELP_TEXT: &str = "I can walk you through a COVID-19 self-assessment or book a flight. \
Say \"book a flight\" at any time, or \"cancel\" to stop what we're doing.";

#[derive(Clone, Copy, Debug, Default)]
pub struct HelpTask;

impl TaskHandler for HelpTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Help
    }

    fn slots(&self) -> &[SlotSpec] {
        &[]
    }

    fn step(&self, _input: Option<&str>, slots: &SlotState) -> StepOutcome {
        StepOutcome::completed(TaskValue::new(TaskKind::Help, HELP_TEXT), slots.clone())
    }
}
