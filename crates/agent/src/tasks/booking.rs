use chrono::{Days, NaiveDate, Utc};
use tracing::warn;

use corebot_core::prompts::PromptTemplate;
use corebot_core::tasks::collector::parse_text;
use corebot_core::tasks::{
    Collected, SlotCollector, SlotSpec, SlotState, StepOutcome, TaskHandler, TaskKind, TaskValue,
};

const SLOTS: &[SlotSpec] = &[
    SlotSpec::new("destination", "Where would you like to travel to?", parse_text),
    SlotSpec::new("origin", "Where are you traveling from?", parse_text),
    SlotSpec::new("travel_date", "When would you like to travel?", parse_travel_date)
        .with_reprompt("I didn't catch that date. Please answer today, tomorrow, or YYYY-MM-DD."),
];

const CONFIRMATION: PromptTemplate = PromptTemplate::new(
    "I have you booked to {{ destination }} from {{ origin }} on {{ travel_date }}",
);

/// Collects destination, origin and date, then confirms the booking.
#[derive(Clone, Copy, Debug, Default)]
pub struct BookFlightTask;

impl TaskHandler for BookFlightTask {
    fn kind(&self) -> TaskKind {
        TaskKind::BookFlight
    }

    fn slots(&self) -> &[SlotSpec] {
        SLOTS
    }

    fn templates(&self) -> Vec<&PromptTemplate> {
        vec![&CONFIRMATION]
    }

    fn step(&self, input: Option<&str>, slots: &SlotState) -> StepOutcome {
        match SlotCollector::new(SLOTS).collect(input, slots) {
            Collected::Ask { prompt, slots, .. } => StepOutcome::needs_input(prompt, slots),
            Collected::Cancelled(slots) => StepOutcome::cancelled(slots),
            Collected::Complete(slots) => {
                let summary = CONFIRMATION.render(&slots).unwrap_or_else(|error| {
                    warn!(error = %error, "booking confirmation failed to render");
                    "Your flight is booked.".to_string()
                });
                let value = TaskValue::new(TaskKind::BookFlight, summary).with_fields(slots.clone());
                StepOutcome::completed(value, slots)
            }
        }
    }
}

/// Accepts `YYYY-MM-DD`, `today` or `tomorrow`; relative dates resolve
/// against the current UTC date.
pub fn parse_travel_date(raw: &str) -> Option<String> {
    let normalized = raw
        .trim()
        .trim_end_matches(|character: char| character.is_ascii_punctuation())
        .to_ascii_lowercase();
    let today = Utc::now().date_naive();
    let date = match normalized.as_str() {
        "today" => today,
        "tomorrow" => today.checked_add_days(Days::new(1))?,
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok()?,
    };
    Some(date.format("%Y-%m-%d").to_string())
}
