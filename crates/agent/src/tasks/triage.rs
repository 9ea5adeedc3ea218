use tracing::warn;

use corebot_core::prompts::PromptTemplate;
use corebot_core::tasks::collector::parse_yes_no;
use corebot_core::tasks::{
    Collected, SlotCollector, SlotSpec, SlotState, StepOutcome, TaskHandler, TaskKind, TaskValue,
};

pub const TRIAGE_QUESTION: &str = "Are you experiencing any of the following: severe difficulty breathing, chest pain, very hard time waking up, confusion, lost consciousness?";
pub const EMERGENCY_ADVICE: &str =
    "Please call 911 or go directly to your nearest emergency department.";

const YES_OR_NO: &str = "Please answer yes or no.";

const SLOTS: &[SlotSpec] = &[
    SlotSpec::new("emergency_symptoms", TRIAGE_QUESTION, parse_yes_no)
        .with_reprompt("Please answer yes or no. Are you experiencing any of the following: severe difficulty breathing, chest pain, very hard time waking up, confusion, lost consciousness?"),
    SlotSpec::new(
        "covid_symptoms",
        "Do you have any of these symptoms: fever, cough, shortness of breath, or a new loss of taste or smell?",
        parse_yes_no,
    )
    .with_reprompt(YES_OR_NO),
    SlotSpec::new(
        "recent_exposure",
        "In the last 14 days, have you been in close contact with someone who tested positive for COVID-19?",
        parse_yes_no,
    )
    .with_reprompt(YES_OR_NO),
];

const ADVICE: PromptTemplate = PromptTemplate::new(
    "{% if covid_symptoms == \"yes\" or recent_exposure == \"yes\" %}Based on your answers, please stay home, get tested for COVID-19, and contact your healthcare provider if your symptoms get worse.{% else %}Based on your answers, you don't need to be tested right now. Keep monitoring how you feel and check again if anything changes.{% endif %}",
);

const ADVICE_FALLBACK: &str =
    "Thanks for completing the self-assessment. Contact your healthcare provider if you have concerns.";

/// Root task: a short symptom questionnaire. A "yes" to the first question
/// ends it immediately with emergency advice.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfAssessmentTask;

impl TaskHandler for SelfAssessmentTask {
    fn kind(&self) -> TaskKind {
        TaskKind::SelfAssessment
    }

    fn slots(&self) -> &[SlotSpec] {
        SLOTS
    }

    fn templates(&self) -> Vec<&PromptTemplate> {
        vec![&ADVICE]
    }

    fn step(&self, input: Option<&str>, slots: &SlotState) -> StepOutcome {
        let collected = SlotCollector::new(SLOTS).collect(input, slots);
        let current = match &collected {
            Collected::Cancelled(slots) => return StepOutcome::cancelled(slots.clone()),
            Collected::Ask { slots, .. } | Collected::Complete(slots) => slots,
        };

        if current.get("emergency_symptoms").map(String::as_str) == Some("yes") {
            let value = TaskValue::new(TaskKind::SelfAssessment, EMERGENCY_ADVICE)
                .with_fields(outcome_fields(current, "emergency"));
            return StepOutcome::completed(value, current.clone());
        }

        match collected {
            Collected::Ask { prompt, slots, .. } => StepOutcome::needs_input(prompt, slots),
            Collected::Complete(slots) => {
                let summary = ADVICE.render(&slots).unwrap_or_else(|error| {
                    warn!(error = %error, "self-assessment advice failed to render");
                    ADVICE_FALLBACK.to_string()
                });
                let value = TaskValue::new(TaskKind::SelfAssessment, summary)
                    .with_fields(outcome_fields(&slots, "self_care"));
                StepOutcome::completed(value, slots)
            }
            Collected::Cancelled(slots) => StepOutcome::cancelled(slots),
        }
    }
}

fn outcome_fields(slots: &SlotState, recommendation: &str) -> SlotState {
    let mut fields = slots.clone();
    fields.insert("recommendation".to_string(), recommendation.to_string());
    fields
}

/// Takes over when an emergency is reported mid-conversation. Nothing to ask.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmergencyCareTask;

impl TaskHandler for EmergencyCareTask {
    fn kind(&self) -> TaskKind {
        TaskKind::EmergencyCare
    }

    fn slots(&self) -> &[SlotSpec] {
        &[]
    }

    fn step(&self, _input: Option<&str>, slots: &SlotState) -> StepOutcome {
        StepOutcome::completed(
            TaskValue::new(TaskKind::EmergencyCare, EMERGENCY_ADVICE),
            slots.clone(),
        )
    }
}
