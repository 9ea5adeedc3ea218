use std::error::Error as _;

use tera::{Context, Tera};
use thiserror::Error;

use crate::tasks::SlotState;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("prompt template `{template}` failed to render: {message}")]
pub struct PromptError {
    pub template: String,
    pub message: String,
}

/// A templated prompt or confirmation whose variables are slot names, e.g.
/// `I have you booked to {{ destination }}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    source: &'static str,
}

impl PromptTemplate {
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn render(&self, slots: &SlotState) -> Result<String, PromptError> {
        let mut context = Context::new();
        for (name, value) in slots {
            context.insert(name.as_str(), value);
        }
        self.render_context(&context)
    }

    /// Renders against placeholder values for `declared` so that a template
    /// naming an undeclared slot fails before any traffic is accepted.
    pub fn check(&self, declared: &[&str]) -> Result<(), PromptError> {
        let mut context = Context::new();
        for name in declared {
            context.insert(*name, name);
        }
        self.render_context(&context).map(|_| ())
    }

    fn render_context(&self, context: &Context) -> Result<String, PromptError> {
        Tera::one_off(self.source, context, false).map_err(|error| PromptError {
            template: self.source.to_string(),
            message: error_chain(&error),
        })
    }
}

fn error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::PromptTemplate;
    use crate::tasks::SlotState;

    const BOOKED: PromptTemplate =
        PromptTemplate::new("I have you booked to {{ destination }} from {{ origin }}");

    #[test]
    fn renders_slot_values() {
        let mut slots = SlotState::new();
        slots.insert("destination".to_string(), "Seattle".to_string());
        slots.insert("origin".to_string(), "New York".to_string());

        assert_eq!(
            BOOKED.render(&slots).expect("render"),
            "I have you booked to Seattle from New York"
        );
    }

    #[test]
    fn check_rejects_undeclared_slot_reference() {
        assert!(BOOKED.check(&["destination", "origin"]).is_ok());

        let error = BOOKED.check(&["destination"]).expect_err("origin is not declared");
        assert!(error.template.contains("{{ origin }}"));
    }

    #[test]
    fn render_fails_when_a_slot_is_missing() {
        let mut slots = SlotState::new();
        slots.insert("destination".to_string(), "Seattle".to_string());
        assert!(BOOKED.render(&slots).is_err());
    }
}
