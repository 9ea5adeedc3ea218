use super::{is_cancel_request, SlotState};

/// Normalises raw input for one slot; `None` rejects it.
pub type SlotParser = fn(&str) -> Option<String>;

#[derive(Clone, Copy, Debug)]
pub struct SlotSpec {
    pub name: &'static str,
    pub prompt: &'static str,
    /// Asked instead of `prompt` after the parser rejected an answer.
    pub reprompt: Option<&'static str>,
    pub parser: SlotParser,
}

impl SlotSpec {
    pub const fn new(name: &'static str, prompt: &'static str, parser: SlotParser) -> Self {
        Self { name, prompt, reprompt: None, parser }
    }

    pub const fn with_reprompt(self, reprompt: &'static str) -> Self {
        Self { reprompt: Some(reprompt), ..self }
    }

    pub fn parse(&self, raw: &str) -> Option<String> {
        (self.parser)(raw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Collected {
    Ask { slot: &'static str, prompt: String, slots: SlotState },
    Complete(SlotState),
    Cancelled(SlotState),
}

/// Walks declared slots in order and fills the first missing one from input.
#[derive(Clone, Copy, Debug)]
pub struct SlotCollector<'a> {
    slots: &'a [SlotSpec],
}

impl<'a> SlotCollector<'a> {
    pub fn new(slots: &'a [SlotSpec]) -> Self {
        Self { slots }
    }

    pub fn first_missing(&self, state: &SlotState) -> Option<&'a SlotSpec> {
        self.slots.iter().find(|slot| !state.contains_key(slot.name))
    }

    pub fn collect(&self, input: Option<&str>, state: &SlotState) -> Collected {
        let input = input.map(str::trim).filter(|text| !text.is_empty());
        if input.is_some_and(is_cancel_request) {
            return Collected::Cancelled(state.clone());
        }

        let mut next = state.clone();
        let Some(asked) = self.first_missing(&next) else {
            return Collected::Complete(next);
        };
        let Some(text) = input else {
            return ask(asked, asked.prompt, next);
        };

        match asked.parse(text) {
            Some(value) => {
                next.insert(asked.name.to_string(), value);
            }
            None => return ask(asked, asked.reprompt.unwrap_or(asked.prompt), next),
        }

        match self.first_missing(&next) {
            Some(slot) => ask(slot, slot.prompt, next),
            None => Collected::Complete(next),
        }
    }
}

fn ask(slot: &SlotSpec, prompt: &str, slots: SlotState) -> Collected {
    Collected::Ask { slot: slot.name, prompt: prompt.to_string(), slots }
}

/// Accepts any non-empty answer verbatim.
pub fn parse_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Maps common affirmative/negative answers to `yes` / `no`.
pub fn parse_yes_no(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_ascii_lowercase();
    let first_word = normalized
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_matches(|character: char| character.is_ascii_punctuation());
    match first_word {
        "yes" | "y" | "yeah" | "yep" | "sure" | "correct" | "affirmative" => Some("yes".to_string()),
        "no" | "n" | "nope" | "nah" | "negative" | "none" => Some("no".to_string()),
        _ => None,
    }
}
