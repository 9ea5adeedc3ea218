use async_trait::async_trait;

use corebot_core::classifier::{ClassifierError, IntentClassifier};
use corebot_core::domain::conversation::ConversationState;
use corebot_core::domain::intent::{Intent, Recognition};
use corebot_core::tasks::{is_cancel_request, TaskKind};

const EMERGENCY_PHRASES: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "trouble breathing",
    "hard to breathe",
    "can't breathe",
    "cant breathe",
    "cannot breathe",
    "hard time waking",
    "won't wake up",
    "lost consciousness",
    "passed out",
    "unconscious",
    "confusion",
    "confused",
    "emergency",
    "911",
];

const SELF_ASSESSMENT_PHRASES: &[&str] = &[
    "symptom",
    "symptoms",
    "self assessment",
    "self-assessment",
    "assessment",
    "covid",
    "fever",
    "cough",
    "coughing",
    "feel sick",
    "feeling sick",
    "not feeling well",
];

const BOOKING_PHRASES: &[&str] =
    &["book", "booking", "flight", "flights", "fly", "plane", "ticket", "tickets", "trip"];

const HELP_PHRASES: &[&str] = &["help", "what can you do", "what do you do", "options"];

const GREETING_WORDS: &[&str] = &["hi", "hello", "hey", "howdy", "greetings", "morning"];

const PLACE_STOP_WORDS: &[&str] = &[
    "from", "to", "on", "today", "tomorrow", "please", "and", "a", "book", "fly", "flight",
    "travel", "go",
];

/// Deterministic phrase-matching classifier. Same text, same recognition.
#[derive(Clone, Debug, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Scores every intent the text mentions and pulls out travel entities.
    /// `active_task` lets bare entity answers ("from Boston") count as the
    /// booking task continuing.
    pub fn recognize_text(&self, text: &str, active_task: Option<TaskKind>) -> Recognition {
        let tokens = tokenize(text);
        let normalized = normalize_tokens(&tokens);
        let mut recognition = Recognition::new();

        if contains_any(&normalized, EMERGENCY_PHRASES) {
            recognition = recognition.with_score(Intent::Emergency, 1.0);
        }
        if is_cancel_request(text) {
            recognition = recognition.with_score(Intent::Cancel, 1.0);
        } else if has_word(&tokens, "cancel") {
            recognition = recognition.with_score(Intent::Cancel, 0.6);
        }
        if contains_any(&normalized, HELP_PHRASES) {
            recognition = recognition.with_score(Intent::Help, 0.9);
        }
        if contains_any(&normalized, SELF_ASSESSMENT_PHRASES) {
            recognition = recognition.with_score(Intent::SelfAssessment, 0.85);
        }

        if let Some(destination) = place_after(&tokens, "to") {
            recognition = recognition.with_entity("destination", destination);
        }
        if let Some(origin) = place_after(&tokens, "from") {
            recognition = recognition.with_entity("origin", origin);
        }
        if let Some(travel_date) = extract_travel_date(&tokens) {
            recognition = recognition.with_entity("travel_date", travel_date);
        }

        let booking_words = contains_any(&normalized, BOOKING_PHRASES);
        let continuing_booking =
            active_task == Some(TaskKind::BookFlight) && !recognition.entities.is_empty();
        if booking_words {
            let explicit = has_word(&tokens, "book") && has_word(&tokens, "flight");
            let score = if explicit { 1.0 } else { 0.9 };
            recognition = recognition.with_score(Intent::BookFlight, score);
        } else if continuing_booking {
            recognition = recognition.with_score(Intent::BookFlight, 0.8);
        }

        let greeting = tokens.iter().any(|token| GREETING_WORDS.contains(&token.lower.as_str()));
        if greeting && tokens.len() <= 3 {
            recognition = recognition.with_score(Intent::Greeting, 0.7);
        }

        recognition
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn recognize(
        &self,
        utterance: &str,
        context: &ConversationState,
    ) -> Result<Recognition, ClassifierError> {
        Ok(self.recognize_text(utterance, context.active_task()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Token {
    raw: String,
    lower: String,
}

/// Lowercased tokens joined by single spaces and padded at both ends, so
/// phrases only match on word boundaries.
fn normalize_tokens(tokens: &[Token]) -> String {
    let words = tokens.iter().map(|token| token.lower.as_str()).collect::<Vec<_>>();
    format!(" {} ", words.join(" "))
}

fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|character: char| {
            character.is_ascii_punctuation() && character != '-'
        }))
        .filter(|word| !word.is_empty())
        .map(|word| Token { raw: word.to_string(), lower: word.to_ascii_lowercase() })
        .collect()
}

fn contains_any(normalized_text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| normalized_text.contains(&format!(" {phrase} ")))
}

fn has_word(tokens: &[Token], word: &str) -> bool {
    tokens.iter().any(|token| token.lower == word)
}

/// Words following `marker` up to the next stop word, e.g. "to New York on
/// Friday" gives "New York".
fn place_after(tokens: &[Token], marker: &str) -> Option<String> {
    let start = tokens.iter().position(|token| token.lower == marker)? + 1;
    let place = tokens[start..]
        .iter()
        .take_while(|token| {
            !PLACE_STOP_WORDS.contains(&token.lower.as_str()) && !is_iso_date(&token.lower)
        })
        .map(|token| token.raw.as_str())
        .collect::<Vec<_>>();

    (!place.is_empty()).then(|| place.join(" "))
}

fn extract_travel_date(tokens: &[Token]) -> Option<String> {
    tokens
        .iter()
        .find(|token| {
            token.lower == "today" || token.lower == "tomorrow" || is_iso_date(&token.lower)
        })
        .map(|token| token.lower.clone())
}

fn is_iso_date(token: &str) -> bool {
    chrono::NaiveDate::parse_from_str(token, "%Y-%m-%d").is_ok()
}
