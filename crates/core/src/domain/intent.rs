use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named values pulled out of an utterance by a classifier, keyed by field name.
pub type Entities = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SelfAssessment,
    Emergency,
    BookFlight,
    Help,
    Cancel,
    Greeting,
    /// Sentinel for "could not classify"; never interrupts the active task.
    None,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::SelfAssessment,
        Intent::Emergency,
        Intent::BookFlight,
        Intent::Help,
        Intent::Cancel,
        Intent::Greeting,
        Intent::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfAssessment => "self_assessment",
            Self::Emergency => "emergency",
            Self::BookFlight => "book_flight",
            Self::Help => "help",
            Self::Cancel => "cancel",
            Self::Greeting => "greeting",
            Self::None => "none",
        }
    }

    /// Fixed tie-break rank; lower wins. Interrupt-class intents rank ahead of
    /// task-continuation intents.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Emergency => 0,
            Self::Cancel => 1,
            Self::Help => 2,
            Self::SelfAssessment => 3,
            Self::BookFlight => 4,
            Self::Greeting => 5,
            Self::None => 6,
        }
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown intent label `{0}`")]
pub struct UnknownIntent(pub String);

impl FromStr for Intent {
    type Err = UnknownIntent;

    /// Accepts snake_case labels as well as PascalCase recognizer labels
    /// (`BookFlight`, `None`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let folded: String = value
            .trim()
            .chars()
            .filter(|character| !matches!(character, '_' | '-' | ' '))
            .map(|character| character.to_ascii_lowercase())
            .collect();

        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str().replace('_', "") == folded)
            .ok_or_else(|| UnknownIntent(value.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub intent: Intent,
    pub score: f32,
}

/// Raw classifier output: every scored intent plus extracted entities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub scores: Vec<IntentScore>,
    pub entities: Entities,
}

impl Recognition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score(mut self, intent: Intent, score: f32) -> Self {
        self.scores.push(IntentScore { intent, score });
        self
    }

    pub fn with_entity(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entities.insert(name.into(), value.into());
        self
    }

    /// Resolves the single winning intent. Only scores at or above `threshold`
    /// compete; the highest score wins and equal scores fall back to
    /// [`Intent::priority`]. With no contender the result is unclassified.
    pub fn top_intent(&self, threshold: f32) -> IntentResult {
        let winner = self
            .scores
            .iter()
            .map(|candidate| (candidate.intent, candidate.score.clamp(0.0, 1.0)))
            .filter(|(_, score)| *score >= threshold)
            .min_by(|(left_intent, left_score), (right_intent, right_score)| {
                right_score
                    .total_cmp(left_score)
                    .then_with(|| left_intent.priority().cmp(&right_intent.priority()))
            });

        match winner {
            Some((intent, confidence)) => {
                IntentResult { intent, confidence, entities: self.entities.clone() }
            }
            None => IntentResult { entities: self.entities.clone(), ..IntentResult::unclassified() },
        }
    }
}

/// The resolved intent for one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Entities,
}

impl IntentResult {
    pub fn unclassified() -> Self {
        Self { intent: Intent::None, confidence: 0.0, entities: Entities::new() }
    }

    pub fn is_unclassified(&self) -> bool {
        self.intent.is_unclassified()
    }
}
