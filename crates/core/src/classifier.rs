//! Intent classifier boundary.
//!
//! Implementations only produce a [`Recognition`]; resolving the single top
//! intent and degrading failures to the unclassified intent happens here so
//! every classifier behaves the same way towards the router.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::domain::conversation::ConversationState;
use crate::domain::intent::{IntentResult, Recognition};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier is not configured")]
    NotConfigured,
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("classifier returned a malformed response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool {
        true
    }

    async fn recognize(
        &self,
        utterance: &str,
        context: &ConversationState,
    ) -> Result<Recognition, ClassifierError>;
}

/// Resolved intent plus the failure it was degraded from, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub intent: IntentResult,
    pub degraded: Option<ClassifierError>,
}

pub async fn classify_detailed(
    classifier: &dyn IntentClassifier,
    utterance: &str,
    context: &ConversationState,
    threshold: f32,
) -> Classification {
    let outcome = if classifier.is_configured() {
        classifier.recognize(utterance, context).await
    } else {
        Err(ClassifierError::NotConfigured)
    };

    match outcome {
        Ok(recognition) => {
            Classification { intent: recognition.top_intent(threshold), degraded: None }
        }
        Err(error) => {
            warn!(
                event_name = "classifier.degraded",
                classifier = classifier.name(),
                conversation_id = %context.conversation_id,
                error = %error,
                "classification failed; treating utterance as unclassified"
            );
            Classification { intent: IntentResult::unclassified(), degraded: Some(error) }
        }
    }
}

/// Never fails: any classifier problem yields the unclassified intent.
pub async fn classify(
    classifier: &dyn IntentClassifier,
    utterance: &str,
    context: &ConversationState,
    threshold: f32,
) -> IntentResult {
    classify_detailed(classifier, utterance, context, threshold).await.intent
}

/// Test double answering from a fixed utterance table. Unknown utterances get
/// an empty recognition.
#[derive(Clone, Debug, Default)]
pub struct ScriptedClassifier {
    answers: HashMap<String, Recognition>,
    failure: Option<ClassifierError>,
    unconfigured: bool,
    calls: Arc<AtomicUsize>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, utterance: impl Into<String>, recognition: Recognition) -> Self {
        self.answers.insert(utterance.into(), recognition);
        self
    }

    pub fn failing(error: ClassifierError) -> Self {
        Self { failure: Some(error), ..Self::default() }
    }

    pub fn unconfigured() -> Self {
        Self { unconfigured: true, ..Self::default() }
    }

    /// Number of `recognize` calls made so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        !self.unconfigured
    }

    async fn recognize(
        &self,
        utterance: &str,
        _context: &ConversationState,
    ) -> Result<Recognition, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.answers.get(utterance).cloned().unwrap_or_default())
    }
}
