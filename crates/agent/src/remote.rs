use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use corebot_core::classifier::{ClassifierError, IntentClassifier};
use corebot_core::domain::conversation::ConversationState;
use corebot_core::domain::intent::{Intent, Recognition};

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    utterance: &'a str,
    conversation_id: &'a str,
    active_task: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    intents: BTreeMap<String, f32>,
    #[serde(default)]
    entities: BTreeMap<String, String>,
}

/// Calls an external recognizer over HTTP. The endpoint receives
/// `{utterance, conversation_id, active_task}` and answers
/// `{"intents": {label: score}, "entities": {name: value}}`.
#[derive(Clone, Debug)]
pub struct HttpIntentClassifier {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl HttpIntentClassifier {
    pub fn new(endpoint: Option<String>, api_key: Option<SecretString>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.filter(|value| !value.trim().is_empty()),
            api_key,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

#[async_trait]
impl IntentClassifier for HttpIntentClassifier {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn recognize(
        &self,
        utterance: &str,
        context: &ConversationState,
    ) -> Result<Recognition, ClassifierError> {
        let endpoint = self.endpoint.as_deref().ok_or(ClassifierError::NotConfigured)?;
        let body = RecognizeRequest {
            utterance,
            conversation_id: context.conversation_id.as_str(),
            active_task: context.active_task().map(|task| task.as_str()),
        };

        let mut request = self.client.post(endpoint).timeout(self.timeout).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                ClassifierError::Unavailable(format!("request timed out after {:?}", self.timeout))
            } else {
                ClassifierError::Unavailable(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Unavailable(format!("recognizer returned HTTP {status}")));
        }

        let payload = response
            .json::<RecognizeResponse>()
            .await
            .map_err(|error| ClassifierError::MalformedResponse(error.to_string()))?;

        Ok(into_recognition(payload))
    }
}

fn into_recognition(payload: RecognizeResponse) -> Recognition {
    let mut recognition = Recognition::new();
    for (label, score) in payload.intents {
        match label.parse::<Intent>() {
            Ok(intent) => recognition = recognition.with_score(intent, score),
            Err(error) => debug!(label = %label, error = %error, "ignoring unknown intent label"),
        }
    }
    for (name, value) in payload.entities {
        recognition = recognition.with_entity(name, value);
    }
    recognition
}
