use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use corebot_core::classifier::IntentClassifier;
use corebot_core::config::{AppConfig, ClassifierProvider, StoreBackend};
use corebot_core::dialog::{DialogEngine, DialogSettings};
use corebot_core::domain::conversation::ConversationId;
use corebot_core::errors::{ApplicationError, InterfaceError};
use corebot_core::router::{Router, TurnReply};
use corebot_core::store::{ConversationStore, InMemoryConversationStore};
use corebot_core::tasks::RegistryError;
use corebot_db::{connect_from_config, migrations, SqlConversationStore};

use crate::conversation::KeywordIntentClassifier;
use crate::remote::HttpIntentClassifier;
use crate::tasks::default_registry;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("task wiring is invalid: {0}")]
    Registry(#[from] RegistryError),
    #[error("could not open conversation store `{url}`: {message}")]
    Store { url: String, message: String },
    #[error("could not migrate conversation store: {0}")]
    Migration(String),
}

impl From<RuntimeError> for ApplicationError {
    fn from(error: RuntimeError) -> Self {
        match error {
            RuntimeError::Registry(error) => ApplicationError::Registry(error),
            RuntimeError::Store { .. } | RuntimeError::Migration(_) => {
                ApplicationError::Persistence(error.to_string())
            }
        }
    }
}

pub fn build_engine(config: &AppConfig) -> Result<DialogEngine, RegistryError> {
    let registry = default_registry(config.router.root_task)?;
    DialogEngine::new(registry, config.policy.clone(), DialogSettings::from(&config.router))
}

pub fn build_classifier(config: &AppConfig) -> Arc<dyn IntentClassifier> {
    match config.classifier.provider {
        ClassifierProvider::Keyword => Arc::new(KeywordIntentClassifier::new()),
        ClassifierProvider::Remote => Arc::new(HttpIntentClassifier::new(
            config.classifier.endpoint.clone(),
            config.classifier.api_key.clone(),
            config.classifier.timeout_secs,
        )),
    }
}

/// Opens the configured store; the SQLite backend is migrated before use.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn ConversationStore>, RuntimeError> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryConversationStore::default())),
        StoreBackend::Sqlite => {
            let pool = connect_from_config(&config.store).await.map_err(|error| {
                RuntimeError::Store { url: config.store.url.clone(), message: error.to_string() }
            })?;
            migrations::run_pending(&pool)
                .await
                .map_err(|error| RuntimeError::Migration(error.to_string()))?;
            Ok(Arc::new(SqlConversationStore::new(pool)))
        }
    }
}

/// Owns the wired router for one process.
pub struct AgentRuntime {
    router: Router,
}

impl AgentRuntime {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        let engine = build_engine(config)?;
        let classifier = build_classifier(config);
        if !classifier.is_configured() {
            warn!(
                event_name = "runtime.classifier_unconfigured",
                classifier = classifier.name(),
                "classifier is not configured; every utterance will be unclassified"
            );
        }
        let store = open_store(config).await?;

        info!(
            event_name = "runtime.ready",
            classifier = classifier.name(),
            store = store.backend(),
            root_task = %config.router.root_task,
            "corebot runtime ready"
        );
        Ok(Self::new(Router::new(engine, classifier, store)))
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Runs one turn and maps failures to the user-facing error taxonomy.
    pub async fn handle_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<TurnReply, InterfaceError> {
        self.router
            .handle_turn(conversation_id, text)
            .await
            .map_err(|error| error.into_interface(conversation_id.as_str()))
    }
}
