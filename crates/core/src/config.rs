use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dialog::engine::{DEFAULT_CANCEL_NOTICE, DEFAULT_RESTART_PROMPT};
use crate::dialog::policy::{InterruptPolicy, InterruptPolicyTable};
use crate::domain::intent::Intent;
use crate::tasks::TaskKind;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub router: RouterConfig,
    pub policy: InterruptPolicyTable,
    pub classifier: ClassifierConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub confidence_threshold: f32,
    pub restart_prompt: String,
    pub cancel_notice: Option<String>,
    pub root_task: TaskKind,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierProvider {
    Keyword,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub store_backend: Option<StoreBackend>,
    pub store_url: Option<String>,
    pub log_level: Option<String>,
    pub classifier_provider: Option<ClassifierProvider>,
    pub classifier_endpoint: Option<String>,
    pub confidence_threshold: Option<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig {
                confidence_threshold: 0.5,
                restart_prompt: DEFAULT_RESTART_PROMPT.to_string(),
                cancel_notice: Some(DEFAULT_CANCEL_NOTICE.to_string()),
                root_task: TaskKind::SelfAssessment,
            },
            policy: InterruptPolicyTable::default(),
            classifier: ClassifierConfig {
                provider: ClassifierProvider::Keyword,
                endpoint: None,
                api_key: None,
                timeout_secs: 10,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                url: "sqlite://corebot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

/// An empty notice in config means "cancel silently".
fn notice_value(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

impl ClassifierProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Remote => "remote",
        }
    }
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for ClassifierProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "remote" => Ok(Self::Remote),
            other => Err(ConfigError::Validation(format!(
                "unsupported classifier provider `{other}` (expected keyword|remote)"
            ))),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unsupported store backend `{other}` (expected memory|sqlite)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("corebot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(router) = patch.router {
            if let Some(confidence_threshold) = router.confidence_threshold {
                self.router.confidence_threshold = confidence_threshold;
            }
            if let Some(restart_prompt) = router.restart_prompt {
                self.router.restart_prompt = restart_prompt;
            }
            if let Some(cancel_notice) = router.cancel_notice {
                self.router.cancel_notice = notice_value(cancel_notice);
            }
            if let Some(root_task) = router.root_task {
                self.router.root_task = root_task;
            }
        }

        if let Some(policy) = patch.policy {
            for (intent, rule) in policy {
                let intent = parse_intent(&format!("policy.{intent}"), &intent)?;
                let rule = parse_policy(&format!("policy.{intent}"), &rule)?;
                self.policy.set(intent, rule);
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(provider) = classifier.provider {
                self.classifier.provider = provider;
            }
            if let Some(endpoint) = classifier.endpoint {
                self.classifier.endpoint = Some(endpoint);
            }
            if let Some(classifier_api_key_value) = classifier.api_key {
                self.classifier.api_key = Some(secret_value(classifier_api_key_value));
            }
            if let Some(timeout_secs) = classifier.timeout_secs {
                self.classifier.timeout_secs = timeout_secs;
            }
        }

        if let Some(store) = patch.store {
            if let Some(backend) = store.backend {
                self.store.backend = backend;
            }
            if let Some(url) = store.url {
                self.store.url = url;
            }
            if let Some(max_connections) = store.max_connections {
                self.store.max_connections = max_connections;
            }
            if let Some(timeout_secs) = store.timeout_secs {
                self.store.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COREBOT_ROUTER_CONFIDENCE_THRESHOLD") {
            self.router.confidence_threshold =
                parse_f32("COREBOT_ROUTER_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("COREBOT_ROUTER_RESTART_PROMPT") {
            self.router.restart_prompt = value;
        }
        if let Ok(value) = env::var("COREBOT_ROUTER_CANCEL_NOTICE") {
            self.router.cancel_notice = notice_value(value);
        }
        if let Some(value) = read_env("COREBOT_ROUTER_ROOT_TASK") {
            self.router.root_task =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "COREBOT_ROUTER_ROOT_TASK".to_string(),
                    value: value.clone(),
                })?;
        }

        for intent in Intent::ALL {
            let key = format!("COREBOT_POLICY_{}", intent.as_str().to_ascii_uppercase());
            if let Some(value) = read_env(&key) {
                self.policy.set(intent, parse_policy(&key, &value)?);
            }
        }

        if let Some(value) = read_env("COREBOT_CLASSIFIER_PROVIDER") {
            self.classifier.provider = value.parse()?;
        }
        if let Some(value) = read_env("COREBOT_CLASSIFIER_ENDPOINT") {
            self.classifier.endpoint = Some(value);
        }
        if let Some(value) = read_env("COREBOT_CLASSIFIER_API_KEY") {
            self.classifier.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("COREBOT_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_u64("COREBOT_CLASSIFIER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COREBOT_STORE_BACKEND") {
            self.store.backend = value.parse()?;
        }
        if let Some(value) = read_env("COREBOT_STORE_URL") {
            self.store.url = value;
        }
        if let Some(value) = read_env("COREBOT_STORE_MAX_CONNECTIONS") {
            self.store.max_connections = parse_u32("COREBOT_STORE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COREBOT_STORE_TIMEOUT_SECS") {
            self.store.timeout_secs = parse_u64("COREBOT_STORE_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("COREBOT_LOGGING_LEVEL").or_else(|| read_env("COREBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COREBOT_LOGGING_FORMAT").or_else(|| read_env("COREBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(backend) = overrides.store_backend {
            self.store.backend = backend;
        }
        if let Some(url) = overrides.store_url {
            self.store.url = url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.classifier_provider {
            self.classifier.provider = provider;
        }
        if let Some(endpoint) = overrides.classifier_endpoint {
            self.classifier.endpoint = Some(endpoint);
        }
        if let Some(confidence_threshold) = overrides.confidence_threshold {
            self.router.confidence_threshold = confidence_threshold;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_router(&self.router)?;
        validate_policy(&self.policy)?;
        validate_classifier(&self.classifier)?;
        validate_store(&self.store)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("corebot.toml"), PathBuf::from("config/corebot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_router(router: &RouterConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&router.confidence_threshold) {
        return Err(ConfigError::Validation(
            "router.confidence_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }

    if router.restart_prompt.trim().is_empty() {
        return Err(ConfigError::Validation(
            "router.restart_prompt must not be empty; the bot would go silent when a conversation restarts"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_policy(policy: &InterruptPolicyTable) -> Result<(), ConfigError> {
    if let Some((intent, _)) = policy.rules().find(|(intent, _)| intent.is_unclassified()) {
        return Err(ConfigError::Validation(format!(
            "policy.{intent} must be `ignore`; unclassified utterances always go to the active task"
        )));
    }

    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if classifier.timeout_secs == 0 || classifier.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "classifier.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if classifier.provider == ClassifierProvider::Remote {
        let endpoint = classifier.endpoint.as_deref().map(str::trim).unwrap_or_default();
        if endpoint.is_empty() {
            return Err(ConfigError::Validation(
                "classifier.endpoint is required for the remote provider".to_string(),
            ));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(
                "classifier.endpoint must start with http:// or https://".to_string(),
            ));
        }
        let blank_key = classifier
            .api_key
            .as_ref()
            .is_some_and(|value| value.expose_secret().trim().is_empty());
        if blank_key {
            return Err(ConfigError::Validation(
                "classifier.api_key is set but empty; remove it or provide a key".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.backend == StoreBackend::Sqlite {
        let url = store.url.trim();
        let sqlite_url =
            url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
        if !sqlite_url {
            return Err(ConfigError::Validation(
                "store.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                    .to_string(),
            ));
        }
    }

    if store.max_connections == 0 {
        return Err(ConfigError::Validation(
            "store.max_connections must be greater than zero".to_string(),
        ));
    }

    if store.timeout_secs == 0 || store.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "store.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_intent(key: &str, value: &str) -> Result<Intent, ConfigError> {
    value.parse::<Intent>().map_err(|error| {
        ConfigError::Validation(format!("`{key}` names an unknown intent: {error}"))
    })
}

fn parse_policy(key: &str, value: &str) -> Result<InterruptPolicy, ConfigError> {
    value.parse::<InterruptPolicy>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    router: Option<RouterPatch>,
    policy: Option<BTreeMap<String, String>>,
    classifier: Option<ClassifierPatch>,
    store: Option<StorePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RouterPatch {
    confidence_threshold: Option<f32>,
    restart_prompt: Option<String>,
    cancel_notice: Option<String>,
    root_task: Option<TaskKind>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    provider: Option<ClassifierProvider>,
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    backend: Option<StoreBackend>,
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ClassifierProvider, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
        StoreBackend,
    };
    use crate::dialog::policy::InterruptPolicy;
    use crate::domain::intent::Intent;
    use crate::tasks::TaskKind;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn write_config(dir: &TempDir, contents: &str) -> Result<std::path::PathBuf, String> {
        let path = dir.path().join("corebot.toml");
        fs::write(&path, contents).map_err(|err| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn defaults_are_valid_and_use_keyword_classifier() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.classifier.provider == ClassifierProvider::Keyword, "keyword by default")?;
        ensure(config.store.backend == StoreBackend::Memory, "memory store by default")?;
        ensure(config.router.root_task == TaskKind::SelfAssessment, "triage is the root task")?;
        ensure(
            config.router.restart_prompt == "What else can I do for you?",
            "default restart prompt",
        )?;
        ensure(
            config.policy.policy_for(Intent::Emergency) == InterruptPolicy::InterruptAndReplace,
            "emergency replaces by default",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_COREBOT_CLASSIFIER_KEY", "key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[classifier]
provider = "remote"
endpoint = "https://nlu.example.test/recognize"
api_key = "${TEST_COREBOT_CLASSIFIER_KEY}"
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.classifier.api_key.as_ref().map(|key| key.expose_secret())
                    == Some("key-from-env"),
                "api key should be interpolated from environment",
            )?;
            ensure(config.classifier.provider == ClassifierProvider::Remote, "remote provider")
        })();

        clear_vars(&["TEST_COREBOT_CLASSIFIER_KEY"]);
        result
    }

    #[test]
    fn policy_table_merges_file_and_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREBOT_POLICY_BOOK_FLIGHT", "ignore");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[policy]
help = "replace"
greeting = "interrupt_and_push"
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.policy.policy_for(Intent::Help) == InterruptPolicy::InterruptAndReplace,
                "file should override the help policy",
            )?;
            ensure(
                config.policy.policy_for(Intent::Greeting) == InterruptPolicy::InterruptAndPush,
                "file should add a greeting rule",
            )?;
            ensure(
                config.policy.policy_for(Intent::BookFlight) == InterruptPolicy::Ignore,
                "env should switch booking to ignore",
            )?;
            ensure(
                config.policy.policy_for(Intent::Emergency) == InterruptPolicy::InterruptAndReplace,
                "untouched defaults survive",
            )
        })();

        clear_vars(&["COREBOT_POLICY_BOOK_FLIGHT"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREBOT_LOG_LEVEL", "warn");
        env::set_var("COREBOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["COREBOT_LOG_LEVEL", "COREBOT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREBOT_STORE_URL", "sqlite://from-env.db");
        env::set_var("COREBOT_ROUTER_CONFIDENCE_THRESHOLD", "0.7");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[router]
confidence_threshold = 0.6
restart_prompt = "Anything else?"

[store]
backend = "sqlite"
url = "sqlite://from-file.db"

[logging]
level = "warn"
"#,
            )?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    store_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.store.url == "sqlite://from-override.db", "override store url should win")?;
            ensure(config.store.backend == StoreBackend::Sqlite, "file backend should apply")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                (config.router.confidence_threshold - 0.7).abs() < f32::EPSILON,
                "env threshold should win over file",
            )?;
            ensure(config.router.restart_prompt == "Anything else?", "file restart prompt")
        })();

        clear_vars(&["COREBOT_STORE_URL", "COREBOT_ROUTER_CONFIDENCE_THRESHOLD"]);
        result
    }

    #[test]
    fn empty_cancel_notice_disables_it() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, "[router]\ncancel_notice = \"\"\n")?;
        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.router.cancel_notice.is_none(), "empty notice should disable it")
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREBOT_CLASSIFIER_PROVIDER", "remote");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("classifier.endpoint")
            );
            ensure(has_message, "validation failure should mention classifier.endpoint")
        })();

        clear_vars(&["COREBOT_CLASSIFIER_PROVIDER"]);
        result
    }

    #[test]
    fn out_of_range_threshold_and_unclassified_policy_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let threshold = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                confidence_threshold: Some(1.5),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(
            matches!(threshold, Err(ConfigError::Validation(ref message)) if message.contains("confidence_threshold")),
            "threshold above one should be rejected",
        )?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, "[policy]\nnone = \"push\"\n")?;
        let policy =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(policy, Err(ConfigError::Validation(ref message)) if message.contains("policy.none")),
            "unclassified intent cannot interrupt",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREBOT_CLASSIFIER_API_KEY", "nlu-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("nlu-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(&["COREBOT_CLASSIFIER_API_KEY"]);
        result
    }
}
