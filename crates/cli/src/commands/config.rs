use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use corebot_core::config::{AppConfig, LoadOptions};
use corebot_core::domain::intent::Intent;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    match load_config("config", options) {
        Ok(config) => CommandResult { exit_code: 0, output: render(&config, options) },
        Err(failure) => failure,
    }
}

struct Sources {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl Sources {
    fn detect(options: &LoadOptions) -> Self {
        let path = detect_config_path(options.config_path.as_deref());
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn line(&self, key: &str, value: &str, env_keys: &[&str]) -> String {
        render_line(key, value, field_source(key, env_keys, self.doc.as_ref(), self.path.as_deref()))
    }
}

pub fn render(config: &AppConfig, options: &LoadOptions) -> String {
    let sources = Sources::detect(options);
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(sources.line(
        "router.confidence_threshold",
        &config.router.confidence_threshold.to_string(),
        &["COREBOT_ROUTER_CONFIDENCE_THRESHOLD"],
    ));
    lines.push(sources.line(
        "router.restart_prompt",
        &config.router.restart_prompt,
        &["COREBOT_ROUTER_RESTART_PROMPT"],
    ));
    lines.push(sources.line(
        "router.cancel_notice",
        config.router.cancel_notice.as_deref().unwrap_or("<silent>"),
        &["COREBOT_ROUTER_CANCEL_NOTICE"],
    ));
    lines.push(sources.line(
        "router.root_task",
        config.router.root_task.as_str(),
        &["COREBOT_ROUTER_ROOT_TASK"],
    ));

    for intent in Intent::ALL.into_iter().filter(|intent| !intent.is_unclassified()) {
        let env_key = format!("COREBOT_POLICY_{}", intent.as_str().to_ascii_uppercase());
        lines.push(sources.line(
            &format!("policy.{intent}"),
            config.policy.policy_for(intent).as_str(),
            &[env_key.as_str()],
        ));
    }

    lines.push(sources.line(
        "classifier.provider",
        config.classifier.provider.as_str(),
        &["COREBOT_CLASSIFIER_PROVIDER"],
    ));
    lines.push(sources.line(
        "classifier.endpoint",
        config.classifier.endpoint.as_deref().unwrap_or("<unset>"),
        &["COREBOT_CLASSIFIER_ENDPOINT"],
    ));
    let api_key = config
        .classifier
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(sources.line("classifier.api_key", &api_key, &["COREBOT_CLASSIFIER_API_KEY"]));
    lines.push(sources.line(
        "classifier.timeout_secs",
        &config.classifier.timeout_secs.to_string(),
        &["COREBOT_CLASSIFIER_TIMEOUT_SECS"],
    ));

    lines.push(sources.line(
        "store.backend",
        config.store.backend.as_str(),
        &["COREBOT_STORE_BACKEND"],
    ));
    lines.push(sources.line("store.url", &config.store.url, &["COREBOT_STORE_URL"]));
    lines.push(sources.line(
        "store.max_connections",
        &config.store.max_connections.to_string(),
        &["COREBOT_STORE_MAX_CONNECTIONS"],
    ));
    lines.push(sources.line(
        "store.timeout_secs",
        &config.store.timeout_secs.to_string(),
        &["COREBOT_STORE_TIMEOUT_SECS"],
    ));

    lines.push(sources.line(
        "logging.level",
        &config.logging.level,
        &["COREBOT_LOGGING_LEVEL", "COREBOT_LOG_LEVEL"],
    ));
    lines.push(sources.line(
        "logging.format",
        config.logging.format.as_str(),
        &["COREBOT_LOGGING_FORMAT", "COREBOT_LOG_FORMAT"],
    ));

    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("corebot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/corebot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_the_key_prefix() {
        assert_eq!(redact_token("nlu-1234secret"), "nlu-***");
        assert_eq!(redact_token("plainsecret"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn dotted_paths_resolve_against_the_toml_document() {
        let doc = "[store]\nurl = \"sqlite://a.db\"\n".parse::<Value>().expect("toml");

        assert!(contains_path(&doc, "store.url"));
        assert!(!contains_path(&doc, "store.backend"));
        assert!(!contains_path(&doc, "router.root_task"));
    }
}
