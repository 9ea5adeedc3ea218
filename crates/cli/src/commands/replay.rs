use std::fs;
use std::path::Path;

use corebot_agent::AgentRuntime;
use corebot_core::config::LoadOptions;
use corebot_core::domain::conversation::ConversationId;
use corebot_core::harness::{self, TranscriptEntry};
use serde::Serialize;

use crate::commands::{current_thread_runtime, load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ReplayReport {
    command: &'static str,
    status: &'static str,
    conversation_id: String,
    turns: usize,
    transcript: Vec<TranscriptEntry>,
}

/// Non-empty lines of a script, with `#` comment lines dropped.
pub fn parse_script(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn run(options: &LoadOptions, script: &Path, conversation: &str) -> CommandResult {
    let config = match load_config("replay", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let utterances = match fs::read_to_string(script) {
        Ok(raw) => parse_script(&raw),
        Err(error) => {
            return CommandResult::failure(
                "replay",
                "script_read",
                format!("could not read script `{}`: {error}", script.display()),
                2,
            );
        }
    };
    if utterances.is_empty() {
        return CommandResult::failure(
            "replay",
            "script_empty",
            format!("script `{}` has no utterances", script.display()),
            2,
        );
    }

    let runtime = match current_thread_runtime("replay") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let conversation_id = ConversationId::new(conversation);
    let result = runtime.block_on(async {
        let agent = AgentRuntime::from_config(&config)
            .await
            .map_err(|error| ("runtime_init", error.to_string(), 4u8))?;
        harness::transcript(agent.router(), conversation_id.clone(), &utterances)
            .await
            .map_err(|error| ("turn_failed", error.to_string(), 5u8))
    });

    match result {
        Ok(transcript) => {
            let report = ReplayReport {
                command: "replay",
                status: "ok",
                conversation_id: conversation_id.to_string(),
                turns: transcript.len(),
                transcript,
            };
            match serde_json::to_string_pretty(&report) {
                Ok(output) => CommandResult { exit_code: 0, output },
                Err(error) => {
                    CommandResult::failure("replay", "serialization", error.to_string(), 6)
                }
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("replay", error_class, message, exit_code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_script;

    #[test]
    fn script_skips_blank_lines_and_comments() {
        let script = "# triage\nhi\n\n   I have chest pain  \n# done\n";

        assert_eq!(parse_script(script), vec!["hi".to_string(), "I have chest pain".to_string()]);
    }
}
