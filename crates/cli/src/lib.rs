pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use corebot_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "corebot",
    about = "Corebot operator CLI",
    long_about = "Talk to the corebot dialog router, replay scripted conversations, and inspect configuration and readiness.",
    after_help = "Examples:\n  corebot chat --conversation demo\n  corebot replay --script triage.txt\n  corebot doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a corebot.toml file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Chat with the router interactively on stdin")]
    Chat {
        #[arg(long, default_value = "local", help = "Conversation id to resume or start")]
        conversation: String,
        #[arg(long, help = "Print the active task and pending slot after every turn")]
        show_state: bool,
    },
    #[command(about = "Replay a script of utterances and print the JSON transcript")]
    Replay {
        #[arg(long, help = "File with one utterance per line; `#` starts a comment")]
        script: PathBuf,
        #[arg(long, default_value = "replay", help = "Conversation id used for the replay")]
        conversation: String,
    },
    #[command(about = "Apply pending conversation store migrations")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, task wiring, classifier readiness, and store connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };

    // Logging is best effort; commands report config errors themselves.
    let logging = AppConfig::load(options.clone())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    init_logging(&logging);

    let result = match cli.command {
        Command::Chat { conversation, show_state } => {
            commands::chat::run(&options, &conversation, show_state)
        }
        Command::Replay { script, conversation } => {
            commands::replay::run(&options, &script, &conversation)
        }
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so command payloads on stdout stay parseable.
pub fn init_logging(config: &LoggingConfig) {
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
