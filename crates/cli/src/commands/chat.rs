use std::io::{self, BufRead, Write};

use corebot_agent::AgentRuntime;
use corebot_core::config::LoadOptions;
use corebot_core::dialog::pending_slot;
use corebot_core::domain::conversation::ConversationId;
use corebot_core::router::Router;

use crate::commands::{current_thread_runtime, load_config, CommandResult};

const BANNER: &str = "corebot chat: type a message, /state to inspect, /reset to start over, /quit to leave";

pub fn run(options: &LoadOptions, conversation: &str, show_state: bool) -> CommandResult {
    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let conversation_id = ConversationId::new(conversation);
    let result = runtime.block_on(async {
        let agent = AgentRuntime::from_config(&config)
            .await
            .map_err(|error| ("runtime_init", error.to_string(), 4u8))?;
        let stdin = io::stdin();
        let stdout = io::stdout();
        run_session(&agent, &conversation_id, stdin.lock(), stdout.lock(), show_state)
            .await
            .map_err(|error| ("io", error.to_string(), 5u8))
    });

    match result {
        Ok(turns) => CommandResult::success(
            "chat",
            format!("conversation `{conversation_id}` ended after {turns} turns"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

/// Reads utterances line by line until EOF or `/quit` and writes every reply
/// prefixed with `bot>`. Returns the number of turns taken.
pub async fn run_session<R, W>(
    agent: &AgentRuntime,
    conversation_id: &ConversationId,
    input: R,
    mut output: W,
    show_state: bool,
) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "{BANNER}")?;
    let mut turns = 0;

    for line in input.lines() {
        let line = line?;
        let utterance = line.trim();
        match utterance {
            "" => continue,
            "/quit" | "/exit" => break,
            "/state" => {
                write_state(agent.router(), conversation_id, &mut output).await?;
                continue;
            }
            "/reset" => {
                let removed = agent.router().reset(conversation_id).await.unwrap_or(false);
                let notice = if removed { "conversation reset" } else { "nothing to reset" };
                writeln!(output, "-- {notice}")?;
                continue;
            }
            _ => {}
        }

        match agent.handle_message(conversation_id, utterance).await {
            Ok(reply) => {
                turns += 1;
                for message in &reply.messages {
                    writeln!(output, "bot> {}", message.text)?;
                }
                if show_state {
                    write_state(agent.router(), conversation_id, &mut output).await?;
                }
            }
            Err(error) => writeln!(output, "bot> {}", error.user_message())?,
        }
        output.flush()?;
    }

    Ok(turns)
}

async fn write_state<W: Write>(
    router: &Router,
    conversation_id: &ConversationId,
    output: &mut W,
) -> io::Result<()> {
    let state = match router.snapshot(conversation_id).await {
        Ok(Some(state)) => state,
        Ok(None) => return writeln!(output, "-- no active conversation"),
        Err(error) => return writeln!(output, "-- state unavailable: {error}"),
    };

    let Some(frame) = state.stack.peek_active() else {
        return writeln!(output, "-- idle after {} turns", state.turn_count);
    };
    let waiting_for = router
        .engine()
        .registry()
        .handler(frame.task)
        .and_then(|handler| pending_slot(handler.as_ref(), frame))
        .unwrap_or("-");
    writeln!(
        output,
        "-- active: {} (depth {}), waiting for: {waiting_for}",
        frame.task,
        state.stack.depth()
    )
}
