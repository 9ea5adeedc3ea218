use std::process::ExitCode;

fn main() -> ExitCode {
    corebot_cli::run()
}
