mod cli;
mod config;
mod run;

use std::process::ExitCode;

use cli::Command;

fn main() -> ExitCode {
    let cli = cli::parse();
    run::initialise_tracing();

    let result = match cli.command {
        Some(Command::Trace(args)) => run::trace(args),
        Some(Command::Shaders(args)) => run::shaders(args),
        None => run::run(cli.run),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(message) = run::failure_message(&err) {
                eprintln!("{message}");
            }
            ExitCode::FAILURE
        }
    }
}
