use anyhow::Context;
use argh::FromArgs;
use sish::{Interpreter, env, governor};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `SISH_LOG=debug`.
const LOG_ENV: &str = "SISH_LOG";

#[derive(FromArgs)]
/// A simple interactive shell.
struct Args {
    /// echo each command to stderr, prefixed with `+`, before running it.
    #[argh(switch, short = 'x')]
    trace: bool,

    /// run a single command and exit with its status.
    #[argh(option, short = 'c')]
    command: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args, program_name: String) -> anyhow::Result<i32> {
    let shell = env::publish_shell_path().context("cannot resolve own executable path")?;
    debug!(shell = %shell.display(), "published shell path");

    let mut interpreter = Interpreter::new(program_name, args.trace);
    governor::install(&interpreter.prompt()).context("cannot install SIGINT handler")?;

    if let Some(command) = args.command {
        interpreter.execute_line(&command)?;
        return Ok(interpreter.last_status());
    }
    interpreter.repl()
}

fn main() {
    let args: Args = argh::from_env();
    let program_name = std::env::args()
        .next()
        .map(|argv0| env::program_name(&argv0))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    init_logging();

    match run(args, program_name.clone()) {
        Ok(status) => process::exit(status),
        Err(e) => {
            eprintln!("{program_name}: {e:#}");
            process::exit(sish::command::EXIT_FAILURE);
        }
    }
}
