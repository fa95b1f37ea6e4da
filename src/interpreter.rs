use crate::builtin::Builtin;
use crate::command::{Command, EXIT_FAILURE, ExitCode};
use crate::env::Environment;
use crate::external;
use crate::governor;
use crate::lexer;
use crate::parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, IsTerminal, Write};
use tracing::debug;

/// A minimal shell-like interpreter that runs builtins in-process and
/// everything else as child processes.
///
/// Example
/// ```
/// use sish::Interpreter;
/// let mut sh = Interpreter::new("sish", false);
/// sh.execute_line("echo hello world").unwrap();
/// assert_eq!(sh.last_status(), 0);
/// ```
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    /// Create an interpreter for a program invoked as `program_name`.
    pub fn new(program_name: impl Into<String>, trace: bool) -> Self {
        let mut env = Environment::new(program_name);
        env.trace = trace;
        Self { env }
    }

    /// Status of the last completed command.
    pub fn last_status(&self) -> ExitCode {
        self.env.last_status
    }

    /// Whether `exit` has been run.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// The prompt drawn before each read.
    pub fn prompt(&self) -> String {
        self.env.prompt()
    }

    /// Execute one input line, with builtin output going to standard output.
    ///
    /// Only failures that make the interpreter unusable are returned as errors;
    /// everything else is reported on stderr and recorded as the exit status.
    pub fn execute_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.execute_line_with_output(line, &mut std::io::stdout())
    }

    /// Like [`Interpreter::execute_line`], but builtins without an output
    /// redirection write to `stdout` instead of the process's standard output.
    pub fn execute_line_with_output(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
    ) -> anyhow::Result<()> {
        let tokens = match lexer::split_into_tokens(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                self.report(&e);
                self.env.last_status = EXIT_FAILURE;
                return Ok(());
            }
        };
        if tokens.is_empty() {
            return Ok(());
        }

        let command = match parser::parse_command(&tokens) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.report(&e);
                self.env.last_status = EXIT_FAILURE;
                return Ok(());
            }
        };

        if self.env.trace {
            eprintln!("+ {}", command.argv().join(" "));
        }

        let _executing = governor::executing();
        let status = self.dispatch(command, stdout)?;
        debug!(status, "command finished");
        self.env.last_status = status;
        Ok(())
    }

    fn dispatch(&mut self, command: Command, stdout: &mut dyn Write) -> anyhow::Result<ExitCode> {
        match Builtin::from_name(command.program()) {
            Some(builtin) => {
                let (argv, mut redirections) = command.into_parts();
                let status = match redirections.stdout.as_mut() {
                    Some(file) => builtin.run(&argv[1..], file, &mut self.env),
                    None => builtin.run(&argv[1..], stdout, &mut self.env),
                };
                Ok(status)
            }
            None => Ok(external::launch(command)?),
        }
    }

    fn report(&self, error: &dyn std::fmt::Display) {
        eprintln!("{}: {}", self.env.program_name, error);
    }

    /// Read-Eval-Print Loop: prompt, read a line, execute it, until `exit` or end of input.
    ///
    /// Returns the status the interpreter should exit with.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;
        let prompt = self.prompt();
        let interactive = io::stdin().is_terminal();

        while !self.env.should_exit {
            // rustyline draws the prompt only when reading from a terminal.
            let shown = if interactive {
                prompt.as_str()
            } else {
                let mut stdout = io::stdout();
                stdout.write_all(prompt.as_bytes())?;
                stdout.flush()?;
                ""
            };
            match rl.readline(shown) {
                Ok(line) => {
                    let line = line.trim_end_matches(['\n', '\r']);
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line)?;
                    }
                    self.execute_line(line)?;
                }
                // Ctrl-C while editing: drop the line and prompt again.
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(self.env.last_status)
    }
}
