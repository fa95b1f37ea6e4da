use crate::command::{EXIT_SUCCESS, ExitCode};
use std::env as stdenv;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable through which children learn the interpreter's path.
pub const SHELL_VAR: &str = "SHELL";

/// Interpreter session state, one per interpreter run.
///
/// The environment contains:
/// - `last_status`: exit status of the last completed command.
/// - `trace`: whether resolved commands are echoed to stderr before running.
/// - `should_exit`: a flag the read loop checks to know when to terminate.
/// - `program_name`: shown in the prompt and in diagnostics.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Exit status of the last completed command.
    pub last_status: ExitCode,
    /// Set once at startup by `-x`.
    pub trace: bool,
    /// When set to true, indicates that the interpreter should exit.
    pub should_exit: bool,
    /// Name the interpreter was invoked as.
    pub program_name: String,
}

impl Environment {
    /// A fresh session: status 0, tracing off.
    pub fn new(program_name: impl Into<String>) -> Self {
        Self {
            last_status: EXIT_SUCCESS,
            trace: false,
            should_exit: false,
            program_name: program_name.into(),
        }
    }

    /// The prompt shown before each read, e.g. `sish$ `.
    pub fn prompt(&self) -> String {
        format!("{}$ ", self.program_name)
    }
}

/// Basename of the path the interpreter was invoked through.
pub fn program_name(argv0: &str) -> String {
    Path::new(argv0)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| argv0.to_string())
}

/// Publishes the interpreter's resolved executable path under [`SHELL_VAR`].
///
/// Must be called during startup, before any other thread exists.
pub fn publish_shell_path() -> io::Result<PathBuf> {
    let exe = stdenv::current_exe()?;
    // SAFETY: called from `main` before the interpreter spawns threads or children.
    unsafe { stdenv::set_var(SHELL_VAR, &exe) };
    Ok(exe)
}
