use std::ffi::{CString, NulError};
use std::fs::File;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Status of a command that completed successfully.
pub const EXIT_SUCCESS: ExitCode = 0;

/// Generic failure: syntax errors, open failures, builtin usage errors.
pub const EXIT_FAILURE: ExitCode = 1;

/// The program could not be found or launched, or was killed by a signal.
pub const EXIT_NOT_EXECUTED: ExitCode = 127;

/// Files a command's standard streams are connected to.
///
/// Each slot owns its file; replacing or dropping it closes the descriptor.
#[derive(Debug, Default)]
pub struct Redirections {
    /// Replacement for standard input.
    pub stdin: Option<File>,
    /// Replacement for standard output.
    pub stdout: Option<File>,
}

/// One command line after redirections have been resolved.
#[derive(Debug)]
pub struct Command {
    argv: Vec<String>,
    redirections: Redirections,
}

impl Command {
    /// Builds a command. Returns `None` when `argv` is empty, in which case
    /// the redirection files are closed right away.
    pub fn new(argv: Vec<String>, redirections: Redirections) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv, redirections })
        }
    }

    /// The program name, i.e. the first argument.
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// All arguments, program name included.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// Resolved redirections.
    pub fn redirections(&self) -> &Redirections {
        &self.redirections
    }

    /// Gives up the argument vector and the owned files.
    pub fn into_parts(self) -> (Vec<String>, Redirections) {
        (self.argv, self.redirections)
    }

    /// The argument vector as C strings for `execvp`.
    pub fn exec_argv(&self) -> Result<Vec<CString>, NulError> {
        self.argv.iter().map(|a| CString::new(a.as_bytes())).collect()
    }
}
