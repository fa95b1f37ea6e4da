use crate::command::{Command, Redirections};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use thiserror::Error;
use tracing::trace;

/// Permissions for files created by output redirection: rw-r--r--.
const OUTPUT_MODE: u32 = 0o644;

/// Kind of redirection
///
/// Defines the specific operation mode for an I/O redirection (`<`, `>`, `>>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Input redirection (`<path`): reads standard input from an existing file.
    Input,
    /// Output redirection (`>path`): writes standard output to a file, **overwriting** it.
    Truncate,
    /// Output redirection with append (`>>path`): writes standard output to the end of a file.
    Append,
}

/// What a single token means to the parser.
#[derive(Debug, PartialEq, Eq)]
pub enum Directive<'a> {
    /// An ordinary argument.
    Argument(&'a str),
    /// A redirection to the given path.
    Redirect(RedirectKind, &'a str),
}

/// Errors that can occur while resolving a command's redirections.
#[derive(Debug, Error)]
pub enum ParsingError {
    /// The token holds an operator sequence the grammar rejects (`>>>`, `<<`).
    #[error("syntax error near `{0}`")]
    Syntax(String),
    /// A redirection target could not be opened.
    #[error("{path}: {source}")]
    Open {
        /// The path named by the directive.
        path: String,
        /// The underlying system error.
        #[source]
        source: io::Error,
    },
}

/// Classifies a single token.
///
/// Operator and path are contiguous, so `>` followed by a separate `file`
/// token is an output redirection to the empty path plus an argument.
pub fn classify(token: &str) -> Result<Directive<'_>, ParsingError> {
    if token.contains(">>>") || token.contains("<<") {
        return Err(ParsingError::Syntax(token.to_string()));
    }

    let directive = if let Some(path) = token.strip_prefix(">>") {
        Directive::Redirect(RedirectKind::Append, path)
    } else if let Some(path) = token.strip_prefix('>') {
        Directive::Redirect(RedirectKind::Truncate, path)
    } else if let Some(path) = token.strip_prefix('<') {
        Directive::Redirect(RedirectKind::Input, path)
    } else {
        Directive::Argument(token)
    };
    Ok(directive)
}

/// Opens `path` the way `kind` requires.
pub fn open_target(kind: RedirectKind, path: &str) -> Result<File, ParsingError> {
    let result = match kind {
        RedirectKind::Input => File::open(path),
        RedirectKind::Truncate => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(OUTPUT_MODE)
            .open(path),
        RedirectKind::Append => OpenOptions::new()
            .append(true)
            .create(true)
            .mode(OUTPUT_MODE)
            .open(path),
    };
    result.map_err(|source| ParsingError::Open {
        path: path.to_string(),
        source,
    })
}

/// Separates arguments from redirection directives and opens every target.
///
/// Returns `Ok(None)` when the tokens contain no argument at all. On error,
/// every file opened so far is closed before returning.
pub fn parse_command(tokens: &[&str]) -> Result<Option<Command>, ParsingError> {
    let mut argv = Vec::new();
    let mut redirections = Redirections::default();

    for token in tokens {
        match classify(token)? {
            Directive::Argument(arg) => argv.push(arg.to_string()),
            Directive::Redirect(kind, path) => {
                let file = open_target(kind, path)?;
                trace!(?kind, path, "opened redirection target");
                // Assigning drops, and so closes, a superseded file.
                match kind {
                    RedirectKind::Input => redirections.stdin = Some(file),
                    RedirectKind::Truncate | RedirectKind::Append => {
                        redirections.stdout = Some(file)
                    }
                }
            }
        }
    }

    Ok(Command::new(argv, redirections))
}
