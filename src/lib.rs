//! A small interactive command interpreter.
//!
//! Each input line is split into whitespace-separated tokens, redirection
//! tokens (`<in`, `>out`, `>>out`) are resolved into open files, and the
//! remaining arguments run either as a builtin (`cd`, `echo`, `exit`) inside
//! the interpreter or as a child process created with fork and exec.
//!
//! The main entry point is [`Interpreter`]. The public modules [`command`],
//! [`env`] and [`governor`] expose the command model, the session state and
//! the SIGINT handling used by the binary.

mod builtin;
pub mod command;
pub mod env;
mod external;
pub mod governor;
mod interpreter;
mod lexer;
mod parser;

pub use builtin::{Builtin, UsageError};
pub use external::LaunchError;
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
pub use lexer::{LexingError, MAX_TOKENS};
pub use parser::{ParsingError, RedirectKind};
