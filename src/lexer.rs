//! Lexical analysis of a single input line.
//!
//! The grammar is deliberately flat: a token is any run of characters that are
//! neither a space nor a tab. There is no quoting and no escaping, so a literal
//! space can never appear inside a token.

use thiserror::Error;

/// Upper bound on the number of tokens accepted from one line.
pub const MAX_TOKENS: usize = 256;

const DELIMITERS: [char; 2] = [' ', '\t'];

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexingError {
    /// The line split into more than [`MAX_TOKENS`] tokens.
    #[error("too many tokens (limit is {limit})")]
    TooManyTokens {
        /// The limit that was exceeded.
        limit: usize,
    },
}

/// Splits `line` into tokens separated by runs of spaces and tabs.
///
/// A line made only of whitespace yields an empty vector.
pub fn split_into_tokens(line: &str) -> Result<Vec<&str>, LexingError> {
    let mut tokens = Vec::new();
    for token in line.split(DELIMITERS).filter(|t| !t.is_empty()) {
        if tokens.len() == MAX_TOKENS {
            return Err(LexingError::TooManyTokens { limit: MAX_TOKENS });
        }
        tokens.push(token);
    }
    Ok(tokens)
}
