//! Error types. Front-end errors (tokenization, parse, undefined predicate)
//! are ordinary recoverable values; bytecode invariant violations are
//! programmer errors and abort the process via `panic!` rather than a
//! `Result` variant (§7).

use thiserror::Error;

/// Errors produced while compiling source text (a program or a query).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontendError {
    /// Unexpected character, or an unterminated block comment.
    #[error("line {line}: unexpected character '{ch}'")]
    Lex { line: u32, ch: char },

    /// Unterminated `/* ... */` comment.
    #[error("line {line}: unterminated block comment")]
    UnterminatedComment { line: u32 },

    /// Unexpected token; `expected` names the token kinds that would have been accepted.
    #[error("line {line}: unexpected token {found:?}, expected one of {expected:?}")]
    Parse {
        line: u32,
        found: String,
        expected: Vec<&'static str>,
    },

    /// A goal references a predicate with no defined clauses.
    #[error("No clauses defined for predicate {name}/{arity}")]
    UndefinedPredicate { name: String, arity: u32 },
}
