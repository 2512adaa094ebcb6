/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and rendering.

use std::fmt;

use thiserror::Error;

/// Errors that can occur during template operations.
///
/// All errors are terminal: compilation and rendering abort immediately and
/// propagate to the caller. Nothing is retried, logged away, or swallowed.
///
/// `Display` and `Error` are implemented by hand rather than derived via
/// `thiserror`: several variants carry a plain-data field named `source`
/// (the offending source text), which `thiserror` would otherwise treat as
/// the error cause and require to implement `std::error::Error`.
#[derive(Debug)]
pub enum TemplateError {
    /// An opening or closing delimiter has no matching counterpart.
    MissingDelimiter { delimiter: String },

    /// A continuation or closing statement appeared with no open block of
    /// its family, or a block was left unterminated at end of input.
    MissingStatement { keyword: String },

    /// An `else`/`default` branch was followed by a further branch.
    TerminalBranchNotLast { terminal: String, block: String },

    /// An `else`/`default` branch appeared twice in the same block.
    DuplicateTerminalBranch { terminal: String, block: String },

    /// A statement name that is not one of the configured keywords.
    UnknownStatement { name: String },

    /// A statement argument that does not match its keyword's grammar
    /// (e.g. an iteration without an ` in ` separator or with a
    /// non-identifier binding name).
    InvalidStatementArgument { keyword: String, arg: String },

    /// Delimiter or statement-keyword configuration that would make
    /// tokenization ambiguous.
    InvalidConfig { message: String },

    /// Render-time: an iteration subject did not evaluate to a list.
    NotAList { source: String },

    /// The expression engine raised during evaluation. The offending
    /// source is attached for diagnosability; the cause is re-raised as-is.
    Evaluation { source: String, cause: EngineError },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::MissingDelimiter { delimiter } => {
                write!(f, "missing delimiter: '{delimiter}'")
            }
            TemplateError::MissingStatement { keyword } => {
                write!(f, "missing statement: '{keyword}'")
            }
            TemplateError::TerminalBranchNotLast { terminal, block } => write!(
                f,
                "invalid statement: '{terminal}' must be the last element of '{block}'"
            ),
            TemplateError::DuplicateTerminalBranch { terminal, block } => {
                write!(f, "invalid statement: duplicate '{terminal}' in '{block}'")
            }
            TemplateError::UnknownStatement { name } => {
                write!(f, "unknown statement: '{name}'")
            }
            TemplateError::InvalidStatementArgument { keyword, arg } => write!(
                f,
                "invalid statement: '{arg}' is not a valid '{keyword}' argument"
            ),
            TemplateError::InvalidConfig { message } => {
                write!(f, "invalid configuration: {message}")
            }
            TemplateError::NotAList { source } => {
                write!(f, "incompatible argument: '{source}' is not a list")
            }
            TemplateError::Evaluation { source, cause } => {
                write!(f, "evaluation failed in '{source}': {cause}")
            }
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TemplateError::Evaluation { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Error raised by an [`ExpressionEngine`](crate::ExpressionEngine)
/// implementation.
///
/// The capability boundary is message-based so the core never depends on an
/// engine's internal error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    /// Create a new engine error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for EngineError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for EngineError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
