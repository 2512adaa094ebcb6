/*
 * tokenizer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template tokenizer.
//!
//! Splits raw template text into a flat sequence of typed tokens in one
//! linear left-to-right pass. The scanner alternates between two modes:
//! outside any block it looks for the nearer of the two opening delimiters,
//! emitting the text before it as a literal; inside a block it looks for the
//! matching closing delimiter and classifies the enclosed content.

use crate::config::Delimiters;
use crate::error::{TemplateError, TemplateResult};

/// One classified fragment of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text, emitted unchanged by the renderer.
    Text(String),
    /// The trimmed source of an embedded expression.
    Expression(String),
    /// A statement: the first word of the block content plus the trimmed
    /// remainder as its argument.
    Statement { name: String, arg: String },
}

/// The closing delimiter currently being sought.
struct Seek<'a> {
    close: &'a str,
    expression: bool,
}

/// Tokenize a template against the configured delimiters.
///
/// Fails with [`TemplateError::MissingDelimiter`] when an opening delimiter
/// has no matching close, or when a closing delimiter appears in literal
/// text with no opening delimiter before it.
pub fn tokenize(template: &str, delimiters: &Delimiters) -> TemplateResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;
    let mut seeking: Option<Seek<'_>> = None;

    while cursor < template.len() || seeking.is_some() {
        let rest = &template[cursor..];

        if let Some(seek) = seeking.take() {
            let end = rest
                .find(seek.close)
                .ok_or_else(|| TemplateError::MissingDelimiter {
                    delimiter: seek.close.to_string(),
                })?;
            let content = rest[..end].trim();
            if !content.is_empty() {
                if seek.expression {
                    tokens.push(Token::Expression(content.to_string()));
                } else if let Some((name, arg)) = split_statement(content) {
                    tokens.push(Token::Statement { name, arg });
                }
                // Content not starting with a word character is dropped,
                // like whitespace-only blocks.
            }
            cursor += end + seek.close.len();
            continue;
        }

        let next_expression = rest.find(&delimiters.expression_open);
        let next_statement = rest.find(&delimiters.statement_open);
        let (text_end, next) = match (next_expression, next_statement) {
            (Some(e), Some(s)) if e <= s => (e, Some(expression_seek(delimiters))),
            (Some(e), None) => (e, Some(expression_seek(delimiters))),
            (_, Some(s)) => (s, Some(statement_seek(delimiters))),
            (None, None) => (rest.len(), None),
        };

        // A closing delimiter inside a literal segment has no opener.
        let segment = &rest[..text_end];
        if segment.contains(&delimiters.expression_close) {
            return Err(TemplateError::MissingDelimiter {
                delimiter: delimiters.expression_open.clone(),
            });
        }
        if segment.contains(&delimiters.statement_close) {
            return Err(TemplateError::MissingDelimiter {
                delimiter: delimiters.statement_open.clone(),
            });
        }
        if !segment.is_empty() {
            tokens.push(Token::Text(segment.to_string()));
        }

        match next {
            Some(seek) => {
                let open_len = if seek.expression {
                    delimiters.expression_open.len()
                } else {
                    delimiters.statement_open.len()
                };
                cursor += text_end + open_len;
                seeking = Some(seek);
            }
            None => cursor += text_end,
        }
    }

    Ok(tokens)
}

fn expression_seek(delimiters: &Delimiters) -> Seek<'_> {
    Seek {
        close: &delimiters.expression_close,
        expression: true,
    }
}

fn statement_seek(delimiters: &Delimiters) -> Seek<'_> {
    Seek {
        close: &delimiters.statement_close,
        expression: false,
    }
}

/// Split trimmed statement content into its name (one or more word
/// characters) and argument (the trimmed remainder). Content that does not
/// start with a word character yields no statement.
fn split_statement(content: &str) -> Option<(String, String)> {
    let name_end = content
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(content.len());
    if name_end == 0 {
        return None;
    }
    let (name, rest) = content.split_at(name_end);
    Some((name.to_string(), rest.trim().to_string()))
}
