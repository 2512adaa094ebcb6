/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Delimiter and statement-keyword configuration.
//!
//! Both delimiter pairs and all ten statement keywords are configurable.
//! Configurations that would make tokenization ambiguous are rejected
//! eagerly by [`TemplateOptions::validate`] rather than producing
//! order-dependent scanning behavior.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{TemplateError, TemplateResult};

/// The four delimiter strings recognized by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delimiters {
    /// Opens an embedded expression. Default `{{`.
    pub expression_open: String,
    /// Closes an embedded expression. Default `}}`.
    pub expression_close: String,
    /// Opens a statement. Default `{%`.
    pub statement_open: String,
    /// Closes a statement. Default `%}`.
    pub statement_close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            expression_open: "{{".to_string(),
            expression_close: "}}".to_string(),
            statement_open: "{%".to_string(),
            statement_close: "%}".to_string(),
        }
    }
}

/// The ten statement keywords, one per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statements {
    /// Opens a conditional block. Default `if`.
    #[serde(rename = "if")]
    pub if_: String,
    /// Continues a conditional with a further condition. Default `elseif`.
    #[serde(rename = "elseif")]
    pub else_if: String,
    /// The conditional's terminal fallback branch. Default `else`.
    #[serde(rename = "else")]
    pub else_: String,
    /// Closes a conditional block. Default `endif`.
    #[serde(rename = "endif")]
    pub end_if: String,
    /// Opens an iteration block. Default `foreach`.
    pub foreach: String,
    /// Closes an iteration block. Default `endforeach`.
    #[serde(rename = "endforeach")]
    pub end_foreach: String,
    /// Opens a multi-way branch block. Default `switch`.
    pub switch: String,
    /// Opens a case branch within a multi-way branch. Default `case`.
    pub case: String,
    /// The multi-way branch's terminal fallback branch. Default `default`.
    pub default: String,
    /// Closes a multi-way branch block. Default `endswitch`.
    #[serde(rename = "endswitch")]
    pub end_switch: String,
}

impl Default for Statements {
    fn default() -> Self {
        Self {
            if_: "if".to_string(),
            else_if: "elseif".to_string(),
            else_: "else".to_string(),
            end_if: "endif".to_string(),
            foreach: "foreach".to_string(),
            end_foreach: "endforeach".to_string(),
            switch: "switch".to_string(),
            case: "case".to_string(),
            default: "default".to_string(),
            end_switch: "endswitch".to_string(),
        }
    }
}

/// Options for constructing a [`Template`](crate::Template).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOptions {
    /// Delimiter strings used by the tokenizer.
    pub delimiters: Delimiters,
    /// Statement keywords used by the block assembler.
    pub statements: Statements,
    /// If true, every template line is trimmed of leading/trailing
    /// whitespace and line breaks are removed, once, before tokenizing.
    pub trim_result: bool,
}

impl TemplateOptions {
    /// Validate this configuration, rejecting ambiguous setups eagerly.
    ///
    /// Rules:
    /// - every delimiter string must be non-empty;
    /// - the expression-open and statement-open delimiters must differ and
    ///   neither may be a prefix of the other (the tokenizer's
    ///   nearer-of-two-indices dispatch cannot otherwise break ties);
    /// - every keyword must be non-empty, consist of word characters only,
    ///   and all ten must be pairwise distinct.
    ///
    /// Identical open and close delimiters of the same pair are legal: the
    /// close scan starts after the opener.
    pub fn validate(&self) -> TemplateResult<()> {
        let d = &self.delimiters;
        for (name, value) in [
            ("expression_open", &d.expression_open),
            ("expression_close", &d.expression_close),
            ("statement_open", &d.statement_open),
            ("statement_close", &d.statement_close),
        ] {
            if value.is_empty() {
                return Err(TemplateError::InvalidConfig {
                    message: format!("delimiter '{name}' must not be empty"),
                });
            }
        }

        if d.expression_open.starts_with(&d.statement_open)
            || d.statement_open.starts_with(&d.expression_open)
        {
            return Err(TemplateError::InvalidConfig {
                message: format!(
                    "expression open delimiter '{}' and statement open delimiter '{}' \
                     are ambiguous",
                    d.expression_open, d.statement_open
                ),
            });
        }

        let mut seen: HashMap<&str, StatementKind> = HashMap::new();
        for (kind, keyword) in self.statements.roles() {
            if keyword.is_empty() {
                return Err(TemplateError::InvalidConfig {
                    message: format!("statement keyword for '{kind:?}' must not be empty"),
                });
            }
            if !keyword.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(TemplateError::InvalidConfig {
                    message: format!(
                        "statement keyword '{keyword}' must contain word characters only"
                    ),
                });
            }
            if let Some(previous) = seen.insert(keyword, kind) {
                return Err(TemplateError::InvalidConfig {
                    message: format!(
                        "statement keyword '{keyword}' is used for both '{previous:?}' \
                         and '{kind:?}'"
                    ),
                });
            }
        }

        Ok(())
    }
}

/// The structural role a statement keyword plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    If,
    ElseIf,
    Else,
    EndIf,
    ForEach,
    EndForEach,
    Switch,
    Case,
    Default,
    EndSwitch,
}

impl Statements {
    /// All ten (role, keyword) pairs.
    fn roles(&self) -> [(StatementKind, &str); 10] {
        [
            (StatementKind::If, self.if_.as_str()),
            (StatementKind::ElseIf, self.else_if.as_str()),
            (StatementKind::Else, self.else_.as_str()),
            (StatementKind::EndIf, self.end_if.as_str()),
            (StatementKind::ForEach, self.foreach.as_str()),
            (StatementKind::EndForEach, self.end_foreach.as_str()),
            (StatementKind::Switch, self.switch.as_str()),
            (StatementKind::Case, self.case.as_str()),
            (StatementKind::Default, self.default.as_str()),
            (StatementKind::EndSwitch, self.end_switch.as_str()),
        ]
    }
}

/// The fixed keyword→role table the block assembler dispatches through.
///
/// Built once per compilation from the validated configuration; the
/// assembler never compares keyword strings directly.
#[derive(Debug, Clone)]
pub(crate) struct StatementSet {
    kinds: HashMap<String, StatementKind>,
    keywords: Vec<(StatementKind, String)>,
}

impl StatementSet {
    pub(crate) fn new(statements: &Statements) -> Self {
        let keywords: Vec<(StatementKind, String)> = statements
            .roles()
            .iter()
            .map(|(kind, keyword)| (*kind, keyword.to_string()))
            .collect();
        let kinds = keywords
            .iter()
            .map(|(kind, keyword)| (keyword.clone(), *kind))
            .collect();
        Self { kinds, keywords }
    }

    /// The role of a statement name, if it is a configured keyword.
    pub(crate) fn kind_of(&self, name: &str) -> Option<StatementKind> {
        self.kinds.get(name).copied()
    }

    /// The configured keyword for a role, for diagnostics.
    pub(crate) fn keyword(&self, kind: StatementKind) -> &str {
        self.keywords
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, keyword)| keyword.as_str())
            .unwrap_or_default()
    }
}
