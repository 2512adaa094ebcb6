/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled node tree types.
//!
//! A compiled template is an ordered sequence of [`TemplateNode`]s;
//! composite nodes own the subtrees of their branches and bodies. The tree
//! is immutable after assembly and rendered via a single exhaustive match,
//! so an unknown node kind is not a representable state.

/// A node in the compiled template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Literal text, output as-is.
    Text(Text),
    /// An embedded expression, evaluated and stringified at render time.
    Expression(Expression),
    /// A conditional block with zero or more `elseif` branches and an
    /// optional `else` branch.
    Conditional(Conditional),
    /// An iteration block over a list value.
    Iteration(Iteration),
    /// A multi-way branch over an evaluated subject value.
    MultiBranch(MultiBranch),
}

/// Literal text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    /// The literal text content.
    pub text: String,
}

/// Embedded expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// The prepared expression source.
    pub source: String,
}

/// Conditional block.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    /// Ordered (prepared condition source, body) pairs for the opening
    /// branch and each `elseif` branch. Never empty.
    pub branches: Vec<(String, Vec<TemplateNode>)>,
    /// Optional `else` branch. Always the last branch when present.
    pub else_branch: Option<Vec<TemplateNode>>,
}

/// Iteration block.
#[derive(Debug, Clone, PartialEq)]
pub struct Iteration {
    /// Name bound to the current element inside the body.
    pub item: String,
    /// Name bound to the current zero-based position inside the body.
    pub index: String,
    /// The prepared collection source. Must evaluate to a list.
    pub collection: String,
    /// The loop body.
    pub body: Vec<TemplateNode>,
}

/// Multi-way branch block.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiBranch {
    /// The prepared subject source.
    pub subject: String,
    /// Ordered (prepared case source, body) pairs.
    pub cases: Vec<(String, Vec<TemplateNode>)>,
    /// Optional `default` branch. Always the last branch when present.
    pub default_branch: Option<Vec<TemplateNode>>,
}

/// Prepare an expression source for the engine.
///
/// A source containing neither a newline nor a statement terminator is a
/// single expression and is wrapped as an implicit return; anything else is
/// a verbatim script body whose author supplies an explicit `return`.
pub(crate) fn prepare_source(raw: &str) -> String {
    if !raw.contains('\n') && !raw.contains(';') {
        format!("return {raw};")
    } else {
        raw.to_string()
    }
}
