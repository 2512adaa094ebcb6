/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Block assembler and the compiled [`Template`] type.
//!
//! The assembler consumes the flat token sequence once, left to right, and
//! groups tokens into the node tree. At each recursion level exactly one
//! block can be open; tokens of any other statement family are accumulated
//! opaquely into its body and re-interpreted from scratch when the finished
//! body is handed to a fresh assembler. A per-family depth counter tells a
//! nested same-kind closer apart from the one that terminates the current
//! level, which is what makes unlimited same-kind and mixed-kind nesting
//! work without the outer pass understanding the inner structure.

use std::fmt;

use crate::ast::{
    Conditional, Expression, Iteration, MultiBranch, TemplateNode, Text, prepare_source,
};
use crate::config::{StatementKind, StatementSet, TemplateOptions};
use crate::context::Context;
use crate::engine::ExpressionEngine;
use crate::error::{TemplateError, TemplateResult};
use crate::evaluator;
use crate::script::ScriptEngine;
use crate::tokenizer::{Token, tokenize};

/// A compiled template, ready to render.
///
/// Constructed empty or from a source string; the compiled tree is
/// immutable until [`set_template`](Template::set_template) replaces it
/// wholesale. Rendering takes `&mut self` because expressions may mutate
/// the stored context.
pub struct Template {
    nodes: Vec<TemplateNode>,
    options: TemplateOptions,
    statements: StatementSet,
    context: Context,
    engine: Box<dyn ExpressionEngine>,
}

impl Template {
    /// Create an empty template with default options. It renders to the
    /// empty string until a source is supplied.
    pub fn new() -> Self {
        let options = TemplateOptions::default();
        let statements = StatementSet::new(&options.statements);
        Self {
            nodes: Vec::new(),
            options,
            statements,
            context: Context::new(),
            engine: Box::new(ScriptEngine::new()),
        }
    }

    /// Create an empty template with the given options.
    ///
    /// Fails with [`TemplateError::InvalidConfig`] when the configuration
    /// is ambiguous (see [`TemplateOptions::validate`]).
    pub fn with_options(options: TemplateOptions) -> TemplateResult<Self> {
        options.validate()?;
        let statements = StatementSet::new(&options.statements);
        Ok(Self {
            nodes: Vec::new(),
            options,
            statements,
            context: Context::new(),
            engine: Box::new(ScriptEngine::new()),
        })
    }

    /// Compile a template from source text with default options.
    pub fn compile(source: &str) -> TemplateResult<Self> {
        let mut template = Self::new();
        template.set_template(source)?;
        Ok(template)
    }

    /// Compile a template from source text with the given options.
    pub fn compile_with_options(source: &str, options: TemplateOptions) -> TemplateResult<Self> {
        let mut template = Self::with_options(options)?;
        template.set_template(source)?;
        Ok(template)
    }

    /// Replace the expression engine. The default is
    /// [`ScriptEngine`](crate::ScriptEngine).
    pub fn with_engine(mut self, engine: Box<dyn ExpressionEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Set and compile the template source, replacing any previous tree.
    ///
    /// The new tree is fully built before the swap, so a compilation
    /// failure leaves a previously compiled tree in place and renderable.
    pub fn set_template(&mut self, source: &str) -> TemplateResult<&mut Self> {
        let source = if self.options.trim_result {
            trim_lines(source)
        } else {
            source.to_string()
        };
        let tokens = tokenize(&source, &self.options.delimiters)?;
        tracing::debug!(tokens = tokens.len(), "compiling template");
        let nodes = assemble(tokens, &self.statements)?;
        self.nodes = nodes;
        Ok(self)
    }

    /// Set the context used by [`render`](Template::render).
    pub fn set_context(&mut self, context: Context) -> &mut Self {
        self.context = context;
        self
    }

    /// The stored context, including any mutations performed by rendered
    /// expressions.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The stored context, mutably.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// The compiled node tree.
    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }

    /// The options this template was built with.
    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// Render the compiled tree against the stored context.
    ///
    /// Without a compiled tree this returns the empty string, not an error.
    pub fn render(&mut self) -> TemplateResult<String> {
        tracing::debug!(nodes = self.nodes.len(), "rendering template");
        evaluator::evaluate(&self.nodes, &mut self.context, self.engine.as_ref())
    }

    /// Set the context, then render.
    pub fn render_with(&mut self, context: Context) -> TemplateResult<String> {
        self.set_context(context);
        self.render()
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("nodes", &self.nodes)
            .field("options", &self.options)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Strip leading/trailing whitespace from every line and drop line breaks.
fn trim_lines(source: &str) -> String {
    source.lines().map(str::trim).collect()
}

/// Assembler state for an open conditional block.
struct ConditionalState {
    depth: usize,
    /// Role of the branch currently accumulating: `If`, `ElseIf` or `Else`.
    head: StatementKind,
    head_arg: String,
    completed: Vec<(String, Vec<Token>)>,
    body: Vec<Token>,
}

/// Assembler state for an open iteration block.
struct IterationState {
    depth: usize,
    arg: String,
    body: Vec<Token>,
}

/// Assembler state for an open multi-way branch block.
struct MultiBranchState {
    depth: usize,
    subject: String,
    /// The currently-open `case`/`default` sub-branch, tracked separately
    /// from the block opener.
    sub: Option<(StatementKind, String)>,
    completed: Vec<(String, Vec<Token>)>,
    body: Vec<Token>,
}

/// The innermost open block at this recursion level, if any.
enum OpenBlock {
    Conditional(ConditionalState),
    Iteration(IterationState),
    MultiBranch(MultiBranchState),
}

impl OpenBlock {
    fn body_mut(&mut self) -> &mut Vec<Token> {
        match self {
            OpenBlock::Conditional(state) => &mut state.body,
            OpenBlock::Iteration(state) => &mut state.body,
            OpenBlock::MultiBranch(state) => &mut state.body,
        }
    }

    /// The keyword role that would close this block.
    fn closer(&self) -> StatementKind {
        match self {
            OpenBlock::Conditional(_) => StatementKind::EndIf,
            OpenBlock::Iteration(_) => StatementKind::EndForEach,
            OpenBlock::MultiBranch(_) => StatementKind::EndSwitch,
        }
    }
}

fn missing(statements: &StatementSet, kind: StatementKind) -> TemplateError {
    TemplateError::MissingStatement {
        keyword: statements.keyword(kind).to_string(),
    }
}

/// Assemble a token sequence into a node tree.
pub(crate) fn assemble(
    tokens: Vec<Token>,
    statements: &StatementSet,
) -> TemplateResult<Vec<TemplateNode>> {
    let mut nodes = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for token in tokens {
        let (name, arg) = match token {
            Token::Text(text) => {
                match &mut open {
                    Some(block) => block.body_mut().push(Token::Text(text)),
                    None => nodes.push(TemplateNode::Text(Text { text })),
                }
                continue;
            }
            Token::Expression(source) => {
                match &mut open {
                    Some(block) => block.body_mut().push(Token::Expression(source)),
                    None => nodes.push(TemplateNode::Expression(Expression {
                        source: prepare_source(&source),
                    })),
                }
                continue;
            }
            Token::Statement { name, arg } => (name, arg),
        };

        let kind = statements
            .kind_of(&name)
            .ok_or_else(|| TemplateError::UnknownStatement { name: name.clone() })?;

        match kind {
            StatementKind::If => match open.take() {
                None => {
                    open = Some(OpenBlock::Conditional(ConditionalState {
                        depth: 1,
                        head: StatementKind::If,
                        head_arg: arg,
                        completed: Vec::new(),
                        body: Vec::new(),
                    }));
                }
                Some(OpenBlock::Conditional(mut state)) => {
                    state.depth += 1;
                    state.body.push(Token::Statement { name, arg });
                    open = Some(OpenBlock::Conditional(state));
                }
                Some(mut block) => {
                    block.body_mut().push(Token::Statement { name, arg });
                    open = Some(block);
                }
            },

            StatementKind::ElseIf | StatementKind::Else => match open.take() {
                None => return Err(missing(statements, StatementKind::If)),
                Some(OpenBlock::Conditional(mut state)) if state.depth == 1 => {
                    if state.head == StatementKind::Else {
                        let terminal = statements.keyword(StatementKind::Else).to_string();
                        let block = statements.keyword(StatementKind::If).to_string();
                        return Err(if kind == StatementKind::Else {
                            TemplateError::DuplicateTerminalBranch { terminal, block }
                        } else {
                            TemplateError::TerminalBranchNotLast { terminal, block }
                        });
                    }
                    let body = std::mem::take(&mut state.body);
                    let head_arg = std::mem::replace(&mut state.head_arg, arg);
                    state.completed.push((head_arg, body));
                    state.head = kind;
                    open = Some(OpenBlock::Conditional(state));
                }
                Some(mut block) => {
                    block.body_mut().push(Token::Statement { name, arg });
                    open = Some(block);
                }
            },

            StatementKind::EndIf => match open.take() {
                None => return Err(missing(statements, StatementKind::If)),
                Some(OpenBlock::Conditional(state)) if state.depth == 1 => {
                    nodes.push(finish_conditional(state, statements)?);
                }
                Some(OpenBlock::Conditional(mut state)) => {
                    state.depth -= 1;
                    state.body.push(Token::Statement { name, arg });
                    open = Some(OpenBlock::Conditional(state));
                }
                Some(mut block) => {
                    block.body_mut().push(Token::Statement { name, arg });
                    open = Some(block);
                }
            },

            StatementKind::ForEach => match open.take() {
                None => {
                    open = Some(OpenBlock::Iteration(IterationState {
                        depth: 1,
                        arg,
                        body: Vec::new(),
                    }));
                }
                Some(OpenBlock::Iteration(mut state)) => {
                    state.depth += 1;
                    state.body.push(Token::Statement { name, arg });
                    open = Some(OpenBlock::Iteration(state));
                }
                Some(mut block) => {
                    block.body_mut().push(Token::Statement { name, arg });
                    open = Some(block);
                }
            },

            StatementKind::EndForEach => match open.take() {
                None => return Err(missing(statements, StatementKind::ForEach)),
                Some(OpenBlock::Iteration(state)) if state.depth == 1 => {
                    nodes.push(finish_iteration(state, statements)?);
                }
                Some(OpenBlock::Iteration(mut state)) => {
                    state.depth -= 1;
                    state.body.push(Token::Statement { name, arg });
                    open = Some(OpenBlock::Iteration(state));
                }
                Some(mut block) => {
                    block.body_mut().push(Token::Statement { name, arg });
                    open = Some(block);
                }
            },

            StatementKind::Switch => match open.take() {
                None => {
                    open = Some(OpenBlock::MultiBranch(MultiBranchState {
                        depth: 1,
                        subject: arg,
                        sub: None,
                        completed: Vec::new(),
                        body: Vec::new(),
                    }));
                }
                Some(OpenBlock::MultiBranch(mut state)) => {
                    state.depth += 1;
                    state.body.push(Token::Statement { name, arg });
                    open = Some(OpenBlock::MultiBranch(state));
                }
                Some(mut block) => {
                    block.body_mut().push(Token::Statement { name, arg });
                    open = Some(block);
                }
            },

            StatementKind::Case | StatementKind::Default => match open.take() {
                None => return Err(missing(statements, StatementKind::Switch)),
                Some(OpenBlock::MultiBranch(mut state)) if state.depth == 1 => {
                    if matches!(state.sub, Some((StatementKind::Default, _))) {
                        let terminal = statements.keyword(StatementKind::Default).to_string();
                        let block = statements.keyword(StatementKind::Switch).to_string();
                        return Err(if kind == StatementKind::Default {
                            TemplateError::DuplicateTerminalBranch { terminal, block }
                        } else {
                            TemplateError::TerminalBranchNotLast { terminal, block }
                        });
                    }
                    if let Some((_, case_arg)) = state.sub.take() {
                        let body = std::mem::take(&mut state.body);
                        state.completed.push((case_arg, body));
                    }
                    // Without a previous sub-branch the accumulated body is
                    // kept: content before the first case merges into it.
                    state.sub = Some((kind, arg));
                    open = Some(OpenBlock::MultiBranch(state));
                }
                Some(mut block) => {
                    block.body_mut().push(Token::Statement { name, arg });
                    open = Some(block);
                }
            },

            StatementKind::EndSwitch => match open.take() {
                None => return Err(missing(statements, StatementKind::Switch)),
                Some(OpenBlock::MultiBranch(state)) if state.depth == 1 => {
                    nodes.push(finish_multi_branch(state, statements)?);
                }
                Some(OpenBlock::MultiBranch(mut state)) => {
                    state.depth -= 1;
                    state.body.push(Token::Statement { name, arg });
                    open = Some(OpenBlock::MultiBranch(state));
                }
                Some(mut block) => {
                    block.body_mut().push(Token::Statement { name, arg });
                    open = Some(block);
                }
            },
        }
    }

    if let Some(block) = open {
        return Err(missing(statements, block.closer()));
    }

    Ok(nodes)
}

fn finish_conditional(
    state: ConditionalState,
    statements: &StatementSet,
) -> TemplateResult<TemplateNode> {
    let ConditionalState {
        head,
        head_arg,
        mut completed,
        body,
        ..
    } = state;

    let else_branch = if head == StatementKind::Else {
        Some(assemble(body, statements)?)
    } else {
        completed.push((head_arg, body));
        None
    };

    let mut branches = Vec::with_capacity(completed.len());
    for (condition, tokens) in completed {
        branches.push((prepare_source(&condition), assemble(tokens, statements)?));
    }

    Ok(TemplateNode::Conditional(Conditional {
        branches,
        else_branch,
    }))
}

fn finish_iteration(
    state: IterationState,
    statements: &StatementSet,
) -> TemplateResult<TemplateNode> {
    let (item, index, collection) = parse_iteration_argument(&state.arg, statements)?;
    Ok(TemplateNode::Iteration(Iteration {
        item,
        index,
        collection: prepare_source(&collection),
        body: assemble(state.body, statements)?,
    }))
}

/// Parse an iteration argument: `<item>[, <index>] in <collection>`.
/// The index binding defaults to the literal name `index`.
fn parse_iteration_argument(
    arg: &str,
    statements: &StatementSet,
) -> TemplateResult<(String, String, String)> {
    let invalid = || TemplateError::InvalidStatementArgument {
        keyword: statements.keyword(StatementKind::ForEach).to_string(),
        arg: arg.to_string(),
    };

    let (bindings, collection) = arg.split_once(" in ").ok_or_else(invalid)?;
    let (item, index) = match bindings.split_once(',') {
        Some((item, index)) => (item.trim(), index.trim()),
        None => (bindings.trim(), "index"),
    };
    let collection = collection.trim();
    if !is_identifier(item) || !is_identifier(index) || collection.is_empty() {
        return Err(invalid());
    }
    Ok((item.to_string(), index.to_string(), collection.to_string()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn finish_multi_branch(
    state: MultiBranchState,
    statements: &StatementSet,
) -> TemplateResult<TemplateNode> {
    let MultiBranchState {
        subject,
        sub,
        mut completed,
        body,
        ..
    } = state;

    let default_branch = match sub {
        Some((StatementKind::Case, case_arg)) => {
            completed.push((case_arg, body));
            None
        }
        // An open `default` branch, or no branch at all: the body is the
        // default subtree.
        _ => Some(assemble(body, statements)?),
    };

    let mut cases = Vec::with_capacity(completed.len());
    for (case, tokens) in completed {
        cases.push((prepare_source(&case), assemble(tokens, statements)?));
    }

    Ok(TemplateNode::MultiBranch(MultiBranch {
        subject: prepare_source(&subject),
        cases,
        default_branch,
    }))
}
