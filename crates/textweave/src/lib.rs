/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Embedded-expression text templating engine.
//!
//! This crate compiles template strings containing literal text, embedded
//! expressions, and block statements into an immutable node tree, and
//! renders that tree against a mutable variable context. It supports:
//!
//! - Expression interpolation: `{{ user.name }}`
//! - Conditionals: `{%if cond%}...{%elseif other%}...{%else%}...{%endif%}`
//! - Iteration: `{%foreach item, index in items%}...{%endforeach%}`
//! - Multi-way branching: `{%switch subject%}{%case a%}...{%default%}...{%endswitch%}`
//! - Multi-statement script blocks: `{{ total += item.price; }}`
//! - Configurable delimiters and statement keywords ([`TemplateOptions`])
//!
//! # Architecture
//!
//! Compilation is a single pass: the tokenizer splits the raw text into a
//! flat token sequence using the configured delimiters, and the block
//! assembler folds that sequence into a tree of renderable nodes, enforcing
//! block structure (matched openers/closers, `else`/`default` ordering,
//! arbitrary nesting). Rendering walks the tree against one mutable
//! [`Context`]; expression side effects persist across sibling nodes for
//! the duration of a render call.
//!
//! Expression evaluation itself is a pluggable capability: the core hands
//! every expression source to an [`ExpressionEngine`]. The default engine,
//! [`ScriptEngine`], interprets a small JavaScript-flavored script language.
//!
//! # Example
//!
//! ```
//! use textweave::{Context, Template, Value};
//!
//! let mut template = Template::compile(
//!     "{%foreach item, n in items%}{{n + 1}}. {{item}}\n{%endforeach%}",
//! )
//! .unwrap();
//!
//! let mut context = Context::new();
//! context.insert("items", Value::List(vec!["foo".into(), "bar".into()]));
//!
//! let output = template.render_with(context).unwrap();
//! assert_eq!(output, "1. foo\n2. bar\n");
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod script;
pub mod tokenizer;

// Re-export main types at crate root
pub use ast::{Conditional, Expression, Iteration, MultiBranch, TemplateNode, Text};
pub use config::{Delimiters, StatementKind, Statements, TemplateOptions};
pub use context::{Context, Value};
pub use engine::ExpressionEngine;
pub use error::{EngineError, TemplateError, TemplateResult};
pub use parser::Template;
pub use script::ScriptEngine;
pub use tokenizer::Token;
