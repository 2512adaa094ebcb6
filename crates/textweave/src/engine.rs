/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The expression-evaluation capability.
//!
//! The core compiles and renders templates without defining an expression
//! language of its own: every expression source is handed to an
//! [`ExpressionEngine`] together with the mutable render context. The
//! default implementation is [`ScriptEngine`](crate::ScriptEngine); embedders
//! may inject anything that honors the contract below.

use crate::context::{Context, Value};
use crate::error::EngineError;

/// Evaluates expression sources against a mutable context.
///
/// # Source contract
///
/// Sources arrive prepared by the core: a short interpolation such as
/// `user.name` is wrapped as `return user.name;` before the engine sees it,
/// while sources containing a `;` or a newline are passed verbatim. An
/// engine therefore has to execute statement sequences and honor `return`;
/// a script that finishes without returning evaluates to [`Value::Null`].
///
/// # Context mutation
///
/// Engines receive the context mutably and may write to it; the renderer
/// threads one context through the whole render call, so writes persist
/// across sibling nodes and loop iterations. Engines must not retain state
/// of their own between calls; hidden shared state would break the
/// reuse-across-renders contract of the compiled template.
pub trait ExpressionEngine {
    /// Evaluate a prepared source against the context.
    fn evaluate(&self, source: &str, context: &mut Context) -> Result<Value, EngineError>;
}
