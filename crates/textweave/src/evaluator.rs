/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template rendering.
//!
//! Walks the compiled node tree against one mutable context, concatenating
//! node output left to right. The context is threaded by `&mut` through the
//! whole call: expression side effects stay visible to every subsequently
//! rendered sibling and descendant node. The only scoping applied is the
//! save/insert/restore shadow of the item and index bindings around an
//! iteration body.

use std::collections::HashMap;

use crate::ast::{Conditional, Iteration, MultiBranch, TemplateNode};
use crate::context::{Context, Value};
use crate::engine::ExpressionEngine;
use crate::error::{TemplateError, TemplateResult};

/// Render a node sequence against the context.
pub fn evaluate(
    nodes: &[TemplateNode],
    context: &mut Context,
    engine: &dyn ExpressionEngine,
) -> TemplateResult<String> {
    let mut output = String::new();
    evaluate_into(nodes, context, engine, &mut output)?;
    Ok(output)
}

fn evaluate_into(
    nodes: &[TemplateNode],
    context: &mut Context,
    engine: &dyn ExpressionEngine,
    output: &mut String,
) -> TemplateResult<()> {
    for node in nodes {
        evaluate_node(node, context, engine, output)?;
    }
    Ok(())
}

fn evaluate_node(
    node: &TemplateNode,
    context: &mut Context,
    engine: &dyn ExpressionEngine,
    output: &mut String,
) -> TemplateResult<()> {
    match node {
        TemplateNode::Text(text) => {
            output.push_str(&text.text);
            Ok(())
        }

        TemplateNode::Expression(expression) => {
            let value = eval_source(&expression.source, context, engine)?;
            output.push_str(&value.to_string());
            Ok(())
        }

        TemplateNode::Conditional(conditional) => {
            evaluate_conditional(conditional, context, engine, output)
        }

        TemplateNode::Iteration(iteration) => {
            evaluate_iteration(iteration, context, engine, output)
        }

        TemplateNode::MultiBranch(multi) => {
            evaluate_multi_branch(multi, context, engine, output)
        }
    }
}

/// Render the first branch whose condition is truthy, else the `else`
/// branch, else nothing. Later conditions are never evaluated.
fn evaluate_conditional(
    conditional: &Conditional,
    context: &mut Context,
    engine: &dyn ExpressionEngine,
    output: &mut String,
) -> TemplateResult<()> {
    for (condition, body) in &conditional.branches {
        if eval_source(condition, context, engine)?.is_truthy() {
            return evaluate_into(body, context, engine, output);
        }
    }
    if let Some(body) = &conditional.else_branch {
        return evaluate_into(body, context, engine, output);
    }
    Ok(())
}

/// Render the body once per element, in order, with the item and index
/// bindings shadowing any outer variables of the same names.
fn evaluate_iteration(
    iteration: &Iteration,
    context: &mut Context,
    engine: &dyn ExpressionEngine,
    output: &mut String,
) -> TemplateResult<()> {
    let value = eval_source(&iteration.collection, context, engine)?;
    let items = match value {
        Value::List(items) => items,
        _ => {
            return Err(TemplateError::NotAList {
                source: iteration.collection.clone(),
            });
        }
    };

    let previous_item = context.remove(&iteration.item);
    let previous_index = context.remove(&iteration.index);

    for (position, element) in items.into_iter().enumerate() {
        context.insert(iteration.item.clone(), element);
        context.insert(iteration.index.clone(), Value::Number(position as f64));
        evaluate_into(&iteration.body, context, engine, output)?;
    }

    context.remove(&iteration.item);
    context.remove(&iteration.index);
    if let Some(value) = previous_item {
        context.insert(iteration.item.clone(), value);
    }
    if let Some(value) = previous_index {
        context.insert(iteration.index.clone(), value);
    }

    Ok(())
}

/// Evaluate every case up front into a value-keyed lookup (later
/// collisions overwrite: last one wins), then the subject once; render the
/// matched branch, else the default branch, else nothing.
fn evaluate_multi_branch(
    multi: &MultiBranch,
    context: &mut Context,
    engine: &dyn ExpressionEngine,
    output: &mut String,
) -> TemplateResult<()> {
    let mut lookup: HashMap<String, &[TemplateNode]> = HashMap::new();
    for (case, body) in &multi.cases {
        let key = eval_source(case, context, engine)?.to_string();
        lookup.insert(key, body);
    }

    let subject = eval_source(&multi.subject, context, engine)?.to_string();
    if let Some(body) = lookup.get(subject.as_str()) {
        return evaluate_into(body, context, engine, output);
    }
    if let Some(body) = &multi.default_branch {
        return evaluate_into(body, context, engine, output);
    }
    Ok(())
}

fn eval_source(
    source: &str,
    context: &mut Context,
    engine: &dyn ExpressionEngine,
) -> TemplateResult<Value> {
    engine
        .evaluate(source, context)
        .map_err(|cause| TemplateError::Evaluation {
            source: source.to_string(),
            cause,
        })
}
