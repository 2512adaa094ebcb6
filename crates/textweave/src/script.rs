/*
 * script.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The default expression engine.
//!
//! [`ScriptEngine`] implements [`ExpressionEngine`] with a small interpreted
//! script language: literals, variable paths, the usual unary/binary/ternary
//! operators, `let`/`const`/`var` declarations, assignments, and `return`.
//! Statements are separated by `;` or newlines. Declared names are local to
//! one evaluation; undeclared assignments write through to the render
//! context and therefore persist across sibling nodes and loop iterations.
//!
//! The identifier `context` denotes the context map itself, so
//! `context.field` reads and writes the same slot as a bare `field` (unless
//! a local of that name shadows it).

use std::collections::HashMap;

use crate::context::{Context, Value};
use crate::engine::ExpressionEngine;
use crate::error::EngineError;

/// The built-in restricted script interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEngine;

impl ScriptEngine {
    /// Create a new engine. The engine is stateless; every evaluation is
    /// independent apart from its effects on the context.
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEngine for ScriptEngine {
    fn evaluate(&self, source: &str, context: &mut Context) -> Result<Value, EngineError> {
        let tokens = lex(source)?;
        let statements = Parser::new(tokens).parse_script()?;
        Interpreter {
            context,
            locals: HashMap::new(),
        }
        .run(&statements)
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Str(String),
    Ident(String),

    // Keywords
    Return,
    Let,
    Const,
    Var,
    True,
    False,
    Null,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    Question,
    Colon,
    Dot,
    Comma,
    Semi,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
}

fn lex(source: &str) -> Result<Vec<Tok>, EngineError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            // Newlines separate statements, like `;`.
            '\n' => {
                chars.next();
                tokens.push(Tok::Semi);
            }
            '0'..='9' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        text.push(d);
                        chars.next();
                    } else if d == '.' && !text.contains('.') {
                        // Consume the dot only when a digit follows, so
                        // the fraction is not confused with member access.
                        let mut ahead = chars.clone();
                        ahead.next();
                        if matches!(ahead.peek(), Some(n) if n.is_ascii_digit()) {
                            text.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                let number = text
                    .parse::<f64>()
                    .map_err(|_| EngineError::new(format!("invalid number '{text}'")))?;
                tokens.push(Tok::Number(number));
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some(d) = chars.next() {
                    if d == quote {
                        closed = true;
                        break;
                    }
                    if d == '\\' {
                        match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(esc) => text.push(esc),
                            None => break,
                        }
                    } else {
                        text.push(d);
                    }
                }
                if !closed {
                    return Err(EngineError::new("unterminated string"));
                }
                tokens.push(Tok::Str(text));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "return" => Tok::Return,
                    "let" => Tok::Let,
                    "const" => Tok::Const,
                    "var" => Tok::Var,
                    "true" => Tok::True,
                    "false" => Tok::False,
                    "null" => Tok::Null,
                    _ => Tok::Ident(ident),
                });
            }
            _ => {
                chars.next();
                let tok = match c {
                    '=' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            if chars.peek() == Some(&'=') {
                                chars.next();
                            }
                            Tok::Eq
                        } else {
                            Tok::Assign
                        }
                    }
                    '!' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            if chars.peek() == Some(&'=') {
                                chars.next();
                            }
                            Tok::NotEq
                        } else {
                            Tok::Bang
                        }
                    }
                    '&' => {
                        if chars.peek() == Some(&'&') {
                            chars.next();
                            Tok::AndAnd
                        } else {
                            return Err(EngineError::new("unexpected character '&'"));
                        }
                    }
                    '|' => {
                        if chars.peek() == Some(&'|') {
                            chars.next();
                            Tok::OrOr
                        } else {
                            return Err(EngineError::new("unexpected character '|'"));
                        }
                    }
                    '<' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::LtEq
                        } else {
                            Tok::Lt
                        }
                    }
                    '>' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::GtEq
                        } else {
                            Tok::Gt
                        }
                    }
                    '+' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::PlusAssign
                        } else {
                            Tok::Plus
                        }
                    }
                    '-' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::MinusAssign
                        } else {
                            Tok::Minus
                        }
                    }
                    '*' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::StarAssign
                        } else {
                            Tok::Star
                        }
                    }
                    '/' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::SlashAssign
                        } else {
                            Tok::Slash
                        }
                    }
                    '%' => Tok::Percent,
                    '?' => Tok::Question,
                    ':' => Tok::Colon,
                    '.' => Tok::Dot,
                    ',' => Tok::Comma,
                    ';' => Tok::Semi,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '[' => Tok::LBracket,
                    ']' => Tok::RBracket,
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    other => {
                        return Err(EngineError::new(format!("unexpected character '{other}'")));
                    }
                };
                tokens.push(tok);
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Var(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, PartialEq)]
enum Stmt {
    Declare(String, Option<Expr>),
    Assign(Expr, Option<BinaryOp>, Expr),
    Return(Option<Expr>),
    Expr(Expr),
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Tok>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<(), EngineError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> EngineError {
        match self.peek() {
            Some(tok) => EngineError::new(format!("expected {what}, found {tok:?}")),
            None => EngineError::new(format!("expected {what}, found end of script")),
        }
    }

    fn skip_separators(&mut self) {
        while self.eat(&Tok::Semi) {}
    }

    fn parse_script(mut self) -> Result<Vec<Stmt>, EngineError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while self.peek().is_some() {
            statements.push(self.parse_statement()?);
            if self.peek().is_some() && !self.eat(&Tok::Semi) {
                return Err(self.unexpected("';' or end of script"));
            }
            self.skip_separators();
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Stmt, EngineError> {
        match self.peek() {
            Some(Tok::Let) | Some(Tok::Const) | Some(Tok::Var) => {
                self.next();
                let name = match self.next() {
                    Some(Tok::Ident(name)) => name,
                    _ => return Err(EngineError::new("expected a name after declaration")),
                };
                let initializer = if self.eat(&Tok::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(Stmt::Declare(name, initializer))
            }
            Some(Tok::Return) => {
                self.next();
                match self.peek() {
                    None | Some(Tok::Semi) => Ok(Stmt::Return(None)),
                    _ => Ok(Stmt::Return(Some(self.parse_expr()?))),
                }
            }
            _ => {
                let expr = self.parse_expr()?;
                let compound = match self.peek() {
                    Some(Tok::Assign) => Some(None),
                    Some(Tok::PlusAssign) => Some(Some(BinaryOp::Add)),
                    Some(Tok::MinusAssign) => Some(Some(BinaryOp::Sub)),
                    Some(Tok::StarAssign) => Some(Some(BinaryOp::Mul)),
                    Some(Tok::SlashAssign) => Some(Some(BinaryOp::Div)),
                    _ => None,
                };
                match compound {
                    Some(op) => {
                        self.next();
                        if !matches!(
                            expr,
                            Expr::Var(_) | Expr::Member(_, _) | Expr::Index(_, _)
                        ) {
                            return Err(EngineError::new("invalid assignment target"));
                        }
                        let value = self.parse_expr()?;
                        Ok(Stmt::Assign(expr, op, value))
                    }
                    None => Ok(Stmt::Expr(expr)),
                }
            }
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, EngineError> {
        let condition = self.parse_or()?;
        if self.eat(&Tok::Question) {
            let then = self.parse_expr()?;
            self.expect(&Tok::Colon, "':'")?;
            let otherwise = self.parse_expr()?;
            Ok(Expr::Ternary(
                Box::new(condition),
                Box::new(then),
                Box::new(otherwise),
            ))
        } else {
            Ok(condition)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EngineError> {
        let mut left = self.parse_and()?;
        while self.eat(&Tok::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EngineError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Tok::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, EngineError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => BinaryOp::Eq,
                Some(Tok::NotEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.next();
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, EngineError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => BinaryOp::Lt,
                Some(Tok::LtEq) => BinaryOp::LtEq,
                Some(Tok::Gt) => BinaryOp::Gt,
                Some(Tok::GtEq) => BinaryOp::GtEq,
                _ => break,
            };
            self.next();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, EngineError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.next();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EngineError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinaryOp::Mul,
                Some(Tok::Slash) => BinaryOp::Div,
                Some(Tok::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.next();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EngineError> {
        if self.eat(&Tok::Bang) {
            Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
        } else if self.eat(&Tok::Minus) {
            Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, EngineError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Tok::Dot) {
                let key = match self.next() {
                    Some(Tok::Ident(key)) => key,
                    _ => return Err(EngineError::new("expected a property name after '.'")),
                };
                expr = Expr::Member(Box::new(expr), key);
            } else if self.eat(&Tok::LBracket) {
                let index = self.parse_expr()?;
                self.expect(&Tok::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, EngineError> {
        match self.next() {
            Some(Tok::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Tok::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Tok::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Tok::Ident(name)) => Ok(Expr::Var(name)),
            Some(Tok::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(expr)
            }
            Some(Tok::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Tok::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.eat(&Tok::Comma) {
                            continue;
                        }
                        self.expect(&Tok::RBracket, "']'")?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            Some(Tok::LBrace) => {
                let mut entries = Vec::new();
                if !self.eat(&Tok::RBrace) {
                    loop {
                        let key = match self.next() {
                            Some(Tok::Ident(key)) => key,
                            Some(Tok::Str(key)) => key,
                            _ => return Err(EngineError::new("expected a map key")),
                        };
                        self.expect(&Tok::Colon, "':'")?;
                        entries.push((key, self.parse_expr()?));
                        if self.eat(&Tok::Comma) {
                            continue;
                        }
                        self.expect(&Tok::RBrace, "'}'")?;
                        break;
                    }
                }
                Ok(Expr::Map(entries))
            }
            Some(tok) => Err(EngineError::new(format!(
                "expected an expression, found {tok:?}"
            ))),
            None => Err(EngineError::new(
                "expected an expression, found end of script",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

/// The name that denotes the whole context map inside scripts.
const CONTEXT_NAME: &str = "context";

struct Interpreter<'a> {
    context: &'a mut Context,
    locals: HashMap<String, Value>,
}

impl Interpreter<'_> {
    fn run(mut self, statements: &[Stmt]) -> Result<Value, EngineError> {
        for statement in statements {
            match statement {
                Stmt::Declare(name, initializer) => {
                    let value = match initializer {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Null,
                    };
                    self.locals.insert(name.clone(), value);
                }
                Stmt::Assign(target, op, expr) => {
                    let value = match op {
                        Some(op) => {
                            let current = self.eval(target)?;
                            binary(*op, current, self.eval(expr)?)?
                        }
                        None => self.eval(expr)?,
                    };
                    self.assign(target, value)?;
                }
                Stmt::Return(expr) => {
                    return match expr {
                        Some(expr) => self.eval(expr),
                        None => Ok(Value::Null),
                    };
                }
                Stmt::Expr(expr) => {
                    self.eval(expr)?;
                }
            }
        }
        Ok(Value::Null)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EngineError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => {
                if name == CONTEXT_NAME {
                    return Ok(self.context.to_value());
                }
                if let Some(value) = self.locals.get(name) {
                    return Ok(value.clone());
                }
                Ok(self.context.get(name).cloned().unwrap_or(Value::Null))
            }
            Expr::Member(obj, key) => {
                let value = self.eval(obj)?;
                match &value {
                    Value::Map(map) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
                    Value::List(_) | Value::String(_) if key == "length" => Ok(Value::Number(
                        value.length().unwrap_or_default() as f64,
                    )),
                    Value::Null => Err(EngineError::new(format!(
                        "cannot read property '{key}' of null"
                    ))),
                    other => Err(EngineError::new(format!(
                        "cannot read property '{key}' of a {}",
                        other.kind()
                    ))),
                }
            }
            Expr::Index(obj, index) => {
                let value = self.eval(obj)?;
                let index = self.eval(index)?;
                match (&value, &index) {
                    (Value::List(items), Value::Number(n)) => {
                        if *n < 0.0 || n.fract() != 0.0 {
                            return Ok(Value::Null);
                        }
                        Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
                    }
                    (Value::String(s), Value::Number(n)) => {
                        if *n < 0.0 || n.fract() != 0.0 {
                            return Ok(Value::Null);
                        }
                        Ok(s.chars()
                            .nth(*n as usize)
                            .map(|c| Value::String(c.to_string()))
                            .unwrap_or(Value::Null))
                    }
                    (Value::Map(map), Value::String(key)) => {
                        Ok(map.get(key).cloned().unwrap_or(Value::Null))
                    }
                    (Value::Null, _) => Err(EngineError::new("cannot index null")),
                    (container, index) => Err(EngineError::new(format!(
                        "cannot index a {} with a {}",
                        container.kind(),
                        index.kind()
                    ))),
                }
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => Ok(Value::Number(-to_number(&value)?)),
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left)?;
                match op {
                    LogicalOp::And => {
                        if left.is_truthy() {
                            self.eval(right)
                        } else {
                            Ok(left)
                        }
                    }
                    LogicalOp::Or => {
                        if left.is_truthy() {
                            Ok(left)
                        } else {
                            self.eval(right)
                        }
                    }
                }
            }
            Expr::Ternary(condition, then, otherwise) => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::List(items) => {
                let items: Result<Vec<Value>, EngineError> =
                    items.iter().map(|item| self.eval(item)).collect();
                Ok(Value::List(items?))
            }
            Expr::Map(entries) => {
                let mut map = HashMap::new();
                for (key, expr) in entries {
                    let value = self.eval(expr)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Map(map))
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<(), EngineError> {
        match target {
            Expr::Var(name) => {
                if name == CONTEXT_NAME {
                    return Err(EngineError::new("cannot assign to 'context'"));
                }
                if let Some(slot) = self.locals.get_mut(name) {
                    *slot = value;
                } else {
                    self.context.insert(name.clone(), value);
                }
                Ok(())
            }
            Expr::Member(_, _) | Expr::Index(_, _) => {
                let slot = self.resolve_slot(target)?;
                *slot = value;
                Ok(())
            }
            _ => Err(EngineError::new("invalid assignment target")),
        }
    }

    /// Resolve an assignment target path to the slot it names. The final
    /// map key is created on demand; every intermediate container must
    /// already exist.
    fn resolve_slot(&mut self, target: &Expr) -> Result<&mut Value, EngineError> {
        match target {
            Expr::Var(name) => {
                if name == CONTEXT_NAME {
                    return Err(EngineError::new("cannot assign to 'context'"));
                }
                let slot = if self.locals.contains_key(name) {
                    self.locals.get_mut(name)
                } else if self.context.contains(name) {
                    self.context.get_mut(name)
                } else {
                    None
                };
                slot.ok_or_else(|| EngineError::new(format!("'{name}' is not defined")))
            }
            Expr::Member(obj, key) => {
                // `context.key` names a context slot directly and may
                // create it.
                if matches!(obj.as_ref(), Expr::Var(root) if root == CONTEXT_NAME) {
                    if !self.context.contains(key) {
                        self.context.insert(key.clone(), Value::Null);
                    }
                    return self
                        .context
                        .get_mut(key)
                        .ok_or_else(|| EngineError::new(format!("'{key}' is not defined")));
                }
                let container = self.resolve_slot(obj)?;
                match container {
                    Value::Map(map) => Ok(map.entry(key.clone()).or_insert(Value::Null)),
                    other => Err(EngineError::new(format!(
                        "cannot assign property '{key}' of a {}",
                        other.kind()
                    ))),
                }
            }
            Expr::Index(obj, index) => {
                let index = self.eval(index)?;
                let container = self.resolve_slot(obj)?;
                match (container, index) {
                    (Value::List(items), Value::Number(n)) => {
                        if n < 0.0 || n.fract() != 0.0 {
                            return Err(EngineError::new(format!("index {n} is out of range")));
                        }
                        items
                            .get_mut(n as usize)
                            .ok_or_else(|| EngineError::new(format!("index {n} is out of range")))
                    }
                    (Value::Map(map), Value::String(key)) => {
                        Ok(map.entry(key).or_insert(Value::Null))
                    }
                    (container, index) => Err(EngineError::new(format!(
                        "cannot index a {} with a {}",
                        container.kind(),
                        index.kind()
                    ))),
                }
            }
            _ => Err(EngineError::new("invalid assignment target")),
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EngineError> {
    match op {
        BinaryOp::Add => {
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                Ok(Value::String(format!("{left}{right}")))
            } else {
                Ok(Value::Number(to_number(&left)? + to_number(&right)?))
            }
        }
        BinaryOp::Sub => Ok(Value::Number(to_number(&left)? - to_number(&right)?)),
        BinaryOp::Mul => Ok(Value::Number(to_number(&left)? * to_number(&right)?)),
        BinaryOp::Div => Ok(Value::Number(to_number(&left)? / to_number(&right)?)),
        BinaryOp::Rem => Ok(Value::Number(to_number(&left)? % to_number(&right)?)),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            compare(op, &left, &right)
        }
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EngineError> {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (l, r) => {
            return Err(EngineError::new(format!(
                "cannot compare a {} with a {}",
                l.kind(),
                r.kind()
            )));
        }
    };
    let result = match ordering {
        Some(ordering) => match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::LtEq => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            BinaryOp::GtEq => ordering.is_ge(),
            _ => false,
        },
        // Incomparable numbers (NaN) compare false, whatever the operator.
        None => false,
    };
    Ok(Value::Bool(result))
}

fn to_number(value: &Value) -> Result<f64, EngineError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(0.0)
            } else {
                Ok(trimmed.parse().unwrap_or(f64::NAN))
            }
        }
        other => Err(EngineError::new(format!(
            "cannot use a {} in arithmetic",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(source: &str, context: &mut Context) -> Result<Value, EngineError> {
        ScriptEngine::new().evaluate(source, context)
    }

    fn eval_ok(source: &str) -> Value {
        eval(source, &mut Context::new()).unwrap()
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval_ok("return 1;"), Value::Number(1.0));
        assert_eq!(eval_ok("return 1.5;"), Value::Number(1.5));
        assert_eq!(eval_ok("return 'Hello !';"), Value::String("Hello !".to_string()));
        assert_eq!(eval_ok("return \"a\\nb\";"), Value::String("a\nb".to_string()));
        assert_eq!(eval_ok("return true;"), Value::Bool(true));
        assert_eq!(eval_ok("return null;"), Value::Null);
        assert_eq!(
            eval_ok("return [1, 2];"),
            Value::List(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_map_literal_member_access() {
        assert_eq!(
            eval_ok("return {text: 'Hello !'}.text;"),
            Value::String("Hello !".to_string())
        );
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval_ok("return 1 + 2 * 3;"), Value::Number(7.0));
        assert_eq!(eval_ok("return (1 + 2) * 3;"), Value::Number(9.0));
        assert_eq!(eval_ok("return 7 % 4;"), Value::Number(3.0));
        assert_eq!(eval_ok("return -2 + 1;"), Value::Number(-1.0));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            eval_ok("return 'n: ' + 1;"),
            Value::String("n: 1".to_string())
        );
        assert_eq!(
            eval_ok("return '(' + 'x' + ')';"),
            Value::String("(x)".to_string())
        );
    }

    #[test]
    fn test_comparison_and_equality() {
        assert_eq!(eval_ok("return 1 < 2;"), Value::Bool(true));
        assert_eq!(eval_ok("return 'a' < 'b';"), Value::Bool(true));
        assert_eq!(eval_ok("return 1 == 1;"), Value::Bool(true));
        assert_eq!(eval_ok("return 1 === 2;"), Value::Bool(false));
        assert_eq!(eval_ok("return 'x' !== 'y';"), Value::Bool(true));
    }

    #[test]
    fn test_logical_operators_yield_operands() {
        assert_eq!(eval_ok("return null || 'fallback';"), Value::String("fallback".to_string()));
        assert_eq!(eval_ok("return 'left' || 'right';"), Value::String("left".to_string()));
        assert_eq!(eval_ok("return 0 && 'never';"), Value::Number(0.0));
        assert_eq!(eval_ok("return 1 && 'right';"), Value::String("right".to_string()));
        assert_eq!(eval_ok("return !0;"), Value::Bool(true));
    }

    #[test]
    fn test_ternary() {
        assert_eq!(
            eval_ok("return 1 < 2 ? 'yes' : 'no';"),
            Value::String("yes".to_string())
        );
        assert_eq!(
            eval_ok("return false ? 'yes' : 'no';"),
            Value::String("no".to_string())
        );
    }

    #[test]
    fn test_variable_lookup() {
        let mut ctx = Context::new();
        ctx.insert("name", "Ada");
        assert_eq!(
            eval("return name;", &mut ctx).unwrap(),
            Value::String("Ada".to_string())
        );
        // Missing identifiers read as null.
        assert_eq!(eval("return missing;", &mut ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_member_and_index_access() {
        let mut ctx = Context::new();
        ctx.insert(
            "user",
            Value::Map(HashMap::from([(
                "name".to_string(),
                Value::String("Ada".to_string()),
            )])),
        );
        ctx.insert(
            "items",
            Value::List(vec![Value::String("a".to_string()), Value::String("b".to_string())]),
        );
        assert_eq!(
            eval("return user.name;", &mut ctx).unwrap(),
            Value::String("Ada".to_string())
        );
        assert_eq!(eval("return user.missing;", &mut ctx).unwrap(), Value::Null);
        assert_eq!(
            eval("return items[1];", &mut ctx).unwrap(),
            Value::String("b".to_string())
        );
        assert_eq!(eval("return items[5];", &mut ctx).unwrap(), Value::Null);
        assert_eq!(eval("return items.length;", &mut ctx).unwrap(), Value::Number(2.0));
        assert_eq!(
            eval("return 'abc'.length;", &mut ctx).unwrap(),
            Value::Number(3.0)
        );
    }

    #[test]
    fn test_member_access_on_null_fails() {
        let err = eval("return null.hello;", &mut Context::new()).unwrap_err();
        assert_eq!(err.message(), "cannot read property 'hello' of null");
    }

    #[test]
    fn test_scripts_and_locals() {
        let mut ctx = Context::new();
        ctx.insert("text", "Hello !");
        assert_eq!(
            eval("const myText = text + '!!'; return myText;", &mut ctx).unwrap(),
            Value::String("Hello !!!".to_string())
        );
        // Declarations are evaluation-local.
        assert!(!ctx.contains("myText"));
    }

    #[test]
    fn test_newline_separates_statements() {
        assert_eq!(
            eval_ok("let text = 'Hello !'\nreturn text"),
            Value::String("Hello !".to_string())
        );
    }

    #[test]
    fn test_script_without_return_yields_null() {
        let mut ctx = Context::new();
        assert_eq!(eval("x = 1;", &mut ctx).unwrap(), Value::Null);
        assert_eq!(ctx.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_context_alias_and_assignment() {
        let mut ctx = Context::new();
        eval("context.value = 1;", &mut ctx).unwrap();
        assert_eq!(ctx.get("value"), Some(&Value::Number(1.0)));
        eval("value += 1;", &mut ctx).unwrap();
        assert_eq!(ctx.get("value"), Some(&Value::Number(2.0)));
        assert_eq!(
            eval("return context.value;", &mut ctx).unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn test_nested_path_assignment() {
        let mut ctx = Context::new();
        ctx.insert(
            "user",
            Value::Map(HashMap::from([(
                "name".to_string(),
                Value::String("Ada".to_string()),
            )])),
        );
        eval("user.name = 'Grace'; user.age = 36;", &mut ctx).unwrap();
        match ctx.get("user") {
            Some(Value::Map(map)) => {
                assert_eq!(map["name"], Value::String("Grace".to_string()));
                assert_eq!(map["age"], Value::Number(36.0));
            }
            other => panic!("expected a map, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_to_undefined_root_fails() {
        let err = eval("ghost.field = 1;", &mut Context::new()).unwrap_err();
        assert_eq!(err.message(), "'ghost' is not defined");
    }

    #[test]
    fn test_syntax_errors() {
        assert!(eval("return 1 +;", &mut Context::new()).is_err());
        assert!(eval("return 'open;", &mut Context::new()).is_err());
        assert!(eval("return ~;", &mut Context::new()).is_err());
        assert!(eval("1 2", &mut Context::new()).is_err());
    }
}
