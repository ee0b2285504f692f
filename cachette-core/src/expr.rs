//! Built-in expression language for `condition`, `post_condition` and `key`.
//!
//! Expressions are evaluated against the invocation's arguments (by name or
//! through the `args` array), an optional `target` object and, for the
//! post-condition only, the just-computed `result`. Evaluation is
//! side-effect-free and fails closed: any error disables caching for the
//! single call it occurred in.
//!
//! The language covers literals (`null`, booleans, integers, floats, single-
//! or double-quoted strings), unary `!` and `-`, arithmetic (`+` concatenates
//! when either operand is a string), comparisons, equality, short-circuit
//! `&&`/`||`, field access `a.b` (missing field yields `null`), indexing
//! `a[0]` / `a['k']` and the postfix helpers `len()` (alias `size()`),
//! `is_empty()`, `contains(x)`, `starts_with(s)` and `ends_with(s)`.
//!
//! Conditions must evaluate to a boolean; there is no truthiness coercion.

use serde_json::Value;

use crate::error::ExprError;

/// A compiled, reusable expression.
///
/// Compilation happens once per declaration at resolution time; evaluation
/// happens per call.
pub trait CompiledExpression: Send + Sync {
    fn evaluate(&self, bindings: &Bindings<'_>) -> Result<Value, ExprError>;

    /// Evaluates and requires a boolean result.
    fn evaluate_bool(&self, bindings: &Bindings<'_>) -> Result<bool, ExprError> {
        match self.evaluate(bindings)? {
            Value::Bool(b) => Ok(b),
            _ => Err(ExprError::NotBoolean),
        }
    }

    fn source(&self) -> &str;
}

/// Pluggable expression compiler.
///
/// The engine's contract with the rest of the crate is purely this trait; a
/// different language can be swapped in through
/// [`GlobalConfigBuilder::expression_engine`](crate::GlobalConfigBuilder::expression_engine).
pub trait ExpressionEngine: Send + Sync {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledExpression>, ExprError>;
}

/// The default expression engine.
///
/// # Examples
///
/// ```
/// use cachette_core::{Bindings, BuiltinEngine, ExpressionEngine};
/// use serde_json::json;
///
/// let engine = BuiltinEngine;
/// let expr = engine.compile("id > 0 && name.starts_with('a')").unwrap();
///
/// let args = [("id", json!(7)), ("name", json!("alice"))];
/// let bindings = Bindings::new(&args);
/// assert_eq!(expr.evaluate(&bindings).unwrap(), json!(true));
/// ```
pub struct BuiltinEngine;

impl ExpressionEngine for BuiltinEngine {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledExpression>, ExprError> {
        let tokens = lex(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let ast = parser.parse_expr()?;
        parser.expect_end()?;
        Ok(Box::new(BuiltinExpression {
            source: source.to_string(),
            ast,
        }))
    }
}

/// Values visible to an expression during one invocation.
///
/// Argument lookup comes first, so a parameter named `result` shadows the
/// result binding.
pub struct Bindings<'a> {
    args: &'a [(&'static str, Value)],
    target: Option<&'a Value>,
    result: Option<&'a Value>,
}

impl<'a> Bindings<'a> {
    pub fn new(args: &'a [(&'static str, Value)]) -> Self {
        Self {
            args,
            target: None,
            result: None,
        }
    }

    pub fn with_target(mut self, target: &'a Value) -> Self {
        self.target = Some(target);
        self
    }

    /// Binds `result` for post-condition evaluation. A null computation
    /// result binds as JSON `null`.
    pub fn with_result(mut self, result: &'a Value) -> Self {
        self.result = Some(result);
        self
    }

    fn lookup(&self, name: &str) -> Result<Value, ExprError> {
        if let Some((_, value)) = self.args.iter().find(|(n, _)| *n == name) {
            return Ok(value.clone());
        }
        match name {
            "args" => Ok(Value::Array(
                self.args.iter().map(|(_, v)| v.clone()).collect(),
            )),
            "result" => self
                .result
                .cloned()
                .ok_or_else(|| ExprError::UnknownIdentifier("result".to_string())),
            "target" => self
                .target
                .cloned()
                .ok_or_else(|| ExprError::UnknownIdentifier("target".to_string())),
            other => Err(ExprError::UnknownIdentifier(other.to_string())),
        }
    }
}

struct BuiltinExpression {
    source: String,
    ast: Expr,
}

impl CompiledExpression for BuiltinExpression {
    fn evaluate(&self, bindings: &Bindings<'_>) -> Result<Value, ExprError> {
        eval(&self.ast, bindings)
    }

    fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Punct(&'static str),
}

fn lex(src: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            out.push((offset, Token::Ident(text)));
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].1.is_ascii_digit() {
                i += 1;
            }
            let mut is_float = false;
            if i + 1 < chars.len() && chars[i].1 == '.' && chars[i + 1].1.is_ascii_digit() {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].1.is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            let token = if is_float {
                Token::Float(
                    text.parse()
                        .map_err(|_| ExprError::parse(offset, "invalid number"))?,
                )
            } else {
                Token::Int(
                    text.parse()
                        .map_err(|_| ExprError::parse(offset, "integer out of range"))?,
                )
            };
            out.push((offset, token));
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut text = String::new();
            let mut closed = false;
            while i < chars.len() {
                let ch = chars[i].1;
                if ch == '\\' && i + 1 < chars.len() {
                    let next = chars[i + 1].1;
                    text.push(match next {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    i += 2;
                    continue;
                }
                if ch == quote {
                    closed = true;
                    i += 1;
                    break;
                }
                text.push(ch);
                i += 1;
            }
            if !closed {
                return Err(ExprError::parse(offset, "unterminated string literal"));
            }
            out.push((offset, Token::Str(text)));
            continue;
        }
        const TWO_CHAR: &[&str] = &["&&", "||", "==", "!=", "<=", ">="];
        const ONE_CHAR: &[&str] = &[
            "!", "<", ">", "+", "-", "*", "/", "%", "(", ")", "[", "]", ".", ",",
        ];
        let rest = &src[offset..];
        if let Some(p) = TWO_CHAR.iter().copied().find(|p| rest.starts_with(p)) {
            out.push((offset, Token::Punct(p)));
            i += 2;
            continue;
        }
        if let Some(p) = ONE_CHAR.iter().copied().find(|p| rest.starts_with(p)) {
            out.push((offset, Token::Punct(p)));
            i += 1;
            continue;
        }
        return Err(ExprError::parse(offset, format!("unexpected character `{c}`")));
    }
    Ok(out)
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Ident(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(0)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), ExprError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(ExprError::parse(self.offset(), format!("expected `{punct}`")))
        }
    }

    fn expect_end(&self) -> Result<(), ExprError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(ExprError::parse(self.offset(), "unexpected trailing tokens"))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat_punct("||") {
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_equality()?;
        while self.eat_punct("&&") {
            let right = self.parse_equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = if self.eat_punct("==") {
                BinOp::Eq
            } else if self.eat_punct("!=") {
                BinOp::Ne
            } else {
                break;
            };
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.eat_punct("<=") {
                BinOp::Le
            } else if self.eat_punct(">=") {
                BinOp::Ge
            } else if self.eat_punct("<") {
                BinOp::Lt
            } else if self.eat_punct(">") {
                BinOp::Gt
            } else {
                break;
            };
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_punct("+") {
                BinOp::Add
            } else if self.eat_punct("-") {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.eat_punct("*") {
                BinOp::Mul
            } else if self.eat_punct("/") {
                BinOp::Div
            } else if self.eat_punct("%") {
                BinOp::Mod
            } else {
                break;
            };
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_punct("!") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat_punct("-") {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                let name = match self.bump() {
                    Some(Token::Ident(name)) => name,
                    _ => {
                        return Err(ExprError::parse(
                            self.offset(),
                            "expected identifier after `.`",
                        ))
                    }
                };
                if self.eat_punct("(") {
                    let mut call_args = Vec::new();
                    if !self.eat_punct(")") {
                        loop {
                            call_args.push(self.parse_expr()?);
                            if self.eat_punct(")") {
                                break;
                            }
                            self.expect_punct(",")?;
                        }
                    }
                    expr = Expr::Call(Box::new(expr), name, call_args);
                } else {
                    expr = Expr::Field(Box::new(expr), name);
                }
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.bump() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::from(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(name)) => match name.as_str() {
                "null" => Ok(Expr::Literal(Value::Null)),
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                _ => Ok(Expr::Ident(name)),
            },
            Some(Token::Punct("(")) => {
                let expr = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            _ => Err(ExprError::parse(offset, "expected expression")),
        }
    }
}

fn eval(expr: &Expr, bindings: &Bindings<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => bindings.lookup(name),
        Expr::Not(inner) => match eval(inner, bindings)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(ExprError::type_error(format!("`!` applied to {}", kind(&other)))),
        },
        Expr::Neg(inner) => {
            let value = eval(inner, bindings)?;
            if let Some(n) = value.as_i64().and_then(i64::checked_neg) {
                Ok(Value::from(n))
            } else if let Some(f) = value.as_f64() {
                Ok(Value::from(-f))
            } else {
                Err(ExprError::type_error(format!(
                    "unary `-` applied to {}",
                    kind(&value)
                )))
            }
        }
        Expr::Binary(op, left, right) => eval_binary(*op, left, right, bindings),
        Expr::Field(receiver, name) => match eval(receiver, bindings)? {
            Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            other => Err(ExprError::type_error(format!(
                "field access `.{name}` on {}",
                kind(&other)
            ))),
        },
        Expr::Index(receiver, index) => {
            let receiver = eval(receiver, bindings)?;
            let index = eval(index, bindings)?;
            match (&receiver, &index) {
                (Value::Array(items), _) if index.as_i64().is_some() => {
                    let i = index.as_i64().unwrap_or(0);
                    if i < 0 {
                        return Ok(Value::Null);
                    }
                    Ok(items.get(i as usize).cloned().unwrap_or(Value::Null))
                }
                (Value::Object(map), Value::String(key)) => {
                    Ok(map.get(key).cloned().unwrap_or(Value::Null))
                }
                _ => Err(ExprError::type_error(format!(
                    "cannot index {} with {}",
                    kind(&receiver),
                    kind(&index)
                ))),
            }
        }
        Expr::Call(receiver, method, call_args) => {
            let receiver = eval(receiver, bindings)?;
            let call_args = call_args
                .iter()
                .map(|a| eval(a, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            eval_method(&receiver, method, &call_args)
        }
    }
}

fn eval_binary(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    bindings: &Bindings<'_>,
) -> Result<Value, ExprError> {
    // && and || short-circuit; everything else evaluates both sides.
    if matches!(op, BinOp::And | BinOp::Or) {
        let lhs = require_bool(eval(left, bindings)?, "left operand")?;
        return match (op, lhs) {
            (BinOp::And, false) => Ok(Value::Bool(false)),
            (BinOp::Or, true) => Ok(Value::Bool(true)),
            _ => {
                let rhs = require_bool(eval(right, bindings)?, "right operand")?;
                Ok(Value::Bool(rhs))
            }
        };
    }

    let lhs = eval(left, bindings)?;
    let rhs = eval(right, bindings)?;
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, &lhs, &rhs),
        BinOp::Add => {
            if lhs.is_string() || rhs.is_string() {
                return Ok(Value::String(format!(
                    "{}{}",
                    stringify(&lhs),
                    stringify(&rhs)
                )));
            }
            arith(op, &lhs, &rhs)
        }
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => arith(op, &lhs, &rhs),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn eval_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, ExprError> {
    match method {
        "len" | "size" => {
            require_arity(method, args, 0)?;
            let len = match receiver {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(ExprError::type_error(format!(
                        "`{method}()` on {}",
                        kind(other)
                    )))
                }
            };
            Ok(Value::from(len as i64))
        }
        "is_empty" => {
            require_arity(method, args, 0)?;
            let empty = match receiver {
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                other => {
                    return Err(ExprError::type_error(format!(
                        "`is_empty()` on {}",
                        kind(other)
                    )))
                }
            };
            Ok(Value::Bool(empty))
        }
        "contains" => {
            require_arity(method, args, 1)?;
            let needle = &args[0];
            let found = match receiver {
                Value::String(s) => match needle {
                    Value::String(sub) => s.contains(sub.as_str()),
                    other => {
                        return Err(ExprError::type_error(format!(
                            "`contains` needle must be a string, got {}",
                            kind(other)
                        )))
                    }
                },
                Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
                Value::Object(map) => match needle {
                    Value::String(key) => map.contains_key(key),
                    other => {
                        return Err(ExprError::type_error(format!(
                            "`contains` key must be a string, got {}",
                            kind(other)
                        )))
                    }
                },
                other => {
                    return Err(ExprError::type_error(format!(
                        "`contains` on {}",
                        kind(other)
                    )))
                }
            };
            Ok(Value::Bool(found))
        }
        "starts_with" | "ends_with" => {
            require_arity(method, args, 1)?;
            let (Value::String(s), Value::String(needle)) = (receiver, &args[0]) else {
                return Err(ExprError::type_error(format!(
                    "`{method}` requires string receiver and argument"
                )));
            };
            let matched = if method == "starts_with" {
                s.starts_with(needle.as_str())
            } else {
                s.ends_with(needle.as_str())
            };
            Ok(Value::Bool(matched))
        }
        other => Err(ExprError::type_error(format!("unknown method `{other}`"))),
    }
}

fn require_arity(method: &str, args: &[Value], expected: usize) -> Result<(), ExprError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ExprError::type_error(format!(
            "`{method}` expects {expected} argument(s), got {}",
            args.len()
        )))
    }
}

fn require_bool(value: Value, position: &str) -> Result<bool, ExprError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(ExprError::type_error(format!(
            "{position} of a logical operator is {}, expected boolean",
            kind(&other)
        ))),
    }
}

/// Numeric values compare by value regardless of integer/float representation.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn compare(op: BinOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        let result = match op {
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!(),
        };
        return Ok(Value::Bool(result));
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        let result = match op {
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!(),
        };
        return Ok(Value::Bool(result));
    }
    Err(ExprError::type_error(format!(
        "cannot compare {} with {}",
        kind(left),
        kind(right)
    )))
}

fn arith(op: BinOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return match op {
            BinOp::Add => Ok(Value::from(a.wrapping_add(b))),
            BinOp::Sub => Ok(Value::from(a.wrapping_sub(b))),
            BinOp::Mul => Ok(Value::from(a.wrapping_mul(b))),
            BinOp::Div if b == 0 => Err(ExprError::type_error("division by zero")),
            BinOp::Div => Ok(Value::from(a / b)),
            BinOp::Mod if b == 0 => Err(ExprError::type_error("modulo by zero")),
            BinOp::Mod => Ok(Value::from(a % b)),
            _ => unreachable!(),
        };
    }
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(ExprError::type_error(format!(
            "arithmetic on {} and {}",
            kind(left),
            kind(right)
        )));
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        _ => unreachable!(),
    };
    Ok(Value::from(result))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_with(src: &str, args: &[(&'static str, Value)]) -> Result<Value, ExprError> {
        let expr = BuiltinEngine.compile(src)?;
        expr.evaluate(&Bindings::new(args))
    }

    fn eval_ok(src: &str, args: &[(&'static str, Value)]) -> Value {
        eval_with(src, args).unwrap()
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval_ok("null", &[]), json!(null));
        assert_eq!(eval_ok("true", &[]), json!(true));
        assert_eq!(eval_ok("42", &[]), json!(42));
        assert_eq!(eval_ok("3.5", &[]), json!(3.5));
        assert_eq!(eval_ok("'hi'", &[]), json!("hi"));
        assert_eq!(eval_ok("\"there\"", &[]), json!("there"));
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval_ok("1 + 2 * 3", &[]), json!(7));
        assert_eq!(eval_ok("(1 + 2) * 3", &[]), json!(9));
        assert_eq!(eval_ok("10 / 4", &[]), json!(2));
        assert_eq!(eval_ok("10.0 / 4", &[]), json!(2.5));
        assert_eq!(eval_ok("7 % 3", &[]), json!(1));
        assert_eq!(eval_ok("-2 + 5", &[]), json!(3));
    }

    #[test]
    fn test_negating_i64_min_widens_to_float() {
        // i64::MIN has no i64 negation; the result must stay numeric
        // instead of panicking on overflow
        let args = [("n", json!(i64::MIN))];
        assert_eq!(eval_ok("-n", &args), json!(-(i64::MIN as f64)));
    }

    #[test]
    fn test_string_concat() {
        let args = [("id", json!(7))];
        assert_eq!(eval_ok("'user:' + id", &args), json!("user:7"));
    }

    #[test]
    fn test_comparisons_and_equality() {
        let args = [("id", json!(7)), ("name", json!("alice"))];
        assert_eq!(eval_ok("id > 0", &args), json!(true));
        assert_eq!(eval_ok("id <= 6", &args), json!(false));
        assert_eq!(eval_ok("name == 'alice'", &args), json!(true));
        assert_eq!(eval_ok("name != 'bob'", &args), json!(true));
        // integers and floats compare by numeric value
        assert_eq!(eval_ok("7 == 7.0", &args), json!(true));
        assert_eq!(eval_ok("'abc' < 'abd'", &args), json!(true));
    }

    #[test]
    fn test_logical_short_circuit() {
        // `missing` is unbound; short-circuit must prevent its evaluation
        assert_eq!(eval_ok("false && missing", &[]), json!(false));
        assert_eq!(eval_ok("true || missing", &[]), json!(true));
        assert_eq!(eval_ok("!false", &[]), json!(true));
    }

    #[test]
    fn test_no_truthiness_coercion() {
        assert!(matches!(eval_with("1 && true", &[]), Err(ExprError::Type(_))));
        let expr = BuiltinEngine.compile("1 + 1").unwrap();
        assert!(matches!(
            expr.evaluate_bool(&Bindings::new(&[])),
            Err(ExprError::NotBoolean)
        ));
    }

    #[test]
    fn test_field_access() {
        let args = [("user", json!({"id": 3, "address": {"city": "Oslo"}}))];
        assert_eq!(eval_ok("user.id", &args), json!(3));
        assert_eq!(eval_ok("user.address.city", &args), json!("Oslo"));
        // missing fields yield null rather than an error
        assert_eq!(eval_ok("user.missing", &args), json!(null));
        assert_eq!(eval_ok("user.missing.deeper", &args), json!(null));
    }

    #[test]
    fn test_indexing() {
        let args = [("items", json!([10, 20, 30])), ("map", json!({"k": 1}))];
        assert_eq!(eval_ok("items[1]", &args), json!(20));
        assert_eq!(eval_ok("items[9]", &args), json!(null));
        assert_eq!(eval_ok("map['k']", &args), json!(1));
        assert_eq!(eval_ok("args[0][2]", &args), json!(30));
    }

    #[test]
    fn test_methods() {
        let args = [
            ("name", json!("alice")),
            ("items", json!([1, 2, 3])),
            ("empty", json!([])),
        ];
        assert_eq!(eval_ok("name.len()", &args), json!(5));
        assert_eq!(eval_ok("items.size()", &args), json!(3));
        assert_eq!(eval_ok("empty.is_empty()", &args), json!(true));
        assert_eq!(eval_ok("items.contains(2)", &args), json!(true));
        assert_eq!(eval_ok("name.contains('lic')", &args), json!(true));
        assert_eq!(eval_ok("name.starts_with('al')", &args), json!(true));
        assert_eq!(eval_ok("name.ends_with('ce')", &args), json!(true));
    }

    #[test]
    fn test_result_binding() {
        let expr = BuiltinEngine
            .compile("result != null && !result.is_empty()")
            .unwrap();
        let full = json!([1, 2]);
        let bindings = Bindings::new(&[]).with_result(&full);
        assert_eq!(expr.evaluate(&bindings).unwrap(), json!(true));

        let null = json!(null);
        let bindings = Bindings::new(&[]).with_result(&null);
        assert_eq!(expr.evaluate(&bindings).unwrap(), json!(false));
    }

    #[test]
    fn test_unbound_result_is_an_error() {
        let expr = BuiltinEngine.compile("result == null").unwrap();
        assert!(matches!(
            expr.evaluate(&Bindings::new(&[])),
            Err(ExprError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn test_unknown_identifier_fails_closed() {
        assert!(matches!(
            eval_with("nope > 1", &[]),
            Err(ExprError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(BuiltinEngine.compile("1 +").is_err());
        assert!(BuiltinEngine.compile("'unterminated").is_err());
        assert!(BuiltinEngine.compile("a ^ b").is_err());
        assert!(BuiltinEngine.compile("a b").is_err());
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(eval_with("1 / 0", &[]), Err(ExprError::Type(_))));
    }

    #[test]
    fn test_target_binding() {
        let target = json!({"region": "eu"});
        let expr = BuiltinEngine.compile("target.region == 'eu'").unwrap();
        let bindings = Bindings::new(&[]).with_target(&target);
        assert_eq!(expr.evaluate(&bindings).unwrap(), json!(true));
    }
}
