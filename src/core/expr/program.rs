//! Compiled matcher programs
//!
//! A [`Program`] is a parsed matcher with every `r.field` / `p.field`
//! reference resolved against the model's token tables. When both arities
//! fit the inline tuple size, references compile to column indices;
//! otherwise they stay as names and are looked up per evaluation.

use super::parser::{parse, BinaryOp, Expr, UnaryOp};
use super::value::Value;
use crate::core::functions::FunctionMap;
use crate::core::model::{RequestValue, INLINE_FIELDS};
use crate::error::{Result, WardenError};
use ahash::AHashMap;
use smallvec::SmallVec;
use std::borrow::Cow;

/// How field references are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Direct column index
    Positional,
    /// Name lookup through the token table at evaluation time
    Named,
}

impl Layout {
    /// Pick the layout for the given request and policy arities
    pub fn for_arity(request: usize, policy: usize) -> Layout {
        if request <= INLINE_FIELDS && policy <= INLINE_FIELDS {
            Layout::Positional
        } else {
            Layout::Named
        }
    }
}

/// Token tables a matcher is compiled against
#[derive(Debug, Clone, Copy)]
pub struct Scope<'s> {
    pub request_key: &'s str,
    pub request_tokens: &'s [String],
    pub policy_key: &'s str,
    pub policy_tokens: &'s [String],
}

/// Inputs for one evaluation
pub struct EvalContext<'a> {
    pub request: &'a [RequestValue],
    pub policy: &'a [String],
    pub functions: &'a FunctionMap,
}

#[derive(Debug, Clone)]
enum Node {
    Literal(Value<'static>),
    Request(usize),
    Policy(usize),
    RequestNamed(String),
    PolicyNamed(String),
    Member(Box<Node>, String),
    Call(String, Vec<Node>),
    Not(Box<Node>),
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    In(Box<Node>, Vec<Node>),
}

/// A matcher ready for repeated evaluation
#[derive(Debug, Clone)]
pub struct Program {
    root: Node,
    source: String,
    layout: Layout,
    uses_policy: bool,
    request_index: AHashMap<String, usize>,
    policy_index: AHashMap<String, usize>,
}

fn index_of(tokens: &[String]) -> AHashMap<String, usize> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, t)| (t.clone(), i))
        .collect()
}

impl Program {
    /// Compile `src` against `scope`, choosing the layout from its arities
    ///
    /// # Examples
    /// ```
    /// use warden_rs::expr::{EvalContext, Program, Scope};
    /// use warden_rs::functions::FunctionMap;
    /// use warden_rs::RequestValues;
    ///
    /// let r = vec!["sub".to_string(), "obj".to_string()];
    /// let p = r.clone();
    /// let scope = Scope { request_key: "r", request_tokens: &r, policy_key: "p", policy_tokens: &p };
    /// let program = Program::compile("r.sub == p.sub && r.obj == p.obj", &scope).unwrap();
    ///
    /// let request = RequestValues::from(["alice", "data1"]);
    /// let row = vec!["alice".to_string(), "data1".to_string()];
    /// let functions = FunctionMap::new();
    /// let ctx = EvalContext { request: &request, policy: &row, functions: &functions };
    /// assert!(program.eval(&ctx).unwrap());
    /// ```
    pub fn compile(src: &str, scope: &Scope<'_>) -> Result<Program> {
        let layout = Layout::for_arity(scope.request_tokens.len(), scope.policy_tokens.len());
        Self::compile_with_layout(src, scope, layout)
    }

    /// Compile with an explicit layout
    pub fn compile_with_layout(src: &str, scope: &Scope<'_>, layout: Layout) -> Result<Program> {
        let expr = parse(src)?;
        let mut program = Program {
            root: Node::Literal(Value::Null),
            source: src.to_string(),
            layout,
            uses_policy: false,
            request_index: index_of(scope.request_tokens),
            policy_index: index_of(scope.policy_tokens),
        };
        program.root = program.lower(&expr, scope)?;
        Ok(program)
    }

    /// The matcher text this program was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Whether the matcher references any policy field
    pub fn uses_policy(&self) -> bool {
        self.uses_policy
    }

    fn lower(&mut self, expr: &Expr, scope: &Scope<'_>) -> Result<Node> {
        Ok(match expr {
            Expr::Literal(v) => Node::Literal(v.clone()),
            Expr::Ident(name) => return Err(WardenError::UnknownToken(name.clone())),
            Expr::Member(base, field) => match base.as_ref() {
                Expr::Ident(section) if section == scope.request_key => {
                    let idx = *self.request_index.get(field).ok_or_else(|| {
                        WardenError::UnknownToken(format!("{}.{}", section, field))
                    })?;
                    match self.layout {
                        Layout::Positional => Node::Request(idx),
                        Layout::Named => Node::RequestNamed(field.clone()),
                    }
                }
                Expr::Ident(section) if section == scope.policy_key => {
                    let idx = *self.policy_index.get(field).ok_or_else(|| {
                        WardenError::UnknownToken(format!("{}.{}", section, field))
                    })?;
                    self.uses_policy = true;
                    match self.layout {
                        Layout::Positional => Node::Policy(idx),
                        Layout::Named => Node::PolicyNamed(field.clone()),
                    }
                }
                Expr::Ident(section) => {
                    return Err(WardenError::UnknownToken(format!("{}.{}", section, field)))
                }
                other => Node::Member(Box::new(self.lower(other, scope)?), field.clone()),
            },
            Expr::Call(name, args) => Node::Call(
                name.clone(),
                args.iter()
                    .map(|a| self.lower(a, scope))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Expr::Unary(UnaryOp::Not, inner) => Node::Not(Box::new(self.lower(inner, scope)?)),
            Expr::Unary(UnaryOp::Neg, inner) => Node::Neg(Box::new(self.lower(inner, scope)?)),
            Expr::Binary(op, l, r) => Node::Binary(
                *op,
                Box::new(self.lower(l, scope)?),
                Box::new(self.lower(r, scope)?),
            ),
            Expr::In(lhs, items) => Node::In(
                Box::new(self.lower(lhs, scope)?),
                items
                    .iter()
                    .map(|i| self.lower(i, scope))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    /// Evaluate to a boolean
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let v = self.eval_node(&self.root, ctx)?;
        v.as_bool().ok_or_else(|| {
            WardenError::ExpressionType(format!(
                "matcher must evaluate to bool, got {}",
                v.type_name()
            ))
        })
    }

    fn request<'a>(&self, ctx: &EvalContext<'a>, idx: usize) -> Result<Value<'a>> {
        ctx.request
            .get(idx)
            .map(RequestValue::as_value)
            .ok_or(WardenError::RequestArity {
                expected: self.request_index.len(),
                actual: ctx.request.len(),
            })
    }

    fn policy<'a>(&self, ctx: &EvalContext<'a>, idx: usize) -> Result<Value<'a>> {
        ctx.policy
            .get(idx)
            .map(|s| Value::Str(Cow::Borrowed(s.as_str())))
            .ok_or(WardenError::PolicyArity {
                expected: self.policy_index.len(),
                actual: ctx.policy.len(),
            })
    }

    fn eval_node<'a>(&'a self, node: &'a Node, ctx: &EvalContext<'a>) -> Result<Value<'a>> {
        match node {
            Node::Literal(v) => Ok(match v {
                Value::Str(s) => Value::Str(Cow::Borrowed(s.as_ref())),
                other => other.clone(),
            }),
            Node::Request(idx) => self.request(ctx, *idx),
            Node::Policy(idx) => self.policy(ctx, *idx),
            Node::RequestNamed(name) => {
                let idx = self
                    .request_index
                    .get(name)
                    .copied()
                    .ok_or_else(|| WardenError::UnknownToken(name.clone()))?;
                self.request(ctx, idx)
            }
            Node::PolicyNamed(name) => {
                let idx = self
                    .policy_index
                    .get(name)
                    .copied()
                    .ok_or_else(|| WardenError::UnknownToken(name.clone()))?;
                self.policy(ctx, idx)
            }
            Node::Member(base, name) => self.eval_node(base, ctx)?.member(name),
            Node::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|a| self.eval_node(a, ctx))
                    .collect::<Result<SmallVec<[Value<'a>; 4]>>>()?;
                ctx.functions.call(name, &values)
            }
            Node::Not(inner) => Ok(Value::Bool(!self.eval_bool(inner, ctx)?)),
            Node::Neg(inner) => self.eval_node(inner, ctx)?.negate(),
            Node::Binary(BinaryOp::And, l, r) => {
                Ok(Value::Bool(self.eval_bool(l, ctx)? && self.eval_bool(r, ctx)?))
            }
            Node::Binary(BinaryOp::Or, l, r) => {
                Ok(Value::Bool(self.eval_bool(l, ctx)? || self.eval_bool(r, ctx)?))
            }
            Node::Binary(op, l, r) => {
                let lhs = self.eval_node(l, ctx)?;
                let rhs = self.eval_node(r, ctx)?;
                binary(*op, &lhs, &rhs)
            }
            Node::In(lhs, items) => {
                let needle = self.eval_node(lhs, ctx)?;
                for item in items {
                    let candidate = self.eval_node(item, ctx)?;
                    let hit = match &candidate {
                        Value::Json(j) if j.is_array() => j
                            .as_array()
                            .map(|arr| {
                                arr.iter()
                                    .any(|e| needle.loose_eq(&Value::Json(Cow::Borrowed(e))))
                            })
                            .unwrap_or(false),
                        other => needle.loose_eq(other),
                    };
                    if hit {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
        }
    }

    fn eval_bool<'a>(&'a self, node: &'a Node, ctx: &EvalContext<'a>) -> Result<bool> {
        let v = self.eval_node(node, ctx)?;
        v.as_bool().ok_or_else(|| {
            WardenError::ExpressionType(format!("expected bool operand, got {}", v.type_name()))
        })
    }
}

fn binary(op: BinaryOp, lhs: &Value<'_>, rhs: &Value<'_>) -> Result<Value<'static>> {
    use std::cmp::Ordering::*;
    Ok(match op {
        BinaryOp::Eq => Value::Bool(lhs.loose_eq(rhs)),
        BinaryOp::Ne => Value::Bool(!lhs.loose_eq(rhs)),
        BinaryOp::Lt => Value::Bool(lhs.compare(rhs)? == Less),
        BinaryOp::Le => Value::Bool(lhs.compare(rhs)? != Greater),
        BinaryOp::Gt => Value::Bool(lhs.compare(rhs)? == Greater),
        BinaryOp::Ge => Value::Bool(lhs.compare(rhs)? != Less),
        BinaryOp::Add => lhs.arith('+', rhs)?,
        BinaryOp::Sub => lhs.arith('-', rhs)?,
        BinaryOp::Mul => lhs.arith('*', rhs)?,
        BinaryOp::Div => lhs.arith('/', rhs)?,
        BinaryOp::Rem => lhs.arith('%', rhs)?,
        BinaryOp::And | BinaryOp::Or => {
            let (a, b) = (lhs.as_bool(), rhs.as_bool());
            match (a, b) {
                (Some(a), Some(b)) if op == BinaryOp::And => Value::Bool(a && b),
                (Some(a), Some(b)) => Value::Bool(a || b),
                _ => {
                    return Err(WardenError::ExpressionType(
                        "logical operator on non-bool".to_string(),
                    ))
                }
            }
        }
    })
}
