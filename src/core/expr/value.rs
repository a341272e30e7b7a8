//! Runtime values produced while evaluating a matcher

use crate::error::{Result, WardenError};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// A value flowing through matcher evaluation
///
/// Strings borrowed from request and policy tuples stay borrowed, so field
/// access in the positional fast path does not allocate.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Cow<'a, str>),
    Json(Cow<'a, serde_json::Value>),
}

impl<'a> Value<'a> {
    /// Borrow a string value (plain string or JSON string)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Json(j) => j.as_str(),
            _ => None,
        }
    }

    /// Get a boolean value (plain bool or JSON bool)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Json(j) => j.as_bool(),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::Str(s) => parse_number(s),
            Value::Json(j) => match j.as_ref() {
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(Number::Int)
                    .or_else(|| n.as_f64().map(Number::Float)),
                serde_json::Value::String(s) => parse_number(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// Detach from borrowed tuples
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(b),
            Value::Int(i) => Value::Int(i),
            Value::Float(f) => Value::Float(f),
            Value::Str(s) => Value::Str(Cow::Owned(s.into_owned())),
            Value::Json(j) => Value::Json(Cow::Owned(j.into_owned())),
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Json(_) => "object",
        }
    }

    /// Access a named member of a JSON object value
    pub fn member(&self, name: &str) -> Result<Value<'static>> {
        match self {
            Value::Json(j) => match j.get(name) {
                Some(v) => Ok(from_json(v)),
                None => Ok(Value::Null),
            },
            other => Err(WardenError::ExpressionType(format!(
                "cannot access member '{}' of {}",
                name,
                other.type_name()
            ))),
        }
    }

    /// Equality used by `==`, `!=` and `in`
    pub fn loose_eq(&self, other: &Value<'_>) -> bool {
        if let (Some(a), Some(b)) = (self.as_str(), other.as_str()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.as_bool(), other.as_bool()) {
            return a == b;
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.cmp_with(b) == Some(Ordering::Equal),
                _ => false,
            },
        }
    }

    /// Ordering used by `<`, `<=`, `>` and `>=`
    pub fn compare(&self, other: &Value<'_>) -> Result<Ordering> {
        let numeric = matches!(self, Value::Int(_) | Value::Float(_))
            || matches!(other, Value::Int(_) | Value::Float(_));
        if !numeric {
            if let (Some(a), Some(b)) = (self.as_str(), other.as_str()) {
                return Ok(a.cmp(b));
            }
        }
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp_with(b).ok_or_else(|| {
                WardenError::ExpressionType("cannot order NaN".to_string())
            }),
            _ => Err(WardenError::ExpressionType(format!(
                "cannot compare {} with {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }
}

impl Value<'_> {
    /// Apply an arithmetic operator; `+` on two non-numeric strings concatenates
    pub(crate) fn arith(&self, op: char, other: &Value<'_>) -> Result<Value<'static>> {
        if op == '+' {
            let numeric = matches!(self, Value::Int(_) | Value::Float(_))
                || matches!(other, Value::Int(_) | Value::Float(_));
            if !numeric {
                if let (Some(a), Some(b)) = (self.as_str(), other.as_str()) {
                    return Ok(Value::from(format!("{}{}", a, b)));
                }
            }
        }

        let (a, b) = match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(WardenError::ExpressionType(format!(
                    "cannot apply '{}' to {} and {}",
                    op,
                    self.type_name(),
                    other.type_name()
                )))
            }
        };

        if let (Number::Int(x), Number::Int(y)) = (a, b) {
            let r = match op {
                '+' => x.checked_add(y),
                '-' => x.checked_sub(y),
                '*' => x.checked_mul(y),
                '/' if y != 0 && x.checked_rem(y) == Some(0) => x.checked_div(y),
                '/' if y != 0 => return Ok(Value::Float(x as f64 / y as f64)),
                '%' if y != 0 => x.checked_rem(y),
                '/' | '%' => {
                    return Err(WardenError::ExpressionType("division by zero".to_string()))
                }
                _ => None,
            };
            if let Some(r) = r {
                return Ok(Value::Int(r));
            }
        }

        let (x, y) = (a.as_f64(), b.as_f64());
        let r = match op {
            '+' => x + y,
            '-' => x - y,
            '*' => x * y,
            '/' => x / y,
            '%' => x % y,
            _ => {
                return Err(WardenError::ExpressionType(format!(
                    "unknown operator '{}'",
                    op
                )))
            }
        };
        Ok(Value::Float(r))
    }

    /// Numeric negation
    pub(crate) fn negate(&self) -> Result<Value<'static>> {
        match self.as_number() {
            Some(Number::Int(i)) => Ok(i.checked_neg().map(Value::Int).unwrap_or(Value::Float(-(i as f64)))),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(WardenError::ExpressionType(format!(
                "cannot negate {}",
                self.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Json(j) => match j.as_ref() {
                serde_json::Value::String(s) => write!(f, "{}", s),
                other => write!(f, "{}", other),
            },
        }
    }
}

impl From<bool> for Value<'static> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value<'static> {
    fn from(s: String) -> Self {
        Value::Str(Cow::Owned(s))
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }
}

/// Convert a JSON member into the closest plain value
pub(crate) fn from_json(v: &serde_json::Value) -> Value<'static> {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::String(s) => Value::Str(Cow::Owned(s.clone())),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        other => Value::Json(Cow::Owned(other.clone())),
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn cmp_with(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    s.parse::<i64>()
        .map(Number::Int)
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(Number::Float))
}
