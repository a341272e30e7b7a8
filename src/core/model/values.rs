//! Policy and request tuples
//!
//! Both are ordered, value-compared sequences. Up to
//! [`INLINE_FIELDS`] fields are stored inline, longer rows spill to the heap
//! transparently, so one type covers every arity.

use crate::core::cache::push_key_part;
use crate::core::expr::Value;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

/// Number of fields kept inline before a tuple spills to the heap
pub const INLINE_FIELDS: usize = 12;

/// One policy row (`p` rule or `g` grouping rule)
///
/// Immutable once built; updates replace the whole row.
///
/// # Examples
/// ```
/// use warden_rs::PolicyValues;
///
/// let row = PolicyValues::from(["alice", "data1", "read"]);
/// assert_eq!(row.len(), 3);
/// assert_eq!(&row[1], "data1");
/// assert_eq!(row, PolicyValues::from(vec!["alice".to_string(), "data1".into(), "read".into()]));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PolicyValues(SmallVec<[String; INLINE_FIELDS]>);

impl PolicyValues {
    /// An empty row
    pub fn new() -> Self {
        PolicyValues(SmallVec::new())
    }

    /// A row of `len` empty strings, used when the matcher is evaluated
    /// without any policy row
    pub fn blank(len: usize) -> Self {
        PolicyValues((0..len).map(|_| String::new()).collect())
    }

    /// Whether the row is stored inline
    pub fn is_inline(&self) -> bool {
        !self.0.spilled()
    }

    /// Field at `index`, or `""` past the end
    pub fn field(&self, index: usize) -> &str {
        self.0.get(index).map(String::as_str).unwrap_or("")
    }

    /// Copy the row into a plain vector
    pub fn to_vec(&self) -> Vec<String> {
        self.0.to_vec()
    }

    /// Check whether the row matches `values` from `field_index` on; empty
    /// filter values match anything
    pub fn matches_filter(&self, field_index: usize, values: &[String]) -> bool {
        values.iter().enumerate().all(|(i, v)| {
            v.is_empty() || self.0.get(field_index + i).map(|f| f == v).unwrap_or(false)
        })
    }
}

impl Deref for PolicyValues {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Debug for PolicyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for PolicyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl From<Vec<String>> for PolicyValues {
    fn from(v: Vec<String>) -> Self {
        PolicyValues(SmallVec::from_vec(v))
    }
}

impl From<&[&str]> for PolicyValues {
    fn from(v: &[&str]) -> Self {
        PolicyValues(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PolicyValues {
    fn from(v: [&str; N]) -> Self {
        PolicyValues(v.iter().map(|s| s.to_string()).collect())
    }
}

impl FromIterator<String> for PolicyValues {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        PolicyValues(iter.into_iter().collect())
    }
}

/// One request field: a plain string or a structured (ABAC) object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestValue {
    Str(String),
    Object(serde_json::Value),
}

impl RequestValue {
    /// Borrow as a matcher value
    pub fn as_value(&self) -> Value<'_> {
        match self {
            RequestValue::Str(s) => Value::Str(Cow::Borrowed(s)),
            RequestValue::Object(o) => Value::Json(Cow::Borrowed(o)),
        }
    }

    /// Borrow the string form, if this is a plain string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RequestValue::Str(s) => Some(s),
            RequestValue::Object(serde_json::Value::String(s)) => Some(s),
            RequestValue::Object(_) => None,
        }
    }
}

impl From<&str> for RequestValue {
    fn from(s: &str) -> Self {
        RequestValue::Str(s.to_string())
    }
}

impl From<String> for RequestValue {
    fn from(s: String) -> Self {
        RequestValue::Str(s)
    }
}

impl From<&String> for RequestValue {
    fn from(s: &String) -> Self {
        RequestValue::Str(s.clone())
    }
}

impl From<serde_json::Value> for RequestValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) => RequestValue::Str(s),
            other => RequestValue::Object(other),
        }
    }
}

impl fmt::Display for RequestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestValue::Str(s) => write!(f, "{}", s),
            RequestValue::Object(o) => write!(f, "{}", o),
        }
    }
}

/// One request tuple bound to a request definition
///
/// # Examples
/// ```
/// use warden_rs::RequestValues;
///
/// let req = RequestValues::from(["alice", "data1", "read"]);
/// assert_eq!(req.cache_key(), "5:alice5:data14:read");
/// assert_eq!(req.to_string(), "alice, data1, read");
/// assert!(!req.has_objects());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestValues(SmallVec<[RequestValue; INLINE_FIELDS]>);

impl RequestValues {
    /// An empty request
    pub fn new() -> Self {
        RequestValues(SmallVec::new())
    }

    /// Append a field
    pub fn push(&mut self, value: impl Into<RequestValue>) {
        self.0.push(value.into());
    }

    /// Builder-style append
    pub fn with(mut self, value: impl Into<RequestValue>) -> Self {
        self.push(value);
        self
    }

    /// Whether any field is a structured object
    pub fn has_objects(&self) -> bool {
        self.0.iter().any(|v| matches!(v, RequestValue::Object(_)))
    }

    /// Canonical, order-preserving key for the decision cache
    ///
    /// Every field is written as `<byte length>:<text>`, so distinct requests
    /// never share a key whatever characters their values contain.
    pub fn cache_key(&self) -> String {
        let mut key = String::new();
        for v in self.0.iter() {
            match v {
                RequestValue::Str(s) => push_key_part(&mut key, s),
                RequestValue::Object(o) => {
                    key.push('@');
                    push_key_part(&mut key, &o.to_string());
                }
            }
        }
        key
    }
}

impl fmt::Display for RequestValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

impl Deref for RequestValues {
    type Target = [RequestValue];

    fn deref(&self) -> &[RequestValue] {
        &self.0
    }
}

impl<const N: usize> From<[&str; N]> for RequestValues {
    fn from(v: [&str; N]) -> Self {
        RequestValues(v.iter().map(|s| RequestValue::from(*s)).collect())
    }
}

impl From<&[&str]> for RequestValues {
    fn from(v: &[&str]) -> Self {
        RequestValues(v.iter().map(|s| RequestValue::from(*s)).collect())
    }
}

impl From<Vec<String>> for RequestValues {
    fn from(v: Vec<String>) -> Self {
        RequestValues(v.into_iter().map(RequestValue::Str).collect())
    }
}

impl From<Vec<RequestValue>> for RequestValues {
    fn from(v: Vec<RequestValue>) -> Self {
        RequestValues(SmallVec::from_vec(v))
    }
}

impl FromIterator<RequestValue> for RequestValues {
    fn from_iter<I: IntoIterator<Item = RequestValue>>(iter: I) -> Self {
        RequestValues(iter.into_iter().collect())
    }
}
