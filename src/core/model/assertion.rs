//! One model definition line and the policy rows bound to it

use super::store::PolicyStore;
use ahash::AHashMap;

/// A named definition within a model section
///
/// For `r` and `p` definitions the tokens are field names (`sub`, `obj`,
/// `act`, ...). For `g` definitions they are `_` placeholders and only
/// their count matters. `e` and `m` carry just the expression text.
#[derive(Debug, Clone, Default)]
pub struct Assertion {
    /// Type name, e.g. `p`, `p2`, `g`
    pub key: String,
    /// Definition text as written
    pub value: String,
    /// Declared field names in column order
    pub tokens: Vec<String>,
    token_index: AHashMap<String, usize>,
    /// Rows loaded under this type (`p` and `g` sections only)
    pub policy: PolicyStore,
}

impl Assertion {
    pub fn new(key: impl Into<String>, value: impl Into<String>, tokens: Vec<String>) -> Self {
        let token_index = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Assertion {
            key: key.into(),
            value: value.into(),
            tokens,
            token_index,
            policy: PolicyStore::new(),
        }
    }

    /// Column index of a field
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.token_index.get(field).copied()
    }

    /// Number of declared fields
    pub fn arity(&self) -> usize {
        self.tokens.len()
    }

    pub fn has_token(&self, field: &str) -> bool {
        self.token_index.contains_key(field)
    }
}
