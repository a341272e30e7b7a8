//! Built-in matching functions and the function registry
//!
//! Matcher expressions call functions by name. Each one is a first-class
//! closure taking evaluated arguments, so built-ins, role predicates
//! (`g`, `g2`, ...) and host-supplied functions are registered the same way.
//!
//! Built-ins:
//! - `keyMatch`, `keyMatch2`, `keyMatch3`, `keyMatch4`, `keyMatch5`
//! - `keyGet`, `keyGet2`, `keyGet3`
//! - `regexMatch`, `globMatch`, `ipMatch`

mod ip;
mod key;
mod pattern;

pub use ip::ip_match;
pub use key::{key_get, key_get2, key_get3, key_match, key_match2, key_match3, key_match4, key_match5};
pub use pattern::{
    glob_match, regex_match, PatternCache, DEFAULT_LOCK_TIMEOUT, DEFAULT_PATTERN_CACHE_CAPACITY,
};

use crate::core::expr::Value;
use crate::core::rbac::MatchingFn;
use crate::error::{Result, WardenError};
use ahash::AHashMap;
use std::sync::Arc;
use tracing::warn;

/// A function callable from a matcher expression
pub type Function = Arc<dyn for<'a> Fn(&[Value<'a>]) -> Result<Value<'static>> + Send + Sync>;

/// Wrap a closure as a [`Function`]
///
/// # Examples
/// ```
/// use warden_rs::functions::{function, FunctionMap};
/// use warden_rs::expr::Value;
///
/// let mut fm = FunctionMap::new();
/// fm.add("isOwner", function(|args| {
///     Ok(Value::Bool(args.first().and_then(|v| v.as_str()) == Some("alice")))
/// }));
/// assert!(fm.contains("isOwner"));
/// ```
pub fn function<F>(f: F) -> Function
where
    F: for<'a> Fn(&[Value<'a>]) -> Result<Value<'static>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Check the argument count and borrow every argument as a string
pub fn string_args<'v>(name: &str, args: &'v [Value<'_>], expected: usize) -> Result<Vec<&'v str>> {
    if args.len() != expected {
        return Err(WardenError::ArgumentCount {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: args.len(),
        });
    }
    args.iter()
        .map(|v| {
            v.as_str().ok_or_else(|| {
                WardenError::ExpressionType(format!(
                    "{} expects string arguments, got {}",
                    name,
                    v.type_name()
                ))
            })
        })
        .collect()
}

fn bool_fn(name: &'static str, f: fn(&PatternCache, &str, &str) -> bool, cache: Arc<PatternCache>) -> Function {
    function(move |args| {
        let a = string_args(name, args, 2)?;
        Ok(Value::Bool(f(&cache, a[0], a[1])))
    })
}

/// Registry of functions callable from matchers
#[derive(Clone, Default)]
pub struct FunctionMap {
    functions: AHashMap<String, Function>,
}

impl FunctionMap {
    /// An empty registry
    pub fn new() -> Self {
        FunctionMap {
            functions: AHashMap::new(),
        }
    }

    /// A registry with every built-in, sharing `cache` for compiled patterns
    pub fn with_builtins(cache: Arc<PatternCache>) -> Self {
        let mut fm = FunctionMap::new();

        fm.add(
            "keyMatch",
            function(|args| {
                let a = string_args("keyMatch", args, 2)?;
                Ok(Value::Bool(key_match(a[0], a[1])))
            }),
        );
        fm.add(
            "keyGet",
            function(|args| {
                let a = string_args("keyGet", args, 2)?;
                Ok(Value::from(key_get(a[0], a[1]).to_string()))
            }),
        );
        fm.add("keyMatch2", bool_fn("keyMatch2", key::key_match2_with, cache.clone()));
        fm.add("keyMatch3", bool_fn("keyMatch3", key::key_match3_with, cache.clone()));
        fm.add("keyMatch4", bool_fn("keyMatch4", key::key_match4_with, cache.clone()));
        fm.add("keyMatch5", bool_fn("keyMatch5", key::key_match5_with, cache.clone()));

        let c = cache.clone();
        fm.add(
            "keyGet2",
            function(move |args| {
                let a = string_args("keyGet2", args, 3)?;
                Ok(Value::from(key::key_get2_with(&c, a[0], a[1], a[2])))
            }),
        );
        let c = cache.clone();
        fm.add(
            "keyGet3",
            function(move |args| {
                let a = string_args("keyGet3", args, 3)?;
                Ok(Value::from(key::key_get3_with(&c, a[0], a[1], a[2])))
            }),
        );
        let c = cache;
        fm.add(
            "regexMatch",
            function(move |args| {
                let a = string_args("regexMatch", args, 2)?;
                Ok(Value::Bool(pattern::regex_match_with(&c, a[0], a[1])?))
            }),
        );
        fm.add(
            "globMatch",
            function(|args| {
                let a = string_args("globMatch", args, 2)?;
                Ok(Value::Bool(glob_match(a[0], a[1])?))
            }),
        );
        fm.add(
            "ipMatch",
            function(|args| {
                let a = string_args("ipMatch", args, 2)?;
                Ok(Value::Bool(ip_match(a[0], a[1])?))
            }),
        );

        fm
    }

    /// Register or replace a function
    pub fn add(&mut self, name: impl Into<String>, f: Function) {
        self.functions.insert(name.into(), f);
    }

    /// Look up a function
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Remove a function, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<Function> {
        self.functions.remove(name)
    }

    /// Check if a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Call a function by name
    pub fn call<'a>(&self, name: &str, args: &[Value<'a>]) -> Result<Value<'static>> {
        let f = self
            .functions
            .get(name)
            .ok_or_else(|| WardenError::UnknownFunction(name.to_string()))?;
        f(args)
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for FunctionMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionMap")
            .field("functions", &self.names())
            .finish()
    }
}

/// Resolve a built-in by name into a role-name matching predicate
///
/// Used for pattern-based role and domain matching. Errors from functions
/// that can fail (`ipMatch`, `regexMatch`, `globMatch`) are logged and
/// treated as non-matches, since the role graph has no error channel for
/// pattern comparisons.
pub fn builtin_matching_fn(name: &str, cache: Arc<PatternCache>) -> Option<MatchingFn> {
    fn lenient(name: &'static str, r: Result<bool>) -> bool {
        r.unwrap_or_else(|e| {
            warn!("{} failed during role matching: {}", name, e);
            false
        })
    }

    let f: MatchingFn = match name {
        "keyMatch" => Arc::new(|a: &str, b: &str| key_match(a, b)),
        "keyMatch2" => Arc::new(move |a: &str, b: &str| key::key_match2_with(&cache, a, b)),
        "keyMatch3" => Arc::new(move |a: &str, b: &str| key::key_match3_with(&cache, a, b)),
        "keyMatch4" => Arc::new(move |a: &str, b: &str| key::key_match4_with(&cache, a, b)),
        "keyMatch5" => Arc::new(move |a: &str, b: &str| key::key_match5_with(&cache, a, b)),
        "regexMatch" => Arc::new(move |a: &str, b: &str| {
            lenient("regexMatch", pattern::regex_match_with(&cache, a, b))
        }),
        "globMatch" => Arc::new(|a: &str, b: &str| lenient("globMatch", glob_match(a, b))),
        "ipMatch" => Arc::new(|a: &str, b: &str| lenient("ipMatch", ip_match(a, b))),
        _ => return None,
    };
    Some(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(fm: &FunctionMap, name: &str, args: &[&str]) -> Result<Value<'static>> {
        let args: Vec<Value<'_>> = args.iter().map(|s| Value::from(*s)).collect();
        fm.call(name, &args)
    }

    #[test]
    fn test_builtins_registered() {
        let fm = FunctionMap::with_builtins(Arc::new(PatternCache::default()));
        for name in [
            "keyMatch",
            "keyMatch2",
            "keyMatch3",
            "keyMatch4",
            "keyMatch5",
            "keyGet",
            "keyGet2",
            "keyGet3",
            "regexMatch",
            "globMatch",
            "ipMatch",
        ] {
            assert!(fm.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_call_builtins() {
        let fm = FunctionMap::with_builtins(Arc::new(PatternCache::default()));
        assert_eq!(call(&fm, "keyMatch", &["/foo/bar", "/foo*"]).unwrap(), Value::Bool(true));
        assert_eq!(call(&fm, "keyMatch2", &["/foo/bar", "/foo*"]).unwrap(), Value::Bool(false));
        assert_eq!(
            call(&fm, "keyGet2", &["/a/b", "/:x/b", "x"]).unwrap().as_str(),
            Some("a")
        );
        assert_eq!(
            call(&fm, "ipMatch", &["192.168.2.123", "192.168.2.0/24"]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_call_errors() {
        let fm = FunctionMap::with_builtins(Arc::new(PatternCache::default()));
        assert!(matches!(
            call(&fm, "nope", &["a"]),
            Err(WardenError::UnknownFunction(_))
        ));
        assert!(matches!(
            call(&fm, "keyMatch", &["a"]),
            Err(WardenError::ArgumentCount { .. })
        ));
        assert!(matches!(
            call(&fm, "ipMatch", &["bad", "10.0.0.0/8"]),
            Err(WardenError::InvalidIp(_))
        ));
        assert!(matches!(
            fm.call("keyMatch", &[Value::Int(1), Value::from("a")]),
            Err(WardenError::ExpressionType(_))
        ));
    }

    #[test]
    fn test_builtin_matching_fn() {
        let cache = Arc::new(PatternCache::default());
        let f = builtin_matching_fn("keyMatch2", cache.clone()).unwrap();
        assert!(f("/book/1", "/book/:id"));
        assert!(!f("/pen/1", "/book/:id"));

        let ip = builtin_matching_fn("ipMatch", cache.clone()).unwrap();
        assert!(!ip("garbage", "10.0.0.0/8"));

        assert!(builtin_matching_fn("unknown", cache).is_none());
    }
}
