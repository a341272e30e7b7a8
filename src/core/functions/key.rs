//! Path-pattern matching for request keys
//!
//! Supports the `keyMatch` family used inside matcher expressions:
//! - `keyMatch` - literal prefix up to a single `*`
//! - `keyMatch2` - `:name` segments and `/*` suffixes
//! - `keyMatch3` - `{name}` segments and `/*` suffixes
//! - `keyMatch4` - like `keyMatch3`, repeated placeholders must bind the same value
//! - `keyMatch5` - like `keyMatch3`, ignoring a `?query` on the request key
//!
//! Patterns are translated to anchored regexes. Regex metacharacters in the
//! pattern are passed through untouched, so `.` keeps its regex meaning.

use super::pattern::PatternCache;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

fn colon_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":[^/]+").expect("static placeholder regex"))
}

fn brace_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^/]+?\}").expect("static placeholder regex"))
}

fn anchored(body: &str) -> String {
    format!("^{}$", body)
}

/// Compile `pattern` and test `key` against it, treating a bad pattern as a non-match
fn is_match(cache: &PatternCache, pattern: &str, key: &str) -> bool {
    match cache.regex(pattern) {
        Ok(re) => re.is_match(key),
        Err(e) => {
            warn!("failed to compile key pattern '{}': {}; treating as non-match", pattern, e);
            false
        }
    }
}

/// Check `key1` against `key2`, where `key2` may contain one `*`
///
/// # Examples
/// ```
/// use warden_rs::functions::key_match;
///
/// assert!(key_match("/foo/bar", "/foo/*"));
/// assert!(key_match("/foo/bar", "/foo*"));
/// assert!(!key_match("/bar/foo", "/foo/*"));
/// ```
pub fn key_match(key1: &str, key2: &str) -> bool {
    let Some(i) = key2.find('*') else {
        return key1 == key2;
    };

    if key1.len() > i {
        return key1.get(..i) == Some(&key2[..i]);
    }
    key1 == &key2[..i]
}

/// Return the part of `key1` matched by the `*` in `key2`, or `""`
///
/// # Examples
/// ```
/// use warden_rs::functions::key_get;
///
/// assert_eq!(key_get("/foo/bar/baz", "/foo/*"), "bar/baz");
/// assert_eq!(key_get("/foo", "/bar/*"), "");
/// ```
pub fn key_get<'a>(key1: &'a str, key2: &str) -> &'a str {
    let Some(i) = key2.find('*') else {
        return "";
    };

    if key1.len() > i && key1.get(..i) == Some(&key2[..i]) {
        return key1.get(i..).unwrap_or("");
    }
    ""
}

fn translate_key2(key2: &str) -> String {
    let key2 = key2.replace("/*", "/.*");
    colon_placeholder().replace_all(&key2, "[^/]+").into_owned()
}

fn translate_key3(key2: &str) -> String {
    let key2 = key2.replace("/*", "/.*");
    brace_placeholder().replace_all(&key2, "[^/]+?").into_owned()
}

pub(crate) fn key_match2_with(cache: &PatternCache, key1: &str, key2: &str) -> bool {
    is_match(cache, &anchored(&translate_key2(key2)), key1)
}

pub(crate) fn key_match3_with(cache: &PatternCache, key1: &str, key2: &str) -> bool {
    is_match(cache, &anchored(&translate_key3(key2)), key1)
}

pub(crate) fn key_match4_with(cache: &PatternCache, key1: &str, key2: &str) -> bool {
    let key2 = key2.replace("/*", "/.*");

    let mut names: Vec<&str> = Vec::new();
    let mut body = String::with_capacity(key2.len() + 16);
    let mut last = 0;
    for m in brace_placeholder().find_iter(&key2) {
        body.push_str(&key2[last..m.start()]);
        body.push_str("([^/]+)");
        names.push(&key2[m.start() + 1..m.end() - 1]);
        last = m.end();
    }
    body.push_str(&key2[last..]);

    let re = match cache.regex(&anchored(&body)) {
        Ok(re) => re,
        Err(e) => {
            warn!("failed to compile keyMatch4 pattern '{}': {}", key2, e);
            return false;
        }
    };

    let Some(captures) = re.captures(key1) else {
        return false;
    };

    // Literal parentheses in the pattern would add groups we don't own
    if captures.len() - 1 != names.len() {
        warn!(
            "keyMatch4 pattern '{}' has {} placeholders but {} capture groups",
            key2,
            names.len(),
            captures.len() - 1
        );
        return false;
    }

    let mut bound: Vec<(&str, &str)> = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let value = captures.get(i + 1).map(|m| m.as_str()).unwrap_or("");
        match bound.iter().find(|(n, _)| n == name) {
            Some((_, existing)) if *existing != value => return false,
            Some(_) => {}
            None => bound.push((name, value)),
        }
    }
    true
}

pub(crate) fn key_match5_with(cache: &PatternCache, key1: &str, key2: &str) -> bool {
    let key1 = match key1.find('?') {
        Some(i) => &key1[..i],
        None => key1,
    };
    let key2 = key2.replace("/*", "/.*");
    let body = brace_placeholder().replace_all(&key2, "[^/]+").into_owned();
    is_match(cache, &anchored(&body), key1)
}

/// Extract the value bound to a placeholder: `names` are the placeholder
/// names in order of appearance, `body` the translated regex body
fn key_get_with(cache: &PatternCache, key1: &str, body: &str, names: &[&str], var: &str) -> String {
    let re = match cache.regex(&anchored(body)) {
        Ok(re) => re,
        Err(e) => {
            warn!("failed to compile key pattern '{}': {}", body, e);
            return String::new();
        }
    };
    let Some(captures) = re.captures(key1) else {
        return String::new();
    };
    names
        .iter()
        .position(|name| *name == var)
        .and_then(|i| captures.get(i + 1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

pub(crate) fn key_get2_with(cache: &PatternCache, key1: &str, key2: &str, var: &str) -> String {
    let key2 = key2.replace("/*", "/.*");
    let names: Vec<&str> = colon_placeholder()
        .find_iter(&key2)
        .map(|m| &key2[m.start() + 1..m.end()])
        .collect();
    let body = colon_placeholder().replace_all(&key2, "([^/]+)");
    key_get_with(cache, key1, &body, &names, var)
}

pub(crate) fn key_get3_with(cache: &PatternCache, key1: &str, key2: &str, var: &str) -> String {
    let key2 = key2.replace("/*", "/.*");
    let names: Vec<&str> = brace_placeholder()
        .find_iter(&key2)
        .map(|m| &key2[m.start() + 1..m.end() - 1])
        .collect();
    let body = brace_placeholder().replace_all(&key2, "([^/]+?)");
    key_get_with(cache, key1, &body, &names, var)
}

/// Match `key1` against a pattern with `:name` segments
///
/// # Examples
/// ```
/// use warden_rs::functions::key_match2;
///
/// assert!(key_match2("/resource1", "/:resource"));
/// assert!(key_match2("/foo/bar", "/foo/*"));
/// assert!(!key_match2("/foo/bar", "/foo*"));
/// ```
pub fn key_match2(key1: &str, key2: &str) -> bool {
    key_match2_with(&PatternCache::uncached(), key1, key2)
}

/// Match `key1` against a pattern with `{name}` segments
pub fn key_match3(key1: &str, key2: &str) -> bool {
    key_match3_with(&PatternCache::uncached(), key1, key2)
}

/// Match `key1` against a pattern with `{name}` segments, where repeated
/// names must capture identical values
///
/// # Examples
/// ```
/// use warden_rs::functions::key_match4;
///
/// assert!(key_match4("/parent/123/child/123", "/parent/{id}/child/{id}"));
/// assert!(!key_match4("/parent/123/child/456", "/parent/{id}/child/{id}"));
/// ```
pub fn key_match4(key1: &str, key2: &str) -> bool {
    key_match4_with(&PatternCache::uncached(), key1, key2)
}

/// Match like [`key_match3`], ignoring a `?query` suffix on `key1`
pub fn key_match5(key1: &str, key2: &str) -> bool {
    key_match5_with(&PatternCache::uncached(), key1, key2)
}

/// Return the value bound to `:var` in `key2`, or `""`
///
/// # Examples
/// ```
/// use warden_rs::functions::key_get2;
///
/// assert_eq!(key_get2("/resource1/action", "/:res/action", "res"), "resource1");
/// assert_eq!(key_get2("/resource1/action", "/:res/action", "missing"), "");
/// ```
pub fn key_get2(key1: &str, key2: &str, var: &str) -> String {
    key_get2_with(&PatternCache::uncached(), key1, key2, var)
}

/// Return the value bound to `{var}` in `key2`, or `""`
pub fn key_get3(key1: &str, key2: &str, var: &str) -> String {
    key_get3_with(&PatternCache::uncached(), key1, key2, var)
}
