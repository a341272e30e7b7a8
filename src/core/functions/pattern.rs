//! Regex and glob matching, plus the compiled-pattern cache shared by the
//! key-match family
//!
//! Compiling a regex per policy row dominates evaluation time, so compiled
//! patterns are kept in an LRU cache. The cache is best-effort: when the
//! lock cannot be taken within the timeout the pattern is compiled fresh.

use crate::error::Result;
use glob::{MatchOptions, Pattern};
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::warn;

/// Default number of compiled patterns kept per cache
pub const DEFAULT_PATTERN_CACHE_CAPACITY: usize = 256;

/// Default bounded wait before bypassing a contended cache
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(10);

/// LRU cache of compiled regexes
pub struct PatternCache {
    regexes: Option<Mutex<LruCache<String, Regex>>>,
    lock_timeout: Duration,
}

impl PatternCache {
    /// Create a cache holding up to `capacity` compiled patterns
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PatternCache {
            regexes: Some(Mutex::new(LruCache::new(capacity))),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// A cache that never stores anything (used by the free functions)
    pub fn uncached() -> Self {
        PatternCache {
            regexes: None,
            lock_timeout: Duration::ZERO,
        }
    }

    /// Set the bounded wait used before bypassing the cache
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Get a compiled regex for `pattern`, compiling on miss
    pub fn regex(&self, pattern: &str) -> Result<Regex> {
        let Some(regexes) = &self.regexes else {
            return Ok(Regex::new(pattern)?);
        };

        match regexes.try_lock_for(self.lock_timeout) {
            Some(mut cache) => {
                if let Some(re) = cache.get(pattern) {
                    return Ok(re.clone());
                }
            }
            None => warn!("pattern cache lock contended; compiling '{}' uncached", pattern),
        }

        let re = Regex::new(pattern)?;
        if let Some(mut cache) = regexes.try_lock_for(self.lock_timeout) {
            cache.put(pattern.to_string(), re.clone());
        }
        Ok(re)
    }

    /// Number of cached patterns
    pub fn len(&self) -> usize {
        self.regexes.as_ref().map(|m| m.lock().len()).unwrap_or(0)
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached patterns
    pub fn clear(&self) {
        if let Some(regexes) = &self.regexes {
            regexes.lock().clear();
        }
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_CACHE_CAPACITY)
    }
}

pub(crate) fn regex_match_with(cache: &PatternCache, key1: &str, key2: &str) -> Result<bool> {
    Ok(cache.regex(key2)?.is_match(key1))
}

/// Unanchored regex search of `key2` in `key1`
///
/// An invalid pattern is an error, not a non-match.
///
/// # Examples
/// ```
/// use warden_rs::functions::regex_match;
///
/// assert!(regex_match("/topic/create", "/topic/create").unwrap());
/// assert!(regex_match("/topic/create/123", "/topic/create").unwrap());
/// assert!(!regex_match("/topic/delete", "/topic/create").unwrap());
/// assert!(regex_match("/topic", "(").is_err());
/// ```
pub fn regex_match(key1: &str, key2: &str) -> Result<bool> {
    regex_match_with(&PatternCache::uncached(), key1, key2)
}

/// Shell-style glob match where `*` never crosses a `/`
///
/// # Examples
/// ```
/// use warden_rs::functions::glob_match;
///
/// assert!(glob_match("/foo/bar", "/foo/*").unwrap());
/// assert!(!glob_match("/foo/bar/baz", "/foo/*").unwrap());
/// assert!(glob_match("/foo", "*/foo").unwrap());
/// ```
pub fn glob_match(key1: &str, key2: &str) -> Result<bool> {
    let pattern = Pattern::new(key2)?;
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    Ok(pattern.matches_with(key1, options))
}
