//! Result caches
//!
//! - [`DecisionCache`] memoizes whole decisions by request key
//! - [`MembershipCache`] memoizes `g(...)` lookups for one role type
//!
//! Both are best-effort. A lock that cannot be taken within the configured
//! wait is treated as a miss (reads) or skipped (writes), so contention only
//! costs a recomputation.

use crate::error::{Result, WardenError};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::warn;

/// Default number of cached decisions
pub const DEFAULT_DECISION_CACHE_CAPACITY: usize = 1000;

/// Decision memoization contract
pub trait DecisionCache: Send + Sync {
    /// Cached decision for `key`, if any
    fn try_get(&self, key: &str) -> Option<bool>;

    fn set(&self, key: &str, result: bool);

    fn clear(&self);
}

/// LRU decision cache
///
/// # Examples
/// ```
/// use warden_rs::{DecisionCache, LruDecisionCache};
///
/// let cache = LruDecisionCache::new(2).unwrap();
/// cache.set("alice$$data1$$read", true);
/// assert_eq!(cache.try_get("alice$$data1$$read"), Some(true));
/// assert_eq!(cache.try_get("bob$$data1$$read"), None);
/// ```
pub struct LruDecisionCache {
    cache: Mutex<LruCache<String, bool>>,
    lock_timeout: Duration,
}

impl LruDecisionCache {
    /// Create a cache holding at most `capacity` decisions
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| WardenError::Config("decision cache capacity must be > 0".to_string()))?;
        Ok(LruDecisionCache {
            cache: Mutex::new(LruCache::new(capacity)),
            lock_timeout: Duration::from_millis(10),
        })
    }

    /// Set the longest wait for the cache lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl DecisionCache for LruDecisionCache {
    fn try_get(&self, key: &str) -> Option<bool> {
        match self.cache.try_lock_for(self.lock_timeout) {
            Some(mut cache) => cache.get(key).copied(),
            None => {
                warn!("Decision cache busy, bypassing lookup");
                None
            }
        }
    }

    fn set(&self, key: &str, result: bool) {
        match self.cache.try_lock_for(self.lock_timeout) {
            Some(mut cache) => {
                cache.put(key.to_string(), result);
            }
            None => warn!("Decision cache busy, skipping store"),
        }
    }

    fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl std::fmt::Debug for LruDecisionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruDecisionCache")
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

/// Default number of memoized `g(...)` lookups per role type
pub const DEFAULT_MEMBERSHIP_CACHE_CAPACITY: usize = 10_000;

/// Memoized role-membership results for one role type
///
/// Bounded LRU; callers pick the keys through request values, so the least
/// recently used lookups are evicted once `capacity` is reached.
pub struct MembershipCache {
    entries: Mutex<LruCache<String, bool>>,
    lock_timeout: Duration,
}

impl MembershipCache {
    pub fn new(capacity: usize, lock_timeout: Duration) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            WardenError::Config("membership cache capacity must be > 0".to_string())
        })?;
        Ok(MembershipCache {
            entries: Mutex::new(LruCache::new(capacity)),
            lock_timeout,
        })
    }

    /// Key for a `(name1, name2, domain)` lookup
    ///
    /// Each part is length-prefixed so no choice of names can produce the
    /// key of a different lookup.
    pub fn key(name1: &str, name2: &str, domain: Option<&str>) -> String {
        let mut key = String::with_capacity(name1.len() + name2.len() + 16);
        push_key_part(&mut key, name1);
        push_key_part(&mut key, name2);
        match domain {
            Some(d) => push_key_part(&mut key, d),
            None => key.push('-'),
        }
        key
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries
            .try_lock_for(self.lock_timeout)
            .and_then(|mut entries| entries.get(key).copied())
    }

    pub fn insert(&self, key: String, result: bool) {
        if let Some(mut entries) = self.entries.try_lock_for(self.lock_timeout) {
            entries.put(key, result);
        }
    }

    /// Look up `key`, computing and storing it on a miss
    pub fn get_or_compute(&self, key: String, compute: impl FnOnce() -> bool) -> bool {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let result = compute();
        self.insert(key, result);
        result
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl std::fmt::Debug for MembershipCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipCache")
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

/// Append `part` as `<byte length>:<part>`
pub(crate) fn push_key_part(key: &mut String, part: &str) {
    key.push_str(&part.len().to_string());
    key.push(':');
    key.push_str(part);
}
