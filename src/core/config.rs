//! Enforcer configuration
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! enabled = true
//! max_hierarchy_level = 10
//!
//! [cache]
//! enabled = true
//! capacity = 1000
//!
//! [functions]
//! membership_cache_capacity = 10000
//! regex_cache_capacity = 256
//! ```

use crate::core::cache::{DEFAULT_DECISION_CACHE_CAPACITY, DEFAULT_MEMBERSHIP_CACHE_CAPACITY};
use crate::core::functions::DEFAULT_PATTERN_CACHE_CAPACITY;
use crate::core::rbac::DEFAULT_MAX_HIERARCHY_LEVEL;
use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Enforcer switches and cache sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcerConfig {
    /// When false every request is allowed without evaluation
    pub enabled: bool,
    /// Write policy edits through to the adapter
    pub auto_save: bool,
    /// Keep role links in step with grouping edits
    pub auto_build_role_links: bool,
    pub auto_notify_watcher: bool,
    pub max_hierarchy_level: usize,
    pub cache: CacheConfig,
    pub functions: FunctionConfig,
}

/// Decision cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Install an LRU decision cache at construction
    pub enabled: bool,
    pub capacity: usize,
    /// Clear cached decisions on every policy or role mutation
    pub auto_clean: bool,
    /// Longest wait for a cache lock before bypassing it
    pub lock_timeout_ms: u64,
}

/// Matcher function settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    /// Memoize `g(...)` results between role mutations
    pub membership_cache: bool,
    /// Lookups kept per role type before the least recent are evicted
    pub membership_cache_capacity: usize,
    /// Compiled patterns kept by the key-match family (0 disables caching)
    pub regex_cache_capacity: usize,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_save: true,
            auto_build_role_links: true,
            auto_notify_watcher: true,
            max_hierarchy_level: DEFAULT_MAX_HIERARCHY_LEVEL,
            cache: CacheConfig::default(),
            functions: FunctionConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_DECISION_CACHE_CAPACITY,
            auto_clean: true,
            lock_timeout_ms: 10,
        }
    }
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            membership_cache: true,
            membership_cache_capacity: DEFAULT_MEMBERSHIP_CACHE_CAPACITY,
            regex_cache_capacity: DEFAULT_PATTERN_CACHE_CAPACITY,
        }
    }
}

impl EnforcerConfig {
    /// Parse and validate a TOML document
    ///
    /// # Examples
    /// ```
    /// use warden_rs::EnforcerConfig;
    ///
    /// let config = EnforcerConfig::from_toml_str("
    /// auto_save = false
    /// [cache]
    /// enabled = true
    /// capacity = 64
    /// ").unwrap();
    /// assert!(!config.auto_save);
    /// assert_eq!(config.cache.capacity, 64);
    /// assert_eq!(config.max_hierarchy_level, 10);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EnforcerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| WardenError::Config(e.to_string()))
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_hierarchy_level == 0 {
            return Err(WardenError::Config(
                "max_hierarchy_level must be at least 1".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(WardenError::Config(
                "cache.capacity must be > 0 when the cache is enabled".to_string(),
            ));
        }
        if self.functions.membership_cache && self.functions.membership_cache_capacity == 0 {
            return Err(WardenError::Config(
                "functions.membership_cache_capacity must be > 0 when the membership cache is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.lock_timeout_ms)
    }
}
