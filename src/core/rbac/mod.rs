//! Role hierarchy
//!
//! Grouping rules (`g, alice, admin[, domain]`) become directed edges in a
//! role graph partitioned by domain. The graph answers the `g(...)`
//! predicates used by matchers.

mod manager;
mod role;

pub use manager::{DefaultRoleManager, DEFAULT_DOMAIN, DEFAULT_MAX_HIERARCHY_LEVEL};
pub use role::{Role, RoleDomain};

use crate::error::Result;
use std::sync::Arc;

/// Name or domain pattern predicate: `f(literal, pattern)`
pub type MatchingFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Role graph operations
///
/// Implementations use interior mutability so one instance can be shared
/// between concurrent enforcement calls and policy edits.
pub trait RoleManager: Send + Sync {
    /// Drop every link, leaving only the empty default domain
    fn clear(&self);

    /// Add `name1 -> name2` (name1 inherits name2)
    fn add_link(&self, name1: &str, name2: &str, domain: Option<&str>) -> Result<()>;

    /// Remove the direct edge `name1 -> name2`
    fn delete_link(&self, name1: &str, name2: &str, domain: Option<&str>) -> Result<()>;

    /// Whether `name1` reaches `name2` within the hierarchy limit
    fn has_link(&self, name1: &str, name2: &str, domain: Option<&str>) -> bool;

    /// Direct roles of `name`
    fn get_roles(&self, name: &str, domain: Option<&str>) -> Vec<String>;

    /// Direct users of `name`
    fn get_users(&self, name: &str, domain: Option<&str>) -> Vec<String>;

    /// Domains where `name` appears
    fn get_domains(&self, name: &str) -> Vec<String>;

    fn get_all_domains(&self) -> Vec<String>;

    fn delete_domain(&self, domain: &str) -> Result<()>;

    /// Enable pattern-based role name matching
    fn add_matching_fn(&self, f: MatchingFn);

    /// Enable pattern-based domain matching
    fn add_domain_matching_fn(&self, f: MatchingFn);

    /// Log the graph at debug level
    fn print_roles(&self);

    fn max_hierarchy_level(&self) -> usize;
}
