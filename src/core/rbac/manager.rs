//! Default role graph
//!
//! Domains map to [`RoleDomain`]s, each guarded by its own lock, so edits in
//! one domain never block lookups in another. Pattern matching is applied
//! at query time: a literal name also reaches every node whose name is a
//! pattern it matches, and a literal domain also sees every domain whose
//! name is a pattern it matches. Results therefore do not depend on the
//! order in which links and patterns were added.

use super::role::RoleDomain;
use super::{MatchingFn, RoleManager};
use crate::error::{Result, WardenError};
use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Domain used when grouping rules carry no domain
pub const DEFAULT_DOMAIN: &str = "";

/// Default bound on inheritance hops
pub const DEFAULT_MAX_HIERARCHY_LEVEL: usize = 10;

/// Thread-safe role graph with optional name and domain pattern matching
///
/// # Examples
/// ```
/// use warden_rs::{DefaultRoleManager, RoleManager};
///
/// let rm = DefaultRoleManager::new(10);
/// rm.add_link("alice", "admin", None).unwrap();
/// rm.add_link("admin", "staff", None).unwrap();
///
/// assert!(rm.has_link("alice", "staff", None));
/// assert!(!rm.has_link("staff", "alice", None));
/// assert_eq!(rm.get_roles("alice", None), vec!["admin"]);
/// ```
pub struct DefaultRoleManager {
    domains: RwLock<AHashMap<String, Arc<RoleDomain>>>,
    matching_fn: RwLock<Option<MatchingFn>>,
    domain_matching_fn: RwLock<Option<MatchingFn>>,
    max_hierarchy_level: usize,
}

fn fresh_domains() -> AHashMap<String, Arc<RoleDomain>> {
    let mut map = AHashMap::new();
    map.insert(DEFAULT_DOMAIN.to_string(), Arc::new(RoleDomain::new()));
    map
}

fn domain_key(domain: Option<&str>) -> &str {
    domain.unwrap_or(DEFAULT_DOMAIN)
}

impl DefaultRoleManager {
    pub fn new(max_hierarchy_level: usize) -> Self {
        DefaultRoleManager {
            domains: RwLock::new(fresh_domains()),
            matching_fn: RwLock::new(None),
            domain_matching_fn: RwLock::new(None),
            max_hierarchy_level,
        }
    }

    fn domain(&self, key: &str) -> Arc<RoleDomain> {
        if let Some(d) = self.domains.read().get(key) {
            return d.clone();
        }
        self.domains
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RoleDomain::new()))
            .clone()
    }

    /// The domain itself plus every pattern domain it matches
    fn view(&self, key: &str) -> Vec<Arc<RoleDomain>> {
        let domains = self.domains.read();
        let mut out = Vec::new();
        if let Some(d) = domains.get(key) {
            out.push(d.clone());
        }
        if let Some(f) = self.domain_matching_fn.read().as_ref() {
            for (name, d) in domains.iter() {
                if name != key && f(key, name) {
                    out.push(d.clone());
                }
            }
        }
        out
    }

    /// `name` plus every node name that `name` pattern-matches
    fn aliases(name: &str, view: &[Arc<RoleDomain>], matching: Option<&MatchingFn>) -> Vec<String> {
        let mut out = vec![name.to_string()];
        if let Some(f) = matching {
            for d in view {
                for node in d.nodes() {
                    if node.name() != name && f(name, node.name()) && !out.iter().any(|n| n == node.name()) {
                        out.push(node.name().to_string());
                    }
                }
            }
        }
        out
    }
}

impl Default for DefaultRoleManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HIERARCHY_LEVEL)
    }
}

impl std::fmt::Debug for DefaultRoleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultRoleManager")
            .field("domains", &self.domains.read().len())
            .field("max_hierarchy_level", &self.max_hierarchy_level)
            .finish()
    }
}

impl RoleManager for DefaultRoleManager {
    fn clear(&self) {
        *self.domains.write() = fresh_domains();
    }

    fn add_link(&self, name1: &str, name2: &str, domain: Option<&str>) -> Result<()> {
        let d = self.domain(domain_key(domain));
        let role1 = d.get_or_create(name1);
        let role2 = d.get_or_create(name2);
        role1.add_role(name2);
        role2.add_user(name1);
        debug!("Added link {} -> {} in domain '{}'", name1, name2, domain_key(domain));
        Ok(())
    }

    fn delete_link(&self, name1: &str, name2: &str, domain: Option<&str>) -> Result<()> {
        let key = domain_key(domain);
        let d = self
            .domains
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| WardenError::NameNotFound(key.to_string()))?;
        let role1 = d
            .get(name1)
            .ok_or_else(|| WardenError::NameNotFound(name1.to_string()))?;
        let role2 = d
            .get(name2)
            .ok_or_else(|| WardenError::NameNotFound(name2.to_string()))?;
        role1.remove_role(name2);
        role2.remove_user(name1);
        debug!("Deleted link {} -> {} in domain '{}'", name1, name2, key);
        Ok(())
    }

    fn has_link(&self, name1: &str, name2: &str, domain: Option<&str>) -> bool {
        let matching = self.matching_fn.read().clone();
        let matches = |a: &str, b: &str| matching.as_ref().map_or(false, |f| f(a, b));

        if name1 == name2 || matches(name1, name2) {
            return true;
        }

        let view = self.view(domain_key(domain));
        if view.is_empty() {
            return false;
        }

        let mut frontier = Self::aliases(name1, &view, matching.as_ref());
        let mut visited: AHashSet<String> = frontier.iter().cloned().collect();

        for _ in 0..self.max_hierarchy_level {
            let mut next = Vec::new();
            for node in &frontier {
                for d in &view {
                    let Some(role) = d.get(node) else { continue };
                    for r in role.roles() {
                        if r == name2 || matches(&r, name2) {
                            return true;
                        }
                        for alias in Self::aliases(&r, &view, matching.as_ref()) {
                            if visited.insert(alias.clone()) {
                                next.push(alias);
                            }
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        false
    }

    fn get_roles(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        let matching = self.matching_fn.read().clone();
        let view = self.view(domain_key(domain));
        let mut out = AHashSet::new();
        for alias in Self::aliases(name, &view, matching.as_ref()) {
            for d in &view {
                if let Some(role) = d.get(&alias) {
                    out.extend(role.roles());
                }
            }
        }
        let mut out: Vec<String> = out.into_iter().collect();
        out.sort_unstable();
        out
    }

    fn get_users(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        let view = self.view(domain_key(domain));
        let mut out = AHashSet::new();
        for d in &view {
            if let Some(role) = d.get(name) {
                out.extend(role.users());
            }
        }
        let mut out: Vec<String> = out.into_iter().collect();
        out.sort_unstable();
        out
    }

    fn get_domains(&self, name: &str) -> Vec<String> {
        let matching = self.matching_fn.read().clone();
        let domains = self.domains.read();
        let mut out: Vec<String> = domains
            .iter()
            .filter(|(_, d)| {
                d.contains(name)
                    || matching.as_ref().map_or(false, |f| {
                        d.nodes().iter().any(|n| f(name, n.name()))
                    })
            })
            .map(|(k, _)| k.clone())
            .collect();
        out.sort_unstable();
        out
    }

    fn get_all_domains(&self) -> Vec<String> {
        let mut out: Vec<String> = self.domains.read().keys().cloned().collect();
        out.sort_unstable();
        out
    }

    fn delete_domain(&self, domain: &str) -> Result<()> {
        let mut domains = self.domains.write();
        domains.remove(domain);
        if domain == DEFAULT_DOMAIN {
            domains.insert(DEFAULT_DOMAIN.to_string(), Arc::new(RoleDomain::new()));
        }
        debug!("Deleted domain '{}'", domain);
        Ok(())
    }

    fn add_matching_fn(&self, f: MatchingFn) {
        *self.matching_fn.write() = Some(f);
    }

    fn add_domain_matching_fn(&self, f: MatchingFn) {
        *self.domain_matching_fn.write() = Some(f);
    }

    fn print_roles(&self) {
        let domains = self.domains.read();
        let mut keys: Vec<&String> = domains.keys().collect();
        keys.sort_unstable();
        for key in keys {
            let Some(d) = domains.get(key) else { continue };
            let mut lines: Vec<String> = d
                .nodes()
                .iter()
                .flat_map(|n| {
                    let name = n.name().to_string();
                    n.roles().into_iter().map(move |r| format!("{} < {}", name, r))
                })
                .collect();
            lines.sort_unstable();
            debug!("Roles in domain '{}': {}", key, lines.join(", "));
        }
    }

    fn max_hierarchy_level(&self) -> usize {
        self.max_hierarchy_level
    }
}
