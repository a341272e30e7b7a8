//! Role nodes and per-domain role maps

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use std::sync::Arc;

/// A node in the role graph
///
/// Edges are stored by name and resolved through the owning domain's map,
/// so a node never holds a pointer into another node or another domain.
#[derive(Debug)]
pub struct Role {
    name: String,
    /// Direct successors: roles this node inherits
    roles: RwLock<AHashSet<String>>,
    /// Direct predecessors: nodes inheriting this one
    users: RwLock<AHashSet<String>>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Role {
            name: name.into(),
            roles: RwLock::new(AHashSet::new()),
            users: RwLock::new(AHashSet::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn add_role(&self, role: &str) {
        self.roles.write().insert(role.to_string());
    }

    pub(crate) fn remove_role(&self, role: &str) -> bool {
        self.roles.write().remove(role)
    }

    pub(crate) fn add_user(&self, user: &str) {
        self.users.write().insert(user.to_string());
    }

    pub(crate) fn remove_user(&self, user: &str) -> bool {
        self.users.write().remove(user)
    }

    pub fn has_direct_role(&self, role: &str) -> bool {
        self.roles.read().contains(role)
    }

    /// Names of direct successors
    pub fn roles(&self) -> Vec<String> {
        self.roles.read().iter().cloned().collect()
    }

    /// Names of direct predecessors
    pub fn users(&self) -> Vec<String> {
        self.users.read().iter().cloned().collect()
    }
}

/// All role nodes of one domain
#[derive(Debug, Default)]
pub struct RoleDomain {
    roles: RwLock<AHashMap<String, Arc<Role>>>,
}

impl RoleDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Role>> {
        self.roles.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.read().contains_key(name)
    }

    /// Fetch a node, creating it on first use
    pub fn get_or_create(&self, name: &str) -> Arc<Role> {
        if let Some(role) = self.roles.read().get(name) {
            return role.clone();
        }
        self.roles
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Role::new(name)))
            .clone()
    }

    /// Snapshot of every node
    pub fn nodes(&self) -> Vec<Arc<Role>> {
        self.roles.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.roles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_edges() {
        let role = Role::new("alice");
        assert!(role.roles().is_empty());
        role.add_role("admin");
        role.add_role("admin");
        assert_eq!(role.roles(), vec!["admin".to_string()]);
        assert!(role.has_direct_role("admin"));
        assert!(role.remove_role("admin"));
        assert!(!role.remove_role("admin"));
    }

    #[test]
    fn test_domain_get_or_create_is_idempotent() {
        let domain = RoleDomain::new();
        let a = domain.get_or_create("alice");
        let b = domain.get_or_create("alice");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(domain.len(), 1);
        assert!(domain.get("bob").is_none());
    }
}
