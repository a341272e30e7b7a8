//! Role-based convenience API over the `g` role type and `p` rules

use super::Enforcer;
use crate::core::model::{PolicyValues, RequestValues};
use crate::error::Result;
use ahash::AHashSet;
use std::collections::VecDeque;

fn grouping_rule(user: &str, role: &str, domain: Option<&str>) -> PolicyValues {
    let mut fields = vec![user.to_string(), role.to_string()];
    if let Some(d) = domain {
        fields.push(d.to_string());
    }
    PolicyValues::from(fields)
}

impl Enforcer {
    /// Direct roles of `name`
    pub fn get_roles_for_user(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        self.role_manager("g")
            .map(|rm| rm.get_roles(name, domain))
            .unwrap_or_default()
    }

    /// Direct members of `role`
    pub fn get_users_for_role(&self, role: &str, domain: Option<&str>) -> Vec<String> {
        self.role_manager("g")
            .map(|rm| rm.get_users(role, domain))
            .unwrap_or_default()
    }

    /// Whether `name` holds `role` directly
    pub fn has_role_for_user(&self, name: &str, role: &str, domain: Option<&str>) -> bool {
        self.get_roles_for_user(name, domain).iter().any(|r| r == role)
    }

    pub fn add_role_for_user(&mut self, user: &str, role: &str, domain: Option<&str>) -> Result<bool> {
        self.add_grouping_policy(grouping_rule(user, role, domain))
    }

    /// Grant every role or none
    pub fn add_roles_for_user(&mut self, user: &str, roles: &[&str], domain: Option<&str>) -> Result<bool> {
        let rules = roles.iter().map(|r| grouping_rule(user, r, domain)).collect();
        self.add_grouping_policies(rules)
    }

    pub fn delete_role_for_user(&mut self, user: &str, role: &str, domain: Option<&str>) -> Result<bool> {
        self.remove_grouping_policy(grouping_rule(user, role, domain))
    }

    /// Revoke every role of `user` (within `domain` when given)
    pub fn delete_roles_for_user(&mut self, user: &str, domain: Option<&str>) -> Result<bool> {
        match domain {
            Some(d) => self.remove_filtered_grouping_policy(0, &[user, "", d]),
            None => self.remove_filtered_grouping_policy(0, &[user]),
        }
    }

    /// Remove `user` from grouping rules and as a policy subject
    pub fn delete_user(&mut self, user: &str) -> Result<bool> {
        let grouping = self.remove_filtered_grouping_policy(0, &[user])?;
        let sub = self.subject_index();
        let policy = self.remove_filtered_policy(sub, &[user])?;
        Ok(grouping || policy)
    }

    /// Remove `role` from grouping rules and as a policy subject
    pub fn delete_role(&mut self, role: &str) -> Result<bool> {
        let grouping = self.remove_filtered_grouping_policy(1, &[role])?;
        let sub = self.subject_index();
        let policy = self.remove_filtered_policy(sub, &[role])?;
        Ok(grouping || policy)
    }

    /// Remove every rule granting `permission` (the fields after the subject)
    pub fn delete_permission(&mut self, permission: &[&str]) -> Result<bool> {
        let start = self.subject_index() + 1;
        self.remove_filtered_policy(start, permission)
    }

    pub fn add_permission_for_user(&mut self, user: &str, permission: &[&str]) -> Result<bool> {
        self.add_policy(permission_rule(user, permission))
    }

    pub fn delete_permission_for_user(&mut self, user: &str, permission: &[&str]) -> Result<bool> {
        self.remove_policy(permission_rule(user, permission))
    }

    pub fn delete_permissions_for_user(&mut self, user: &str) -> Result<bool> {
        let sub = self.subject_index();
        self.remove_filtered_policy(sub, &[user])
    }

    pub fn has_permission_for_user(&self, user: &str, permission: &[&str]) -> bool {
        self.has_policy(permission_rule(user, permission))
    }

    /// Rules naming `user` as subject (and `domain`, when the policy has one)
    pub fn get_permissions_for_user(&self, user: &str, domain: Option<&str>) -> Vec<PolicyValues> {
        let sub = self.subject_index();
        let dom = domain.and_then(|_| self.model.field_index("p", "dom"));
        self.get_policy()
            .into_iter()
            .filter(|row| row.field(sub) == user)
            .filter(|row| match (domain, dom) {
                (Some(d), Some(i)) => row.field(i) == d,
                _ => true,
            })
            .collect()
    }

    /// Every role reachable from `name`, nearest first
    ///
    /// # Examples
    /// ```
    /// use warden_rs::Enforcer;
    ///
    /// let model = "
    /// [request_definition]
    /// r = sub, obj, act
    /// [policy_definition]
    /// p = sub, obj, act
    /// [role_definition]
    /// g = _, _
    /// [policy_effect]
    /// e = some(where (p.eft == allow))
    /// [matchers]
    /// m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
    /// ";
    /// let e = Enforcer::from_text(model, "g, alice, admin\ng, admin, root").unwrap();
    /// assert_eq!(e.get_implicit_roles_for_user("alice", None), vec!["admin", "root"]);
    /// ```
    pub fn get_implicit_roles_for_user(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        let Some(rm) = self.role_manager("g") else {
            return Vec::new();
        };
        let mut seen: AHashSet<String> = AHashSet::new();
        seen.insert(name.to_string());
        let mut roles = Vec::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(name.to_string(), 0)]);
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= rm.max_hierarchy_level() {
                continue;
            }
            for role in rm.get_roles(&current, domain) {
                if seen.insert(role.clone()) {
                    roles.push(role.clone());
                    queue.push_back((role, depth + 1));
                }
            }
        }
        roles
    }

    /// Every user that reaches `role`, nearest first
    pub fn get_implicit_users_for_role(&self, role: &str, domain: Option<&str>) -> Vec<String> {
        let Some(rm) = self.role_manager("g") else {
            return Vec::new();
        };
        let mut seen: AHashSet<String> = AHashSet::new();
        seen.insert(role.to_string());
        let mut users = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::from([role.to_string()]);
        while let Some(current) = queue.pop_front() {
            for user in rm.get_users(&current, domain) {
                if seen.insert(user.clone()) {
                    users.push(user.clone());
                    queue.push_back(user);
                }
            }
        }
        users
    }

    /// Rules granted to `user` directly or through any inherited role
    pub fn get_implicit_permissions_for_user(&self, user: &str, domain: Option<&str>) -> Vec<PolicyValues> {
        let mut subjects = vec![user.to_string()];
        subjects.extend(self.get_implicit_roles_for_user(user, domain));
        subjects
            .iter()
            .flat_map(|s| self.get_permissions_for_user(s, domain))
            .collect()
    }

    /// Users (not roles) whose requests for `permission` are allowed
    pub fn get_implicit_users_for_permission(&self, permission: &[&str]) -> Result<Vec<String>> {
        let roles: AHashSet<String> = self
            .model
            .get_values_for_field_in_policy_all_types("g", 1)
            .into_iter()
            .collect();
        let mut candidates = self.get_all_subjects();
        for user in self.model.get_values_for_field_in_policy_all_types("g", 0) {
            if !candidates.contains(&user) {
                candidates.push(user);
            }
        }

        let mut users = Vec::new();
        for user in candidates {
            if roles.contains(&user) {
                continue;
            }
            let mut request = RequestValues::new().with(user.as_str());
            for p in permission {
                request.push(*p);
            }
            if self.enforce(request)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Domains in which `user` has a role
    pub fn get_domains_for_user(&self, user: &str) -> Vec<String> {
        self.role_manager("g")
            .map(|rm| rm.get_domains(user))
            .unwrap_or_default()
    }

    pub fn get_roles_for_user_in_domain(&self, user: &str, domain: &str) -> Vec<String> {
        self.get_roles_for_user(user, Some(domain))
    }

    pub fn get_users_for_role_in_domain(&self, role: &str, domain: &str) -> Vec<String> {
        self.get_users_for_role(role, Some(domain))
    }

    pub fn get_all_domains(&self) -> Vec<String> {
        self.role_manager("g")
            .map(|rm| rm.get_all_domains())
            .unwrap_or_default()
    }

    fn subject_index(&self) -> usize {
        self.model.field_index("p", "sub").unwrap_or(0)
    }
}

fn permission_rule(user: &str, permission: &[&str]) -> PolicyValues {
    std::iter::once(user)
        .chain(permission.iter().copied())
        .map(str::to_string)
        .collect()
}
