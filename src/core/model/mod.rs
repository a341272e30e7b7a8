//! Policy model
//!
//! A [`Model`] holds the five definition sections (`r`, `p`, `g`, `e`, `m`),
//! each mapping type names (`p`, `p2`, ...) to an [`Assertion`]. Policy and
//! grouping rows live in the assertion of the type they were loaded under.

mod assertion;
mod parser;
mod store;
mod values;

pub use assertion::Assertion;
pub use store::PolicyStore;
pub use values::{PolicyValues, RequestValue, RequestValues, INLINE_FIELDS};

use crate::core::effect::EffectKind;
use crate::core::rbac::RoleManager;
use crate::error::{Result, WardenError};
use ahash::AHashMap;
use parser::{parse_model_text, section_header};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Sections in canonical order
pub const SECTIONS: [&str; 5] = ["r", "p", "g", "e", "m"];

const REQUIRED_SECTIONS: [&str; 4] = ["r", "p", "e", "m"];

/// Direction of an incremental role-link update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOp {
    Add,
    Remove,
}

/// Parsed model definitions plus the policy rows loaded into them
#[derive(Debug, Clone, Default)]
pub struct Model {
    sections: BTreeMap<String, BTreeMap<String, Assertion>>,
}

impl Model {
    /// An empty model; definitions are added with [`Model::add_def`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse model text
    ///
    /// # Examples
    /// ```
    /// use warden_rs::Model;
    ///
    /// let model = Model::from_text(r#"
    /// [request_definition]
    /// r = sub, obj, act
    ///
    /// [policy_definition]
    /// p = sub, obj, act
    ///
    /// [policy_effect]
    /// e = some(where (p.eft == allow))
    ///
    /// [matchers]
    /// m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
    /// "#).unwrap();
    ///
    /// assert_eq!(model.field_index("p", "obj"), Some(1));
    /// ```
    pub fn from_text(text: &str) -> Result<Model> {
        let mut model = Model::new();
        for def in parse_model_text(text)? {
            model.add_def(def.section, &def.key, &def.value)?;
        }
        model.validate()?;
        info!(
            "Loaded model with {} definitions",
            model.sections.values().map(BTreeMap::len).sum::<usize>()
        );
        Ok(model)
    }

    /// Add (or replace) one definition; returns false for an empty value
    pub fn add_def(&mut self, section: &str, key: &str, value: &str) -> Result<bool> {
        if section_header(section).is_none() {
            return Err(WardenError::ModelParse {
                line: 0,
                message: format!("unknown section '{}'", section),
            });
        }
        let value = value.trim();
        if value.is_empty() {
            return Ok(false);
        }

        let tokens = match section {
            "r" | "p" | "g" => value
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        if section == "g" && tokens.len() < 2 {
            return Err(WardenError::ModelParse {
                line: 0,
                message: format!("role definition '{}' needs at least two fields", key),
            });
        }
        if section == "e" {
            EffectKind::parse(value)?;
        }

        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), Assertion::new(key, value, tokens));
        Ok(true)
    }

    /// Check every required section is present
    pub fn validate(&self) -> Result<()> {
        for sec in REQUIRED_SECTIONS {
            if self.sections.get(sec).map_or(true, BTreeMap::is_empty) {
                let header = section_header(sec).unwrap_or(sec);
                return Err(WardenError::MissingSection(header.to_string()));
            }
        }
        Ok(())
    }

    /// All assertions of a section
    pub fn section(&self, section: &str) -> Option<&BTreeMap<String, Assertion>> {
        self.sections.get(section)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Assertion> {
        self.sections.get(section).and_then(|s| s.get(key))
    }

    /// Like [`Model::get`], failing with [`WardenError::AssertionNotFound`]
    pub fn assertion(&self, section: &str, key: &str) -> Result<&Assertion> {
        self.get(section, key)
            .ok_or_else(|| WardenError::AssertionNotFound {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    fn assertion_mut(&mut self, section: &str, key: &str) -> Result<&mut Assertion> {
        self.sections
            .get_mut(section)
            .and_then(|s| s.get_mut(key))
            .ok_or_else(|| WardenError::AssertionNotFound {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Declared role types (`g`, `g2`, ...)
    pub fn role_types(&self) -> Vec<String> {
        self.sections
            .get("g")
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Column index of `field` in policy type `ptype`
    pub fn field_index(&self, ptype: &str, field: &str) -> Option<usize> {
        self.get("p", ptype).and_then(|a| a.index_of(field))
    }

    /// Effect kind paired with a policy type (`p2` pairs with `e2`, falling back to `e`)
    pub fn effect_kind_for(&self, ptype: &str) -> Result<EffectKind> {
        let suffix = ptype.trim_start_matches('p');
        let key = format!("e{}", suffix);
        let assertion = match self.get("e", &key) {
            Some(a) => a,
            None => self.assertion("e", "e")?,
        };
        EffectKind::parse(&assertion.value)
    }

    // ---- policy management ----

    /// Load one adapter row whose first field is the type name
    pub fn load_policy_row(&mut self, ptype: &str, rule: PolicyValues) -> Result<bool> {
        let section = ptype.get(..1).unwrap_or("");
        if section != "p" && section != "g" {
            return Err(WardenError::Adapter(format!("unknown policy type '{}'", ptype)));
        }
        self.assertion_mut(section, ptype)
            .map(|a| a.policy.insert(rule))
    }

    pub fn add_policy(&mut self, section: &str, ptype: &str, rule: PolicyValues) -> Result<bool> {
        self.check_priority(section, ptype, std::slice::from_ref(&rule))?;
        let added = self.assertion_mut(section, ptype)?.policy.insert(rule);
        if added {
            self.resort(section, ptype)?;
        }
        Ok(added)
    }

    /// Add every rule or none
    pub fn add_policies(&mut self, section: &str, ptype: &str, rules: &[PolicyValues]) -> Result<bool> {
        self.check_priority(section, ptype, rules)?;
        let added = self.assertion_mut(section, ptype)?.policy.insert_all(rules);
        if added {
            self.resort(section, ptype)?;
        }
        Ok(added)
    }

    pub fn remove_policy(&mut self, section: &str, ptype: &str, rule: &PolicyValues) -> Result<bool> {
        Ok(self.assertion_mut(section, ptype)?.policy.remove(rule))
    }

    /// Remove every rule or none
    pub fn remove_policies(&mut self, section: &str, ptype: &str, rules: &[PolicyValues]) -> Result<bool> {
        Ok(self.assertion_mut(section, ptype)?.policy.remove_all(rules))
    }

    /// Remove rows matching a field filter; returns the removed rows
    pub fn remove_filtered_policy(
        &mut self,
        section: &str,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<Vec<PolicyValues>> {
        Ok(self
            .assertion_mut(section, ptype)?
            .policy
            .remove_filtered(field_index, values))
    }

    pub fn update_policy(
        &mut self,
        section: &str,
        ptype: &str,
        old: &PolicyValues,
        new: PolicyValues,
    ) -> Result<bool> {
        self.check_priority(section, ptype, std::slice::from_ref(&new))?;
        let updated = self.assertion_mut(section, ptype)?.policy.replace(old, new);
        if updated {
            self.resort(section, ptype)?;
        }
        Ok(updated)
    }

    pub fn update_policies(
        &mut self,
        section: &str,
        ptype: &str,
        old: &[PolicyValues],
        new: &[PolicyValues],
    ) -> Result<bool> {
        self.check_priority(section, ptype, new)?;
        let updated = self.assertion_mut(section, ptype)?.policy.replace_all(old, new);
        if updated {
            self.resort(section, ptype)?;
        }
        Ok(updated)
    }

    pub fn has_policy(&self, section: &str, ptype: &str, rule: &PolicyValues) -> bool {
        self.get(section, ptype)
            .map_or(false, |a| a.policy.contains(rule))
    }

    pub fn get_policy(&self, section: &str, ptype: &str) -> Vec<PolicyValues> {
        self.get(section, ptype)
            .map(|a| a.policy.rows().to_vec())
            .unwrap_or_default()
    }

    pub fn get_filtered_policy(
        &self,
        section: &str,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Vec<PolicyValues> {
        self.get(section, ptype)
            .map(|a| a.policy.filtered(field_index, values))
            .unwrap_or_default()
    }

    pub fn get_values_for_field_in_policy(&self, section: &str, ptype: &str, field_index: usize) -> Vec<String> {
        self.get(section, ptype)
            .map(|a| a.policy.values_for_field(field_index))
            .unwrap_or_default()
    }

    /// Distinct column values across every type of a section
    pub fn get_values_for_field_in_policy_all_types(&self, section: &str, field_index: usize) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        if let Some(sec) = self.sections.get(section) {
            for a in sec.values() {
                for v in a.policy.values_for_field(field_index) {
                    if !out.contains(&v) {
                        out.push(v);
                    }
                }
            }
        }
        out
    }

    /// Drop every policy and grouping row
    pub fn clear_policy(&mut self) {
        for sec in ["p", "g"] {
            if let Some(s) = self.sections.get_mut(sec) {
                for a in s.values_mut() {
                    a.policy.clear();
                }
            }
        }
    }

    /// Reject rows whose priority column is not an integer, before any mutation
    pub(crate) fn check_priority(&self, section: &str, ptype: &str, rules: &[PolicyValues]) -> Result<()> {
        if section != "p" {
            return Ok(());
        }
        if let Some(idx) = self.field_index(ptype, "priority") {
            for rule in rules {
                parse_priority(rule.field(idx))?;
            }
        }
        Ok(())
    }

    fn resort(&mut self, section: &str, ptype: &str) -> Result<()> {
        if section == "p" {
            if let Some(idx) = self.field_index(ptype, "priority") {
                sort_by_priority(self.assertion_mut(section, ptype)?, idx)?;
            }
        }
        Ok(())
    }

    // ---- ordering ----

    /// Stable-sort every policy type that declares a `priority` column
    pub fn sort_policies_by_priority(&mut self) -> Result<()> {
        if let Some(sec) = self.sections.get_mut("p") {
            for a in sec.values_mut() {
                if let Some(idx) = a.index_of("priority") {
                    sort_by_priority(a, idx)?;
                }
            }
        }
        Ok(())
    }

    /// Order `subjectPriority` policy types so deeper subjects in the `g`
    /// hierarchy come first
    pub fn sort_policies_by_subject_hierarchy(&mut self) -> Result<()> {
        let ptypes: Vec<String> = match self.sections.get("p") {
            Some(sec) => sec.keys().cloned().collect(),
            None => return Ok(()),
        };
        let levels = subject_levels(&self.get_policy("g", "g"));

        for ptype in ptypes {
            if self.effect_kind_for(&ptype)? != EffectKind::SubjectPriority {
                continue;
            }
            let sub_idx = self.field_index(&ptype, "sub").unwrap_or(0);
            let dom_idx = self.field_index(&ptype, "dom");
            let a = self.assertion_mut("p", &ptype)?;
            a.policy.sort_by_key(|row| {
                let domain = dom_idx.map(|i| row.field(i)).unwrap_or("");
                let key = level_key(domain, row.field(sub_idx));
                std::cmp::Reverse(levels.get(&key).copied().unwrap_or(0))
            });
            debug!("Sorted {} by subject hierarchy", ptype);
        }
        Ok(())
    }

    // ---- role links ----

    /// Rebuild one role type's links from its grouping rows
    pub fn build_role_links(&self, ptype: &str, rm: &dyn RoleManager) -> Result<()> {
        let a = self
            .get("g", ptype)
            .ok_or_else(|| WardenError::RoleTypeNotFound(ptype.to_string()))?;
        for rule in a.policy.iter() {
            add_or_remove_link(rm, a.arity(), rule, PolicyOp::Add)?;
        }
        debug!("Built {} role links for {}", a.policy.len(), ptype);
        Ok(())
    }

    /// Apply grouping-row changes to a role manager without a full rebuild
    pub fn build_incremental_role_links(
        &self,
        rm: &dyn RoleManager,
        op: PolicyOp,
        ptype: &str,
        rules: &[PolicyValues],
    ) -> Result<()> {
        let a = self
            .get("g", ptype)
            .ok_or_else(|| WardenError::RoleTypeNotFound(ptype.to_string()))?;
        for rule in rules {
            add_or_remove_link(rm, a.arity(), rule, op)?;
        }
        Ok(())
    }
}

fn sort_by_priority(a: &mut Assertion, idx: usize) -> Result<()> {
    let mut priorities: AHashMap<PolicyValues, i64> = AHashMap::with_capacity(a.policy.len());
    for row in a.policy.iter() {
        priorities.insert(row.clone(), parse_priority(row.field(idx))?);
    }
    a.policy
        .sort_by_key(|row| priorities.get(row).copied().unwrap_or(i64::MAX));
    Ok(())
}

fn parse_priority(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| WardenError::InvalidPriority(raw.to_string()))
}

fn level_key(domain: &str, name: &str) -> String {
    format!("{}::{}", domain, name)
}

/// Depth of every subject in the grouping hierarchy, roots at 0
fn subject_levels(rules: &[PolicyValues]) -> AHashMap<String, usize> {
    let mut parent: AHashMap<String, String> = AHashMap::new();
    let mut children: AHashMap<String, Vec<String>> = AHashMap::new();
    for rule in rules {
        let domain = if rule.len() > 2 { rule.field(2) } else { "" };
        let child = level_key(domain, rule.field(0));
        let role = level_key(domain, rule.field(1));
        parent.insert(child.clone(), role.clone());
        children.entry(role).or_default().push(child);
    }

    let mut levels = AHashMap::new();
    let mut queue: VecDeque<(String, usize)> = children
        .keys()
        .filter(|k| !parent.contains_key(*k))
        .map(|k| (k.clone(), 0))
        .collect();
    while let Some((name, level)) = queue.pop_front() {
        if levels.contains_key(&name) {
            continue;
        }
        levels.insert(name.clone(), level);
        if let Some(kids) = children.get(&name) {
            queue.extend(kids.iter().map(|k| (k.clone(), level + 1)));
        }
    }
    levels
}

fn add_or_remove_link(rm: &dyn RoleManager, arity: usize, rule: &PolicyValues, op: PolicyOp) -> Result<()> {
    if rule.len() < arity {
        return Err(WardenError::PolicyArity {
            expected: arity,
            actual: rule.len(),
        });
    }
    let domain = if arity > 2 { Some(rule.field(2)) } else { None };
    match op {
        PolicyOp::Add => rm.add_link(rule.field(0), rule.field(1), domain),
        PolicyOp::Remove => rm.delete_link(rule.field(0), rule.field(1), domain),
    }
}

impl FromStr for Model {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Model> {
        Model::from_text(s)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sec in SECTIONS {
            let Some(defs) = self.sections.get(sec) else { continue };
            if defs.is_empty() {
                continue;
            }
            writeln!(f, "[{}]", section_header(sec).unwrap_or(sec))?;
            for (key, a) in defs {
                writeln!(f, "{} = {}", key, a.value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rbac::DefaultRoleManager;

    const RBAC: &str = "
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
";

    fn row(fields: &[&str]) -> PolicyValues {
        PolicyValues::from(fields)
    }

    #[test]
    fn test_model_from_text() {
        let model: Model = RBAC.parse().unwrap();
        assert_eq!(model.assertion("r", "r").unwrap().tokens, vec!["sub", "obj", "act"]);
        assert_eq!(model.role_types(), vec!["g"]);
        assert_eq!(model.effect_kind_for("p").unwrap(), EffectKind::AllowOverride);
        assert!(matches!(
            model.assertion("p", "p9"),
            Err(WardenError::AssertionNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_section() {
        let err = Model::from_text("[request_definition]\nr = sub\n").unwrap_err();
        assert!(matches!(err, WardenError::MissingSection(s) if s == "policy_definition"));
    }

    #[test]
    fn test_unsupported_effect_rejected_at_load() {
        let text = RBAC.replace("some(where (p.eft == allow))", "max(p.eft)");
        assert!(matches!(
            Model::from_text(&text),
            Err(WardenError::UnsupportedEffect(_))
        ));
    }

    #[test]
    fn test_display_round_trip() {
        let model = Model::from_text(RBAC).unwrap();
        let again = Model::from_text(&model.to_string()).unwrap();
        assert_eq!(again.to_string(), model.to_string());
    }

    #[test]
    fn test_policy_management() {
        let mut model = Model::from_text(RBAC).unwrap();
        assert!(model.add_policy("p", "p", row(&["alice", "data1", "read"])).unwrap());
        assert!(!model.add_policy("p", "p", row(&["alice", "data1", "read"])).unwrap());
        assert!(model
            .add_policies("p", "p", &[row(&["bob", "data2", "write"]), row(&["bob", "data1", "read"])])
            .unwrap());
        assert_eq!(model.get_values_for_field_in_policy("p", "p", 0), vec!["alice", "bob"]);
        assert_eq!(model.get_filtered_policy("p", "p", 0, &["bob".to_string()]).len(), 2);

        assert!(model
            .update_policy("p", "p", &row(&["alice", "data1", "read"]), row(&["alice", "data1", "write"]))
            .unwrap());
        assert!(model.has_policy("p", "p", &row(&["alice", "data1", "write"])));

        let removed = model.remove_filtered_policy("p", "p", 0, &["bob".to_string()]).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(model.get_policy("p", "p").len(), 1);

        assert!(model.add_policy("p", "nope", row(&["x"])).is_err());
        model.clear_policy();
        assert!(model.get_policy("p", "p").is_empty());
    }

    #[test]
    fn test_priority_sort() {
        let text = RBAC.replace("p = sub, obj, act", "p = priority, sub, obj, act, eft");
        let mut model = Model::from_text(&text).unwrap();
        model.add_policy("p", "p", row(&["10", "alice", "d", "read", "allow"])).unwrap();
        model.add_policy("p", "p", row(&["1", "bob", "d", "read", "deny"])).unwrap();
        model.add_policy("p", "p", row(&["10", "carol", "d", "read", "allow"])).unwrap();
        let subjects: Vec<String> = model.get_policy("p", "p").iter().map(|r| r[1].clone()).collect();
        assert_eq!(subjects, vec!["bob", "alice", "carol"]);

        assert!(matches!(
            model.add_policy("p", "p", row(&["high", "dave", "d", "read", "allow"])),
            Err(WardenError::InvalidPriority(v)) if v == "high"
        ));
        assert_eq!(model.get_policy("p", "p").len(), 3);
    }

    #[test]
    fn test_subject_hierarchy_sort() {
        let text = RBAC
            .replace("p = sub, obj, act", "p = sub, obj, act, eft")
            .replace("some(where (p.eft == allow))", "subjectPriority(p.eft) || deny");
        let mut model = Model::from_text(&text).unwrap();
        model.add_policy("p", "p", row(&["root", "data1", "read", "deny"])).unwrap();
        model.add_policy("p", "p", row(&["admin", "data1", "read", "deny"])).unwrap();
        model.add_policy("p", "p", row(&["alice", "data1", "read", "allow"])).unwrap();
        model.add_policy("g", "g", row(&["admin", "root"])).unwrap();
        model.add_policy("g", "g", row(&["alice", "admin"])).unwrap();

        model.sort_policies_by_subject_hierarchy().unwrap();
        let subjects: Vec<String> = model.get_policy("p", "p").iter().map(|r| r[0].clone()).collect();
        assert_eq!(subjects, vec!["alice", "admin", "root"]);
    }

    #[test]
    fn test_build_role_links() {
        let mut model = Model::from_text(RBAC).unwrap();
        model.add_policy("g", "g", row(&["alice", "admin"])).unwrap();
        let rm = DefaultRoleManager::default();
        model.build_role_links("g", &rm).unwrap();
        assert!(rm.has_link("alice", "admin", None));

        model
            .build_incremental_role_links(&rm, PolicyOp::Remove, "g", &[row(&["alice", "admin"])])
            .unwrap();
        assert!(!rm.has_link("alice", "admin", None));

        assert!(matches!(
            model.build_role_links("g2", &rm),
            Err(WardenError::RoleTypeNotFound(_))
        ));
        assert!(model
            .build_incremental_role_links(&rm, PolicyOp::Add, "g", &[row(&["lonely"])])
            .is_err());
    }
}
