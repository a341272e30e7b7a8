//! Policy and grouping-rule management
//!
//! Every successful edit goes adapter (when auto-save is on), then model,
//! then role links, then caches, then watcher. A batch update the adapter
//! rejects partway is reverted there before the error is returned.

use super::Enforcer;
use crate::core::model::{PolicyOp, PolicyValues};
use crate::core::watcher::PolicyChange;
use crate::error::Result;
use ahash::AHashSet;
use tracing::{debug, warn};

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Enforcer {
    // ---- shared edit paths ----

    fn add_rules(&mut self, sec: &str, ptype: &str, rules: Vec<PolicyValues>) -> Result<bool> {
        self.model.assertion(sec, ptype)?;
        let mut seen = AHashSet::with_capacity(rules.len());
        if rules.is_empty()
            || !rules.iter().all(|r| seen.insert(r))
            || rules.iter().any(|r| self.model.has_policy(sec, ptype, r))
        {
            return Ok(false);
        }
        self.model.check_priority(sec, ptype, &rules)?;

        if self.config.auto_save {
            if let Some(adapter) = self.adapter.as_mut() {
                let saved = match rules.as_slice() {
                    [rule] => adapter.add_policy(sec, ptype, rule)?,
                    _ => adapter.add_policies(sec, ptype, &rules)?,
                };
                if !saved {
                    return Ok(false);
                }
            }
        }
        if !self.model.add_policies(sec, ptype, &rules)? {
            return Ok(false);
        }
        self.after_edit(sec, ptype, PolicyOp::Add, &rules)?;
        self.notify(PolicyChange::added(sec, ptype, rules));
        Ok(true)
    }

    fn remove_rules(&mut self, sec: &str, ptype: &str, rules: Vec<PolicyValues>) -> Result<bool> {
        self.model.assertion(sec, ptype)?;
        if rules.is_empty() || !rules.iter().all(|r| self.model.has_policy(sec, ptype, r)) {
            return Ok(false);
        }

        if self.config.auto_save {
            if let Some(adapter) = self.adapter.as_mut() {
                let removed = match rules.as_slice() {
                    [rule] => adapter.remove_policy(sec, ptype, rule)?,
                    _ => adapter.remove_policies(sec, ptype, &rules)?,
                };
                if !removed {
                    return Ok(false);
                }
            }
        }
        if !self.model.remove_policies(sec, ptype, &rules)? {
            return Ok(false);
        }
        self.after_edit(sec, ptype, PolicyOp::Remove, &rules)?;
        self.notify(PolicyChange::removed(sec, ptype, rules));
        Ok(true)
    }

    fn remove_filtered_rules(&mut self, sec: &str, ptype: &str, field_index: usize, values: &[&str]) -> Result<bool> {
        self.model.assertion(sec, ptype)?;
        let values = to_strings(values);
        if values.is_empty()
            || values.iter().all(String::is_empty)
            || self
                .model
                .get_filtered_policy(sec, ptype, field_index, &values)
                .is_empty()
        {
            return Ok(false);
        }

        if self.config.auto_save {
            if let Some(adapter) = self.adapter.as_mut() {
                if !adapter.remove_filtered_policy(sec, ptype, field_index, &values)? {
                    return Ok(false);
                }
            }
        }
        let removed = self
            .model
            .remove_filtered_policy(sec, ptype, field_index, &values)?;
        if removed.is_empty() {
            return Ok(false);
        }
        self.after_edit(sec, ptype, PolicyOp::Remove, &removed)?;
        self.notify(PolicyChange::removed_filtered(sec, ptype, field_index, removed));
        Ok(true)
    }

    fn update_rules(
        &mut self,
        sec: &str,
        ptype: &str,
        old: Vec<PolicyValues>,
        new: Vec<PolicyValues>,
    ) -> Result<bool> {
        self.model.assertion(sec, ptype)?;
        if old.is_empty()
            || old.len() != new.len()
            || !old.iter().all(|r| self.model.has_policy(sec, ptype, r))
        {
            return Ok(false);
        }
        self.model.check_priority(sec, ptype, &new)?;

        if self.config.auto_save {
            if let Some(adapter) = self.adapter.as_mut() {
                let mut applied = 0;
                let mut failed = None;
                for (o, n) in old.iter().zip(&new) {
                    match adapter.update_policy(sec, ptype, o, n) {
                        Ok(true) => applied += 1,
                        Ok(false) => {
                            failed = Some(Ok(false));
                            break;
                        }
                        Err(e) => {
                            failed = Some(Err(e));
                            break;
                        }
                    }
                }
                if let Some(outcome) = failed {
                    // Put the rows already written back to their old values
                    for (o, n) in old.iter().zip(&new).take(applied).rev() {
                        if let Err(e) = adapter.update_policy(sec, ptype, n, o) {
                            warn!("Could not restore ({}) in the adapter: {}", o, e);
                        }
                    }
                    return outcome;
                }
            }
        }
        if !self.model.update_policies(sec, ptype, &old, &new)? {
            return Ok(false);
        }
        self.after_edit(sec, ptype, PolicyOp::Remove, &old)?;
        self.after_edit(sec, ptype, PolicyOp::Add, &new)?;
        self.notify(PolicyChange::updated(sec, ptype, old, new));
        Ok(true)
    }

    /// Bring role links, ordering and caches in line with an applied edit
    ///
    /// The model has already changed when this runs, so the caches are
    /// cleared whether or not the role graph could be patched.
    fn after_edit(&mut self, sec: &str, ptype: &str, op: PolicyOp, rules: &[PolicyValues]) -> Result<()> {
        let linked = if sec == "g" {
            let linked = self.relink(ptype, op, rules);
            self.clear_membership(ptype);
            linked
        } else {
            Ok(())
        };
        let sorted = self.model.sort_policies_by_subject_hierarchy();
        if self.config.cache.auto_clean {
            self.invalidate_decisions();
        }
        debug!("{:?} {} rule(s) on {}.{}", op, rules.len(), sec, ptype);
        linked.and(sorted)
    }

    /// Patch the role graph of `ptype`, rebuilding it from the model when a
    /// patch cannot be applied
    fn relink(&self, ptype: &str, op: PolicyOp, rules: &[PolicyValues]) -> Result<()> {
        if !self.config.auto_build_role_links {
            return Ok(());
        }
        let Some(rm) = self.role_managers.get(ptype) else {
            return Ok(());
        };
        if let Err(e) = self
            .model
            .build_incremental_role_links(rm.as_ref(), op, ptype, rules)
        {
            warn!("Incremental {:?} on {} failed ({}), rebuilding links", op, ptype, e);
            rm.clear();
            self.model.build_role_links(ptype, rm.as_ref())?;
        }
        Ok(())
    }

    // ---- policy rules ----

    pub fn add_policy(&mut self, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.add_named_policy("p", rule)
    }

    pub fn add_named_policy(&mut self, ptype: &str, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.add_rules("p", ptype, vec![rule.into()])
    }

    /// Add every rule or none
    pub fn add_policies(&mut self, rules: Vec<PolicyValues>) -> Result<bool> {
        self.add_named_policies("p", rules)
    }

    pub fn add_named_policies(&mut self, ptype: &str, rules: Vec<PolicyValues>) -> Result<bool> {
        self.add_rules("p", ptype, rules)
    }

    pub fn remove_policy(&mut self, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.remove_named_policy("p", rule)
    }

    pub fn remove_named_policy(&mut self, ptype: &str, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.remove_rules("p", ptype, vec![rule.into()])
    }

    /// Remove every rule or none
    pub fn remove_policies(&mut self, rules: Vec<PolicyValues>) -> Result<bool> {
        self.remove_named_policies("p", rules)
    }

    pub fn remove_named_policies(&mut self, ptype: &str, rules: Vec<PolicyValues>) -> Result<bool> {
        self.remove_rules("p", ptype, rules)
    }

    /// Remove rules whose fields from `field_index` on match `values`
    /// (empty values match anything)
    pub fn remove_filtered_policy(&mut self, field_index: usize, values: &[&str]) -> Result<bool> {
        self.remove_filtered_named_policy("p", field_index, values)
    }

    pub fn remove_filtered_named_policy(&mut self, ptype: &str, field_index: usize, values: &[&str]) -> Result<bool> {
        self.remove_filtered_rules("p", ptype, field_index, values)
    }

    pub fn update_policy(&mut self, old: impl Into<PolicyValues>, new: impl Into<PolicyValues>) -> Result<bool> {
        self.update_named_policy("p", old, new)
    }

    pub fn update_named_policy(
        &mut self,
        ptype: &str,
        old: impl Into<PolicyValues>,
        new: impl Into<PolicyValues>,
    ) -> Result<bool> {
        self.update_rules("p", ptype, vec![old.into()], vec![new.into()])
    }

    /// Replace `old[i]` with `new[i]` for every `i`, or change nothing
    pub fn update_policies(&mut self, old: Vec<PolicyValues>, new: Vec<PolicyValues>) -> Result<bool> {
        self.update_rules("p", "p", old, new)
    }

    // ---- grouping rules ----

    pub fn add_grouping_policy(&mut self, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.add_named_grouping_policy("g", rule)
    }

    pub fn add_named_grouping_policy(&mut self, ptype: &str, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.add_rules("g", ptype, vec![rule.into()])
    }

    pub fn add_grouping_policies(&mut self, rules: Vec<PolicyValues>) -> Result<bool> {
        self.add_named_grouping_policies("g", rules)
    }

    pub fn add_named_grouping_policies(&mut self, ptype: &str, rules: Vec<PolicyValues>) -> Result<bool> {
        self.add_rules("g", ptype, rules)
    }

    pub fn remove_grouping_policy(&mut self, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.remove_named_grouping_policy("g", rule)
    }

    pub fn remove_named_grouping_policy(&mut self, ptype: &str, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.remove_rules("g", ptype, vec![rule.into()])
    }

    pub fn remove_grouping_policies(&mut self, rules: Vec<PolicyValues>) -> Result<bool> {
        self.remove_rules("g", "g", rules)
    }

    pub fn remove_filtered_grouping_policy(&mut self, field_index: usize, values: &[&str]) -> Result<bool> {
        self.remove_filtered_named_grouping_policy("g", field_index, values)
    }

    pub fn remove_filtered_named_grouping_policy(
        &mut self,
        ptype: &str,
        field_index: usize,
        values: &[&str],
    ) -> Result<bool> {
        self.remove_filtered_rules("g", ptype, field_index, values)
    }

    pub fn update_grouping_policy(&mut self, old: impl Into<PolicyValues>, new: impl Into<PolicyValues>) -> Result<bool> {
        self.update_named_grouping_policy("g", old, new)
    }

    pub fn update_named_grouping_policy(
        &mut self,
        ptype: &str,
        old: impl Into<PolicyValues>,
        new: impl Into<PolicyValues>,
    ) -> Result<bool> {
        self.update_rules("g", ptype, vec![old.into()], vec![new.into()])
    }

    // ---- queries ----

    pub fn get_policy(&self) -> Vec<PolicyValues> {
        self.get_named_policy("p")
    }

    pub fn get_named_policy(&self, ptype: &str) -> Vec<PolicyValues> {
        self.model.get_policy("p", ptype)
    }

    pub fn get_filtered_policy(&self, field_index: usize, values: &[&str]) -> Vec<PolicyValues> {
        self.get_filtered_named_policy("p", field_index, values)
    }

    pub fn get_filtered_named_policy(&self, ptype: &str, field_index: usize, values: &[&str]) -> Vec<PolicyValues> {
        self.model
            .get_filtered_policy("p", ptype, field_index, &to_strings(values))
    }

    pub fn get_grouping_policy(&self) -> Vec<PolicyValues> {
        self.get_named_grouping_policy("g")
    }

    pub fn get_named_grouping_policy(&self, ptype: &str) -> Vec<PolicyValues> {
        self.model.get_policy("g", ptype)
    }

    pub fn get_filtered_grouping_policy(&self, field_index: usize, values: &[&str]) -> Vec<PolicyValues> {
        self.model
            .get_filtered_policy("g", "g", field_index, &to_strings(values))
    }

    pub fn has_policy(&self, rule: impl Into<PolicyValues>) -> bool {
        self.has_named_policy("p", rule)
    }

    pub fn has_named_policy(&self, ptype: &str, rule: impl Into<PolicyValues>) -> bool {
        self.model.has_policy("p", ptype, &rule.into())
    }

    pub fn has_grouping_policy(&self, rule: impl Into<PolicyValues>) -> bool {
        self.has_named_grouping_policy("g", rule)
    }

    pub fn has_named_grouping_policy(&self, ptype: &str, rule: impl Into<PolicyValues>) -> bool {
        self.model.has_policy("g", ptype, &rule.into())
    }

    /// Distinct subjects of `p` rules, in first-seen order
    pub fn get_all_subjects(&self) -> Vec<String> {
        self.get_all_named_subjects("p")
    }

    pub fn get_all_named_subjects(&self, ptype: &str) -> Vec<String> {
        self.field_values(ptype, "sub", 0)
    }

    pub fn get_all_objects(&self) -> Vec<String> {
        self.get_all_named_objects("p")
    }

    pub fn get_all_named_objects(&self, ptype: &str) -> Vec<String> {
        self.field_values(ptype, "obj", 1)
    }

    pub fn get_all_actions(&self) -> Vec<String> {
        self.get_all_named_actions("p")
    }

    pub fn get_all_named_actions(&self, ptype: &str) -> Vec<String> {
        self.field_values(ptype, "act", 2)
    }

    /// Distinct roles named by grouping rules
    pub fn get_all_roles(&self) -> Vec<String> {
        self.get_all_named_roles("g")
    }

    pub fn get_all_named_roles(&self, ptype: &str) -> Vec<String> {
        self.model.get_values_for_field_in_policy("g", ptype, 1)
    }

    fn field_values(&self, ptype: &str, field: &str, fallback: usize) -> Vec<String> {
        let idx = self.model.field_index(ptype, field).unwrap_or(fallback);
        self.model.get_values_for_field_in_policy("p", ptype, idx)
    }
}
