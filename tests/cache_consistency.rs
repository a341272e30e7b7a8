//! Decision cache consistency across policy and role edits
//!
//! Also covers the membership cache bound, key encoding with separator
//! characters in values and adapter writes that fail partway.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use warden_rs::{
    Adapter, DecisionCache, Enforcer, EnforcerConfig, Filter, LruDecisionCache, MemoryAdapter, Model, PolicyValues,
    Result, RoleManager, WardenError,
};

const MODEL: &str = "
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

const POLICY: &str = "
p, alice, data1, read
p, data2_admin, data2, read
g, alice, data2_admin
";

fn cached_enforcer(auto_clean: bool) -> Enforcer {
    let mut config = EnforcerConfig::default();
    config.cache.enabled = true;
    config.cache.auto_clean = auto_clean;
    let mut e = Enforcer::with_config(Model::from_text(MODEL).unwrap(), config).unwrap();
    e.set_adapter(MemoryAdapter::from_csv_str(POLICY).unwrap());
    e.load_policy().unwrap();
    e
}

#[test]
fn test_policy_removal_invalidates_cached_allow() {
    let mut e = cached_enforcer(true);

    assert!(e.enforce(["alice", "data1", "read"]).unwrap());
    assert!(e.enforce(["alice", "data1", "read"]).unwrap());

    e.remove_policy(["alice", "data1", "read"]).unwrap();
    assert!(!e.enforce(["alice", "data1", "read"]).unwrap());
}

#[test]
fn test_policy_addition_invalidates_cached_deny() {
    let mut e = cached_enforcer(true);

    assert!(!e.enforce(["bob", "data1", "read"]).unwrap());
    e.add_policy(["bob", "data1", "read"]).unwrap();
    assert!(e.enforce(["bob", "data1", "read"]).unwrap());
}

#[test]
fn test_role_edit_invalidates_cached_decision() {
    let mut e = cached_enforcer(true);

    assert!(e.enforce(["alice", "data2", "read"]).unwrap());
    e.delete_role_for_user("alice", "data2_admin", None).unwrap();
    assert!(!e.enforce(["alice", "data2", "read"]).unwrap());

    e.add_role_for_user("alice", "data2_admin", None).unwrap();
    assert!(e.enforce(["alice", "data2", "read"]).unwrap());
}

#[test]
fn test_reload_invalidates_cached_decision() {
    let mut e = cached_enforcer(true);
    assert!(e.enforce(["alice", "data1", "read"]).unwrap());

    e.set_adapter(MemoryAdapter::from_csv_str("p, bob, data1, read").unwrap());
    e.load_policy().unwrap();
    assert!(!e.enforce(["alice", "data1", "read"]).unwrap());
    assert!(e.enforce(["bob", "data1", "read"]).unwrap());
}

#[test]
fn test_stale_decision_kept_without_auto_clean() {
    let mut e = cached_enforcer(false);

    assert!(e.enforce(["alice", "data1", "read"]).unwrap());
    e.remove_policy(["alice", "data1", "read"]).unwrap();

    // Cached answer survives until the cache is cleared by hand
    assert!(e.enforce(["alice", "data1", "read"]).unwrap());
    e.decision_cache().unwrap().clear();
    assert!(!e.enforce(["alice", "data1", "read"]).unwrap());
}

/// Cache wrapper that counts lookups and hits
struct CountingCache {
    inner: LruDecisionCache,
    hits: Arc<AtomicUsize>,
}

impl DecisionCache for CountingCache {
    fn try_get(&self, key: &str) -> Option<bool> {
        let hit = self.inner.try_get(key);
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        hit
    }

    fn set(&self, key: &str, result: bool) {
        self.inner.set(key, result)
    }

    fn clear(&self) {
        self.inner.clear()
    }
}

#[test]
fn test_custom_cache_is_consulted() {
    let mut e = Enforcer::from_text(MODEL, POLICY).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    e.set_decision_cache(CountingCache {
        inner: LruDecisionCache::new(16).unwrap(),
        hits: hits.clone(),
    });

    for _ in 0..5 {
        assert!(e.enforce(["alice", "data1", "read"]).unwrap());
    }
    assert_eq!(hits.load(Ordering::SeqCst), 4);

    e.add_policy(["carol", "data3", "read"]).unwrap();
    assert!(e.enforce(["alice", "data1", "read"]).unwrap());
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[test]
fn test_cache_config_toggle() {
    let mut e = cached_enforcer(true);
    assert!(e.decision_cache().is_some());

    let mut config = e.config().clone();
    config.cache.enabled = false;
    e.set_config(config).unwrap();
    assert!(e.decision_cache().is_none());
    assert!(e.enforce(["alice", "data1", "read"]).unwrap());
}

#[test]
fn test_zero_capacity_rejected() {
    let mut config = EnforcerConfig::default();
    config.cache.enabled = true;
    config.cache.capacity = 0;
    assert!(Enforcer::with_config(Model::from_text(MODEL).unwrap(), config).is_err());
}

#[test]
fn test_failed_link_patch_still_drops_cached_membership() {
    let mut e = cached_enforcer(false);

    // carol's row is in the policy but never reached the role graph
    e.enable_auto_build_role_links(false);
    e.add_grouping_policy(["carol", "x"]).unwrap();
    e.enable_auto_build_role_links(true);

    assert!(e.enforce(["alice", "data2", "read"]).unwrap());
    assert!(e
        .remove_grouping_policies(vec![
            PolicyValues::from(["alice", "data2_admin"]),
            PolicyValues::from(["carol", "x"]),
        ])
        .unwrap());

    assert!(!e.has_grouping_policy(["alice", "data2_admin"]));
    assert!(!e.role_manager("g").unwrap().has_link("alice", "data2_admin", None));
    e.decision_cache().unwrap().clear();
    assert!(!e.enforce(["alice", "data2", "read"]).unwrap());
}

#[test]
fn test_failed_link_patch_with_auto_clean() {
    let mut e = cached_enforcer(true);
    e.enable_auto_build_role_links(false);
    e.add_grouping_policy(["carol", "x"]).unwrap();
    e.enable_auto_build_role_links(true);

    assert!(e.enforce(["alice", "data2", "read"]).unwrap());
    e.remove_grouping_policies(vec![
        PolicyValues::from(["carol", "x"]),
        PolicyValues::from(["alice", "data2_admin"]),
    ])
    .unwrap();
    assert!(!e.enforce(["alice", "data2", "read"]).unwrap());
}

#[test]
fn test_separators_in_values_do_not_share_cache_entries() {
    let mut e = cached_enforcer(true);
    e.add_policy(["a$$b", "c", "d"]).unwrap();

    assert!(e.enforce(["a$$b", "c", "d"]).unwrap());
    assert!(e.enforce(["a$$b", "c", "d"]).unwrap());
    assert!(!e.enforce(["a", "b$$c", "d"]).unwrap());
    assert!(!e.enforce(["a$$b$$c", "", "d"]).unwrap());
}

#[test]
fn test_membership_cache_stays_bounded() {
    let mut config = EnforcerConfig::default();
    config.functions.membership_cache_capacity = 32;
    let mut e = Enforcer::with_config(Model::from_text(MODEL).unwrap(), config).unwrap();
    e.set_adapter(MemoryAdapter::from_csv_str(POLICY).unwrap());
    e.load_policy().unwrap();

    for i in 0..2_000 {
        let user = format!("user{}", i);
        assert!(!e.enforce([user.as_str(), "data2", "read"]).unwrap());
    }
    let cache = e.membership_cache("g").unwrap();
    assert_eq!(cache.capacity(), 32);
    assert_eq!(cache.len(), 32);
    assert!(e.enforce(["alice", "data2", "read"]).unwrap());

    // Resizing through the config swaps in a fresh cache
    let mut config = e.config().clone();
    config.functions.membership_cache_capacity = 4;
    e.set_config(config).unwrap();
    assert_eq!(e.membership_cache("g").unwrap().capacity(), 4);
    assert!(e.enforce(["alice", "data2", "read"]).unwrap());
}

/// Memory adapter that fails one chosen update and can refuse filtered removal
struct FlakyAdapter {
    inner: MemoryAdapter,
    updates: usize,
    fail_update: usize,
    refuse_filtered: bool,
}

impl FlakyAdapter {
    fn new(fail_update: usize, refuse_filtered: bool) -> Self {
        FlakyAdapter {
            inner: MemoryAdapter::from_csv_str(POLICY).unwrap(),
            updates: 0,
            fail_update,
            refuse_filtered,
        }
    }
}

impl Adapter for FlakyAdapter {
    fn load_policy(&mut self, model: &mut Model) -> Result<()> {
        self.inner.load_policy(model)
    }

    fn load_filtered_policy(&mut self, model: &mut Model, filter: &Filter) -> Result<()> {
        self.inner.load_filtered_policy(model, filter)
    }

    fn is_filtered(&self) -> bool {
        self.inner.is_filtered()
    }

    fn save_policy(&mut self, model: &Model) -> Result<()> {
        self.inner.save_policy(model)
    }

    fn add_policy(&mut self, sec: &str, ptype: &str, rule: &PolicyValues) -> Result<bool> {
        self.inner.add_policy(sec, ptype, rule)
    }

    fn add_policies(&mut self, sec: &str, ptype: &str, rules: &[PolicyValues]) -> Result<bool> {
        self.inner.add_policies(sec, ptype, rules)
    }

    fn remove_policy(&mut self, sec: &str, ptype: &str, rule: &PolicyValues) -> Result<bool> {
        self.inner.remove_policy(sec, ptype, rule)
    }

    fn remove_policies(&mut self, sec: &str, ptype: &str, rules: &[PolicyValues]) -> Result<bool> {
        self.inner.remove_policies(sec, ptype, rules)
    }

    fn remove_filtered_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<bool> {
        if self.refuse_filtered {
            return Ok(false);
        }
        self.inner.remove_filtered_policy(sec, ptype, field_index, values)
    }

    fn update_policy(&mut self, sec: &str, ptype: &str, old: &PolicyValues, new: &PolicyValues) -> Result<bool> {
        self.updates += 1;
        if self.updates == self.fail_update {
            return Err(WardenError::Adapter("write rejected".to_string()));
        }
        self.inner.update_policy(sec, ptype, old, new)
    }
}

fn flaky_enforcer(fail_update: usize, refuse_filtered: bool) -> Enforcer {
    let mut e = Enforcer::from_text(MODEL, "").unwrap();
    e.set_adapter(FlakyAdapter::new(fail_update, refuse_filtered));
    e.load_policy().unwrap();
    e
}

#[test]
fn test_partial_batch_update_is_rolled_back_in_adapter() {
    let mut e = flaky_enforcer(2, false);
    assert!(e.enforce(["alice", "data1", "read"]).unwrap());

    let result = e.update_policies(
        vec![
            PolicyValues::from(["alice", "data1", "read"]),
            PolicyValues::from(["data2_admin", "data2", "read"]),
        ],
        vec![
            PolicyValues::from(["alice", "data1", "write"]),
            PolicyValues::from(["data2_admin", "data2", "write"]),
        ],
    );
    assert!(matches!(result, Err(WardenError::Adapter(_))));
    assert!(e.has_policy(["alice", "data1", "read"]));
    assert!(e.enforce(["alice", "data1", "read"]).unwrap());

    // The first row written before the failure was restored
    e.load_policy().unwrap();
    assert!(e.has_policy(["alice", "data1", "read"]));
    assert!(!e.has_policy(["alice", "data1", "write"]));
    assert!(e.has_policy(["data2_admin", "data2", "read"]));
    assert_eq!(e.get_policy().len(), 2);
}

#[test]
fn test_refused_filtered_removal_keeps_model() {
    let mut e = flaky_enforcer(0, true);

    assert!(!e.remove_filtered_policy(0, &["alice"]).unwrap());
    assert!(e.has_policy(["alice", "data1", "read"]));
    assert!(e.enforce(["alice", "data1", "read"]).unwrap());

    // Nothing matches, so the adapter is not asked at all
    assert!(!e.remove_filtered_policy(0, &["nobody"]).unwrap());
}
