//! Persistence and change notification through the enforcer
//!
//! Covers auto-save into the adapter, filtered loading, configuration from
//! TOML and the watcher messages emitted for each kind of edit.

use parking_lot::Mutex;
use std::sync::Arc;
use warden_rs::{
    Adapter, CallbackWatcher, ChannelWatcher, Enforcer, EnforcerConfig, Filter, MemoryAdapter, Model, Operation,
    PolicyChange, PolicyValues, Result, WardenError, Watcher,
};

const MODEL: &str = "
[request_definition]
r = sub, dom, obj, act

[policy_definition]
p = sub, dom, obj, act

[role_definition]
g = _, _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub, r.dom) && r.dom == p.dom && r.obj == p.obj && r.act == p.act
";

const POLICY: &str = "
# tenant one
p, admin, domain1, data1, read
p, admin, domain1, data1, write
# tenant two
p, admin, domain2, data2, read
g, alice, admin, domain1
g, bob, admin, domain2
";

fn enforcer() -> Enforcer {
    Enforcer::with_adapter(Model::from_text(MODEL).unwrap(), MemoryAdapter::from_csv_str(POLICY).unwrap()).unwrap()
}

#[test]
fn test_auto_save_persists_edits_across_reload() {
    let mut e = enforcer();

    e.add_policy(["admin", "domain2", "data2", "write"]).unwrap();
    e.remove_policy(["admin", "domain1", "data1", "write"]).unwrap();
    e.load_policy().unwrap();

    assert!(e.enforce(["bob", "domain2", "data2", "write"]).unwrap());
    assert!(!e.enforce(["alice", "domain1", "data1", "write"]).unwrap());
    assert_eq!(e.get_policy().len(), 3);
}

#[test]
fn test_edits_without_auto_save_are_memory_only() {
    let mut e = enforcer();
    e.enable_auto_save(false);

    e.add_policy(["admin", "domain2", "data2", "write"]).unwrap();
    assert!(e.enforce(["bob", "domain2", "data2", "write"]).unwrap());

    e.load_policy().unwrap();
    assert!(!e.enforce(["bob", "domain2", "data2", "write"]).unwrap());
}

#[test]
fn test_save_policy_writes_full_snapshot() {
    let mut e = enforcer();
    e.enable_auto_save(false);
    e.add_grouping_policy(["carol", "admin", "domain2"]).unwrap();
    e.save_policy().unwrap();

    e.clear_policy();
    assert!(e.get_policy().is_empty());
    assert!(!e.enforce(["carol", "domain2", "data2", "read"]).unwrap());

    e.load_policy().unwrap();
    assert!(e.enforce(["carol", "domain2", "data2", "read"]).unwrap());
}

#[test]
fn test_filtered_load_and_save_guard() {
    let mut e = enforcer();
    let filter = Filter {
        p: vec!["".to_string(), "domain1".to_string()],
        g: vec!["".to_string(), "".to_string(), "domain1".to_string()],
    };
    e.load_filtered_policy(&filter).unwrap();

    assert!(e.is_filtered());
    assert_eq!(e.get_policy().len(), 2);
    assert!(e.enforce(["alice", "domain1", "data1", "read"]).unwrap());
    assert!(!e.enforce(["bob", "domain2", "data2", "read"]).unwrap());

    // A partial view must not overwrite the full store
    assert!(matches!(e.save_policy(), Err(WardenError::Adapter(_))));

    e.load_policy().unwrap();
    assert!(!e.is_filtered());
    assert!(e.enforce(["bob", "domain2", "data2", "read"]).unwrap());
}

/// Adapter that refuses every operation
struct BrokenAdapter;

impl Adapter for BrokenAdapter {
    fn load_policy(&mut self, _model: &mut Model) -> Result<()> {
        Err(WardenError::Adapter("store offline".to_string()))
    }

    fn load_filtered_policy(&mut self, _model: &mut Model, _filter: &Filter) -> Result<()> {
        Err(WardenError::Adapter("store offline".to_string()))
    }

    fn is_filtered(&self) -> bool {
        false
    }

    fn save_policy(&mut self, _model: &Model) -> Result<()> {
        Err(WardenError::Adapter("store offline".to_string()))
    }

    fn add_policy(&mut self, _sec: &str, _ptype: &str, _rule: &PolicyValues) -> Result<bool> {
        Err(WardenError::Adapter("store offline".to_string()))
    }

    fn add_policies(&mut self, _sec: &str, _ptype: &str, _rules: &[PolicyValues]) -> Result<bool> {
        Err(WardenError::Adapter("store offline".to_string()))
    }

    fn remove_policy(&mut self, _sec: &str, _ptype: &str, _rule: &PolicyValues) -> Result<bool> {
        Err(WardenError::Adapter("store offline".to_string()))
    }

    fn remove_policies(&mut self, _sec: &str, _ptype: &str, _rules: &[PolicyValues]) -> Result<bool> {
        Err(WardenError::Adapter("store offline".to_string()))
    }

    fn remove_filtered_policy(
        &mut self,
        _sec: &str,
        _ptype: &str,
        _field_index: usize,
        _values: &[String],
    ) -> Result<bool> {
        Err(WardenError::Adapter("store offline".to_string()))
    }

    fn update_policy(&mut self, _sec: &str, _ptype: &str, _old: &PolicyValues, _new: &PolicyValues) -> Result<bool> {
        Err(WardenError::Adapter("store offline".to_string()))
    }
}

#[test]
fn test_adapter_failure_leaves_memory_untouched() {
    let mut e = enforcer();
    e.set_adapter(BrokenAdapter);

    assert!(e.add_policy(["admin", "domain2", "data2", "write"]).is_err());
    assert!(!e.has_policy(["admin", "domain2", "data2", "write"]));

    assert!(e.remove_policy(["admin", "domain1", "data1", "read"]).is_err());
    assert!(e.enforce(["alice", "domain1", "data1", "read"]).unwrap());

    // Failed reload keeps the policy already in memory
    assert!(e.load_policy().is_err());
    assert_eq!(e.get_policy().len(), 3);
    assert!(e.enforce(["alice", "domain1", "data1", "read"]).unwrap());
}

#[test]
fn test_watcher_receives_each_edit() {
    let mut e = enforcer();
    let (watcher, rx) = ChannelWatcher::new();
    e.set_watcher(watcher);

    e.add_policy(["admin", "domain2", "data2", "write"]).unwrap();
    e.remove_filtered_policy(1, &["domain1"]).unwrap();
    e.update_grouping_policy(["bob", "admin", "domain2"], ["carol", "admin", "domain2"])
        .unwrap();
    e.save_policy().unwrap();

    let changes: Vec<PolicyChange> = rx.try_iter().collect();
    let ops: Vec<Operation> = changes.iter().map(|c| c.operation).collect();
    assert_eq!(
        ops,
        vec![
            Operation::AddPolicies,
            Operation::RemoveFilteredPolicy,
            Operation::UpdatePolicies,
            Operation::SavePolicy,
        ]
    );
    assert_eq!(changes[1].field_index, Some(1));
    assert_eq!(changes[1].old_rules.len(), 2);
    assert_eq!(changes[2].ptype, "g");
}

#[test]
fn test_no_change_means_no_notification() {
    let mut e = enforcer();
    let (watcher, rx) = ChannelWatcher::new();
    e.set_watcher(watcher);

    assert!(!e.add_policy(["admin", "domain1", "data1", "read"]).unwrap());
    assert!(!e.remove_policy(["nobody", "domain1", "data1", "read"]).unwrap());
    assert_eq!(rx.try_iter().count(), 0);

    e.enable_auto_notify_watcher(false);
    e.add_policy(["admin", "domain3", "data3", "read"]).unwrap();
    assert_eq!(rx.try_iter().count(), 0);
}

#[test]
fn test_failing_watcher_does_not_fail_edit() {
    let mut e = enforcer();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    e.set_watcher(CallbackWatcher::new(move |change: &PolicyChange| {
        log.lock().push(change.operation);
        Err(WardenError::Watcher("peer unreachable".to_string()))
    }));

    assert!(e.add_policy(["admin", "domain3", "data3", "read"]).unwrap());
    assert!(e.has_policy(["admin", "domain3", "data3", "read"]));
    assert_eq!(*seen.lock(), vec![Operation::AddPolicies]);
}

#[test]
fn test_bounded_watcher_overflow_is_tolerated() {
    let mut e = enforcer();
    let (watcher, rx) = ChannelWatcher::bounded(1);
    e.set_watcher(watcher);

    e.add_policy(["admin", "domain3", "data3", "read"]).unwrap();
    e.add_policy(["admin", "domain3", "data3", "write"]).unwrap();

    assert_eq!(rx.try_iter().count(), 1);
    assert_eq!(e.get_filtered_policy(1, &["domain3"]).len(), 2);
}

#[test]
fn test_config_from_toml() {
    let config = EnforcerConfig::from_toml_str(
        r#"
auto_save = false
max_hierarchy_level = 2

[cache]
enabled = true
capacity = 64
"#,
    )
    .unwrap();
    let mut e = Enforcer::with_config(Model::from_text(MODEL).unwrap(), config).unwrap();
    e.set_adapter(MemoryAdapter::from_csv_str(POLICY).unwrap());
    e.load_policy().unwrap();

    assert!(!e.config().auto_save);
    assert!(e.decision_cache().is_some());
    assert!(e.enforce(["alice", "domain1", "data1", "read"]).unwrap());

    assert!(EnforcerConfig::from_toml_str("max_hierarchy_level = 0").is_err());
}

/// Watcher that counts notifications, usable as a trait object
struct Counter(Arc<Mutex<usize>>);

impl Watcher for Counter {
    fn update(&self, _change: &PolicyChange) -> Result<()> {
        *self.0.lock() += 1;
        Ok(())
    }
}

#[test]
fn test_clear_policy_notifies() {
    let mut e = enforcer();
    let count = Arc::new(Mutex::new(0));
    e.set_watcher(Counter(count.clone()));

    e.clear_policy();
    assert_eq!(*count.lock(), 1);
    assert!(e.get_grouping_policy().is_empty());
    assert!(e.get_roles_for_user("alice", Some("domain1")).is_empty());
}
