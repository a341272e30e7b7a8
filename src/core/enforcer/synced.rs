//! Lock-guarded enforcer for concurrent decisions and edits

use super::Enforcer;
use crate::core::model::{PolicyValues, RequestValues};
use crate::error::Result;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared [`Enforcer`] behind a reader/writer lock
///
/// Decisions take the read lock, so they run concurrently; policy edits
/// take the write lock and are applied one at a time.
///
/// # Examples
/// ```
/// use warden_rs::{Enforcer, SyncedEnforcer};
/// use std::thread;
///
/// let model = "
/// [request_definition]
/// r = sub, obj, act
/// [policy_definition]
/// p = sub, obj, act
/// [policy_effect]
/// e = some(where (p.eft == allow))
/// [matchers]
/// m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
/// ";
/// let shared = SyncedEnforcer::new(Enforcer::from_text(model, "p, alice, data1, read").unwrap());
///
/// let writer = shared.clone();
/// thread::spawn(move || writer.add_policy(["bob", "data1", "read"]).unwrap())
///     .join()
///     .unwrap();
/// assert!(shared.enforce(["bob", "data1", "read"]).unwrap());
/// ```
#[derive(Clone)]
pub struct SyncedEnforcer {
    inner: Arc<RwLock<Enforcer>>,
}

impl SyncedEnforcer {
    pub fn new(enforcer: Enforcer) -> Self {
        SyncedEnforcer {
            inner: Arc::new(RwLock::new(enforcer)),
        }
    }

    /// Shared access for reads not wrapped here
    pub fn read(&self) -> RwLockReadGuard<'_, Enforcer> {
        self.inner.read()
    }

    /// Exclusive access for edits not wrapped here
    pub fn write(&self) -> RwLockWriteGuard<'_, Enforcer> {
        self.inner.write()
    }

    pub fn enforce(&self, request: impl Into<RequestValues>) -> Result<bool> {
        self.inner.read().enforce(request)
    }

    pub fn enforce_ex(&self, request: impl Into<RequestValues>) -> Result<(bool, Vec<PolicyValues>)> {
        self.inner.read().enforce_ex(request)
    }

    pub fn batch_enforce<R: Into<RequestValues>>(&self, requests: impl IntoIterator<Item = R>) -> Result<Vec<bool>> {
        self.inner.read().batch_enforce(requests)
    }

    pub fn load_policy(&self) -> Result<()> {
        self.inner.write().load_policy()
    }

    pub fn save_policy(&self) -> Result<()> {
        self.inner.write().save_policy()
    }

    pub fn add_policy(&self, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.inner.write().add_policy(rule)
    }

    pub fn add_policies(&self, rules: Vec<PolicyValues>) -> Result<bool> {
        self.inner.write().add_policies(rules)
    }

    pub fn remove_policy(&self, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.inner.write().remove_policy(rule)
    }

    pub fn remove_filtered_policy(&self, field_index: usize, values: &[&str]) -> Result<bool> {
        self.inner.write().remove_filtered_policy(field_index, values)
    }

    pub fn update_policy(&self, old: impl Into<PolicyValues>, new: impl Into<PolicyValues>) -> Result<bool> {
        self.inner.write().update_policy(old, new)
    }

    pub fn add_grouping_policy(&self, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.inner.write().add_grouping_policy(rule)
    }

    pub fn remove_grouping_policy(&self, rule: impl Into<PolicyValues>) -> Result<bool> {
        self.inner.write().remove_grouping_policy(rule)
    }

    pub fn get_policy(&self) -> Vec<PolicyValues> {
        self.inner.read().get_policy()
    }

    pub fn get_grouping_policy(&self) -> Vec<PolicyValues> {
        self.inner.read().get_grouping_policy()
    }

    pub fn get_roles_for_user(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        self.inner.read().get_roles_for_user(name, domain)
    }
}

impl std::fmt::Debug for SyncedEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedEnforcer")
            .field("inner", &*self.inner.read())
            .finish()
    }
}
