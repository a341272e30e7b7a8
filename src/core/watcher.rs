//! Change notification
//!
//! After every successful policy mutation the enforcer hands a
//! [`PolicyChange`] to its [`Watcher`]. The change carries enough to replay
//! it on another instance without a full reload.

use crate::core::model::PolicyValues;
use crate::error::{Result, WardenError};
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of policy mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AddPolicies,
    RemovePolicies,
    RemoveFilteredPolicy,
    UpdatePolicies,
    SavePolicy,
    ClearPolicy,
}

/// One mutation, as seen by watchers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyChange {
    pub operation: Operation,
    /// `p` or `g`; empty for whole-store operations
    pub section: String,
    pub ptype: String,
    /// Start column of a filtered removal
    pub field_index: Option<usize>,
    /// Rows removed or replaced
    pub old_rules: Vec<PolicyValues>,
    /// Rows added or written
    pub new_rules: Vec<PolicyValues>,
}

impl PolicyChange {
    pub fn added(section: &str, ptype: &str, rules: Vec<PolicyValues>) -> Self {
        Self::new(Operation::AddPolicies, section, ptype, None, Vec::new(), rules)
    }

    pub fn removed(section: &str, ptype: &str, rules: Vec<PolicyValues>) -> Self {
        Self::new(Operation::RemovePolicies, section, ptype, None, rules, Vec::new())
    }

    pub fn removed_filtered(section: &str, ptype: &str, field_index: usize, rules: Vec<PolicyValues>) -> Self {
        Self::new(
            Operation::RemoveFilteredPolicy,
            section,
            ptype,
            Some(field_index),
            rules,
            Vec::new(),
        )
    }

    pub fn updated(section: &str, ptype: &str, old: Vec<PolicyValues>, new: Vec<PolicyValues>) -> Self {
        Self::new(Operation::UpdatePolicies, section, ptype, None, old, new)
    }

    /// A whole-store operation (`SavePolicy`, `ClearPolicy`)
    pub fn store(operation: Operation) -> Self {
        Self::new(operation, "", "", None, Vec::new(), Vec::new())
    }

    fn new(
        operation: Operation,
        section: &str,
        ptype: &str,
        field_index: Option<usize>,
        old_rules: Vec<PolicyValues>,
        new_rules: Vec<PolicyValues>,
    ) -> Self {
        PolicyChange {
            operation,
            section: section.to_string(),
            ptype: ptype.to_string(),
            field_index,
            old_rules,
            new_rules,
        }
    }
}

/// Receiver of policy change notifications
pub trait Watcher: Send + Sync {
    fn update(&self, change: &PolicyChange) -> Result<()>;
}

/// Watcher that forwards every change into a channel
///
/// # Examples
/// ```
/// use warden_rs::{ChannelWatcher, Operation, PolicyChange, Watcher};
///
/// let (watcher, rx) = ChannelWatcher::new();
/// watcher.update(&PolicyChange::store(Operation::ClearPolicy)).unwrap();
/// assert_eq!(rx.try_recv().unwrap().operation, Operation::ClearPolicy);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelWatcher {
    sender: Sender<PolicyChange>,
}

impl ChannelWatcher {
    /// Unbounded watcher and its receiving end
    pub fn new() -> (Self, Receiver<PolicyChange>) {
        let (sender, receiver) = channel::unbounded();
        (ChannelWatcher { sender }, receiver)
    }

    /// Watcher over a channel with room for `capacity` pending changes
    pub fn bounded(capacity: usize) -> (Self, Receiver<PolicyChange>) {
        let (sender, receiver) = channel::bounded(capacity);
        (ChannelWatcher { sender }, receiver)
    }
}

impl Watcher for ChannelWatcher {
    fn update(&self, change: &PolicyChange) -> Result<()> {
        self.sender
            .try_send(change.clone())
            .map_err(|e| WardenError::Watcher(e.to_string()))
    }
}

/// Watcher backed by a closure
#[derive(Clone)]
pub struct CallbackWatcher {
    callback: Arc<dyn Fn(&PolicyChange) -> Result<()> + Send + Sync>,
}

impl CallbackWatcher {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&PolicyChange) -> Result<()> + Send + Sync + 'static,
    {
        CallbackWatcher {
            callback: Arc::new(callback),
        }
    }
}

impl Watcher for CallbackWatcher {
    fn update(&self, change: &PolicyChange) -> Result<()> {
        (self.callback)(change)
    }
}

impl std::fmt::Debug for CallbackWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackWatcher").finish_non_exhaustive()
    }
}
