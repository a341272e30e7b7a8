//! # Warden - Embeddable Authorization Decisions
//!
//! `warden-rs` decides whether a request (subject, object, action, ...) is
//! permitted, given a model and a set of policy rules. The model is a small
//! INI-like document:
//!
//! - **request/policy definitions** name the fields of requests and rules
//! - **role definitions** declare role inheritance (`g`), optionally per domain
//! - **policy effect** picks how matching rules combine (allow-override,
//!   deny-override, priority, ...)
//! - **matchers** are boolean expressions over request and rule fields
//!
//! ## Quick Start
//!
//! ```rust
//! use warden_rs::{Enforcer, Result};
//!
//! # fn main() -> Result<()> {
//! let model = r#"
//! [request_definition]
//! r = sub, obj, act
//!
//! [policy_definition]
//! p = sub, obj, act
//!
//! [role_definition]
//! g = _, _
//!
//! [policy_effect]
//! e = some(where (p.eft == allow))
//!
//! [matchers]
//! m = g(r.sub, p.sub) && keyMatch2(r.obj, p.obj) && r.act == p.act
//! "#;
//!
//! let policy = "
//! p, reader, /docs/:id, GET
//! g, alice, reader
//! ";
//!
//! let mut e = Enforcer::from_text(model, policy)?;
//! assert!(e.enforce(["alice", "/docs/42", "GET"])?);
//! assert!(!e.enforce(["alice", "/docs/42", "DELETE"])?);
//!
//! // Edits apply immediately
//! e.add_policy(["reader", "/docs/:id", "HEAD"])?;
//! assert!(e.enforce(["alice", "/docs/42", "HEAD"])?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborators
//!
//! The engine performs no I/O. Policy rows come from an [`Adapter`]
//! ([`MemoryAdapter`] parses CSV-like text), changes are announced to a
//! [`Watcher`], and decisions may be memoized by a [`DecisionCache`].
//! Behaviour switches live in [`EnforcerConfig`], loadable from TOML.

pub mod core;
pub mod error;

pub use crate::core::{expr, functions};

pub use crate::core::{
    adapter::{Adapter, Filter, MemoryAdapter},
    cache::{
        DecisionCache, LruDecisionCache, MembershipCache, DEFAULT_DECISION_CACHE_CAPACITY,
        DEFAULT_MEMBERSHIP_CACHE_CAPACITY,
    },
    config::{CacheConfig, EnforcerConfig, FunctionConfig},
    effect::{Effect, EffectChain, EffectKind},
    enforcer::{EnforceContext, EnforceView, Enforcer, SyncedEnforcer},
    model::{Assertion, Model, PolicyOp, PolicyStore, PolicyValues, RequestValue, RequestValues, INLINE_FIELDS},
    rbac::{DefaultRoleManager, MatchingFn, Role, RoleDomain, RoleManager, DEFAULT_MAX_HIERARCHY_LEVEL},
    watcher::{CallbackWatcher, ChannelWatcher, Operation, PolicyChange, Watcher},
};
pub use crate::error::{Result, WardenError};
