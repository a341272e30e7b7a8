//! Decision engine internals
//!
//! - [`model`] - model definitions, policy rows and the policy store
//! - [`rbac`] - role graph and role managers
//! - [`effect`] - effect merging
//! - [`expr`] - matcher parsing, compilation and evaluation
//! - [`functions`] - built-in matching functions and the function registry
//! - [`enforcer`] - the decision and management API
//! - [`cache`], [`adapter`], [`watcher`], [`config`] - collaborators

pub mod adapter;
pub mod cache;
pub mod config;
pub mod effect;
pub mod enforcer;
pub mod expr;
pub mod functions;
pub mod model;
pub mod rbac;
pub mod watcher;
