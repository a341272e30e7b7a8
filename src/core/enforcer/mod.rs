//! Enforcer: the decision API
//!
//! An [`Enforcer`] owns a [`Model`], one role manager per role type, the
//! function registry used by matchers and the optional collaborators
//! (adapter, watcher, decision cache). Decisions take `&self`, so one
//! enforcer can serve many threads; policy edits take `&mut self` (see
//! [`SyncedEnforcer`] for a lock-guarded variant).

mod management;
mod rbac_api;
mod synced;
mod view;

pub use synced::SyncedEnforcer;
pub use view::{EnforceContext, EnforceView};

use crate::core::adapter::{Adapter, Filter, MemoryAdapter};
use crate::core::cache::{DecisionCache, LruDecisionCache, MembershipCache};
use crate::core::config::EnforcerConfig;
use crate::core::effect::{Effect, EffectChain};
use crate::core::expr::{has_eval, rewrite_eval, EvalContext, Program, Value};
use crate::core::functions::{function, Function, FunctionMap, PatternCache};
use crate::core::model::{Model, PolicyOp, PolicyValues, RequestValues};
use crate::core::rbac::{DefaultRoleManager, MatchingFn, RoleManager};
use crate::core::watcher::{Operation, PolicyChange, Watcher};
use crate::error::{Result, WardenError};
use ahash::AHashMap;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Compiled matchers kept for `eval()` rewrites and ad hoc matchers
pub const DEFAULT_PROGRAM_CACHE_CAPACITY: usize = 512;

/// How the matcher is obtained for each row
enum Plan<'m> {
    Compiled(Arc<Program>),
    PerRow(&'m str),
}

/// Authorization decision engine
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
/// let policy = "
/// p, alice, data1, read
/// p, data2_admin, data2, write
/// g, alice, data2_admin
/// ";
///
/// let e = Enforcer::from_text(model, policy).unwrap();
/// assert!(e.enforce(["alice", "data1", "read"]).unwrap());
/// assert!(e.enforce(["alice", "data2", "write"]).unwrap());
/// assert!(!e.enforce(["bob", "data2", "write"]).unwrap());
/// ```
pub struct Enforcer {
    model: Model,
    config: EnforcerConfig,
    functions: FunctionMap,
    pattern_cache: Arc<PatternCache>,
    role_managers: AHashMap<String, Arc<dyn RoleManager>>,
    membership: AHashMap<String, Arc<MembershipCache>>,
    views: RwLock<AHashMap<EnforceContext, Arc<EnforceView>>>,
    programs: Mutex<LruCache<String, Arc<Program>>>,
    adapter: Option<Box<dyn Adapter>>,
    watcher: Option<Box<dyn Watcher>>,
    decision_cache: Option<Box<dyn DecisionCache>>,
}

impl Enforcer {
    /// Enforcer over `model` with the default configuration and no adapter
    pub fn new(model: Model) -> Result<Self> {
        Self::with_config(model, EnforcerConfig::default())
    }

    /// Enforcer over `model` with an explicit configuration
    pub fn with_config(model: Model, config: EnforcerConfig) -> Result<Self> {
        model.validate()?;
        config.validate()?;

        let pattern_cache = Arc::new(match config.functions.regex_cache_capacity {
            0 => PatternCache::uncached(),
            n => PatternCache::new(n).with_lock_timeout(config.lock_timeout()),
        });
        let programs = LruCache::new(
            NonZeroUsize::new(DEFAULT_PROGRAM_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        );

        let mut enforcer = Enforcer {
            model,
            functions: FunctionMap::with_builtins(pattern_cache.clone()),
            pattern_cache,
            role_managers: AHashMap::new(),
            membership: AHashMap::new(),
            views: RwLock::new(AHashMap::new()),
            programs: Mutex::new(programs),
            adapter: None,
            watcher: None,
            decision_cache: None,
            config: EnforcerConfig::default(),
        };
        enforcer.set_config(config)?;

        for ptype in enforcer.model.role_types() {
            let rm: Arc<dyn RoleManager> =
                Arc::new(DefaultRoleManager::new(enforcer.config.max_hierarchy_level));
            enforcer.install_role_manager(&ptype, rm)?;
        }
        if enforcer.config.auto_build_role_links {
            enforcer.build_role_links()?;
        }
        Ok(enforcer)
    }

    /// Enforcer that loads its policy from `adapter`
    pub fn with_adapter(model: Model, adapter: impl Adapter + 'static) -> Result<Self> {
        let mut enforcer = Self::new(model)?;
        enforcer.adapter = Some(Box::new(adapter));
        enforcer.load_policy()?;
        Ok(enforcer)
    }

    /// Enforcer built from model text and CSV-like policy text
    pub fn from_text(model: &str, policy: &str) -> Result<Self> {
        let model = Model::from_text(model)?;
        Self::with_adapter(model, MemoryAdapter::from_csv_str(policy)?)
    }

    // ---- configuration ----

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    /// Apply a configuration; installs or drops the LRU decision cache to
    /// match `cache.enabled`
    pub fn set_config(&mut self, config: EnforcerConfig) -> Result<()> {
        config.validate()?;
        if config.cache.enabled {
            if self.decision_cache.is_none() || self.config.cache != config.cache {
                let cache = LruDecisionCache::new(config.cache.capacity)?
                    .with_lock_timeout(config.lock_timeout());
                self.decision_cache = Some(Box::new(cache));
            }
        } else if self.config.cache.enabled {
            self.decision_cache = None;
        }
        let membership_changed = config.functions.membership_cache != self.config.functions.membership_cache
            || config.functions.membership_cache_capacity != self.config.functions.membership_cache_capacity;
        self.config = config;
        if membership_changed {
            let rms: Vec<(String, Arc<dyn RoleManager>)> = self
                .role_managers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (ptype, rm) in rms {
                self.install_role_manager(&ptype, rm)?;
            }
        }
        Ok(())
    }

    /// Turn evaluation on or off; while off every request is allowed
    pub fn enable_enforce(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn enable_auto_save(&mut self, enabled: bool) {
        self.config.auto_save = enabled;
    }

    pub fn enable_auto_build_role_links(&mut self, enabled: bool) {
        self.config.auto_build_role_links = enabled;
    }

    pub fn enable_auto_notify_watcher(&mut self, enabled: bool) {
        self.config.auto_notify_watcher = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Replace the model; policy rows, role links and cached views are rebuilt
    pub fn set_model(&mut self, model: Model) -> Result<()> {
        model.validate()?;
        self.model = model;
        self.views.write().clear();
        self.programs.lock().clear();
        for ptype in self.role_managers.keys() {
            self.functions.remove(ptype);
        }
        self.role_managers.clear();
        self.membership.clear();
        for ptype in self.model.role_types() {
            let rm: Arc<dyn RoleManager> =
                Arc::new(DefaultRoleManager::new(self.config.max_hierarchy_level));
            self.install_role_manager(&ptype, rm)?;
        }
        if self.config.auto_build_role_links {
            self.build_role_links()?;
        }
        self.invalidate_decisions();
        Ok(())
    }

    pub fn set_adapter(&mut self, adapter: impl Adapter + 'static) {
        self.adapter = Some(Box::new(adapter));
    }

    pub fn adapter(&self) -> Option<&dyn Adapter> {
        self.adapter.as_deref()
    }

    pub fn set_watcher(&mut self, watcher: impl Watcher + 'static) {
        self.watcher = Some(Box::new(watcher));
    }

    /// Install a decision cache (replacing the configured LRU one)
    pub fn set_decision_cache(&mut self, cache: impl DecisionCache + 'static) {
        self.decision_cache = Some(Box::new(cache));
    }

    pub fn decision_cache(&self) -> Option<&dyn DecisionCache> {
        self.decision_cache.as_deref()
    }

    /// Memoized `g(...)` results of role type `ptype`, if enabled
    pub fn membership_cache(&self, ptype: &str) -> Option<Arc<MembershipCache>> {
        self.membership.get(ptype).cloned()
    }

    /// Role manager serving role type `ptype`
    pub fn role_manager(&self, ptype: &str) -> Option<Arc<dyn RoleManager>> {
        self.role_managers.get(ptype).cloned()
    }

    /// Replace the role manager of `ptype` and rebuild its links
    pub fn set_role_manager(&mut self, ptype: &str, rm: Arc<dyn RoleManager>) -> Result<()> {
        if self.model.get("g", ptype).is_none() {
            return Err(WardenError::RoleTypeNotFound(ptype.to_string()));
        }
        self.install_role_manager(ptype, rm.clone())?;
        if self.config.auto_build_role_links {
            rm.clear();
            self.model.build_role_links(ptype, rm.as_ref())?;
        }
        self.invalidate_decisions();
        Ok(())
    }

    /// Register a matcher function (replacing any function of that name)
    ///
    /// # Examples
    /// ```
    /// use warden_rs::functions::function;
    /// use warden_rs::expr::Value;
    /// use warden_rs::Enforcer;
    ///
    /// let model = "
    /// [request_definition]
    /// r = sub, obj
    /// [policy_definition]
    /// p = sub, obj
    /// [policy_effect]
    /// e = some(where (p.eft == allow))
    /// [matchers]
    /// m = r.sub == p.sub && sameTenant(r.obj, p.obj)
    /// ";
    /// let mut e = Enforcer::from_text(model, "p, alice, acme/*").unwrap();
    /// e.add_function("sameTenant", function(|args| {
    ///     let a = args[0].as_str().unwrap_or("");
    ///     let b = args[1].as_str().unwrap_or("");
    ///     Ok(Value::Bool(a.split('/').next() == b.split('/').next()))
    /// }));
    /// assert!(e.enforce(["alice", "acme/report"]).unwrap());
    /// assert!(!e.enforce(["alice", "globex/report"]).unwrap());
    /// ```
    pub fn add_function(&mut self, name: &str, f: Function) {
        self.functions.add(name, f);
        self.invalidate_decisions();
    }

    pub fn functions(&self) -> &FunctionMap {
        &self.functions
    }

    /// Shared compiled-pattern cache of the key-match family
    pub fn pattern_cache(&self) -> Arc<PatternCache> {
        self.pattern_cache.clone()
    }

    /// Enable pattern matching on role names for role type `ptype`
    pub fn add_named_matching_fn(&mut self, ptype: &str, f: MatchingFn) -> Result<()> {
        let rm = self
            .role_managers
            .get(ptype)
            .ok_or_else(|| WardenError::RoleTypeNotFound(ptype.to_string()))?;
        rm.add_matching_fn(f);
        self.clear_membership(ptype);
        self.invalidate_decisions();
        Ok(())
    }

    /// Enable pattern matching on domain names for role type `ptype`
    pub fn add_named_domain_matching_fn(&mut self, ptype: &str, f: MatchingFn) -> Result<()> {
        let rm = self
            .role_managers
            .get(ptype)
            .ok_or_else(|| WardenError::RoleTypeNotFound(ptype.to_string()))?;
        rm.add_domain_matching_fn(f);
        self.clear_membership(ptype);
        self.invalidate_decisions();
        Ok(())
    }

    // ---- loading and saving ----

    /// Reload every row from the adapter; on failure the current policy is kept
    pub fn load_policy(&mut self) -> Result<()> {
        let mut model = self.model.clone();
        model.clear_policy();
        let adapter = self
            .adapter
            .as_mut()
            .ok_or_else(|| WardenError::Adapter("no adapter installed".to_string()))?;
        adapter.load_policy(&mut model)?;
        self.install_policy(model)
    }

    /// Reload only rows matching `filter`
    pub fn load_filtered_policy(&mut self, filter: &Filter) -> Result<()> {
        let mut model = self.model.clone();
        model.clear_policy();
        let adapter = self
            .adapter
            .as_mut()
            .ok_or_else(|| WardenError::Adapter("no adapter installed".to_string()))?;
        adapter.load_filtered_policy(&mut model, filter)?;
        self.install_policy(model)
    }

    pub fn is_filtered(&self) -> bool {
        self.adapter.as_ref().map_or(false, |a| a.is_filtered())
    }

    fn install_policy(&mut self, mut model: Model) -> Result<()> {
        model.sort_policies_by_priority()?;
        model.sort_policies_by_subject_hierarchy()?;
        self.model = model;
        if self.config.auto_build_role_links {
            self.build_role_links()?;
        }
        self.invalidate_decisions();
        let count = |sec: &str| {
            self.model
                .section(sec)
                .map_or(0, |s| s.values().map(|a| a.policy.len()).sum::<usize>())
        };
        info!("Policy loaded: {} rules, {} grouping rules", count("p"), count("g"));
        Ok(())
    }

    /// Write the whole policy through the adapter
    pub fn save_policy(&mut self) -> Result<()> {
        let adapter = self
            .adapter
            .as_mut()
            .ok_or_else(|| WardenError::Adapter("no adapter installed".to_string()))?;
        adapter.save_policy(&self.model)?;
        self.notify(PolicyChange::store(Operation::SavePolicy));
        Ok(())
    }

    /// Drop every rule and role link in memory (the adapter is untouched)
    pub fn clear_policy(&mut self) {
        self.model.clear_policy();
        for rm in self.role_managers.values() {
            rm.clear();
        }
        for cache in self.membership.values() {
            cache.clear();
        }
        self.invalidate_decisions();
        self.notify(PolicyChange::store(Operation::ClearPolicy));
    }

    /// Rebuild every role manager from the grouping rows
    pub fn build_role_links(&mut self) -> Result<()> {
        for (ptype, rm) in &self.role_managers {
            rm.clear();
            self.model.build_role_links(ptype, rm.as_ref())?;
        }
        for cache in self.membership.values() {
            cache.clear();
        }
        Ok(())
    }

    /// Apply grouping-row changes to the role manager of `ptype`
    pub fn build_incremental_role_links(
        &mut self,
        op: PolicyOp,
        ptype: &str,
        rules: &[PolicyValues],
    ) -> Result<()> {
        let rm = self
            .role_managers
            .get(ptype)
            .ok_or_else(|| WardenError::RoleTypeNotFound(ptype.to_string()))?;
        self.model.build_incremental_role_links(rm.as_ref(), op, ptype, rules)?;
        self.clear_membership(ptype);
        Ok(())
    }

    // ---- decisions ----

    /// Decide a request against the default context
    pub fn enforce(&self, request: impl Into<RequestValues>) -> Result<bool> {
        let request = request.into();
        if !self.config.enabled {
            return Ok(true);
        }
        let key = self.decision_cache.as_ref().map(|_| request.cache_key());
        if let (Some(cache), Some(key)) = (&self.decision_cache, &key) {
            if let Some(hit) = cache.try_get(key) {
                debug!("Decision cache hit for {}", key);
                return Ok(hit);
            }
        }

        let view = self.view(&EnforceContext::default())?;
        let (result, _) = self.decide(&view, None, &request)?;

        if let (Some(cache), Some(key)) = (&self.decision_cache, key) {
            cache.set(&key, result);
        }
        Ok(result)
    }

    /// Decide and return the rows that produced the decision
    pub fn enforce_ex(&self, request: impl Into<RequestValues>) -> Result<(bool, Vec<PolicyValues>)> {
        self.enforce_ex_with_context(&EnforceContext::default(), request)
    }

    /// Decide with an ad hoc matcher instead of the model's
    pub fn enforce_with_matcher(&self, matcher: &str, request: impl Into<RequestValues>) -> Result<bool> {
        self.enforce_ex_with_matcher(matcher, request).map(|(r, _)| r)
    }

    pub fn enforce_ex_with_matcher(
        &self,
        matcher: &str,
        request: impl Into<RequestValues>,
    ) -> Result<(bool, Vec<PolicyValues>)> {
        let request = request.into();
        if !self.config.enabled {
            return Ok((true, Vec::new()));
        }
        let view = self.view(&EnforceContext::default())?;
        let (result, hits) = self.decide(&view, Some(matcher), &request)?;
        Ok((result, self.hit_rows(&view, &hits)))
    }

    /// Decide against explicit request/policy/effect/matcher types
    ///
    /// # Examples
    /// ```
    /// use warden_rs::{EnforceContext, Enforcer};
    ///
    /// let model = "
    /// [request_definition]
    /// r = sub, obj, act
    /// r2 = sub, act
    /// [policy_definition]
    /// p = sub, obj, act
    /// p2 = sub, act
    /// [policy_effect]
    /// e = some(where (p.eft == allow))
    /// [matchers]
    /// m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
    /// m2 = r2.sub == p2.sub && r2.act == p2.act
    /// ";
    /// let e = Enforcer::from_text(model, "p2, alice, login").unwrap();
    /// assert!(e.enforce_with_context(&EnforceContext::new("2"), ["alice", "login"]).unwrap());
    /// assert!(!e.enforce(["alice", "data1", "login"]).unwrap());
    /// ```
    pub fn enforce_with_context(&self, ctx: &EnforceContext, request: impl Into<RequestValues>) -> Result<bool> {
        self.enforce_ex_with_context(ctx, request).map(|(r, _)| r)
    }

    pub fn enforce_ex_with_context(
        &self,
        ctx: &EnforceContext,
        request: impl Into<RequestValues>,
    ) -> Result<(bool, Vec<PolicyValues>)> {
        let request = request.into();
        if !self.config.enabled {
            return Ok((true, Vec::new()));
        }
        let view = self.view(ctx)?;
        let (result, hits) = self.decide(&view, None, &request)?;
        Ok((result, self.hit_rows(&view, &hits)))
    }

    /// Decide each request in order; the first error aborts the batch
    pub fn batch_enforce<R: Into<RequestValues>>(&self, requests: impl IntoIterator<Item = R>) -> Result<Vec<bool>> {
        requests.into_iter().map(|r| self.enforce(r)).collect()
    }

    /// Decide requests on scoped worker threads
    ///
    /// Each request gets the same semantics as [`Enforcer::enforce`]; results
    /// come back in request order.
    pub fn parallel_batch_enforce(&self, requests: &[RequestValues]) -> Result<Vec<bool>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(requests.len());
        let chunk = requests.len().div_ceil(workers);

        let outcomes = crossbeam::scope(|s| {
            let handles: Vec<_> = requests
                .chunks(chunk)
                .map(|part| {
                    s.spawn(move |_| {
                        part.iter()
                            .map(|r| self.enforce(r.clone()))
                            .collect::<Result<Vec<bool>>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(WardenError::Config("enforcement worker panicked".to_string())))
                })
                .collect::<Vec<_>>()
        })
        .map_err(|_| WardenError::Config("enforcement worker panicked".to_string()))?;

        let mut results = Vec::with_capacity(requests.len());
        for part in outcomes {
            results.extend(part?);
        }
        Ok(results)
    }

    /// Cached view for `ctx`, building it on first use
    pub fn view(&self, ctx: &EnforceContext) -> Result<Arc<EnforceView>> {
        if let Some(view) = self.views.read().get(ctx) {
            return Ok(view.clone());
        }
        let view = Arc::new(EnforceView::build(&self.model, ctx)?);
        self.views.write().insert(ctx.clone(), view.clone());
        Ok(view)
    }

    fn decide(&self, view: &EnforceView, matcher: Option<&str>, request: &RequestValues) -> Result<(bool, Vec<usize>)> {
        if request.len() < view.request_arity() {
            return Err(WardenError::RequestArity {
                expected: view.request_arity(),
                actual: request.len(),
            });
        }

        let plan = match matcher {
            Some(src) if has_eval(src) => Plan::PerRow(src),
            Some(src) => Plan::Compiled(self.program(view, src)?),
            None => match &view.program {
                Some(p) => Plan::Compiled(p.clone()),
                None => Plan::PerRow(&view.matcher),
            },
        };

        let rows = self
            .model
            .get("p", &view.context.ptype)
            .map(|a| a.policy.rows())
            .unwrap_or(&[]);
        let mut chain = EffectChain::new(view.effect);

        let uses_policy = match &plan {
            Plan::Compiled(p) => p.uses_policy(),
            Plan::PerRow(_) => true,
        };
        if rows.is_empty() || !uses_policy {
            let program = match &plan {
                Plan::Compiled(p) => p.clone(),
                Plan::PerRow(_) => return Err(WardenError::EvalRuleMissing),
            };
            let blank = PolicyValues::blank(view.policy_arity());
            let ctx = EvalContext {
                request,
                policy: &blank,
                functions: &self.functions,
            };
            let effect = if program.eval(&ctx)? {
                Effect::Allow
            } else {
                Effect::Indeterminate
            };
            chain.try_chain(effect);
            let result = chain.result();
            debug!("Request ({}) -> {} (no policy rows scanned)", request, result);
            return Ok((result, Vec::new()));
        }

        for row in rows {
            if row.len() < view.policy_arity() {
                return Err(WardenError::PolicyArity {
                    expected: view.policy_arity(),
                    actual: row.len(),
                });
            }
            let program = match &plan {
                Plan::Compiled(p) => p.clone(),
                Plan::PerRow(src) => {
                    let rewritten = rewrite_eval(src, &view.scope(), request, row)?;
                    self.program(view, &rewritten)?
                }
            };
            let ctx = EvalContext {
                request,
                policy: row,
                functions: &self.functions,
            };
            let effect = match (program.eval(&ctx)?, view.eft_index) {
                (false, _) => Effect::Indeterminate,
                (true, Some(idx)) => Effect::from_declared(row.field(idx)),
                (true, None) => Effect::Allow,
            };
            let determined = match view.priority_index {
                Some(idx) => chain.try_chain_with_priority(effect, Some(row.field(idx))),
                None => chain.try_chain(effect),
            };
            if determined {
                break;
            }
        }

        let (result, hits) = chain.finish();
        debug!(
            "Request ({}) -> {} after {} of {} rows",
            request,
            result,
            hits.len(),
            rows.len()
        );
        Ok((result, hits))
    }

    fn hit_rows(&self, view: &EnforceView, hits: &[usize]) -> Vec<PolicyValues> {
        let Some(a) = self.model.get("p", &view.context.ptype) else {
            return Vec::new();
        };
        hits.iter()
            .filter_map(|&i| a.policy.rows().get(i).cloned())
            .collect()
    }

    /// Compile `src` against the view's tokens, through the program cache
    fn program(&self, view: &EnforceView, src: &str) -> Result<Arc<Program>> {
        let key = format!("{}$${}$${}", view.context.rtype, view.context.ptype, src);
        let timeout = self.config.lock_timeout();
        if let Some(mut programs) = self.programs.try_lock_for(timeout) {
            if let Some(p) = programs.get(&key) {
                return Ok(p.clone());
            }
        } else {
            warn!("Program cache busy, compiling without it");
        }

        let program = Arc::new(Program::compile(src, &view.scope())?);
        if let Some(mut programs) = self.programs.try_lock_for(timeout) {
            programs.put(key, program.clone());
        }
        Ok(program)
    }

    // ---- internals shared with the management APIs ----

    fn install_role_manager(&mut self, ptype: &str, rm: Arc<dyn RoleManager>) -> Result<()> {
        let cache = if self.config.functions.membership_cache {
            let cache = Arc::new(MembershipCache::new(
                self.config.functions.membership_cache_capacity,
                self.config.lock_timeout(),
            )?);
            self.membership.insert(ptype.to_string(), cache.clone());
            Some(cache)
        } else {
            self.membership.remove(ptype);
            None
        };
        self.functions
            .add(ptype, role_function(ptype.to_string(), rm.clone(), cache));
        self.role_managers.insert(ptype.to_string(), rm);
        Ok(())
    }

    fn clear_membership(&self, ptype: &str) {
        if let Some(cache) = self.membership.get(ptype) {
            cache.clear();
        }
    }

    fn invalidate_decisions(&self) {
        if let Some(cache) = &self.decision_cache {
            cache.clear();
        }
    }

    fn notify(&self, change: PolicyChange) {
        if !self.config.auto_notify_watcher {
            return;
        }
        if let Some(watcher) = &self.watcher {
            if let Err(e) = watcher.update(&change) {
                warn!("Watcher failed for {:?}: {}", change.operation, e);
            }
        }
    }
}

impl std::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut role_types: Vec<&String> = self.role_managers.keys().collect();
        role_types.sort();
        f.debug_struct("Enforcer")
            .field("config", &self.config)
            .field("role_types", &role_types)
            .field("functions", &self.functions)
            .field("has_adapter", &self.adapter.is_some())
            .field("has_watcher", &self.watcher.is_some())
            .field("has_decision_cache", &self.decision_cache.is_some())
            .finish()
    }
}

/// `g(name, role[, domain])` backed by a role manager
fn role_function(name: String, rm: Arc<dyn RoleManager>, cache: Option<Arc<MembershipCache>>) -> Function {
    function(move |args| {
        let strings = args
            .iter()
            .map(|v| {
                v.as_str().ok_or_else(|| {
                    WardenError::ExpressionType(format!("{} expects string arguments, got {}", name, v.type_name()))
                })
            })
            .collect::<Result<Vec<&str>>>()?;
        let (n1, n2, domain) = match strings.as_slice() {
            [a, b] => (*a, *b, None),
            [a, b, d] => (*a, *b, Some(*d)),
            _ => {
                return Err(WardenError::ArgumentCount {
                    name: name.clone(),
                    expected: "2 or 3".to_string(),
                    actual: args.len(),
                })
            }
        };
        let linked = match &cache {
            Some(cache) => cache.get_or_compute(MembershipCache::key(n1, n2, domain), || {
                rm.has_link(n1, n2, domain)
            }),
            None => rm.has_link(n1, n2, domain),
        };
        Ok(Value::Bool(linked))
    })
}
