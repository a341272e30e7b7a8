//! `eval()` indirection
//!
//! A matcher such as `r.sub.Age > 18 && eval(p.sub_rule)` reads part of its
//! logic from a policy column. Each `eval(x.field)` call is replaced, per
//! row, by the parenthesized rule text before compilation.

use super::program::Scope;
use crate::core::model::RequestValue;
use crate::error::{Result, WardenError};
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn eval_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\beval\(([^)]*)\)").expect("static eval regex"))
}

/// Whether a matcher uses `eval()`
pub fn has_eval(matcher: &str) -> bool {
    eval_call().is_match(matcher)
}

/// Arguments of every `eval()` call, in order (e.g. `p.sub_rule`)
pub fn eval_targets(matcher: &str) -> Vec<String> {
    eval_call()
        .captures_iter(matcher)
        .map(|c| c[1].trim().to_string())
        .collect()
}

/// Substitute each `eval(...)` with the rule text it points at
///
/// Fails with [`WardenError::EvalRuleMissing`] when the referenced column
/// is absent or empty.
pub fn rewrite_eval(
    matcher: &str,
    scope: &Scope<'_>,
    request: &[RequestValue],
    policy: &[String],
) -> Result<String> {
    let mut failure = None;
    let out = eval_call().replace_all(matcher, |caps: &Captures<'_>| {
        match resolve(caps[1].trim(), scope, request, policy) {
            Ok(rule) => format!("({})", rule),
            Err(e) => {
                failure.get_or_insert(e);
                String::new()
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(out.into_owned()),
    }
}

fn resolve(target: &str, scope: &Scope<'_>, request: &[RequestValue], policy: &[String]) -> Result<String> {
    let (section, field) = target
        .split_once('.')
        .ok_or_else(|| WardenError::UnknownToken(target.to_string()))?;

    let rule = if section == scope.policy_key {
        let idx = scope
            .policy_tokens
            .iter()
            .position(|t| t == field)
            .ok_or_else(|| WardenError::UnknownToken(target.to_string()))?;
        policy.get(idx).map(String::as_str).unwrap_or("").to_string()
    } else if section == scope.request_key {
        let idx = scope
            .request_tokens
            .iter()
            .position(|t| t == field)
            .ok_or_else(|| WardenError::UnknownToken(target.to_string()))?;
        request
            .get(idx)
            .and_then(RequestValue::as_str)
            .unwrap_or("")
            .to_string()
    } else {
        return Err(WardenError::UnknownToken(target.to_string()));
    };

    if rule.trim().is_empty() {
        return Err(WardenError::EvalRuleMissing);
    }
    Ok(rule)
}
