//! Precomputed per-context enforcement metadata

use crate::core::effect::EffectKind;
use crate::core::expr::{has_eval, Program, Scope};
use crate::core::model::Model;
use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Which request, policy, effect and matcher types a decision uses
///
/// # Examples
/// ```
/// use warden_rs::EnforceContext;
///
/// let ctx = EnforceContext::new("2");
/// assert_eq!(ctx.ptype, "p2");
/// assert_eq!(EnforceContext::default().mtype, "m");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnforceContext {
    pub rtype: String,
    pub ptype: String,
    pub etype: String,
    pub mtype: String,
}

impl EnforceContext {
    /// Context for the types sharing `suffix` (`""` for `r`/`p`/`e`/`m`)
    pub fn new(suffix: &str) -> Self {
        EnforceContext {
            rtype: format!("r{}", suffix),
            ptype: format!("p{}", suffix),
            etype: format!("e{}", suffix),
            mtype: format!("m{}", suffix),
        }
    }
}

impl Default for EnforceContext {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Display for EnforceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.rtype, self.ptype, self.etype, self.mtype)
    }
}

/// Model-derived data for one [`EnforceContext`]
///
/// Built once per context and reused until the model definitions change.
/// Matchers using `eval()` are rewritten per row, so they carry no
/// precompiled program.
#[derive(Debug)]
pub struct EnforceView {
    pub(crate) context: EnforceContext,
    pub(crate) request_tokens: Vec<String>,
    pub(crate) policy_tokens: Vec<String>,
    pub(crate) effect: EffectKind,
    pub(crate) matcher: String,
    pub(crate) program: Option<Arc<Program>>,
    pub(crate) priority_index: Option<usize>,
    pub(crate) eft_index: Option<usize>,
}

impl EnforceView {
    pub fn build(model: &Model, context: &EnforceContext) -> Result<EnforceView> {
        let request = model.assertion("r", &context.rtype)?;
        let policy = model.assertion("p", &context.ptype)?;
        let matcher = model.assertion("m", &context.mtype)?.value.clone();
        let effect = match model.get("e", &context.etype) {
            Some(a) => EffectKind::parse(&a.value)?,
            None => model.effect_kind_for(&context.ptype)?,
        };

        let mut view = EnforceView {
            context: context.clone(),
            request_tokens: request.tokens.clone(),
            policy_tokens: policy.tokens.clone(),
            effect,
            matcher,
            program: None,
            priority_index: policy.index_of("priority"),
            eft_index: policy.index_of("eft"),
        };
        if !has_eval(&view.matcher) {
            view.program = Some(Arc::new(Program::compile(&view.matcher, &view.scope())?));
        }
        Ok(view)
    }

    pub(crate) fn scope(&self) -> Scope<'_> {
        Scope {
            request_key: &self.context.rtype,
            request_tokens: &self.request_tokens,
            policy_key: &self.context.ptype,
            policy_tokens: &self.policy_tokens,
        }
    }

    pub fn context(&self) -> &EnforceContext {
        &self.context
    }

    pub fn effect(&self) -> EffectKind {
        self.effect
    }

    /// The model's matcher text
    pub fn matcher(&self) -> &str {
        &self.matcher
    }

    /// Whether the matcher is rewritten per row
    pub fn has_eval(&self) -> bool {
        self.program.is_none()
    }

    /// Whether the matcher reads any policy column
    pub fn uses_policy(&self) -> bool {
        self.program.as_ref().map_or(true, |p| p.uses_policy())
    }

    pub fn request_arity(&self) -> usize {
        self.request_tokens.len()
    }

    pub fn policy_arity(&self) -> usize {
        self.policy_tokens.len()
    }

    pub fn has_priority(&self) -> bool {
        self.priority_index.is_some()
    }

    pub fn has_eft(&self) -> bool {
        self.eft_index.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::Layout;

    const MODEL: &str = "
[request_definition]
r = sub, obj, act
r2 = sub, act
[policy_definition]
p = sub, obj, act, eft, priority
p2 = sub_rule, act
[policy_effect]
e = priority(p.eft) || deny
[matchers]
m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
m2 = eval(p2.sub_rule) && r2.act == p2.act
";

    #[test]
    fn test_view_for_default_context() {
        let model = Model::from_text(MODEL).unwrap();
        let view = EnforceView::build(&model, &EnforceContext::default()).unwrap();
        assert_eq!(view.effect(), EffectKind::Priority);
        assert!(!view.has_eval());
        assert!(view.uses_policy());
        assert_eq!(view.priority_index, Some(4));
        assert_eq!(view.eft_index, Some(3));
        assert_eq!(view.program.as_ref().unwrap().layout(), Layout::Positional);
    }

    #[test]
    fn test_view_with_eval_and_effect_fallback() {
        let model = Model::from_text(MODEL).unwrap();
        let view = EnforceView::build(&model, &EnforceContext::new("2")).unwrap();
        assert!(view.has_eval());
        assert!(view.uses_policy());
        assert_eq!(view.effect(), EffectKind::Priority);
        assert!(!view.has_priority());
    }

    #[test]
    fn test_view_unknown_token_fails() {
        let text = MODEL.replace("r.act == p.act", "r.act == p.verb");
        let model = Model::from_text(&text).unwrap();
        assert!(EnforceView::build(&model, &EnforceContext::default()).is_err());
    }
}
