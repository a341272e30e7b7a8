//! Effect merging
//!
//! Each policy row contributes an [`Effect`]. An [`EffectChain`] folds those
//! effects, in scan order, into one decision according to the model's
//! policy-effect expression and reports when the decision can no longer
//! change so the scan can stop early.

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Outcome of one policy row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
    /// Row did not match, or declared an effect other than allow/deny
    Indeterminate,
}

impl Effect {
    /// Interpret a row's declared `eft` column
    pub fn from_declared(eft: &str) -> Effect {
        match eft {
            "allow" => Effect::Allow,
            "deny" => Effect::Deny,
            _ => Effect::Indeterminate,
        }
    }
}

/// Supported policy-effect expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// `some(where (p.eft == allow))`
    AllowOverride,
    /// `!some(where (p.eft == deny))`
    DenyOverride,
    /// `some(where (p.eft == allow)) && !some(where (p.eft == deny))`
    AllowAndDeny,
    /// `priority(p.eft) || deny`
    Priority,
    /// `subjectPriority(p.eft) || deny`
    SubjectPriority,
    /// `priority(p.eft) && !some(where (p.eft == deny))`
    PriorityDenyOverride,
}

impl EffectKind {
    /// Recognize an effect expression, ignoring whitespace
    ///
    /// # Examples
    /// ```
    /// use warden_rs::EffectKind;
    ///
    /// assert_eq!(
    ///     EffectKind::parse("some(where (p.eft == allow))").unwrap(),
    ///     EffectKind::AllowOverride
    /// );
    /// assert!(EffectKind::parse("max(p.eft)").is_err());
    /// ```
    pub fn parse(expr: &str) -> Result<EffectKind> {
        let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "some(where(p.eft==allow))" => Ok(EffectKind::AllowOverride),
            "!some(where(p.eft==deny))" => Ok(EffectKind::DenyOverride),
            "some(where(p.eft==allow))&&!some(where(p.eft==deny))" => Ok(EffectKind::AllowAndDeny),
            "priority(p.eft)||deny" => Ok(EffectKind::Priority),
            "subjectPriority(p.eft)||deny" => Ok(EffectKind::SubjectPriority),
            "priority(p.eft)&&!some(where(p.eft==deny))" => Ok(EffectKind::PriorityDenyOverride),
            _ => Err(WardenError::UnsupportedEffect(expr.to_string())),
        }
    }

    /// Whether rows are scanned in declared priority order
    pub fn uses_priority(&self) -> bool {
        matches!(self, EffectKind::Priority | EffectKind::PriorityDenyOverride)
    }
}

/// Running fold over per-row effects
#[derive(Debug, Clone)]
pub struct EffectChain {
    kind: EffectKind,
    result: bool,
    determined: bool,
    chained: usize,
    hits: SmallVec<[usize; 4]>,
    bracket: Option<String>,
    /// Allow or deny rows chained since the current bracket opened
    bracket_rows: usize,
}

impl EffectChain {
    pub fn new(kind: EffectKind) -> Self {
        EffectChain {
            kind,
            result: matches!(kind, EffectKind::DenyOverride),
            determined: false,
            chained: 0,
            hits: SmallVec::new(),
            bracket: None,
            bracket_rows: 0,
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    /// Fold the next row's effect; returns true once the result is final
    ///
    /// # Examples
    /// ```
    /// use warden_rs::{Effect, EffectChain, EffectKind};
    ///
    /// let mut chain = EffectChain::new(EffectKind::AllowOverride);
    /// assert!(!chain.try_chain(Effect::Indeterminate));
    /// assert!(chain.try_chain(Effect::Allow));
    /// assert!(chain.result());
    /// assert_eq!(chain.hits(), &[1]);
    /// ```
    pub fn try_chain(&mut self, effect: Effect) -> bool {
        if self.determined {
            return true;
        }
        let index = self.chained;
        self.chained += 1;

        match self.kind {
            EffectKind::AllowOverride => {
                if effect == Effect::Allow {
                    self.decide(true, index);
                }
            }
            EffectKind::DenyOverride => {
                if effect == Effect::Deny {
                    self.decide(false, index);
                }
            }
            EffectKind::AllowAndDeny | EffectKind::PriorityDenyOverride => match effect {
                Effect::Allow if !self.result => {
                    self.result = true;
                    self.hits.clear();
                    self.hits.push(index);
                }
                Effect::Deny => self.decide(false, index),
                _ => {}
            },
            EffectKind::Priority | EffectKind::SubjectPriority => match effect {
                Effect::Allow => self.decide(true, index),
                Effect::Deny => self.decide(false, index),
                Effect::Indeterminate => {}
            },
        }

        self.determined
    }

    /// Fold the next row's effect together with its declared priority
    ///
    /// Only [`EffectKind::PriorityDenyOverride`] looks at the priority. Rows
    /// sharing one priority value form a bracket, and the first observed
    /// value opens the first bracket. When the value changes and at least
    /// one row of the current bracket has chained an allow or a deny, the
    /// bracket has decided: the chain finalizes with its current result and
    /// the new row is not consumed. Non-matching rows chain as
    /// [`Effect::Indeterminate`] and do not close a bracket, so a bracket in
    /// which nothing matched falls through to the next one.
    pub fn try_chain_with_priority(&mut self, effect: Effect, priority: Option<&str>) -> bool {
        if self.determined {
            return true;
        }
        if self.kind == EffectKind::PriorityDenyOverride {
            if let Some(p) = priority {
                match &self.bracket {
                    None => self.bracket = Some(p.to_string()),
                    Some(current) if current != p => {
                        if self.bracket_rows > 0 {
                            self.determined = true;
                            return true;
                        }
                        self.bracket = Some(p.to_string());
                    }
                    Some(_) => {}
                }
            }
            if effect != Effect::Indeterminate {
                self.bracket_rows += 1;
            }
        }
        self.try_chain(effect)
    }

    fn decide(&mut self, result: bool, index: usize) {
        self.result = result;
        self.determined = true;
        self.hits.clear();
        self.hits.push(index);
    }

    pub fn is_determined(&self) -> bool {
        self.determined
    }

    /// Current verdict (final once determined or after the last row)
    pub fn result(&self) -> bool {
        self.result
    }

    /// Chain positions of the rows that produced the verdict
    pub fn hits(&self) -> &[usize] {
        &self.hits
    }

    /// Number of effects folded so far
    pub fn len(&self) -> usize {
        self.chained
    }

    pub fn is_empty(&self) -> bool {
        self.chained == 0
    }

    /// Consume the chain, returning the verdict and hit positions
    pub fn finish(self) -> (bool, Vec<usize>) {
        let hits = self.hits().to_vec();
        (self.result, hits)
    }
}
