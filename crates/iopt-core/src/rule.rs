//! # Rule System
//!
//! A rule rewrites the representative of one memo group into zero or more
//! equivalent shapes.
//!
//! ## Contract
//!
//! - [`Rule::matches`] is a cheap test on the node alone. It must not resolve
//!   children. The default checks the rule's [`Pattern`] shallowly; the driver
//!   additionally resolves children for patterns that constrain them.
//! - [`Rule::apply`] receives the node with placeholder children and a
//!   [`Lookup`] to peek below them. It must be a pure function of its inputs
//!   and the [`RuleContext`]: applied again to an unchanged node it returns
//!   the same results, which is what makes fixpoint detection sound.
//! - Results may contain concrete subtrees. The memo inserts them and
//!   replaces them by placeholders before storing the candidate.
//!
//! ## Result Kinds
//!
//! [`RuleResult::Alternative`] competes with the current representative on
//! cost. [`RuleResult::Replace`] wins unconditionally; it is meant for
//! rewrites that are always improvements, such as merging adjacent filters.
//! A replacement that is a bare placeholder states that the group is
//! equivalent to the referenced group.
//!
//! ## Rule Deduplication
//!
//! Each rule has a `rule_hash()` fingerprint. The memo records per group which
//! rules have seen its current representative, so a rule is never offered the
//! same shape twice.
//!
//! ## Rule Registry
//!
//! [`RuleRegistry`] holds the base rules plus connector-specific [`RuleSet`]s,
//! selected by source type. Rules run in registration order, base rules first.

use crate::catalog::Catalog;
use crate::cost::CostModel;
use crate::error::Result;
use crate::lookup::Lookup;
use crate::memo::GroupId;
use crate::pattern::Pattern;
use crate::plan::{PlanNode, PlanRef};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Session state passed to every rule application.
pub struct RuleContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub cost_model: &'a dyn CostModel,
    /// Group whose representative is being rewritten.
    pub group: GroupId,
    /// Current pass, starting at 1.
    pub pass: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleResult {
    /// A competing candidate for the group, ranked by the cost model.
    Alternative(PlanRef),
    /// A candidate that becomes the representative regardless of cost.
    Replace(PlanRef),
}

impl RuleResult {
    pub fn plan(&self) -> &PlanRef {
        match self {
            RuleResult::Alternative(plan) | RuleResult::Replace(plan) => plan,
        }
    }
}

pub trait Rule: Send + Sync + 'static {
    /// Name of this rule, used in logs and errors.
    fn name(&self) -> &str;

    /// Shape this rule rewrites.
    fn pattern(&self) -> Pattern;

    /// Cheap test on `node` alone, run before `apply`.
    fn matches(&self, node: &PlanNode) -> bool {
        self.pattern().matches_node(node)
    }

    fn apply(
        &self,
        node: &PlanRef,
        lookup: &dyn Lookup,
        ctx: &RuleContext<'_>,
    ) -> Result<Vec<RuleResult>>;

    /// Key of this rule's exploration flags. Covers the implementing type as
    /// well as the name, so two different rules sharing a name keep separate
    /// flags.
    fn rule_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::any::TypeId::of::<Self>().hash(&mut hasher);
        self.name().hash(&mut hasher);
        hasher.finish()
    }
}

/// A named set of rules (e.g., for a specific connector).
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Registry of optimization rules.
pub struct RuleRegistry {
    pub base_rules: Vec<Box<dyn Rule>>,
    pub source_rules: HashMap<String, RuleSet>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            base_rules: Vec::new(),
            source_rules: HashMap::new(),
        }
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.base_rules.push(rule);
    }

    pub fn add_source_rule_set(&mut self, name: impl Into<String>, rule_set: RuleSet) {
        self.source_rules.insert(name.into(), rule_set);
    }

    /// Rules active for `source`, in application order.
    pub fn active_rules(&self, source: Option<&str>) -> Vec<&dyn Rule> {
        let mut rules: Vec<&dyn Rule> = self.base_rules.iter().map(|r| r.as_ref()).collect();
        if let Some(rs) = source.and_then(|s| self.source_rules.get(s)) {
            rules.extend(rs.rules.iter().map(|r| r.as_ref()));
        }
        rules
    }

    pub fn len(&self) -> usize {
        self.base_rules.len() + self.source_rules.values().map(|rs| rs.rules.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Rule for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn pattern(&self) -> Pattern {
            Pattern::filter()
        }

        fn apply(
            &self,
            _node: &PlanRef,
            _lookup: &dyn Lookup,
            _ctx: &RuleContext<'_>,
        ) -> Result<Vec<RuleResult>> {
            Ok(vec![])
        }
    }

    fn names(rules: Vec<&dyn Rule>) -> Vec<String> {
        rules.iter().map(|r| r.name().to_string()).collect()
    }

    #[test]
    fn test_source_rules_follow_base_rules() {
        let mut registry = RuleRegistry::new();
        registry.add_rule(Box::new(Named("b")));
        registry.add_rule(Box::new(Named("a")));
        registry.add_source_rule_set(
            "hive",
            RuleSet::new("hive").with_rule(Box::new(Named("hive_scan"))),
        );

        assert_eq!(names(registry.active_rules(None)), ["b", "a"]);
        assert_eq!(names(registry.active_rules(Some("hive"))), ["b", "a", "hive_scan"]);
        assert_eq!(names(registry.active_rules(Some("iceberg"))), ["b", "a"]);
        assert_eq!(registry.len(), 3);
    }

    /// Same names as `Named`, different rule.
    struct Shadow(&'static str);

    impl Rule for Shadow {
        fn name(&self) -> &str {
            self.0
        }

        fn pattern(&self) -> Pattern {
            Pattern::join()
        }

        fn apply(
            &self,
            _node: &PlanRef,
            _lookup: &dyn Lookup,
            _ctx: &RuleContext<'_>,
        ) -> Result<Vec<RuleResult>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_rule_hash_depends_on_name_and_type() {
        assert_eq!(Named("x").rule_hash(), Named("x").rule_hash());
        assert_ne!(Named("x").rule_hash(), Named("y").rule_hash());
        assert_ne!(Named("x").rule_hash(), Shadow("x").rule_hash());
        assert!(Named("x").matches(&PlanNode::filter(
            crate::expr::Expr::bool(true),
            PlanNode::group(0)
        )));
    }
}
