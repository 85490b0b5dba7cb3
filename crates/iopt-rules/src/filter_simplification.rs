//! # Filter Simplification Rules
//!
//! Two rewrites that are always improvements and therefore replace the
//! group's representative outright instead of competing on cost:
//!
//! ```text
//! Filter(Filter(x, p1), p2)  ->  Filter(x, p1 AND p2)
//! Filter(x, TRUE)            ->  x
//! ```
//!
//! Merging runs the combined predicate in one pass over the rows and lets
//! predicate pushdown see every conjunct at once. Removing a `TRUE` filter
//! makes the filter's group equivalent to its input's group; the rule states
//! that by returning the input placeholder itself.

use iopt_core::error::Result;
use iopt_core::expr::Expr;
use iopt_core::lookup::Lookup;
use iopt_core::pattern::Pattern;
use iopt_core::plan::{PlanNode, PlanRef};
use iopt_core::rule::{Rule, RuleContext, RuleResult};
use tracing::trace;

/// `Filter(Filter(x, p1), p2) -> Filter(x, p1 AND p2)`.
pub struct MergeFiltersRule;

impl Rule for MergeFiltersRule {
    fn name(&self) -> &str {
        "MergeFilters"
    }

    fn pattern(&self) -> Pattern {
        Pattern::filter_filter()
    }

    fn apply(
        &self,
        node: &PlanRef,
        lookup: &dyn Lookup,
        ctx: &RuleContext<'_>,
    ) -> Result<Vec<RuleResult>> {
        let PlanNode::Filter {
            predicate: outer,
            input,
        } = node.as_ref()
        else {
            return Ok(vec![]);
        };
        let child = lookup.resolve(input)?;
        let PlanNode::Filter {
            predicate: inner,
            input: grandchild,
        } = child.as_ref()
        else {
            return Ok(vec![]);
        };

        trace!("Merging filters in group {}", ctx.group);
        let merged = Expr::conjunction([inner.clone(), outer.clone()]);
        Ok(vec![RuleResult::Replace(PlanNode::filter(
            merged,
            grandchild.clone(),
        ))])
    }
}

/// `Filter(x, TRUE) -> x`.
pub struct RemoveTrivialFilterRule;

impl Rule for RemoveTrivialFilterRule {
    fn name(&self) -> &str {
        "RemoveTrivialFilter"
    }

    fn pattern(&self) -> Pattern {
        Pattern::filter()
    }

    fn matches(&self, node: &PlanNode) -> bool {
        matches!(node, PlanNode::Filter { predicate, .. } if predicate.is_true())
    }

    fn apply(
        &self,
        node: &PlanRef,
        _lookup: &dyn Lookup,
        _ctx: &RuleContext<'_>,
    ) -> Result<Vec<RuleResult>> {
        match node.as_ref() {
            PlanNode::Filter { input, .. } => Ok(vec![RuleResult::Replace(input.clone())]),
            _ => Ok(vec![]),
        }
    }
}
