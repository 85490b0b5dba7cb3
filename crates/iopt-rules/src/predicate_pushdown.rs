//! # Predicate Pushdown Rule
//!
//! Predicate pushdown reduces the amount of data flowing through the plan as
//! early as possible.
//!
//! ## What It Does
//!
//! When a Filter sits on top of an inner or cross Join, each conjunct of the
//! filter predicate goes as far down as its columns allow:
//!
//! ```text
//! Before: Filter(l_pred AND r_pred AND j_pred, Join(A, B, cond))
//! After:  Join(Filter(A, l_pred), Filter(B, r_pred), cond AND j_pred)
//! ```
//!
//! Conjuncts referencing only the left input's tables filter the left input,
//! likewise for the right, and everything else joins the join condition. A
//! cross join that gains a condition becomes an inner join.
//!
//! ## Memo-Based Approach
//!
//! The pushed-down join is offered as a competing candidate for the Filter's
//! group. The original Filter-over-Join stays in the memo and the cost model
//! chooses between them.

use crate::join_associativity::collect_table_names;
use iopt_core::error::Result;
use iopt_core::expr::{Expr, JoinType};
use iopt_core::lookup::Lookup;
use iopt_core::pattern::Pattern;
use iopt_core::plan::{PlanNode, PlanRef};
use iopt_core::rule::{Rule, RuleContext, RuleResult};
use tracing::trace;

/// Push filter predicates into and below inner joins.
pub struct PredicatePushdownRule;

impl Rule for PredicatePushdownRule {
    fn name(&self) -> &str {
        "PredicatePushdown"
    }

    fn pattern(&self) -> Pattern {
        // Filter(Join(A, B))
        Pattern::filter_join()
    }

    fn apply(
        &self,
        node: &PlanRef,
        lookup: &dyn Lookup,
        ctx: &RuleContext<'_>,
    ) -> Result<Vec<RuleResult>> {
        let PlanNode::Filter { predicate, input } = node.as_ref() else {
            return Ok(vec![]);
        };
        let join = lookup.resolve(input)?;
        let PlanNode::Join {
            join_type,
            condition,
            left,
            right,
        } = join.as_ref()
        else {
            return Ok(vec![]);
        };
        if !matches!(join_type, JoinType::Inner | JoinType::Cross) {
            return Ok(vec![]);
        }

        let left_tables = collect_table_names(left, lookup)?;
        let right_tables = collect_table_names(right, lookup)?;

        let mut left_preds = Vec::new();
        let mut right_preds = Vec::new();
        let mut join_preds: Vec<Expr> = condition.conjuncts().into_iter().cloned().collect();
        for pred in predicate.conjuncts() {
            let tables = pred.tables();
            if !tables.is_empty() && tables.iter().all(|t| left_tables.contains(*t)) {
                left_preds.push(pred.clone());
            } else if !tables.is_empty() && tables.iter().all(|t| right_tables.contains(*t)) {
                right_preds.push(pred.clone());
            } else {
                join_preds.push(pred.clone());
            }
        }

        let new_left = push_filter(left, left_preds);
        let new_right = push_filter(right, right_preds);
        let merged_condition = Expr::conjunction(join_preds);
        let join_type = match join_type {
            JoinType::Cross if !merged_condition.is_true() => JoinType::Inner,
            other => *other,
        };

        trace!("Pushing filter of group {} into join", ctx.group);
        Ok(vec![RuleResult::Alternative(PlanNode::join(
            join_type,
            merged_condition,
            new_left,
            new_right,
        ))])
    }
}

fn push_filter(input: &PlanRef, preds: Vec<Expr>) -> PlanRef {
    if preds.is_empty() {
        input.clone()
    } else {
        PlanNode::filter(Expr::conjunction(preds), input.clone())
    }
}
