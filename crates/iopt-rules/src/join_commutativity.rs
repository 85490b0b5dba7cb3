//! # Join Commutativity Rule
//!
//! This rule implements the algebraic identity: `A JOIN B = B JOIN A` for symmetric
//! join types (inner joins and cross joins).
//!
//! ## Why Commutativity Matters
//!
//! The default cost model builds the hash table of an equi-join on the right
//! input. Commutativity offers the swapped orientation as a competing
//! candidate, so the smaller relation can become the build side. Combined with
//! associativity, it also lets multi-table joins be reordered.
//!
//! ## Applicability
//!
//! This rule only fires for `Inner` and `Cross` joins. Left, Right, Semi, and Anti
//! joins have fixed left/right semantics (e.g., a left join preserves all left rows)
//! and cannot be commuted without changing the query semantics.
//!
//! Swapping twice yields the original shape, which the memo already holds, so
//! the rule stops producing changes after one round.

use iopt_core::error::Result;
use iopt_core::expr::{BinaryOp, Expr, JoinType};
use iopt_core::lookup::Lookup;
use iopt_core::pattern::Pattern;
use iopt_core::plan::{PlanNode, PlanRef};
use iopt_core::rule::{Rule, RuleContext, RuleResult};

/// Join commutativity: A JOIN B -> B JOIN A.
pub struct JoinCommutativityRule;

impl Rule for JoinCommutativityRule {
    fn name(&self) -> &str {
        "JoinCommutativity"
    }

    fn pattern(&self) -> Pattern {
        Pattern::join()
    }

    fn matches(&self, node: &PlanNode) -> bool {
        matches!(
            node,
            PlanNode::Join {
                join_type: JoinType::Inner | JoinType::Cross,
                ..
            }
        )
    }

    fn apply(
        &self,
        node: &PlanRef,
        _lookup: &dyn Lookup,
        _ctx: &RuleContext<'_>,
    ) -> Result<Vec<RuleResult>> {
        let PlanNode::Join {
            join_type,
            condition,
            left,
            right,
        } = node.as_ref()
        else {
            return Ok(vec![]);
        };

        Ok(vec![RuleResult::Alternative(PlanNode::join(
            *join_type,
            swap_condition_sides(condition),
            right.clone(),
            left.clone(),
        ))])
    }
}

/// Swap the sides of an equi-join condition.
/// For A.x = B.y, produce B.y = A.x (semantically the same, but tracks the swap).
fn swap_condition_sides(expr: &Expr) -> Expr {
    match expr {
        Expr::BinaryOp {
            op: BinaryOp::Eq,
            left,
            right,
        } => Expr::BinaryOp {
            op: BinaryOp::Eq,
            left: right.clone(),
            right: left.clone(),
        },
        Expr::And(conjuncts) => Expr::And(conjuncts.iter().map(swap_condition_sides).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iopt_core::catalog::InMemoryCatalog;
    use iopt_core::cost::DefaultCostModel;
    use iopt_core::NoLookup;

    #[test]
    fn test_swap_condition() {
        let cond = Expr::equals(Expr::col("a", "x"), Expr::col("b", "y"));
        let swapped = swap_condition_sides(&cond);
        match swapped {
            Expr::BinaryOp { ref left, ref right, .. } => {
                assert!(matches!(left.as_ref(), Expr::Column(c) if c.table.as_deref() == Some("b")));
                assert!(matches!(right.as_ref(), Expr::Column(c) if c.table.as_deref() == Some("a")));
            }
            _ => panic!("Expected BinaryOp"),
        }
        assert_eq!(swap_condition_sides(&swapped), cond);
    }

    #[test]
    fn test_swaps_children_of_inner_joins_only() {
        let rule = JoinCommutativityRule;
        let cond = Expr::equals(Expr::col("a", "x"), Expr::col("b", "y"));
        let left_join = PlanNode::join(JoinType::Left, cond.clone(), PlanNode::group(0), PlanNode::group(1));
        assert!(!rule.matches(&left_join));

        let inner = PlanNode::join(JoinType::Inner, cond, PlanNode::group(0), PlanNode::group(1));
        assert!(rule.matches(&inner));
        let (catalog, model) = (InMemoryCatalog::new(), DefaultCostModel::default());
        let ctx = RuleContext {
            catalog: &catalog,
            cost_model: &model,
            group: 2,
            pass: 1,
        };
        let results = rule.apply(&inner, &NoLookup, &ctx).unwrap();
        let [RuleResult::Alternative(swapped)] = results.as_slice() else {
            panic!("expected one alternative, got {results:?}");
        };
        let children = swapped.children();
        assert_eq!(children[0].group_id(), Some(1));
        assert_eq!(children[1].group_id(), Some(0));
    }
}
