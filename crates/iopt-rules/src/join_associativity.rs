//! # Join Associativity Rule
//!
//! This rule implements the algebraic identity for inner joins:
//! `(A JOIN_1 B) JOIN_2 C = A JOIN_1 (B JOIN_2 C)`
//!
//! ## Why Associativity Matters
//!
//! Associativity changes the *shape* of the join tree (left-deep vs right-deep vs bushy).
//! Combined with commutativity, it enables exploring the full space of join orderings.
//!
//! For example, consider a 3-table join `(A ⋈ B) ⋈ C`:
//! - Without associativity: only commutativity swaps are explored (A⋈B)⋈C vs C⋈(A⋈B).
//! - With associativity: the optimizer also considers A⋈(B⋈C), which may be much cheaper
//!   if B and C are small and A is large.
//!
//! ## Implementation
//!
//! The rule returns the reassociated join as a concrete tree whose new inner
//! join `B ⋈ C` has placeholder children. The memo inserts that inner join
//! into a group of its own, or reuses the group that already holds it.
//!
//! ## Condition Handling
//!
//! The outer join's condition is split into:
//!
//! 1. **B-C predicates**: conjuncts whose columns all come from the inner join's right
//!    child (B) and the outer right child (C). These move to the new inner join.
//! 2. **Remaining predicates**: conjuncts that reference the inner join's left child (A).
//!    These stay on the new outer join, combined with the original inner condition.
//!
//! The transformation only fires if there is at least one B-C predicate (otherwise the
//! new inner join would be a cross join, which is rarely useful).
//!
//! ## Both Orientations
//!
//! The rule tries both orientations of the inner join:
//! - `(A ⋈₁ B) ⋈₂ C → A ⋈ (B ⋈ C)` when `cond₂` connects B and C
//! - `(A ⋈₁ B) ⋈₂ C → B ⋈ (A ⋈ C)` when `cond₂` connects A and C
//!
//! ## Applicability
//!
//! Only inner joins. Outer join associativity has ordering constraints
//! (e.g., `(A LEFT JOIN B) LEFT JOIN C ≠ A LEFT JOIN (B LEFT JOIN C)`).

use iopt_core::error::Result;
use iopt_core::expr::{Expr, JoinType};
use iopt_core::lookup::Lookup;
use iopt_core::pattern::Pattern;
use iopt_core::plan::{PlanNode, PlanRef};
use iopt_core::rule::{Rule, RuleContext, RuleResult};
use std::collections::HashSet;
use tracing::trace;

/// Join associativity: `(A ⋈₁ B) ⋈₂ C → A ⋈ (B ⋈ C)`.
pub struct JoinAssociativityRule;

impl Rule for JoinAssociativityRule {
    fn name(&self) -> &str {
        "JoinAssociativity"
    }

    fn pattern(&self) -> Pattern {
        // Join(Join(A, B), C)
        Pattern::join_join_left()
    }

    fn matches(&self, node: &PlanNode) -> bool {
        matches!(
            node,
            PlanNode::Join {
                join_type: JoinType::Inner,
                ..
            }
        )
    }

    fn apply(
        &self,
        node: &PlanRef,
        lookup: &dyn Lookup,
        ctx: &RuleContext<'_>,
    ) -> Result<Vec<RuleResult>> {
        let PlanNode::Join {
            join_type: JoinType::Inner,
            condition: outer_cond,
            left,
            right: c,
        } = node.as_ref()
        else {
            return Ok(vec![]);
        };

        let inner = lookup.resolve(left)?;
        let PlanNode::Join {
            join_type: JoinType::Inner,
            condition: inner_cond,
            left: a,
            right: b,
        } = inner.as_ref()
        else {
            return Ok(vec![]);
        };

        let a_tables = collect_table_names(a, lookup)?;
        let b_tables = collect_table_names(b, lookup)?;
        let c_tables = collect_table_names(c, lookup)?;

        let mut results = Vec::new();

        // left ⋈ (right ⋈ C)
        if let Some(plan) = try_reassociate(outer_cond, inner_cond, a, b, c, &b_tables, &c_tables) {
            results.push(RuleResult::Alternative(plan));
        }
        // right ⋈ (left ⋈ C)
        if let Some(plan) = try_reassociate(outer_cond, inner_cond, b, a, c, &a_tables, &c_tables) {
            results.push(RuleResult::Alternative(plan));
        }

        if !results.is_empty() {
            trace!("Reassociated join in group {} into {} shapes", ctx.group, results.len());
        }
        Ok(results)
    }
}

/// Attempt the associativity transformation:
/// `(stay ⋈_inner_cond moved) ⋈_outer_cond c`
/// → `stay ⋈_new_outer (moved ⋈_new_inner c)`
///
/// Returns `None` when no conjunct of the outer condition connects `moved`
/// with `c`.
fn try_reassociate(
    outer_cond: &Expr,
    inner_cond: &Expr,
    stay: &PlanRef,
    moved: &PlanRef,
    c: &PlanRef,
    moved_tables: &HashSet<String>,
    c_tables: &HashSet<String>,
) -> Option<PlanRef> {
    let mut new_inner_preds = Vec::new();
    let mut remaining_outer_preds = Vec::new();

    for pred in outer_cond.conjuncts() {
        let tables = pred.tables();
        let all_in_moved_or_c = tables
            .iter()
            .all(|t| moved_tables.contains(*t) || c_tables.contains(*t));
        let has_moved = tables.iter().any(|t| moved_tables.contains(*t));
        let has_c = tables.iter().any(|t| c_tables.contains(*t));

        if all_in_moved_or_c && has_moved && has_c {
            new_inner_preds.push(pred.clone());
        } else {
            remaining_outer_preds.push(pred.clone());
        }
    }

    if new_inner_preds.is_empty() {
        return None;
    }

    // The inner condition connects stay with moved; moved's columns are still
    // available above the new inner join.
    let new_inner_cond = Expr::conjunction(new_inner_preds);
    let new_outer_cond = Expr::conjunction(
        inner_cond
            .conjuncts()
            .into_iter()
            .cloned()
            .chain(remaining_outer_preds),
    );

    Some(PlanNode::join(
        JoinType::Inner,
        new_outer_cond,
        stay.clone(),
        PlanNode::join(JoinType::Inner, new_inner_cond, moved.clone(), c.clone()),
    ))
}

/// Names of all tables scanned below `node`, looking through placeholders.
pub(crate) fn collect_table_names(node: &PlanRef, lookup: &dyn Lookup) -> Result<HashSet<String>> {
    let mut tables = HashSet::new();
    let mut visited = HashSet::new();
    let mut stack = vec![node.clone()];
    while let Some(node) = stack.pop() {
        match node.as_ref() {
            PlanNode::GroupReference(id) => {
                if visited.insert(*id) {
                    stack.push(lookup.resolve_group(*id)?);
                }
            }
            PlanNode::Scan { table, .. } => {
                tables.insert(table.name.clone());
            }
            _ => stack.extend(node.children()),
        }
    }
    Ok(tables)
}
