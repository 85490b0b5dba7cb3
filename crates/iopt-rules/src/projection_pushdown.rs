//! # Projection Pushdown Rule
//!
//! This rule implements column pruning by pushing projection requirements down to
//! table scans. When a Project node only references a subset of the columns produced
//! by a child Scan, this rule offers the same Project over a Scan that reads only
//! those columns.
//!
//! ## Why This Helps
//!
//! - **Reduces I/O**: columnar storage formats (ORC, Parquet) can skip entire columns
//!   that are not needed.
//! - **Reduces memory**: fewer columns means smaller row representations throughout
//!   the plan.
//!
//! ## Current Scope
//!
//! Only Project directly over Scan. A scan without a column list reads every
//! column; the catalog tells how many that is.

use iopt_core::error::Result;
use iopt_core::expr::ColumnRef;
use iopt_core::lookup::Lookup;
use iopt_core::pattern::Pattern;
use iopt_core::plan::{PlanNode, PlanRef};
use iopt_core::rule::{Rule, RuleContext, RuleResult};
use std::sync::Arc;

/// Push projections closer to table scans to reduce intermediate data.
pub struct ProjectionPushdownRule;

impl Rule for ProjectionPushdownRule {
    fn name(&self) -> &str {
        "ProjectionPushdown"
    }

    fn pattern(&self) -> Pattern {
        // Project(Scan)
        Pattern::project_scan()
    }

    fn apply(
        &self,
        node: &PlanRef,
        lookup: &dyn Lookup,
        ctx: &RuleContext<'_>,
    ) -> Result<Vec<RuleResult>> {
        let PlanNode::Project {
            exprs,
            aliases,
            input,
        } = node.as_ref()
        else {
            return Ok(vec![]);
        };
        let scan = lookup.resolve(input)?;
        let PlanNode::Scan {
            table,
            columns,
            predicate,
        } = scan.as_ref()
        else {
            return Ok(vec![]);
        };

        let mut needed: Vec<ColumnRef> = Vec::new();
        for col in exprs.iter().flat_map(|e| e.columns()) {
            if !needed.contains(col) {
                needed.push(col.clone());
            }
        }
        if needed.is_empty() {
            return Ok(vec![]);
        }

        let read = if columns.is_empty() {
            ctx.catalog.table_columns(table).map(|all| all.len())
        } else {
            Some(columns.len())
        };
        if read.is_some_and(|read| needed.len() >= read) {
            return Ok(vec![]);
        }

        let narrow = Arc::new(PlanNode::Scan {
            table: table.clone(),
            columns: needed,
            predicate: predicate.clone(),
        });
        Ok(vec![RuleResult::Alternative(PlanNode::project(
            exprs.clone(),
            aliases.clone(),
            narrow,
        ))])
    }
}
