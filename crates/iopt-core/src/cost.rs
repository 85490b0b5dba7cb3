//! # Cost Model
//!
//! The memo ranks candidates of a group with a [`CostModel`]. The only thing
//! the optimizer needs from it is [`CostModel::compare`]: given two candidates
//! for the same group, which one is preferable. `Ordering::Equal` keeps the
//! candidate that was inserted first.
//!
//! Candidates handed to the model still have placeholders as children. A model
//! that wants to look below them resolves through the [`Lookup`] it is given,
//! which always reflects the memo's current representatives.
//!
//! [`DefaultCostModel`] derives row counts bottom-up (see [`crate::stats`]) and
//! sums a weighted per-operator cost over the resolved tree:
//!
//! ```text
//! cost(node) = local(node, input stats) + sum(cost(child))
//! ```
//!
//! Joins are assumed to build a hash table on their right input when the
//! condition has an equi-join column pair, and to run as a nested loop
//! otherwise. The asymmetric build cost is what lets join commutativity pick
//! the smaller relation as the build side.

use crate::catalog::{Catalog, InMemoryCatalog};
use crate::error::Result;
use crate::expr::{ColumnRef, Expr, TableRef};
use crate::lookup::Lookup;
use crate::plan::PlanNode;
use crate::stats::{self, Statistics};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Scalar estimate of a plan's expense. Lower is better.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    pub total: f64,
}

impl Cost {
    pub fn new(total: f64) -> Self {
        Self { total }
    }
}

/// Costs closer than `f64::EPSILON` compare equal.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        (self.total - other.total).abs() < f64::EPSILON
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        self.total.partial_cmp(&other.total)
    }
}

pub trait CostModel: Send + Sync {
    /// Cost of `node` including everything below it.
    fn compute_cost(&self, node: &PlanNode, lookup: &dyn Lookup) -> Result<Cost>;

    /// `Less` when `left` is preferable to `right`. Incomparable costs are `Equal`.
    fn compare(&self, left: &PlanNode, right: &PlanNode, lookup: &dyn Lookup) -> Result<Ordering> {
        let left = self.compute_cost(left, lookup)?;
        let right = self.compute_cost(right, lookup)?;
        Ok(left.partial_cmp(&right).unwrap_or(Ordering::Equal))
    }
}

pub struct DefaultCostModel {
    /// Weight per row processed or comparison made.
    pub cpu_weight: f64,
    /// Weight per byte held in memory (hash tables, sort buffers).
    pub memory_weight: f64,
    catalog: Arc<dyn Catalog>,
}

impl Default for DefaultCostModel {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryCatalog::new()))
    }
}

impl DefaultCostModel {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            cpu_weight: 1.0,
            memory_weight: 0.01,
            catalog,
        }
    }

    /// Estimated output statistics of `node`.
    pub fn derive_stats(&self, node: &PlanNode, lookup: &dyn Lookup) -> Result<Statistics> {
        Ok(self.estimate(node, lookup)?.0)
    }

    fn estimate(&self, node: &PlanNode, lookup: &dyn Lookup) -> Result<(Statistics, f64)> {
        let estimate = match node {
            PlanNode::GroupReference(id) => {
                let rep = lookup.resolve_group(*id)?;
                return self.estimate(&rep, lookup);
            }
            PlanNode::Scan {
                table,
                columns,
                predicate,
            } => {
                let base = self
                    .catalog
                    .table_stats(table)
                    .unwrap_or_else(Statistics::unknown);
                let cost = self.cpu_weight * base.row_count * self.column_fraction(table, columns);
                let out = match predicate {
                    Some(p) => stats::derive_filter_stats(&base, stats::estimate_selectivity(p, &base)),
                    None => base,
                };
                (out, cost)
            }
            PlanNode::Filter { predicate, input } => {
                let (input, input_cost) = self.estimate(input, lookup)?;
                let selectivity = stats::estimate_selectivity(predicate, &input);
                let cost = input_cost + self.cpu_weight * input.row_count;
                (stats::derive_filter_stats(&input, selectivity), cost)
            }
            PlanNode::Project { input, .. } => {
                let (input, input_cost) = self.estimate(input, lookup)?;
                let cost = input_cost + self.cpu_weight * input.row_count;
                (input, cost)
            }
            PlanNode::Join {
                join_type,
                condition,
                left,
                right,
            } => {
                let (l, left_cost) = self.estimate(left, lookup)?;
                let (r, right_cost) = self.estimate(right, lookup)?;
                let (out, local) = self.join_estimate(condition, &l, &r);
                let out = if join_type.emits_right() {
                    out
                } else {
                    l.capped(out.row_count)
                };
                (out, left_cost + right_cost + local)
            }
            PlanNode::Aggregate {
                group_by, input, ..
            } => {
                let (input, input_cost) = self.estimate(input, lookup)?;
                let group_cols: Vec<String> = group_by
                    .iter()
                    .filter_map(|e| match e {
                        Expr::Column(c) => Some(c.name.clone()),
                        _ => None,
                    })
                    .collect();
                let out = stats::derive_aggregate_stats(&input, &group_cols);
                let cost = input_cost
                    + self.cpu_weight * input.row_count
                    + self.memory_weight * out.total_size_bytes;
                (out, cost)
            }
            PlanNode::Sort { input, .. } => {
                let (input, input_cost) = self.estimate(input, lookup)?;
                let rows = input.row_count;
                let n_log_n = if rows > 1.0 { rows * rows.log2() } else { 1.0 };
                let cost = input_cost
                    + self.cpu_weight * n_log_n
                    + self.memory_weight * input.total_size_bytes;
                (input, cost)
            }
            PlanNode::Limit {
                offset,
                count,
                input,
            } => {
                let (input, input_cost) = self.estimate(input, lookup)?;
                let out = input.capped(offset.saturating_add(*count) as f64);
                let cost = input_cost + self.cpu_weight * out.row_count;
                (out, cost)
            }
        };
        Ok(estimate)
    }

    /// Share of the table's columns a scan reads. Unknown tables and scans
    /// without an explicit column list read everything.
    fn column_fraction(&self, table: &TableRef, columns: &[ColumnRef]) -> f64 {
        match self.catalog.table_columns(table) {
            Some(all) if !columns.is_empty() && !all.is_empty() => {
                (columns.len() as f64 / all.len() as f64).min(1.0)
            }
            _ => 1.0,
        }
    }

    /// Output statistics and local cost of joining `l` with `r`.
    fn join_estimate(&self, condition: &Expr, l: &Statistics, r: &Statistics) -> (Statistics, f64) {
        let pairs = stats::equi_join_columns(condition);
        let cross = stats::derive_join_stats(l, r, &pairs);
        let residual: Vec<&Expr> = condition
            .conjuncts()
            .into_iter()
            .filter(|c| !c.is_true() && stats::equi_join_columns(c).is_empty())
            .collect();
        let out = residual.iter().fold(cross, |acc, pred| {
            let selectivity = stats::estimate_selectivity(pred, &acc);
            stats::derive_filter_stats(&acc, selectivity)
        });

        let local = if pairs.is_empty() {
            self.cpu_weight * l.row_count * r.row_count
        } else {
            // Build on the right input, probe with the left.
            self.cpu_weight * (l.row_count + r.row_count) + self.memory_weight * r.total_size_bytes
        };
        (out, local)
    }
}

impl CostModel for DefaultCostModel {
    fn compute_cost(&self, node: &PlanNode, lookup: &dyn Lookup) -> Result<Cost> {
        Ok(Cost::new(self.estimate(node, lookup)?.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::JoinType;
    use crate::lookup::NoLookup;
    use crate::stats::ColumnStatistics;

    fn model() -> DefaultCostModel {
        let catalog = InMemoryCatalog::new()
            .with_table(
                TableRef::new("tpch", "lineitem"),
                vec![],
                Statistics::new(600_000.0, 60_000_000.0)
                    .with_column("l_orderkey", ColumnStatistics::new(150_000.0, 0.0)),
            )
            .with_table(
                TableRef::new("tpch", "orders"),
                vec![],
                Statistics::new(150_000.0, 15_000_000.0)
                    .with_column("o_orderkey", ColumnStatistics::new(150_000.0, 0.0)),
            );
        DefaultCostModel::new(Arc::new(catalog))
    }

    fn scan(name: &str) -> Arc<PlanNode> {
        PlanNode::scan(TableRef::new("tpch", name), vec![])
    }

    fn equi() -> Expr {
        Expr::equals(
            Expr::Column(ColumnRef::new("lineitem", "l_orderkey")),
            Expr::Column(ColumnRef::new("orders", "o_orderkey")),
        )
    }

    #[test]
    fn test_smaller_build_side_is_cheaper() {
        let model = model();
        let build_small = PlanNode::join(JoinType::Inner, equi(), scan("lineitem"), scan("orders"));
        let build_large = PlanNode::join(JoinType::Inner, equi(), scan("orders"), scan("lineitem"));
        assert_eq!(
            model.compare(&build_small, &build_large, &NoLookup).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_equi_join_cheaper_than_nested_loop() {
        let model = model();
        let hash = PlanNode::join(JoinType::Inner, equi(), scan("lineitem"), scan("orders"));
        let nested = PlanNode::join(JoinType::Inner, Expr::bool(true), scan("lineitem"), scan("orders"));
        let hash_cost = model.compute_cost(&hash, &NoLookup).unwrap();
        let nested_cost = model.compute_cost(&nested, &NoLookup).unwrap();
        assert!(hash_cost < nested_cost);

        let rows = model.derive_stats(&hash, &NoLookup).unwrap().row_count;
        assert_eq!(rows, 600_000.0);
    }

    #[test]
    fn test_extra_filter_costs_more() {
        let model = model();
        let p = Expr::equals(Expr::col("orders", "o_orderkey"), Expr::int(1));
        let once = PlanNode::filter(p.clone(), scan("orders"));
        let twice = PlanNode::filter(p, once.clone());
        assert_eq!(model.compare(&once, &twice, &NoLookup).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_narrow_scans_are_cheaper() {
        let table = TableRef::new("tpch", "nation");
        let columns: Vec<ColumnRef> = ["n_nationkey", "n_name", "n_regionkey", "n_comment"]
            .iter()
            .map(|c| ColumnRef::new("nation", *c))
            .collect();
        let catalog =
            InMemoryCatalog::new().with_table(table.clone(), columns.clone(), Statistics::new(25.0, 2500.0));
        let model = DefaultCostModel::new(Arc::new(catalog));

        let full = PlanNode::scan(table.clone(), vec![]);
        let narrow = PlanNode::scan(table, columns[..1].to_vec());
        assert_eq!(model.compute_cost(&full, &NoLookup).unwrap(), Cost::new(25.0));
        assert_eq!(model.compute_cost(&narrow, &NoLookup).unwrap(), Cost::new(6.25));
    }

    #[test]
    fn test_placeholders_need_a_lookup() {
        let model = DefaultCostModel::default();
        let plan = PlanNode::limit(0, 10, PlanNode::group(0));
        assert!(model.compute_cost(&plan, &NoLookup).is_err());
        let unknown = model.derive_stats(&scan("nation"), &NoLookup).unwrap();
        assert_eq!(unknown.row_count, stats::DEFAULT_ROW_COUNT);
    }

    #[test]
    fn test_cost_comparisons_use_epsilon() {
        assert_eq!(Cost::new(1.0), Cost::new(1.0 + f64::EPSILON / 2.0));
        assert!(Cost::new(0.0) < Cost::new(1.0));
        assert!(Cost::new(1.0).partial_cmp(&Cost::new(f64::NAN)).is_none());
    }
}
