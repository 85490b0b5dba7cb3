//! # Statistics
//!
//! Row-count and size estimates used by [`DefaultCostModel`](crate::cost::DefaultCostModel)
//! to rank candidates. Estimates are derived bottom-up:
//!
//! - **Filter**: `rows * selectivity`, column NDVs scaled by the same ratio.
//! - **Join**: `|L| * |R| / max(NDV(l), NDV(r))` per equi-join column pair,
//!   assuming uniform values and containment of the smaller key domain.
//! - **Aggregate**: product of the group-by NDVs, capped by the input rows.
//!
//! Selectivity heuristics: equality `1 / NDV`, range `1/3`, `IS NULL` the
//! column's null fraction, AND multiplies (independence), OR uses
//! inclusion-exclusion, anything else [`DEFAULT_FILTER_SELECTIVITY`].

use crate::expr::{BinaryOp, Expr, ScalarValue, UnaryOp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_FILTER_SELECTIVITY: f64 = 0.1;
pub const RANGE_SELECTIVITY: f64 = 0.33;
/// Row count assumed for tables the catalog knows nothing about.
pub const DEFAULT_ROW_COUNT: f64 = 1000.0;
pub const DEFAULT_ROW_SIZE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    pub total_size_bytes: f64,
    /// Keyed by unqualified column name.
    pub column_stats: HashMap<String, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64, total_size_bytes: f64) -> Self {
        Self {
            row_count,
            total_size_bytes,
            column_stats: HashMap::new(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(DEFAULT_ROW_COUNT, DEFAULT_ROW_COUNT * DEFAULT_ROW_SIZE)
    }

    pub fn with_column(mut self, name: impl Into<String>, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(name.into(), stats);
        self
    }

    pub fn avg_row_size(&self) -> f64 {
        if self.row_count > 0.0 {
            self.total_size_bytes / self.row_count
        } else {
            DEFAULT_ROW_SIZE
        }
    }

    /// Same rows, at most `limit` of them.
    pub fn capped(&self, limit: f64) -> Statistics {
        if self.row_count <= limit {
            return self.clone();
        }
        let selectivity = if self.row_count > 0.0 {
            limit / self.row_count
        } else {
            1.0
        };
        let mut capped = derive_filter_stats(self, selectivity);
        capped.row_count = limit.max(1.0);
        capped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values.
    pub distinct_count: f64,
    /// Fraction of NULLs, in `[0, 1]`.
    pub null_fraction: f64,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
        }
    }
}

pub fn derive_filter_stats(input: &Statistics, selectivity: f64) -> Statistics {
    let row_count = (input.row_count * selectivity).max(1.0);
    let ratio = if input.row_count > 0.0 {
        row_count / input.row_count
    } else {
        1.0
    };
    let column_stats = input
        .column_stats
        .iter()
        .map(|(name, cs)| {
            let mut cs = cs.clone();
            cs.distinct_count = (cs.distinct_count * ratio).max(1.0).min(row_count);
            (name.clone(), cs)
        })
        .collect();
    Statistics {
        row_count,
        total_size_bytes: input.total_size_bytes * ratio,
        column_stats,
    }
}

/// Join cardinality for the given `(left column, right column)` equi-join pairs.
/// Without pairs this is the cross product.
pub fn derive_join_stats(
    left: &Statistics,
    right: &Statistics,
    join_columns: &[(String, String)],
) -> Statistics {
    let mut selectivity = 1.0_f64;
    for (left_col, right_col) in join_columns {
        let left_ndv = left
            .column_stats
            .get(left_col)
            .map(|s| s.distinct_count)
            .unwrap_or(left.row_count);
        let right_ndv = right
            .column_stats
            .get(right_col)
            .map(|s| s.distinct_count)
            .unwrap_or(right.row_count);
        selectivity /= left_ndv.max(right_ndv).max(1.0);
    }

    let row_count = (left.row_count * right.row_count * selectivity).max(1.0);
    let total_size_bytes = row_count * (left.avg_row_size() + right.avg_row_size());

    let mut column_stats = HashMap::new();
    for (name, cs) in left.column_stats.iter().chain(right.column_stats.iter()) {
        let mut cs = cs.clone();
        cs.distinct_count = cs.distinct_count.min(row_count);
        column_stats.insert(name.clone(), cs);
    }

    Statistics {
        row_count,
        total_size_bytes,
        column_stats,
    }
}

pub fn derive_aggregate_stats(input: &Statistics, group_by_cols: &[String]) -> Statistics {
    let groups: f64 = group_by_cols
        .iter()
        .map(|col| {
            input
                .column_stats
                .get(col)
                .map(|s| s.distinct_count)
                .unwrap_or(input.row_count)
        })
        .product();
    let row_count = groups.min(input.row_count).max(1.0);
    Statistics::new(row_count, row_count * DEFAULT_ROW_SIZE)
}

pub fn equality_selectivity(stats: &Statistics, column: &str) -> f64 {
    stats
        .column_stats
        .get(column)
        .map(|cs| 1.0 / cs.distinct_count.max(1.0))
        .unwrap_or(DEFAULT_FILTER_SELECTIVITY)
}

/// Fraction of `stats`' rows expected to satisfy `predicate`.
pub fn estimate_selectivity(predicate: &Expr, stats: &Statistics) -> f64 {
    match predicate {
        Expr::Literal(ScalarValue::Bool(true)) => 1.0,
        Expr::Literal(ScalarValue::Bool(false) | ScalarValue::Null) => 0.0,
        Expr::BinaryOp {
            op: BinaryOp::Eq,
            left,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (Expr::Column(c), _) | (_, Expr::Column(c)) => equality_selectivity(stats, &c.name),
            _ => DEFAULT_FILTER_SELECTIVITY,
        },
        Expr::BinaryOp {
            op: BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq,
            ..
        } => RANGE_SELECTIVITY,
        Expr::UnaryOp {
            op: op @ (UnaryOp::IsNull | UnaryOp::IsNotNull),
            operand,
        } => {
            let nulls = match operand.as_ref() {
                Expr::Column(c) => stats
                    .column_stats
                    .get(&c.name)
                    .map(|cs| cs.null_fraction)
                    .unwrap_or(DEFAULT_FILTER_SELECTIVITY),
                _ => DEFAULT_FILTER_SELECTIVITY,
            };
            if *op == UnaryOp::IsNull {
                nulls
            } else {
                1.0 - nulls
            }
        }
        Expr::And(conjuncts) => conjuncts
            .iter()
            .map(|c| estimate_selectivity(c, stats))
            .product(),
        Expr::Or(disjuncts) => {
            let miss: f64 = disjuncts
                .iter()
                .map(|d| 1.0 - estimate_selectivity(d, stats))
                .product();
            1.0 - miss
        }
        _ => DEFAULT_FILTER_SELECTIVITY,
    }
}

/// Column-to-column equalities in a join condition, as `(left, right)` names.
pub fn equi_join_columns(condition: &Expr) -> Vec<(String, String)> {
    condition
        .conjuncts()
        .into_iter()
        .filter_map(|c| match c {
            Expr::BinaryOp {
                op: BinaryOp::Eq,
                left,
                right,
            } => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(l), Expr::Column(r)) => Some((l.name.clone(), r.name.clone())),
                _ => None,
            },
            _ => None,
        })
        .collect()
}
