//! # Plan Node Model
//!
//! Every plan shape, whether handed over by the analyzer, produced by a rule or
//! stored in the memo, is a tree of immutable [`PlanNode`] values shared through
//! [`PlanRef`] (`Arc<PlanNode>`).
//!
//! The enum is closed: operator variants carry their parameters and their
//! children inline, and one extra variant, [`PlanNode::GroupReference`], stands
//! in for "the current representative of memo group N". A group reference has
//! no children. Candidates stored in the memo always have group references as
//! children, which is what turns the memo into a DAG of groups rather than a
//! forest of trees.
//!
//! Nodes are never mutated. [`PlanNode::with_new_children`] returns a new node
//! of the same kind with the same parameters and the given children, and fails
//! if the number of children does not match.
//!
//! Equality and hashing are structural. Because memo candidates only hold group
//! references as children, comparing two candidates compares their kind, their
//! parameters and the identifiers of their child groups.

use crate::error::{OptimizerError, Result};
use crate::expr::{write_list, AggExpr, ColumnRef, Expr, JoinType, SortKey, TableRef};
use crate::lookup::Lookup;
use crate::memo::GroupId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type PlanRef = Arc<PlanNode>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanNode {
    /// Reads a base table. Always a leaf. An empty column list means all columns.
    Scan {
        table: TableRef,
        columns: Vec<ColumnRef>,
        predicate: Option<Expr>,
    },
    Filter {
        predicate: Expr,
        input: PlanRef,
    },
    Project {
        exprs: Vec<Expr>,
        aliases: Vec<String>,
        input: PlanRef,
    },
    Join {
        join_type: JoinType,
        condition: Expr,
        left: PlanRef,
        right: PlanRef,
    },
    Aggregate {
        group_by: Vec<Expr>,
        aggregates: Vec<AggExpr>,
        input: PlanRef,
    },
    Sort {
        order: Vec<SortKey>,
        input: PlanRef,
    },
    Limit {
        offset: u64,
        count: u64,
        input: PlanRef,
    },
    /// Placeholder for the representative of a memo group.
    GroupReference(GroupId),
}

/// Data-less discriminant of [`PlanNode`], used by patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanKind {
    Scan,
    Filter,
    Project,
    Join,
    Aggregate,
    Sort,
    Limit,
    GroupReference,
}

impl PlanNode {
    pub fn scan(table: TableRef, columns: Vec<ColumnRef>) -> PlanRef {
        Arc::new(PlanNode::Scan {
            table,
            columns,
            predicate: None,
        })
    }

    pub fn filter(predicate: Expr, input: PlanRef) -> PlanRef {
        Arc::new(PlanNode::Filter { predicate, input })
    }

    pub fn project(exprs: Vec<Expr>, aliases: Vec<String>, input: PlanRef) -> PlanRef {
        Arc::new(PlanNode::Project {
            exprs,
            aliases,
            input,
        })
    }

    pub fn join(join_type: JoinType, condition: Expr, left: PlanRef, right: PlanRef) -> PlanRef {
        Arc::new(PlanNode::Join {
            join_type,
            condition,
            left,
            right,
        })
    }

    pub fn aggregate(group_by: Vec<Expr>, aggregates: Vec<AggExpr>, input: PlanRef) -> PlanRef {
        Arc::new(PlanNode::Aggregate {
            group_by,
            aggregates,
            input,
        })
    }

    pub fn sort(order: Vec<SortKey>, input: PlanRef) -> PlanRef {
        Arc::new(PlanNode::Sort { order, input })
    }

    pub fn limit(offset: u64, count: u64, input: PlanRef) -> PlanRef {
        Arc::new(PlanNode::Limit {
            offset,
            count,
            input,
        })
    }

    pub fn group(id: GroupId) -> PlanRef {
        Arc::new(PlanNode::GroupReference(id))
    }

    pub fn kind(&self) -> PlanKind {
        match self {
            PlanNode::Scan { .. } => PlanKind::Scan,
            PlanNode::Filter { .. } => PlanKind::Filter,
            PlanNode::Project { .. } => PlanKind::Project,
            PlanNode::Join { .. } => PlanKind::Join,
            PlanNode::Aggregate { .. } => PlanKind::Aggregate,
            PlanNode::Sort { .. } => PlanKind::Sort,
            PlanNode::Limit { .. } => PlanKind::Limit,
            PlanNode::GroupReference(_) => PlanKind::GroupReference,
        }
    }

    /// The referenced group, if this node is a placeholder.
    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            PlanNode::GroupReference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_group_reference(&self) -> bool {
        matches!(self, PlanNode::GroupReference(_))
    }

    /// Number of children this kind of node always has.
    pub fn arity(&self) -> usize {
        match self {
            PlanNode::Scan { .. } | PlanNode::GroupReference(_) => 0,
            PlanNode::Join { .. } => 2,
            PlanNode::Filter { .. }
            | PlanNode::Project { .. }
            | PlanNode::Aggregate { .. }
            | PlanNode::Sort { .. }
            | PlanNode::Limit { .. } => 1,
        }
    }

    /// Children in positional order.
    pub fn children(&self) -> Vec<PlanRef> {
        match self {
            PlanNode::Scan { .. } | PlanNode::GroupReference(_) => vec![],
            PlanNode::Join { left, right, .. } => vec![left.clone(), right.clone()],
            PlanNode::Filter { input, .. }
            | PlanNode::Project { input, .. }
            | PlanNode::Aggregate { input, .. }
            | PlanNode::Sort { input, .. }
            | PlanNode::Limit { input, .. } => vec![input.clone()],
        }
    }

    /// Rebuild this node with `children` in place of its current ones.
    pub fn with_new_children(&self, children: Vec<PlanRef>) -> Result<PlanRef> {
        let node = match (self, children.as_slice()) {
            (PlanNode::Scan { .. } | PlanNode::GroupReference(_), []) => self.clone(),
            (PlanNode::Filter { predicate, .. }, [input]) => PlanNode::Filter {
                predicate: predicate.clone(),
                input: input.clone(),
            },
            (PlanNode::Project { exprs, aliases, .. }, [input]) => PlanNode::Project {
                exprs: exprs.clone(),
                aliases: aliases.clone(),
                input: input.clone(),
            },
            (
                PlanNode::Join {
                    join_type,
                    condition,
                    ..
                },
                [left, right],
            ) => PlanNode::Join {
                join_type: *join_type,
                condition: condition.clone(),
                left: left.clone(),
                right: right.clone(),
            },
            (
                PlanNode::Aggregate {
                    group_by,
                    aggregates,
                    ..
                },
                [input],
            ) => PlanNode::Aggregate {
                group_by: group_by.clone(),
                aggregates: aggregates.clone(),
                input: input.clone(),
            },
            (PlanNode::Sort { order, .. }, [input]) => PlanNode::Sort {
                order: order.clone(),
                input: input.clone(),
            },
            (PlanNode::Limit { offset, count, .. }, [input]) => PlanNode::Limit {
                offset: *offset,
                count: *count,
                input: input.clone(),
            },
            (node, given) => {
                return Err(OptimizerError::ChildCountMismatch {
                    kind: node.kind(),
                    expected: node.arity(),
                    actual: given.len(),
                })
            }
        };
        Ok(Arc::new(node))
    }

    /// Number of output columns, when it can be told without a schema.
    ///
    /// Pass-through operators and placeholders are resolved through `lookup`.
    /// A scan without an explicit column list yields `None`.
    pub fn output_width(&self, lookup: &dyn Lookup) -> Result<Option<usize>> {
        match self {
            PlanNode::Scan { columns, .. } => Ok((!columns.is_empty()).then_some(columns.len())),
            PlanNode::Project { exprs, .. } => Ok(Some(exprs.len())),
            PlanNode::Aggregate {
                group_by,
                aggregates,
                ..
            } => Ok(Some(group_by.len() + aggregates.len())),
            PlanNode::Filter { input, .. }
            | PlanNode::Sort { input, .. }
            | PlanNode::Limit { input, .. } => lookup.resolve(input)?.output_width(lookup),
            PlanNode::Join {
                join_type,
                left,
                right,
                ..
            } => {
                let left_width = lookup.resolve(left)?.output_width(lookup)?;
                if !join_type.emits_right() {
                    return Ok(left_width);
                }
                let right_width = lookup.resolve(right)?.output_width(lookup)?;
                Ok(left_width.zip(right_width).map(|(l, r)| l + r))
            }
            PlanNode::GroupReference(id) => lookup.resolve_group(*id)?.output_width(lookup),
        }
    }

    /// Whether a placeholder appears anywhere in this tree.
    pub fn has_group_references(&self) -> bool {
        let mut stack: Vec<&PlanNode> = vec![self];
        while let Some(node) = stack.pop() {
            if node.is_group_reference() {
                return true;
            }
            match node {
                PlanNode::Join { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
                PlanNode::Filter { input, .. }
                | PlanNode::Project { input, .. }
                | PlanNode::Aggregate { input, .. }
                | PlanNode::Sort { input, .. }
                | PlanNode::Limit { input, .. } => stack.push(input),
                PlanNode::Scan { .. } | PlanNode::GroupReference(_) => {}
            }
        }
        false
    }

    /// Total number of nodes in the tree, placeholders included.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(|c| c.node_count())
            .sum::<usize>()
    }

    fn fmt_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanNode::Scan {
                table,
                columns,
                predicate,
            } => {
                write!(f, "Scan: {table}")?;
                if !columns.is_empty() {
                    write!(f, " [")?;
                    write_list(f, columns, ", ")?;
                    write!(f, "]")?;
                }
                if let Some(p) = predicate {
                    write!(f, " filter={p}")?;
                }
                Ok(())
            }
            PlanNode::Filter { predicate, .. } => write!(f, "Filter: {predicate}"),
            PlanNode::Project { exprs, aliases, .. } => {
                write!(f, "Project: ")?;
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match aliases.get(i) {
                        Some(alias) if !alias.is_empty() => write!(f, "{e} AS {alias}")?,
                        _ => write!(f, "{e}")?,
                    }
                }
                Ok(())
            }
            PlanNode::Join {
                join_type,
                condition,
                ..
            } => write!(f, "Join({join_type:?}): {condition}"),
            PlanNode::Aggregate {
                group_by,
                aggregates,
                ..
            } => {
                write!(f, "Aggregate: group_by=[")?;
                write_list(f, group_by, ", ")?;
                write!(f, "] aggs=[")?;
                write_list(f, aggregates, ", ")?;
                write!(f, "]")
            }
            PlanNode::Sort { order, .. } => {
                write!(f, "Sort: ")?;
                write_list(f, order, ", ")
            }
            PlanNode::Limit { offset, count, .. } => {
                write!(f, "Limit: offset={offset} count={count}")
            }
            PlanNode::GroupReference(id) => write!(f, "Group#{id}"),
        }
    }

    /// One-line description of this node alone, without its children.
    pub fn header(&self) -> String {
        struct Header<'a>(&'a PlanNode);
        impl fmt::Display for Header<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt_header(f)
            }
        }
        Header(self).to_string()
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}", "", indent = depth * 2)?;
        self.fmt_header(f)?;
        writeln!(f)?;
        for child in self.children() {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// EXPLAIN-style rendering, one node per line, children indented.
impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::NoLookup;

    fn scan(name: &str) -> PlanRef {
        PlanNode::scan(
            TableRef::new("s", name),
            vec![ColumnRef::new(name, "a"), ColumnRef::new(name, "b")],
        )
    }

    #[test]
    fn test_rebuild_keeps_kind_and_parameters() {
        let pred = Expr::equals(Expr::col("t", "a"), Expr::int(1));
        let filter = PlanNode::filter(pred.clone(), scan("t"));
        let rebuilt = filter.with_new_children(vec![scan("u")]).unwrap();
        match rebuilt.as_ref() {
            PlanNode::Filter { predicate, input } => {
                assert_eq!(predicate, &pred);
                assert_eq!(input, &scan("u"));
            }
            other => panic!("expected Filter, got {other:?}"),
        }
    }

    #[test]
    fn test_rebuild_rejects_wrong_arity() {
        let join = PlanNode::join(JoinType::Inner, Expr::bool(true), scan("a"), scan("b"));
        let err = join.with_new_children(vec![scan("a")]).unwrap_err();
        assert!(matches!(
            err,
            OptimizerError::ChildCountMismatch {
                kind: PlanKind::Join,
                expected: 2,
                actual: 1
            }
        ));
        assert!(scan("a").with_new_children(vec![scan("b")]).is_err());
    }

    #[test]
    fn test_structural_equality_ignores_sharing() {
        let shared = scan("t");
        let a = PlanNode::limit(0, 10, shared.clone());
        let b = PlanNode::limit(0, 10, scan("t"));
        assert_eq!(a, b);
        assert_ne!(a, PlanNode::limit(0, 11, shared));
    }

    #[test]
    fn test_output_width() {
        let join = PlanNode::join(JoinType::Inner, Expr::bool(true), scan("a"), scan("b"));
        assert_eq!(join.output_width(&NoLookup).unwrap(), Some(4));

        let semi = PlanNode::join(JoinType::Semi, Expr::bool(true), scan("a"), scan("b"));
        assert_eq!(semi.output_width(&NoLookup).unwrap(), Some(2));

        let all_columns = PlanNode::scan(TableRef::new("s", "t"), vec![]);
        let filtered = PlanNode::filter(Expr::bool(true), all_columns);
        assert_eq!(filtered.output_width(&NoLookup).unwrap(), None);

        assert!(PlanNode::group(3).output_width(&NoLookup).is_err());
    }

    #[test]
    fn test_display_indents_children() {
        let plan = PlanNode::filter(
            Expr::equals(Expr::col("t", "a"), Expr::int(1)),
            PlanNode::group(4),
        );
        assert_eq!(plan.to_string(), "Filter: (t.a = 1)\n  Group#4\n");
        assert!(plan.has_group_references());
        assert!(!scan("t").has_group_references());
        assert_eq!(plan.node_count(), 2);
    }
}
