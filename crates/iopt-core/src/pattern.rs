//! # Declarative Pattern Matching for Rules
//!
//! Each rule declares a [`Pattern`] describing the shape it rewrites. The
//! driver checks the pattern before calling `apply`, so a rule never sees a
//! node it cannot handle.
//!
//! ## Pattern Language
//!
//! - `Pattern::Operator(kind, children)`: a node of the given [`PlanKind`]
//!   whose children match the child patterns positionally.
//! - `Pattern::Any`: anything, placeholders included. The common child pattern.
//! - `Pattern::Leaf`: a node without children (a Scan).
//!
//! ## Shallow and Resolved Matching
//!
//! [`Pattern::matches_node`] looks at the node alone: kind and number of
//! children. It never resolves a placeholder, which keeps the default
//! `Rule::matches` free of memo access.
//!
//! [`Pattern::matches`] additionally resolves children through a [`Lookup`]
//! wherever a child pattern is not `Any`, one level per level of nesting.
//! Rules whose shape spans a parent and a child (a filter over a join, a join
//! over a join) are matched this way.

use crate::error::Result;
use crate::lookup::Lookup;
use crate::plan::{PlanKind, PlanNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Match an operator with child patterns.
    Operator(PlanKind, Vec<Pattern>),
    /// Match any subtree (group).
    Any,
    /// Match a leaf node (no children).
    Leaf,
}

impl Pattern {
    /// Any operator of `kind` whose children are unconstrained.
    pub fn kind(kind: PlanKind, arity: usize) -> Self {
        Pattern::Operator(kind, vec![Pattern::Any; arity])
    }

    pub fn join() -> Self {
        Self::kind(PlanKind::Join, 2)
    }

    /// A join whose left child is also a join.
    pub fn join_join_left() -> Self {
        Pattern::Operator(PlanKind::Join, vec![Pattern::join(), Pattern::Any])
    }

    pub fn scan() -> Self {
        Pattern::Operator(PlanKind::Scan, vec![])
    }

    pub fn filter() -> Self {
        Self::kind(PlanKind::Filter, 1)
    }

    /// A filter directly above another filter.
    pub fn filter_filter() -> Self {
        Pattern::Operator(PlanKind::Filter, vec![Pattern::filter()])
    }

    pub fn filter_join() -> Self {
        Pattern::Operator(PlanKind::Filter, vec![Pattern::join()])
    }

    pub fn project_scan() -> Self {
        Pattern::Operator(PlanKind::Project, vec![Pattern::scan()])
    }

    /// Whether any child pattern needs the child to be resolved.
    pub fn inspects_children(&self) -> bool {
        match self {
            Pattern::Operator(_, children) => children.iter().any(|c| *c != Pattern::Any),
            Pattern::Any | Pattern::Leaf => false,
        }
    }

    /// Shallow test on `node` alone. Placeholders only match `Any`.
    pub fn matches_node(&self, node: &PlanNode) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Leaf => !node.is_group_reference() && node.arity() == 0,
            Pattern::Operator(kind, children) => {
                node.kind() == *kind && node.arity() == children.len()
            }
        }
    }

    /// Full test, resolving children through `lookup` for every child
    /// pattern that is not `Any`.
    pub fn matches(&self, node: &PlanNode, lookup: &dyn Lookup) -> Result<bool> {
        if let PlanNode::GroupReference(id) = node {
            if *self == Pattern::Any {
                return Ok(true);
            }
            let rep = lookup.resolve_group(*id)?;
            return self.matches(&rep, lookup);
        }
        if !self.matches_node(node) {
            return Ok(false);
        }
        let Pattern::Operator(_, child_patterns) = self else {
            return Ok(true);
        };
        for (child, pattern) in node.children().iter().zip(child_patterns) {
            if *pattern == Pattern::Any {
                continue;
            }
            let child = lookup.resolve(child)?;
            if !pattern.matches(&child, lookup)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
