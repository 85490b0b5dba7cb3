//! # Built-in Optimization Rules
//!
//! This crate provides the default set of transformation rules for the
//! iterative optimizer. Each rule rewrites the representative of one memo
//! group; children are visible only through placeholders and the lookup.
//!
//! ## Always-Better Rewrites (replace the representative)
//!
//! - **`RemoveTrivialFilterRule`**: Drops `Filter(x, TRUE)`.
//! - **`MergeFiltersRule`**: Collapses two adjacent filters into one with the
//!   conjunction of both predicates.
//!
//! ## Cost-Based Alternatives
//!
//! - **`PredicatePushdownRule`**: Pushes filter conjuncts into and below inner joins.
//! - **`ProjectionPushdownRule`**: Pushes column requirements into table scans.
//! - **`JoinCommutativityRule`**: Swaps the sides of inner and cross joins
//!   (A JOIN B -> B JOIN A). Lets the cost model choose the build side.
//! - **`JoinAssociativityRule`**: Changes join grouping
//!   ((A JOIN B) JOIN C -> A JOIN (B JOIN C)).

pub mod filter_simplification;
pub mod join_associativity;
pub mod join_commutativity;
pub mod predicate_pushdown;
pub mod projection_pushdown;

use iopt_core::rule::RuleRegistry;

/// Create a default rule registry with all built-in rules.
///
/// Rules run in the order registered here. Connector-specific rules can be
/// added to the returned registry via `add_source_rule_set()`.
pub fn default_rule_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    // Simplifications first, so later rules see the simplified shape.
    registry.add_rule(Box::new(filter_simplification::RemoveTrivialFilterRule));
    registry.add_rule(Box::new(filter_simplification::MergeFiltersRule));

    registry.add_rule(Box::new(predicate_pushdown::PredicatePushdownRule));
    registry.add_rule(Box::new(projection_pushdown::ProjectionPushdownRule));
    registry.add_rule(Box::new(join_commutativity::JoinCommutativityRule));
    registry.add_rule(Box::new(join_associativity::JoinAssociativityRule));

    registry
}
