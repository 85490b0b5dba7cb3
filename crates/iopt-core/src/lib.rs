//! # iopt-core: Memoized Iterative Plan Optimizer
//!
//! This crate implements the core of a rule-driven plan rewriter. An analyzed
//! logical plan is stored in a memo of equivalence classes, transformation
//! rules are applied group by group until a fixpoint is reached, and the
//! winning shapes are flattened back into a plain tree.
//!
//! ## Module Overview
//!
//! - **`plan`**: The plan node enum, including the group placeholder variant.
//! - **`expr`**: Scalar expressions, table and column references.
//! - **`memo`**: The Memo: groups, candidates, representatives and parent links.
//! - **`lookup`**: Shallow placeholder resolution against a memo.
//! - **`rule`**: The Rule trait, rule results and the RuleRegistry.
//! - **`pattern`**: Declarative pattern matching for rule applicability checks.
//! - **`optimizer`**: The iterative fixpoint driver.
//! - **`resolver`**: Placeholder-free flattening of memo-backed plans.
//! - **`cost`**: Cost model trait and default implementation (CPU/memory weighted).
//! - **`stats`**: Statistics structures and derivation formulas for cardinality estimation.
//! - **`catalog`**: Catalog trait for accessing table metadata and statistics.
//! - **`config`**: Optimizer limits and rule set selection.
//! - **`error`**: The optimizer error type.

pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod expr;
pub mod lookup;
pub mod memo;
pub mod optimizer;
pub mod pattern;
pub mod plan;
pub mod resolver;
pub mod rule;
pub mod stats;

pub use config::OptimizerConfig;
pub use error::{OptimizerError, Result};
pub use lookup::{Lookup, NoLookup};
pub use memo::{GroupId, Memo};
pub use optimizer::{IterativeOptimizer, OptimizedPlan};
pub use plan::{PlanKind, PlanNode, PlanRef};
pub use resolver::resolve_group_references;
