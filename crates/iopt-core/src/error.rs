//! # Optimizer Errors
//!
//! Errors fall into three classes:
//!
//! - **Consistency violations** (`UnknownGroup`, `ChildCountMismatch`,
//!   `ArityMismatch`, `SelfReference`, `CyclicReference`): a driver or rule bug.
//!   They abort the current compilation and are never shown to end users as a
//!   query error.
//! - **Rule faults** (`Rule`): a rule failed while computing a replacement. The
//!   driver propagates these instead of skipping the rule.
//! - **Budget exhaustion** (`NotConverged`, `MemoLimitExceeded`): recoverable.
//!   The error carries the best plan found so far so the caller can decide to
//!   proceed, retry with a larger budget, or fail the query.

use crate::memo::GroupId;
use crate::plan::{PlanKind, PlanRef};

pub type Result<T> = std::result::Result<T, OptimizerError>;

#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    #[error("{kind:?} expects {expected} children, got {actual}")]
    ChildCountMismatch {
        kind: PlanKind,
        expected: usize,
        actual: usize,
    },

    #[error("candidate for group {group} produces {actual} columns, group produces {expected}")]
    ArityMismatch {
        group: GroupId,
        expected: usize,
        actual: usize,
    },

    #[error("candidate for group {0} references its own group")]
    SelfReference(GroupId),

    #[error("group {0} is reachable from its own representative")]
    CyclicReference(GroupId),

    #[error("rule '{rule}' failed: {message}")]
    Rule { rule: String, message: String },

    #[error("optimizer did not converge after {passes} passes")]
    NotConverged { passes: usize, best_plan: PlanRef },

    #[error("memo grew to {groups} groups, exceeding the configured limit")]
    MemoLimitExceeded { groups: usize, best_plan: PlanRef },
}

impl OptimizerError {
    /// Build a rule fault from any displayable cause.
    pub fn rule(rule: impl Into<String>, message: impl std::fmt::Display) -> Self {
        OptimizerError::Rule {
            rule: rule.into(),
            message: message.to_string(),
        }
    }

    /// Whether the caller may continue with [`OptimizerError::best_plan`].
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OptimizerError::NotConverged { .. } | OptimizerError::MemoLimitExceeded { .. }
        )
    }

    pub fn best_plan(&self) -> Option<&PlanRef> {
        match self {
            OptimizerError::NotConverged { best_plan, .. }
            | OptimizerError::MemoLimitExceeded { best_plan, .. } => Some(best_plan),
            _ => None,
        }
    }

    pub fn into_best_plan(self) -> Option<PlanRef> {
        match self {
            OptimizerError::NotConverged { best_plan, .. }
            | OptimizerError::MemoLimitExceeded { best_plan, .. } => Some(best_plan),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::TableRef;
    use crate::plan::PlanNode;

    #[test]
    fn test_recoverable_errors_carry_plan() {
        let plan = PlanNode::scan(TableRef::new("s", "t"), vec![]);
        let err = OptimizerError::NotConverged {
            passes: 3,
            best_plan: plan.clone(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.best_plan(), Some(&plan));
        assert_eq!(err.to_string(), "optimizer did not converge after 3 passes");

        let fatal = OptimizerError::UnknownGroup(7);
        assert!(!fatal.is_recoverable());
        assert!(fatal.into_best_plan().is_none());
    }
}
